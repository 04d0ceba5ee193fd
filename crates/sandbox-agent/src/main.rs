//! Binary entry point: wires config, state, the startup sequence, the
//! background monitors, and the HTTP facade together.

mod activity_mw;
mod config;
mod http;
mod lifecycle;
mod migration_trigger;
mod state;
mod terminal;

use anyhow::{Context, Result};
use config::AgentConfig;
use state::AppState;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = AgentConfig::from_env().context("failed to read environment configuration")?;
    info!(port = config.port, local_mode = config.local_mode, "starting sandbox agent");

    let state = AppState::new(config).context("failed to initialize application state")?;

    let startup_timestamp = lifecycle::run(&state).await;

    tokio::spawn(activity_mw::run_idle_monitor(state.clone()));
    tokio::spawn(migration_trigger::watch(state.clone(), startup_timestamp));

    if !state.config.local_mode {
        let supervisor = terminal::TerminalSupervisor::new(state.config.pty_port, state.config.root.clone());
        tokio::spawn(supervisor.supervise());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let router = http::build(state);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(address = %addr, "sandbox agent listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;

    info!("sandbox agent shut down");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "ctrl_c handler error");
                }
                return;
            }
        };

        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    warn!(error = %e, "ctrl_c handler error");
                }
            }
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl_c handler error");
        }
    }
}
