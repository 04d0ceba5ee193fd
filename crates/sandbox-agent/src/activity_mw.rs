//! Activity/idle monitor — the request-side half.
//!
//! Touches the shared `ActivityMonitor` for every request except `/health`
//! and requests carrying the orchestrator's readiness-probe header. The PTY
//! byte-traffic half lives in `terminal.rs`.

use crate::state::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use sandbox_common::activity::READINESS_PROBE_HEADER;

pub async fn touch_activity(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let is_probe = req.headers().contains_key(READINESS_PROBE_HEADER);
    let is_health = req.uri().path() == "/health";
    if !is_probe && !is_health {
        state.activity.touch();
    }
    next.run(req).await
}

/// Background loop: every 30s, check idle duration and trigger a graceful
/// exit once it exceeds `idle_timeout_secs`. `idle_timeout_secs<=0` disables
/// the monitor entirely.
pub async fn run_idle_monitor(state: AppState) {
    let timeout_secs = state.config.idle_timeout_secs;
    if timeout_secs <= 0 {
        tracing::info!("idle monitor disabled (idleTimeoutSeconds <= 0)");
        return;
    }
    let timeout = std::time::Duration::from_secs(timeout_secs as u64);

    let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
    loop {
        interval.tick().await;
        let idle_for = state.activity.idle_for();
        if idle_for > timeout {
            tracing::info!(idle_for = ?idle_for, "idle timeout exceeded, exiting gracefully");
            std::process::exit(0);
        }
    }
}
