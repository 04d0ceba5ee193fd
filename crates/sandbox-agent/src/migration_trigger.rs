//! Migration checkpoint trigger.
//!
//! The platform's "migrating" lifecycle event is delivered by the
//! out-of-scope orchestrator. This process is modeled the same way a
//! shutdown signal is: a dedicated Unix signal the supervisor sends us,
//! `SIGUSR1`, distinct from the `SIGTERM`/ctrl-c path that ends the process
//! outright. This mapping is an explicit decision recorded in DESIGN.md —
//! no concrete transport is named for the signal since the orchestrator
//! itself is out of scope.

use crate::state::AppState;
use chrono::{DateTime, Utc};
use sandbox_exec::ProcessRunner;
use sandbox_migration::{ChangeTracker, Checkpoint};

/// Wait for migration signals and run a checkpoint for each one. A no-op
/// loop (returns immediately) when local mode is active or no K/V store is
/// configured, since there is nowhere to persist a checkpoint to.
#[cfg(unix)]
pub async fn watch(state: AppState, startup_timestamp: DateTime<Utc>) {
    use tokio::signal::unix::{signal, SignalKind};

    if state.config.local_mode {
        return;
    }
    let Some(store) = state.kv_store.clone() else {
        tracing::info!("no migration K/V store configured; migration handler not registered");
        return;
    };

    let mut migrating = match signal(SignalKind::user_defined1()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "failed to install migration signal handler");
            return;
        }
    };

    let runner = ProcessRunner::new(&state.config.root);
    let tracker = ChangeTracker::new(ChangeTracker::default_marker_path());
    let run_id = std::env::var("ACTOR_RUN_ID").ok();

    tracing::info!("migration handler registered");
    loop {
        if migrating.recv().await.is_none() {
            return;
        }
        tracing::info!("migration signal received, running checkpoint");
        let checkpoint = Checkpoint {
            root: &state.config.root,
            tracker: &tracker,
            runner: &runner,
            store: store.as_ref(),
            startup_timestamp,
            run_id: run_id.clone(),
        };
        checkpoint.run().await;
    }
}

#[cfg(not(unix))]
pub async fn watch(_state: AppState, _startup_timestamp: DateTime<Utc>) {
    tracing::info!("migration signal handling is only supported on unix platforms");
}
