//! Startup lifecycle controller.
//!
//! Composes env install / init script / migration restore into the startup
//! state machine:
//!
//! ```text
//! INIT -> (restore? RESTORED : INSTALLING -> INSTALLED) -> INIT_SCRIPT -> READY
//!                                                                  \-> READY-BUT-UNHEALTHY
//! ```
//!
//! `MODE=local` short-circuits the whole machine straight to READY: no env
//! setup, no init script, no migration.

use crate::state::AppState;
use chrono::Utc;
use sandbox_exec::{EnvInstaller, InitScriptRunner, ProcessRunner};
use sandbox_migration::{ChangeTracker, KvStore};

/// Run the startup state machine, mutating `state.readiness` exactly once at
/// the end. Returns the startup timestamp the migration handler should use
/// as `MigrationManifest.startupTimestamp` for any later checkpoint.
pub async fn run(state: &AppState) -> chrono::DateTime<Utc> {
    let startup_timestamp = Utc::now();

    if state.config.local_mode {
        tracing::info!("MODE=local: skipping env install, init script, and migration restore");
        state.readiness.mark_ready(None);
        return startup_timestamp;
    }

    let runner = ProcessRunner::new(&state.config.root);
    let tracker = ChangeTracker::new(ChangeTracker::default_marker_path());

    let restored = match state.kv_store.as_deref() {
        Some(store) => {
            let outcome = sandbox_migration::restore(store, &state.config.root, &runner).await;
            if outcome.restored {
                tracing::info!("restored prior migration snapshot; skipping environment install");
            }
            outcome.restored
        }
        None => false,
    };

    if !restored {
        install_environment(state).await;
        // Invariant/§9 decision: the startup marker is (re)written only on a
        // non-restored start, matching the source's observed behavior — see
        // DESIGN.md "Migration marker lifetime".
        if let Err(e) = tracker.write_marker().await {
            tracing::warn!(error = %e, "failed to write migration startup marker");
        }
    }

    let init_runner = InitScriptRunner::new(&state.config.root);
    let error = match init_runner.run(&state.config.init_script).await {
        Ok(outcome) => outcome.error,
        Err(e) => Some(format!("init script runner failed to execute: {e}")),
    };

    if let Some(err) = &error {
        tracing::warn!(error = %err, "startup completed in READY-BUT-UNHEALTHY state");
    } else {
        tracing::info!("startup complete, service is READY");
    }

    state.readiness.mark_ready(error);
    startup_timestamp
}

async fn install_environment(state: &AppState) {
    let installer = EnvInstaller::new(&state.config.root, false);

    if let Err(e) = installer.prepare_node_workspace().await {
        tracing::warn!(error = %e, "failed to prepare node workspace");
    }
    if let Err(e) = installer.prepare_venv().await {
        tracing::warn!(error = %e, "failed to prepare python venv");
    }

    let node_report = installer.install_node(&state.config.node_dependencies).await;
    tracing::info!(
        installed = ?node_report.installed,
        failed = ?node_report.failed,
        "node dependency install complete"
    );

    let python_report = installer.install_python(&state.config.python_requirements).await;
    tracing::info!(
        installed = ?python_report.installed,
        failed = ?python_report.failed,
        "python dependency install complete"
    );
}
