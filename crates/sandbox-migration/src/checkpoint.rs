//! Checkpoint procedure: triggered by the platform's "migrating" signal.
//! Never allowed to block shutdown — every failure is logged and swallowed.

use crate::change_tracker::ChangeTracker;
use crate::kv_store::{KvStore, MANIFEST_KEY, TARBALL_KEY};
use crate::manifest::{MigrationManifest, PackageDelta};
use crate::packages;
use crate::tarball;
use chrono::{DateTime, Utc};
use sandbox_common::paths;
use sandbox_exec::ProcessRunner;
use std::path::Path;

pub struct Checkpoint<'a> {
    pub root: &'a Path,
    pub tracker: &'a ChangeTracker,
    pub runner: &'a ProcessRunner,
    pub store: &'a dyn KvStore,
    pub startup_timestamp: DateTime<Utc>,
    pub run_id: Option<String>,
}

impl<'a> Checkpoint<'a> {
    /// Run the full checkpoint. Errors are logged internally; the return
    /// value is informational only and is never propagated to a caller that
    /// must proceed with shutdown regardless.
    pub async fn run(self) {
        let (changed_files, packages) = tokio::join!(
            self.tracker.find_changed_files(self.root),
            self.snapshot_packages(),
        );

        let changed_files = match changed_files {
            Ok(cf) => cf,
            Err(e) => {
                tracing::warn!(error = %e, "failed to enumerate changed files during checkpoint");
                Default::default()
            }
        };

        let manifest = MigrationManifest::new(
            self.startup_timestamp,
            self.run_id.clone(),
            packages,
            changed_files.clone(),
        );

        let tarball_bytes = match tarball::build(changed_files.paths.clone()).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "failed to build migration tarball, checkpoint aborted");
                return;
            }
        };

        let manifest_bytes = match serde_json::to_vec(&manifest) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize migration manifest");
                return;
            }
        };

        if let Err(e) = self.store.put(TARBALL_KEY, tarball_bytes).await {
            tracing::warn!(error = %e, "failed to upload migration tarball");
            return;
        }
        if let Err(e) = self.store.put(MANIFEST_KEY, manifest_bytes).await {
            tracing::warn!(error = %e, "failed to upload migration manifest");
        }

        tracing::info!(
            files = changed_files.count,
            bytes = changed_files.total_size,
            "migration checkpoint complete"
        );
    }

    async fn snapshot_packages(&self) -> PackageDelta {
        let apt = packages::read_apt_history(&packages::apt_history_path()).await;
        let pip = packages::snapshot_python_packages(
            self.runner,
            &paths::venv_dir(self.root),
            &packages::pip_baseline_path(),
        )
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to snapshot python packages");
            Vec::new()
        });
        PackageDelta { apt, pip }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv_store::HttpKvStore;

    #[tokio::test]
    async fn checkpoint_with_no_changes_uploads_empty_tarball() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join(".marker");
        let tracker = ChangeTracker::new(&marker);
        tracker.write_marker().await.unwrap();
        let runner = ProcessRunner::new(dir.path());

        struct NullStore;
        #[async_trait::async_trait]
        impl KvStore for NullStore {
            async fn put(&self, _key: &str, _value: Vec<u8>) -> anyhow::Result<()> {
                Ok(())
            }
            async fn get(&self, _key: &str) -> anyhow::Result<Option<Vec<u8>>> {
                Ok(None)
            }
        }

        let checkpoint = Checkpoint {
            root: dir.path(),
            tracker: &tracker,
            runner: &runner,
            store: &NullStore,
            startup_timestamp: Utc::now(),
            run_id: None,
        };
        checkpoint.run().await;
        let _ = HttpKvStore::new("http://unused.invalid");
    }
}
