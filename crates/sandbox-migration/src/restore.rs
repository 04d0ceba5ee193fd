//! Restore procedure: runs at startup, before environment installation.
//! Failures here never abort startup — they are logged, and the caller
//! falls back to a fresh `setupExecutionEnvironment` pass.

use crate::kv_store::{KvStore, MANIFEST_KEY, TARBALL_KEY};
use crate::manifest::{self, MigrationManifest};
use crate::tarball;
use sandbox_common::paths;
use sandbox_exec::ProcessRunner;
use std::path::Path;
use std::time::Duration;

const APT_INSTALL_TIMEOUT: Duration = Duration::from_secs(300);

pub struct RestoreOutcome {
    pub restored: bool,
    pub manifest: Option<MigrationManifest>,
}

/// Attempt a restore. `Ok(RestoreOutcome{restored: false, ..})` is the
/// normal "nothing to restore" path, not an error.
pub async fn restore(store: &dyn KvStore, root: &Path, runner: &ProcessRunner) -> RestoreOutcome {
    let manifest_bytes = match store.get(MANIFEST_KEY).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return RestoreOutcome { restored: false, manifest: None },
        Err(e) => {
            tracing::warn!(error = %e, "failed to read migration manifest, skipping restore");
            return RestoreOutcome { restored: false, manifest: None };
        }
    };

    let manifest = match manifest::parse(&manifest_bytes) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(error = %e, "migration manifest is invalid, skipping restore");
            return RestoreOutcome { restored: false, manifest: None };
        }
    };

    let tarball_bytes = match store.get(TARBALL_KEY).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            tracing::warn!("migration manifest present but tarball missing, skipping restore");
            return RestoreOutcome { restored: false, manifest: None };
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to download migration tarball, skipping restore");
            return RestoreOutcome { restored: false, manifest: None };
        }
    };

    if let Err(e) = tarball::extract(tarball_bytes).await {
        tracing::warn!(error = %e, "failed to extract migration tarball, skipping restore");
        return RestoreOutcome { restored: false, manifest: None };
    }

    reinstall_apt_packages(runner, &manifest).await;
    reinstall_pip_packages(runner, root, &manifest).await;
    reinstall_node_packages(runner, root).await;

    RestoreOutcome {
        restored: true,
        manifest: Some(manifest),
    }
}

async fn reinstall_apt_packages(runner: &ProcessRunner, manifest: &MigrationManifest) {
    if manifest.packages.apt.is_empty() {
        return;
    }
    let update = runner.run("apt-get update", None, Some(APT_INSTALL_TIMEOUT)).await;
    if let Err(e) = update {
        tracing::warn!(error = %e, "apt-get update failed during restore");
        return;
    }
    let packages = manifest.packages.apt.join(" ");
    let command = format!("apt-get install -y {packages}");
    match runner.run(&command, None, Some(APT_INSTALL_TIMEOUT)).await {
        Ok(outcome) if outcome.exit_code != 0 => {
            tracing::warn!(stderr = %outcome.stderr, "apt package restore reported failures");
        }
        Err(e) => tracing::warn!(error = %e, "apt package restore failed to run"),
        _ => {}
    }
}

async fn reinstall_pip_packages(runner: &ProcessRunner, root: &Path, manifest: &MigrationManifest) {
    if manifest.packages.pip.is_empty() {
        return;
    }
    let requirements_path = std::env::temp_dir().join("restore-requirements.txt");
    let contents = manifest.packages.pip.join("\n");
    if let Err(e) = tokio::fs::write(&requirements_path, contents).await {
        tracing::warn!(error = %e, "failed to write restore requirements file");
        return;
    }

    let pip = paths::venv_bin_dir(root).join("pip");
    let command = format!("{} install -r {}", pip.display(), requirements_path.display());
    match runner.run(&command, None, Some(APT_INSTALL_TIMEOUT)).await {
        Ok(outcome) if outcome.exit_code != 0 => {
            tracing::warn!(stderr = %outcome.stderr, "python package restore reported failures");
        }
        Err(e) => tracing::warn!(error = %e, "python package restore failed to run"),
        _ => {}
    }

    if let Err(e) = tokio::fs::remove_file(&requirements_path).await {
        tracing::warn!(error = %e, "failed to remove restore requirements file");
    }
}

async fn reinstall_node_packages(runner: &ProcessRunner, root: &Path) {
    let package_json = paths::package_json(root);
    if !package_json.exists() {
        return;
    }
    let js_dir = paths::js_ts_dir(root);
    match runner
        .run("npm install", Some(&js_dir), Some(APT_INSTALL_TIMEOUT))
        .await
    {
        Ok(outcome) if outcome.exit_code != 0 => {
            tracing::warn!(stderr = %outcome.stderr, "node package restore reported failures");
        }
        Err(e) => tracing::warn!(error = %e, "node package restore failed to run"),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EmptyStore;
    #[async_trait]
    impl KvStore for EmptyStore {
        async fn put(&self, _key: &str, _value: Vec<u8>) -> anyhow::Result<()> {
            Ok(())
        }
        async fn get(&self, _key: &str) -> anyhow::Result<Option<Vec<u8>>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn absent_manifest_means_no_restore() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new(dir.path());
        let outcome = restore(&EmptyStore, dir.path(), &runner).await;
        assert!(!outcome.restored);
        assert!(outcome.manifest.is_none());
    }
}
