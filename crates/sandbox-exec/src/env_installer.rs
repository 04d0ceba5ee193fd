//! Language environment installation.
//!
//! Idempotent preparation of the two per-language workspaces and
//! installation of caller-declared dependencies into them. Failures never
//! become fatal: they are collected into the `failed` list and logged, but
//! do not block readiness.

use crate::process::ProcessRunner;
use sandbox_common::paths;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

const PER_PACKAGE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Default, serde::Serialize)]
pub struct InstallReport {
    pub success: bool,
    pub installed: Vec<String>,
    pub failed: Vec<String>,
}

pub struct EnvInstaller {
    root: PathBuf,
    runner: ProcessRunner,
    local_mode: bool,
}

impl EnvInstaller {
    pub fn new(root: impl Into<PathBuf>, local_mode: bool) -> Self {
        let root = root.into();
        Self {
            runner: ProcessRunner::new(root.clone()),
            root,
            local_mode,
        }
    }

    pub async fn prepare_node_workspace(&self) -> anyhow::Result<bool> {
        if self.local_mode {
            return Ok(true);
        }
        let js_dir = paths::js_ts_dir(&self.root);
        let package_json = paths::package_json(&self.root);
        let node_modules = paths::node_modules_dir(&self.root);

        if package_json.exists() && node_modules.exists() {
            tracing::info!("node workspace pre-provisioned");
            return Ok(true);
        }

        tokio::fs::create_dir_all(&js_dir).await?;
        tokio::fs::write(&package_json, minimal_package_json()).await?;
        tokio::fs::create_dir_all(&node_modules).await?;
        Ok(false)
    }

    pub async fn prepare_venv(&self) -> anyhow::Result<bool> {
        if self.local_mode {
            return Ok(true);
        }
        let venv_dir = paths::venv_dir(&self.root);
        if venv_dir.exists() {
            tracing::info!("python venv pre-provisioned");
            return Ok(true);
        }

        tokio::fs::create_dir_all(paths::py_dir(&self.root)).await?;
        let mut env = self.runner.child_env();
        env.remove("PYTHONHOME");
        env.remove("VIRTUAL_ENV");
        let outcome = self
            .runner
            .run(
                &format!("python3 -m venv {}", venv_dir.display()),
                Some(&paths::py_dir(&self.root)),
                Some(Duration::from_secs(120)),
            )
            .await?;
        if outcome.exit_code != 0 {
            anyhow::bail!("failed to create venv: {}", outcome.stderr);
        }
        Ok(false)
    }

    pub async fn install_node(&self, deps: &BTreeMap<String, String>) -> InstallReport {
        if self.local_mode || deps.is_empty() {
            return InstallReport {
                success: true,
                installed: Vec::new(),
                failed: Vec::new(),
            };
        }

        let js_dir = paths::js_ts_dir(&self.root);
        let mut installed = Vec::new();
        let mut failed = Vec::new();

        for (pkg, version) in deps {
            let spec = if version.is_empty() {
                pkg.clone()
            } else {
                format!("{pkg}@{version}")
            };
            let command = format!("npm install --no-save {spec}");
            match self
                .runner
                .run(&command, Some(&js_dir), Some(PER_PACKAGE_TIMEOUT))
                .await
            {
                Ok(outcome) if outcome.exit_code == 0 => installed.push(pkg.clone()),
                Ok(outcome) => {
                    tracing::warn!(package = %pkg, stderr = %outcome.stderr, "npm install failed");
                    failed.push(pkg.clone());
                }
                Err(e) => {
                    tracing::warn!(package = %pkg, error = %e, "npm install spawn failed");
                    failed.push(pkg.clone());
                }
            }
        }

        InstallReport {
            success: failed.is_empty(),
            installed,
            failed,
        }
    }

    pub async fn install_python(&self, requirements: &str) -> InstallReport {
        let entries = parse_requirements(requirements);
        if self.local_mode || entries.is_empty() {
            return InstallReport {
                success: true,
                installed: Vec::new(),
                failed: Vec::new(),
            };
        }

        let venv_pip = format!(
            "{}/pip",
            paths::venv_bin_dir(&self.root).display()
        );
        let mut installed = Vec::new();
        let mut failed = Vec::new();

        for entry in entries {
            let command = format!("{venv_pip} install {entry}");
            match self
                .runner
                .run(&command, Some(&self.root), Some(PER_PACKAGE_TIMEOUT))
                .await
            {
                Ok(outcome) if outcome.exit_code == 0 => installed.push(entry),
                Ok(outcome) => {
                    tracing::warn!(package = %entry, stderr = %outcome.stderr, "pip install failed");
                    failed.push(entry);
                }
                Err(e) => {
                    tracing::warn!(package = %entry, error = %e, "pip install spawn failed");
                    failed.push(entry);
                }
            }
        }

        InstallReport {
            success: failed.is_empty(),
            installed,
            failed,
        }
    }
}

fn minimal_package_json() -> &'static str {
    "{\n  \"name\": \"sandbox-js-ts\",\n  \"private\": true,\n  \"type\": \"module\"\n}\n"
}

/// Parse a requirements.txt-style blob: blank lines and `#` comments skipped.
fn parse_requirements(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_requirements_skipping_blank_and_comments() {
        let text = "\nrequests==2.31.0\n# a comment\n\nflask\n";
        let parsed = parse_requirements(text);
        assert_eq!(parsed, vec!["requests==2.31.0", "flask"]);
    }

    #[tokio::test]
    async fn prepare_node_workspace_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let installer = EnvInstaller::new(dir.path(), false);
        let first = installer.prepare_node_workspace().await.unwrap();
        assert!(!first);
        let second = installer.prepare_node_workspace().await.unwrap();
        assert!(second);
    }

    #[tokio::test]
    async fn local_mode_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let installer = EnvInstaller::new(dir.path(), true);
        assert!(installer.prepare_node_workspace().await.unwrap());
        assert!(installer.prepare_venv().await.unwrap());
    }
}
