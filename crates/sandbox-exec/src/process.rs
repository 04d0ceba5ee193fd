//! Process execution.
//!
//! Spawns a child through a system shell with a curated environment, waits
//! with a timeout, and always returns a result — internal failures
//! (spawn errors) are the only thing that propagate as `Err` to the facade;
//! a non-zero exit or a timeout is a normal, successful `Ok(ExecOutcome)`.

use sandbox_common::paths;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

pub struct ProcessRunner {
    root: PathBuf,
}

impl ProcessRunner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Build the environment every spawned child inherits: the parent
    /// environment augmented with the per-language binary directories on
    /// `PATH`, `NODE_PATH`, `VIRTUAL_ENV`, and an explicitly emptied
    /// `PYTHONHOME`.
    pub fn child_env(&self) -> HashMap<String, String> {
        let mut env: HashMap<String, String> = std::env::vars().collect();

        let existing_path = env.get("PATH").cloned().unwrap_or_default();
        let prepend = format!(
            "{}:{}",
            paths::node_modules_bin_dir(&self.root).display(),
            paths::venv_bin_dir(&self.root).display(),
        );
        env.insert(
            "PATH".to_string(),
            if existing_path.is_empty() {
                prepend
            } else {
                format!("{prepend}:{existing_path}")
            },
        );
        env.insert(
            "NODE_PATH".to_string(),
            paths::node_modules_dir(&self.root).display().to_string(),
        );
        env.insert(
            "VIRTUAL_ENV".to_string(),
            paths::venv_dir(&self.root).display().to_string(),
        );
        env.remove("PYTHONHOME");
        env.insert("PYTHONHOME".to_string(), String::new());

        env
    }

    /// Run `command` through `sh -c`, buffering stdout/stderr fully.
    /// Defaults: `cwd` = sandbox root, `timeout` = [`DEFAULT_TIMEOUT`].
    pub async fn run(
        &self,
        command: &str,
        cwd: Option<&Path>,
        timeout: Option<Duration>,
    ) -> anyhow::Result<ExecOutcome> {
        let cwd = cwd.unwrap_or(&self.root);
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(cwd)
            .envs(self.child_env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;
        let mut stdout_pipe = child.stdout.take().expect("stdout piped");
        let mut stderr_pipe = child.stderr.take().expect("stderr piped");

        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stdout_pipe.read_to_end(&mut buf).await;
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr_pipe.read_to_end(&mut buf).await;
            buf
        });

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                let stdout = stdout_task.await.unwrap_or_default();
                let stderr = stderr_task.await.unwrap_or_default();
                Ok(ExecOutcome {
                    stdout: String::from_utf8_lossy(&stdout).to_string(),
                    stderr: String::from_utf8_lossy(&stderr).to_string(),
                    exit_code: status.code().unwrap_or(-1),
                })
            }
            Ok(Err(e)) => Err(anyhow::anyhow!("failed to wait for child: {e}")),
            Err(_) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                let stdout = stdout_task.await.unwrap_or_default();
                let mut stderr = stderr_task.await.unwrap_or_default();
                stderr.extend_from_slice(
                    format!("\n[timed out after {}s]", timeout.as_secs()).as_bytes(),
                );
                Ok(ExecOutcome {
                    stdout: String::from_utf8_lossy(&stdout).to_string(),
                    stderr: String::from_utf8_lossy(&stderr).to_string(),
                    exit_code: 124,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn runs_simple_command() {
        let dir = tempdir().unwrap();
        let runner = ProcessRunner::new(dir.path());
        let out = runner.run("echo hi", None, None).await.unwrap();
        assert_eq!(out.stdout.trim(), "hi");
        assert_eq!(out.exit_code, 0);
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_an_error() {
        let dir = tempdir().unwrap();
        let runner = ProcessRunner::new(dir.path());
        let out = runner.run("exit 7", None, None).await.unwrap();
        assert_eq!(out.exit_code, 7);
    }

    #[tokio::test]
    async fn timeout_kills_child_and_reports_nonzero() {
        let dir = tempdir().unwrap();
        let runner = ProcessRunner::new(dir.path());
        let out = runner
            .run("sleep 5", None, Some(Duration::from_millis(100)))
            .await
            .unwrap();
        assert_ne!(out.exit_code, 0);
        assert!(out.stderr.contains("timed out"));
    }

    #[tokio::test]
    async fn default_cwd_is_root() {
        let dir = tempdir().unwrap();
        let runner = ProcessRunner::new(dir.path());
        let out = runner.run("pwd", None, None).await.unwrap();
        assert_eq!(
            out.stdout.trim(),
            dir.path().canonicalize().unwrap().display().to_string()
        );
    }
}
