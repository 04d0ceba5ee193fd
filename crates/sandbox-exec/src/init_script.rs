//! Init script execution.
//!
//! Runs the caller-supplied init script exactly once during startup. A
//! failing script does not abort startup — it is recorded as the readiness
//! error so `/health` can report READY_BUT_UNHEALTHY instead of blocking
//! forever.

use crate::process::ProcessRunner;
use std::path::PathBuf;
use std::time::Duration;

const INIT_TIMEOUT: Duration = Duration::from_secs(300);

#[cfg(unix)]
const SCRIPT_MODE: u32 = 0o755;

pub struct InitScriptOutcome {
    pub ran: bool,
    pub error: Option<String>,
}

pub struct InitScriptRunner {
    root: PathBuf,
    runner: ProcessRunner,
}

impl InitScriptRunner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            runner: ProcessRunner::new(root.clone()),
            root,
        }
    }

    /// Execute `script`, returning whatever readiness error it produced.
    /// `Ok` is returned even for a non-zero exit; only I/O failures around
    /// the temp file itself propagate as `Err`.
    pub async fn run(&self, script: &str) -> anyhow::Result<InitScriptOutcome> {
        if script.trim().is_empty() {
            return Ok(InitScriptOutcome {
                ran: false,
                error: None,
            });
        }

        let file_name = format!("init-{}.sh", std::process::id());
        let file_path = std::env::temp_dir().join(file_name);
        tokio::fs::write(&file_path, script).await?;
        self.apply_executable_mode(&file_path).await?;

        let command = format!("bash {}", file_path.display());
        let run_result = self
            .runner
            .run(&command, Some(&self.root), Some(INIT_TIMEOUT))
            .await;

        if let Err(e) = tokio::fs::remove_file(&file_path).await {
            tracing::warn!(error = %e, file = %file_path.display(), "failed to remove init script");
        }

        let outcome = run_result?;
        if outcome.exit_code != 0 {
            return Ok(InitScriptOutcome {
                ran: true,
                error: Some(format!(
                    "init script exited {}: {}",
                    outcome.exit_code,
                    outcome.stderr.trim()
                )),
            });
        }

        Ok(InitScriptOutcome {
            ran: true,
            error: None,
        })
    }

    #[cfg(unix)]
    async fn apply_executable_mode(&self, path: &std::path::Path) -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(SCRIPT_MODE);
        tokio::fs::set_permissions(path, perms).await?;
        Ok(())
    }

    #[cfg(not(unix))]
    async fn apply_executable_mode(&self, _path: &std::path::Path) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn empty_script_is_a_noop() {
        let dir = tempdir().unwrap();
        let runner = InitScriptRunner::new(dir.path());
        let outcome = runner.run("").await.unwrap();
        assert!(!outcome.ran);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn successful_script_reports_no_error() {
        let dir = tempdir().unwrap();
        let runner = InitScriptRunner::new(dir.path());
        let outcome = runner.run("exit 0").await.unwrap();
        assert!(outcome.ran);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn failing_script_is_recorded_but_does_not_error() {
        let dir = tempdir().unwrap();
        let runner = InitScriptRunner::new(dir.path());
        let outcome = runner.run("echo boom >&2; exit 3").await.unwrap();
        assert!(outcome.ran);
        let err = outcome.error.expect("expected a recorded error");
        assert!(err.contains("3"));
        assert!(err.contains("boom"));
    }
}
