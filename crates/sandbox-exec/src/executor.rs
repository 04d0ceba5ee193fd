//! Code execution.
//!
//! Languages are modeled as a small closed set of `Executor` implementations
//! rather than a `match` sprinkled through the call sites: each variant
//! knows how to invoke its interpreter and what its default working
//! directory is. `execute` is the one place that wires a variant to a temp
//! file and the process runner.

use crate::process::ProcessRunner;
use rand::Rng;
use sandbox_common::{paths, ExecuteResult, Lang, SandboxError};
use std::path::{Path, PathBuf};
use std::time::Duration;

trait Executor {
    /// `(program, args)` to invoke the interpreter against `file`.
    fn invocation(&self, file: &Path) -> (String, Vec<String>);
    fn default_cwd(&self, root: &Path) -> PathBuf;
}

struct JsExecutor;
struct TsExecutor;
struct PyExecutor;

impl Executor for JsExecutor {
    fn invocation(&self, file: &Path) -> (String, Vec<String>) {
        ("node".to_string(), vec![file.display().to_string()])
    }
    fn default_cwd(&self, root: &Path) -> PathBuf {
        paths::js_ts_dir(root)
    }
}

impl Executor for TsExecutor {
    fn invocation(&self, file: &Path) -> (String, Vec<String>) {
        ("tsx".to_string(), vec![file.display().to_string()])
    }
    fn default_cwd(&self, root: &Path) -> PathBuf {
        paths::js_ts_dir(root)
    }
}

impl Executor for PyExecutor {
    fn invocation(&self, file: &Path) -> (String, Vec<String>) {
        ("python".to_string(), vec![file.display().to_string()])
    }
    fn default_cwd(&self, root: &Path) -> PathBuf {
        paths::py_dir(root)
    }
}

fn executor_for(lang: Lang) -> Option<Box<dyn Executor>> {
    match lang {
        Lang::Js => Some(Box::new(JsExecutor)),
        Lang::Ts => Some(Box::new(TsExecutor)),
        Lang::Py => Some(Box::new(PyExecutor)),
        Lang::Shell => None,
    }
}

/// Random 12-hex-character suffix — deliberately not a content hash, so two
/// concurrent executions of identical source never collide on one temp file.
fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..12)
        .map(|_| std::char::from_digit(rng.gen_range(0..16), 16).unwrap())
        .collect()
}

pub struct CodeExecutor {
    root: PathBuf,
    runner: ProcessRunner,
}

impl CodeExecutor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            runner: ProcessRunner::new(root.clone()),
            root,
        }
    }

    /// Execute `code` as `lang`. Never returns `Err` for caller-facing
    /// mistakes (empty code, bad cwd) — those come back as a populated
    /// `ExecuteResult` with `exit_code != 0`.
    pub async fn execute(
        &self,
        code: &str,
        lang: Lang,
        timeout: Option<Duration>,
        cwd: Option<&str>,
        resolve_cwd: impl Fn(&str) -> Result<PathBuf, SandboxError>,
    ) -> anyhow::Result<ExecuteResult> {
        if code.trim().is_empty() {
            return Ok(ExecuteResult {
                stdout: String::new(),
                stderr: "command is empty".to_string(),
                exit_code: 1,
                language: lang,
            });
        }

        let Some(executor) = executor_for(lang) else {
            return Ok(ExecuteResult {
                stdout: String::new(),
                stderr: format!("{lang} is not a code-execution language"),
                exit_code: 1,
                language: lang,
            });
        };

        let effective_cwd = match cwd {
            Some(raw) => match resolve_cwd(raw) {
                Ok(p) => p,
                Err(_) => {
                    return Ok(ExecuteResult {
                        stdout: String::new(),
                        stderr: "cwd escapes the sandbox root".to_string(),
                        exit_code: 1,
                        language: lang,
                    });
                }
            },
            None => executor.default_cwd(&self.root),
        };

        let file_name = format!("exec-{}.{}", random_suffix(), lang.source_extension());
        let file_path = std::env::temp_dir().join(file_name);
        tokio::fs::write(&file_path, code).await?;

        let (program, args) = executor.invocation(&file_path);
        let command = format!(
            "{} {}",
            program,
            args.iter()
                .map(|a| shell_quote(a))
                .collect::<Vec<_>>()
                .join(" ")
        );

        let outcome = self.runner.run(&command, Some(&effective_cwd), timeout).await;

        if let Err(e) = tokio::fs::remove_file(&file_path).await {
            tracing::warn!(error = %e, file = %file_path.display(), "failed to remove temp script file");
        }

        let outcome = outcome?;
        Ok(ExecuteResult {
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            exit_code: outcome.exit_code,
            language: lang,
        })
    }
}

fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn noop_resolve(_raw: &str) -> Result<PathBuf, SandboxError> {
        Err(SandboxError::path_escape("unused"))
    }

    #[tokio::test]
    async fn empty_code_is_a_result_not_an_error() {
        let dir = tempdir().unwrap();
        let exec = CodeExecutor::new(dir.path());
        let result = exec
            .execute("", Lang::Py, None, None, noop_resolve)
            .await
            .unwrap();
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.language, Lang::Py);
    }

    #[tokio::test]
    async fn shell_is_rejected_as_a_code_language() {
        let dir = tempdir().unwrap();
        let exec = CodeExecutor::new(dir.path());
        let result = exec
            .execute("echo hi", Lang::Shell, None, None, noop_resolve)
            .await
            .unwrap();
        assert_eq!(result.exit_code, 1);
    }

    #[tokio::test]
    async fn cwd_escape_yields_sandbox_escape_result() {
        let dir = tempdir().unwrap();
        let exec = CodeExecutor::new(dir.path());
        let result = exec
            .execute("print(1)", Lang::Py, None, Some("../../etc"), noop_resolve)
            .await
            .unwrap();
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("sandbox"));
    }

    #[tokio::test]
    async fn random_suffixes_differ() {
        let a = random_suffix();
        let b = random_suffix();
        assert_eq!(a.len(), 12);
        assert_ne!(a, b);
    }
}
