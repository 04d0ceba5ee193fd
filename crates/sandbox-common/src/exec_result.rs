//! Uniform request/response shapes for shell and code execution.

use crate::lang::Lang;
use serde::{Deserialize, Serialize};

fn default_timeout_secs() -> Option<u32> {
    None
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteRequest {
    pub command: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default = "default_timeout_secs", rename = "timeoutSecs")]
    pub timeout_secs: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteResult {
    pub stdout: String,
    pub stderr: String,
    #[serde(rename = "exitCode")]
    pub exit_code: i32,
    pub language: Lang,
}

impl ExecuteResult {
    pub fn success(stdout: String, stderr: String, language: Lang) -> Self {
        Self {
            stdout,
            stderr,
            exit_code: 0,
            language,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}
