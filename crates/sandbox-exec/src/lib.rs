//! Process execution: running arbitrary shell commands, executing
//! caller-supplied code in a managed per-language workspace, installing
//! dependencies into that workspace, and running the one-shot init script.

pub mod env_installer;
pub mod executor;
pub mod init_script;
pub mod process;

pub use env_installer::{EnvInstaller, InstallReport};
pub use executor::CodeExecutor;
pub use init_script::{InitScriptOutcome, InitScriptRunner};
pub use process::{ExecOutcome, ProcessRunner, DEFAULT_TIMEOUT};
