//! Environment contract: everything the process reads from its environment
//! at startup, collected into one struct the rest of the crate passes around
//! instead of calling `std::env::var` ad hoc.

use std::collections::BTreeMap;
use std::path::PathBuf;

const DEFAULT_ROOT: &str = "/sandbox";
const DEFAULT_IDLE_TIMEOUT_SECS: i64 = 600;
const DEFAULT_PTY_PORT: u16 = 7681;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub port: u16,
    pub public_url: Option<String>,
    pub local_mode: bool,
    pub root: PathBuf,
    pub idle_timeout_secs: i64,
    pub pty_port: u16,
    pub kv_base_url: Option<String>,
    pub init_script: String,
    /// `{pkg -> versionSpec}`, parsed from a JSON object.
    pub node_dependencies: BTreeMap<String, String>,
    /// requirements.txt-format text.
    pub python_requirements: String,
}

/// Parse the `SANDBOX_NODE_DEPENDENCIES` env var: a JSON object mapping
/// package name to version spec. Absent or malformed input yields an empty
/// map rather than failing startup — dependency installation is best-effort
/// ambient behavior, not a readiness gate.
fn parse_node_dependencies(raw: Option<String>) -> BTreeMap<String, String> {
    let Some(raw) = raw else {
        return BTreeMap::new();
    };
    match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!(error = %e, "SANDBOX_NODE_DEPENDENCIES is not a valid JSON object, ignoring");
            BTreeMap::new()
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let port = std::env::var("ACTOR_WEB_SERVER_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .ok_or_else(|| anyhow::anyhow!("ACTOR_WEB_SERVER_PORT must be set to a valid port"))?;

        let public_url = std::env::var("ACTOR_WEB_SERVER_URL").ok();
        let local_mode = std::env::var("MODE")
            .map(|v| v.eq_ignore_ascii_case("local"))
            .unwrap_or(false);

        let root = std::env::var("SANDBOX_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_ROOT));

        let idle_timeout_secs = std::env::var("SANDBOX_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS);

        let pty_port = std::env::var("SANDBOX_PTY_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PTY_PORT);

        let kv_base_url = std::env::var("SANDBOX_MIGRATION_KV_URL").ok();
        let init_script = std::env::var("SANDBOX_INIT_SCRIPT").unwrap_or_default();
        let node_dependencies = parse_node_dependencies(std::env::var("SANDBOX_NODE_DEPENDENCIES").ok());
        let python_requirements = std::env::var("SANDBOX_PYTHON_REQUIREMENTS").unwrap_or_default();

        Ok(Self {
            port,
            public_url,
            local_mode,
            root,
            idle_timeout_secs,
            pty_port,
            kv_base_url,
            init_script,
            node_dependencies,
            python_requirements,
        })
    }
}
