//! Shared application state, passed to every axum handler via `State`.

use crate::config::AgentConfig;
use sandbox_common::{ActivityMonitor, Readiness};
use sandbox_exec::CodeExecutor;
use sandbox_fs::PathResolver;
use sandbox_migration::{HttpKvStore, KvStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AgentConfig>,
    pub readiness: Arc<Readiness>,
    pub activity: Arc<ActivityMonitor>,
    pub resolver: Arc<PathResolver>,
    pub executor: Arc<CodeExecutor>,
    /// `None` when `SANDBOX_MIGRATION_KV_URL` is unset — migration checkpoint
    /// and restore are both no-ops in that case.
    pub kv_store: Option<Arc<dyn KvStore>>,
}

impl AppState {
    pub fn new(config: AgentConfig) -> anyhow::Result<Self> {
        let resolver = PathResolver::new(&config.root)?;
        let executor = CodeExecutor::new(&config.root);
        let kv_store: Option<Arc<dyn KvStore>> = config
            .kv_base_url
            .as_ref()
            .map(|url| Arc::new(HttpKvStore::new(url.clone())) as Arc<dyn KvStore>);
        Ok(Self {
            readiness: Arc::new(Readiness::new()),
            activity: Arc::new(ActivityMonitor::new()),
            resolver: Arc::new(resolver),
            executor: Arc::new(executor),
            kv_store,
            config: Arc::new(config),
        })
    }
}
