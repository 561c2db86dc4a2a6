pub mod middleware;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::gateway::Gateway;
use crate::jobs::JobRegistry;
use crate::rpc::RpcClient;
use crate::scanner::{default_aggregate_ttl, AggregateCache, Scanner, TokenUsage};
use crate::stats::DailyUsage;
use crate::store::Store;
use crate::terminal::PtyRegistry;

/// Everything a handler needs, built once in `main` and cloned (cheaply,
/// via `Arc`) into the Axum router — the teacher's `AppState` shape, trimmed
/// to this system's entities.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<Store>,
    pub gateway: Arc<Gateway>,
    pub pty_registry: Arc<PtyRegistry>,
    pub scanner: Arc<Scanner>,
    pub jobs: Arc<JobRegistry>,
    pub total_usage_cache: Arc<AggregateCache<TokenUsage>>,
    pub daily_usage_cache: Arc<AggregateCache<Vec<DailyUsage>>>,
}

impl AppState {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let store = Store::load(config.data_dir.clone())?;

        let agent_tool = std::env::var("DOCKHAND_AGENT_TOOL").unwrap_or_else(|_| "codex".to_string());
        let rpc = Arc::new(RpcClient::new(agent_tool, vec!["app-server".to_string()]));
        let gateway = Arc::new(Gateway::new(rpc));

        Ok(Self {
            config,
            store,
            gateway,
            pty_registry: Arc::new(PtyRegistry::new()),
            scanner: Arc::new(Scanner::new()),
            jobs: JobRegistry::new(),
            total_usage_cache: Arc::new(AggregateCache::new(default_aggregate_ttl())),
            daily_usage_cache: Arc::new(AggregateCache::new(Duration::from_secs(120))),
        })
    }
}
