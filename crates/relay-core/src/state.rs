//! Shared application state for the server and the CLI.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::db::Database;
use crate::integration::{PlatformCatalog, PlatformDiscovery, SharedDiscoveryCache};
use crate::store::{AgentStore, AutomationStore, CredentialStore, RunStore};

/// Shared state accessible by all API handlers and CLI commands.
pub struct AppStateInner {
    pub db: Database,
    pub automation_store: AutomationStore,
    pub run_store: RunStore,
    pub credential_store: CredentialStore,
    pub agent_store: AgentStore,
    pub config: EngineConfig,
    pub discovery: Arc<PlatformDiscovery>,
    pub platform_catalog: Arc<PlatformCatalog>,
    pub discovery_cache: Option<Arc<SharedDiscoveryCache>>,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    pub fn new(db: Database) -> Self {
        Self::with_config(db, EngineConfig::default(), PlatformCatalog::new())
    }

    pub fn with_config(db: Database, config: EngineConfig, platform_catalog: PlatformCatalog) -> Self {
        Self {
            automation_store: AutomationStore::new(db.clone()),
            run_store: RunStore::new(db.clone()),
            credential_store: CredentialStore::new(db.clone()),
            agent_store: AgentStore::new(db.clone()),
            discovery: Arc::new(PlatformDiscovery::new(&config)),
            discovery_cache: config
                .discovery_cache_ttl
                .map(|ttl| Arc::new(SharedDiscoveryCache::new(ttl))),
            platform_catalog: Arc::new(platform_catalog),
            config,
            db,
        }
    }
}
