//! Wiring of every access component around one database handle.

use pairgate_core::Config;
use pairgate_core::config::database_path;
use tracing::info;

use crate::activation::ActivationOrchestrator;
use crate::cache::WhitelistCache;
use crate::codes::CodeIssuer;
use crate::error::{AccessError, Result};
use crate::gate::AccessGate;
use crate::links::LinkStore;
use crate::registry::ServerRegistry;
use crate::storage::AccessDatabase;
use crate::whitelist::WhitelistManager;

/// Built once at startup. Every field is a cheap clone sharing the pool.
#[derive(Clone)]
pub struct AccessContext {
    pub config: Config,
    pub db: AccessDatabase,
    pub codes: CodeIssuer,
    pub links: LinkStore,
    pub whitelist: WhitelistManager,
    pub registry: ServerRegistry,
    pub activation: ActivationOrchestrator,
    pub cache: WhitelistCache,
}

impl AccessContext {
    /// Open the configured database (or the default data-dir location) and
    /// build every component on top of it.
    pub async fn open(config: Config) -> Result<Self> {
        let path = config
            .database
            .path
            .clone()
            .or_else(database_path)
            .ok_or_else(|| AccessError::NotFound("A data directory for the database".into()))?;
        let db = AccessDatabase::open(&path, &config.database).await?;
        info!(path = %path.display(), "Access database opened");
        Ok(Self::with_database(db, config))
    }

    pub fn with_database(db: AccessDatabase, config: Config) -> Self {
        let codes = CodeIssuer::new(db.clone(), config.codes.clone());
        let links = LinkStore::new(db.clone());
        let whitelist = WhitelistManager::new(db.clone(), config.server.clone());
        let registry = ServerRegistry::new(db.clone());
        let activation = ActivationOrchestrator::new(
            db.clone(),
            codes.clone(),
            whitelist.clone(),
            links.clone(),
            config.activation.clone(),
        );
        let cache = WhitelistCache::new(
            whitelist.clone(),
            registry.clone(),
            config.cache.ttl(),
            config.cache.max_entries,
        );

        Self {
            config,
            db,
            codes,
            links,
            whitelist,
            registry,
            activation,
            cache,
        }
    }

    /// Gate for the proxy: id-only answers from the TTL cache.
    pub fn proxy_gate(&self) -> AccessGate<WhitelistCache> {
        AccessGate::new(self.cache.clone(), self.config.gate.clone())
    }

    /// Gate for a game server: direct lookups with the name fallback.
    pub fn server_gate(&self) -> AccessGate<WhitelistManager> {
        AccessGate::new(self.whitelist.clone(), self.config.gate.clone())
    }
}
