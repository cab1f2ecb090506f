//! Server registration and liveness.

use tracing::{debug, info};

use crate::error::Result;
use crate::storage::{AccessDatabase, ServerInfo};

/// Known game servers, backed by the shared store.
#[derive(Clone)]
pub struct ServerRegistry {
    db: AccessDatabase,
}

impl ServerRegistry {
    pub const fn new(db: AccessDatabase) -> Self {
        Self { db }
    }

    /// Insert or refresh a server. Registering also counts as a heartbeat.
    pub async fn register_server(
        &self,
        name: &str,
        display_name: &str,
        whitelist_enabled: bool,
    ) -> Result<ServerInfo> {
        let server = self
            .db
            .upsert_server(name, display_name, whitelist_enabled)
            .await?;
        info!(server_name = %name, whitelist_enabled, "Server registered");
        Ok(server)
    }

    /// Refresh `last_heartbeat`. Returns false when the server is unknown.
    pub async fn update_heartbeat(&self, name: &str) -> Result<bool> {
        let known = self.db.touch_server(name).await?;
        debug!(server_name = %name, known, "Heartbeat");
        Ok(known)
    }

    pub async fn update_whitelist_enabled(&self, name: &str, enabled: bool) -> Result<bool> {
        let known = self.db.set_server_whitelist_enabled(name, enabled).await?;
        if known {
            info!(server_name = %name, enabled, "Server whitelist toggled");
        }
        Ok(known)
    }

    pub async fn get_all_servers(&self) -> Result<Vec<ServerInfo>> {
        Ok(self.db.list_servers().await?)
    }

    pub async fn get_server(&self, name: &str) -> Result<Option<ServerInfo>> {
        Ok(self.db.get_server(name).await?)
    }
}
