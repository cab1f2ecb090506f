//! Periodic heartbeat keeping the local server marked online.

use std::time::Duration;

use tracing::{info, warn};

use super::ServerRegistry;

/// Spawn a task that refreshes the server's heartbeat every `interval` until
/// `shutdown` changes. A server row that disappeared is registered again.
pub fn spawn_heartbeat_task(
    registry: ServerRegistry,
    name: String,
    display_name: String,
    whitelist_enabled: bool,
    interval: Duration,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.tick().await; // Skip first immediate tick

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    match registry.update_heartbeat(&name).await {
                        Ok(true) => {}
                        Ok(false) => {
                            warn!(server_name = %name, "Server row missing, registering again");
                            if let Err(e) = registry
                                .register_server(&name, &display_name, whitelist_enabled)
                                .await
                            {
                                warn!(server_name = %name, error = %e, "Re-registration failed");
                            }
                        }
                        Err(e) => warn!(server_name = %name, error = %e, "Heartbeat failed"),
                    }
                }
                _ = shutdown.changed() => {
                    info!(server_name = %name, "Heartbeat task shutting down");
                    return;
                }
            }
        }
    })
}
