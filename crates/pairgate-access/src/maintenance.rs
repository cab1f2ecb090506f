//! Periodic removal of expired registration codes.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::codes::CodeIssuer;

/// How often `serve` sweeps expired codes.
pub const CODE_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Spawn a task deleting expired codes every `interval` until `shutdown`
/// changes.
pub fn spawn_code_sweeper(
    issuer: CodeIssuer,
    interval: Duration,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.tick().await; // Skip first immediate tick

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    match issuer.sweep_expired().await {
                        Ok(0) => {}
                        Ok(removed) => debug!(removed, "Expired registration codes removed"),
                        Err(e) => warn!(error = %e, "Expired code sweep failed"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("Code sweeper shutting down");
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::AccessDatabase;
    use pairgate_core::config::CodeConfig;

    #[tokio::test]
    async fn sweeper_removes_expired_codes() {
        let db = AccessDatabase::open_in_memory().await.unwrap();
        let expired = CodeIssuer::new(
            db.clone(),
            CodeConfig {
                ttl_minutes: 0,
                ..CodeConfig::default()
            },
        );
        let code = expired.issue_code(1, None, None).await.unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        let handle = spawn_code_sweeper(expired.clone(), Duration::from_millis(20), shutdown_rx);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(expired.find_code(&code.code).await.unwrap().is_none());

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
