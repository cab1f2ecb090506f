//! Read-through TTL cache in front of whitelist lookups and the server registry.
//!
//! Staleness is bounded by the TTL and explicit invalidation only. Writes to
//! the store do not invalidate anything here; callers that mutate entries
//! through another path must call one of the `invalidate*` methods.
//!
//! The cache lives in the process that serves lookups (the proxy host), which
//! owns its invalidation and runs [`WhitelistCache::spawn_sweeper`]. One-shot
//! `pairgate` commands only invalidate their own short-lived copy.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::registry::ServerRegistry;
use crate::storage::ServerInfo;
use crate::whitelist::WhitelistManager;

#[derive(Debug, Clone)]
struct Cached<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Cached<T> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

fn player_key(player_id: Uuid, server_name: &str) -> String {
    format!("{player_id}:{server_name}")
}

/// Insert under the capacity bound: purge expired entries first, then evict
/// one arbitrary entry if the map is still full.
fn insert_bounded<T>(
    map: &mut HashMap<String, Cached<T>>,
    key: String,
    value: Cached<T>,
    max_entries: usize,
    now: Instant,
) {
    if max_entries == 0 {
        return;
    }
    if !map.contains_key(&key) && map.len() >= max_entries {
        map.retain(|_, cached| !cached.is_expired(now));
        if map.len() >= max_entries {
            if let Some(victim) = map.keys().next().cloned() {
                map.remove(&victim);
            }
        }
    }
    map.insert(key, value);
}

/// Bounded TTL cache of `(player, server) -> whitelisted` answers and of
/// [`ServerInfo`] rows.
#[derive(Clone)]
pub struct WhitelistCache {
    whitelist: WhitelistManager,
    registry: ServerRegistry,
    ttl: Duration,
    max_entries: usize,
    players: Arc<RwLock<HashMap<String, Cached<bool>>>>,
    servers: Arc<RwLock<HashMap<String, Cached<ServerInfo>>>>,
}

impl WhitelistCache {
    pub fn new(
        whitelist: WhitelistManager,
        registry: ServerRegistry,
        ttl: Duration,
        max_entries: usize,
    ) -> Self {
        Self {
            whitelist,
            registry,
            ttl,
            max_entries,
            players: Arc::new(RwLock::new(HashMap::new())),
            servers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached whitelist answer, reading through to the store on a miss or an
    /// expired entry. Negative answers are cached too.
    pub async fn is_whitelisted(&self, player_id: Uuid, server_name: &str) -> Result<bool> {
        let key = player_key(player_id, server_name);
        if let Some(cached) = self.players.read().await.get(&key) {
            if !cached.is_expired(Instant::now()) {
                return Ok(cached.value);
            }
        }

        let value = self.whitelist.is_whitelisted(player_id, server_name).await?;
        let now = Instant::now();
        insert_bounded(
            &mut *self.players.write().await,
            key,
            Cached {
                value,
                expires_at: now + self.ttl,
            },
            self.max_entries,
            now,
        );
        Ok(value)
    }

    /// Cached server lookup. Unknown servers are not cached.
    pub async fn get_server(&self, name: &str) -> Result<Option<ServerInfo>> {
        if let Some(cached) = self.servers.read().await.get(name) {
            if !cached.is_expired(Instant::now()) {
                return Ok(Some(cached.value.clone()));
            }
        }

        let server = self.registry.get_server(name).await?;
        if let Some(server) = &server {
            let now = Instant::now();
            insert_bounded(
                &mut *self.servers.write().await,
                name.to_string(),
                Cached {
                    value: server.clone(),
                    expires_at: now + self.ttl,
                },
                self.max_entries,
                now,
            );
        }
        Ok(server)
    }

    pub async fn invalidate(&self, player_id: Uuid, server_name: &str) {
        self.players
            .write()
            .await
            .remove(&player_key(player_id, server_name));
    }

    /// Drop every cached answer for one player.
    pub async fn invalidate_player(&self, player_id: Uuid) {
        let prefix = format!("{player_id}:");
        self.players
            .write()
            .await
            .retain(|key, _| !key.starts_with(&prefix));
    }

    /// Drop every cached answer for one server and its cached [`ServerInfo`].
    pub async fn invalidate_server(&self, server_name: &str) {
        self.servers.write().await.remove(server_name);
        let suffix = format!(":{server_name}");
        self.players
            .write()
            .await
            .retain(|key, _| !key.ends_with(&suffix));
    }

    pub async fn invalidate_all(&self) {
        self.players.write().await.clear();
        self.servers.write().await.clear();
        info!("Whitelist cache cleared");
    }

    /// Remove expired entries from both maps. Returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();

        let mut players = self.players.write().await;
        let before = players.len();
        players.retain(|_, cached| !cached.is_expired(now));
        let mut removed = before - players.len();
        drop(players);

        let mut servers = self.servers.write().await;
        let before = servers.len();
        servers.retain(|_, cached| !cached.is_expired(now));
        removed += before - servers.len();

        removed
    }

    /// Number of cached whitelist answers, expired or not.
    pub async fn len(&self) -> usize {
        self.players.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.players.read().await.is_empty()
    }

    /// Spawn the background sweeper, running once per TTL until `shutdown`
    /// changes.
    pub fn spawn_sweeper(
        &self,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        let period = self.ttl.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(period);
            timer.tick().await; // Skip first immediate tick

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        let removed = cache.purge_expired().await;
                        if removed > 0 {
                            debug!(removed, "Purged expired cache entries");
                        }
                    }
                    _ = shutdown.changed() => {
                        info!("Cache sweeper shutting down");
                        return;
                    }
                }
            }
        })
    }
}
