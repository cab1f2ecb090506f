//! Configuration resolution for Pairgate.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/pairgate/settings.json)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Complete Pairgate configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub codes: CodeConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub activation: ActivationConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Shared store location and connection pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
    /// Upper bound on concurrent storage operations.
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    /// `SQLite` busy timeout when several processes write the same file.
    pub busy_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: 4,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            busy_timeout_secs: 5,
        }
    }
}

impl DatabaseConfig {
    pub const fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub const fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }
}

/// Registration code issuance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeConfig {
    /// Lifetime of a freshly issued code.
    pub ttl_minutes: u32,
    /// How many fresh codes to try when an insert collides with an existing one.
    pub max_generation_attempts: u32,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: 30,
            max_generation_attempts: 5,
        }
    }
}

impl CodeConfig {
    pub fn ttl_secs(&self) -> i64 {
        i64::from(self.ttl_minutes) * 60
    }
}

/// Identity of the local game server process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
    pub display_name: String,
    pub whitelist_enabled: bool,
    pub heartbeat_interval_secs: u64,
    /// Add unknown players to the whitelist on first join instead of kicking them.
    pub auto_add: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "server1".to_string(),
            display_name: "Server 1".to_string(),
            whitelist_enabled: true,
            heartbeat_interval_secs: 30,
            auto_add: false,
        }
    }
}

impl ServerConfig {
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

/// What a successful code activation grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationConfig {
    /// Servers to whitelist on activation. Empty means the issuing server only.
    pub servers: Vec<String>,
    /// Actor recorded as `added_by` on entries created by pairing.
    pub added_by: String,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            added_by: "pairing-bot".to_string(),
        }
    }
}

/// Proxy-side consistency cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 30,
            max_entries: 10_000,
        }
    }
}

impl CacheConfig {
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Connection-time access gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Hard deadline for one whitelist lookup.
    pub timeout_ms: u64,
    /// Servers that never require a whitelist check.
    pub bypass_servers: Vec<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            bypass_servers: Vec::new(),
        }
    }
}

impl GateConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn requires_whitelist(&self, server_name: &str) -> bool {
        !self
            .bypass_servers
            .iter()
            .any(|s| s.eq_ignore_ascii_case(server_name))
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Load configuration with hierarchical resolution.
///
/// Sections present in a file replace the lower-priority section wholesale;
/// fields missing from a present section take their defaults. Sections a
/// file omits leave the lower layer untouched.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            let global = load_config_file(&global_path)?;
            merge_config(&mut config, global);
        }
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file {} does not exist",
                path.display()
            )));
        }
        let file = load_config_file(path)?;
        merge_config(&mut config, file);
    }

    apply_env_overrides(&mut config);

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("pairgate").join("settings.json"))
}

/// Get the default shared database path.
pub fn database_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("pairgate").join("pairgate.db"))
}

/// One config file as written. Sections absent from the file stay `None` so
/// they cannot shadow a lower-priority layer.
#[derive(Debug, Default, Deserialize)]
struct ConfigOverlay {
    database: Option<DatabaseConfig>,
    codes: Option<CodeConfig>,
    server: Option<ServerConfig>,
    activation: Option<ActivationConfig>,
    cache: Option<CacheConfig>,
    gate: Option<GateConfig>,
    logging: Option<LoggingConfig>,
}

fn load_config_file(path: &Path) -> Result<ConfigOverlay> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn merge_config(base: &mut Config, overlay: ConfigOverlay) {
    if let Some(mut database) = overlay.database {
        // A section without a path keeps the path from the layer below.
        if database.path.is_none() {
            database.path = base.database.path.take();
        }
        base.database = database;
    }
    if let Some(codes) = overlay.codes {
        base.codes = codes;
    }
    if let Some(server) = overlay.server {
        base.server = server;
    }
    if let Some(activation) = overlay.activation {
        base.activation = activation;
    }
    if let Some(cache) = overlay.cache {
        base.cache = cache;
    }
    if let Some(gate) = overlay.gate {
        base.gate = gate;
    }
    if let Some(logging) = overlay.logging {
        base.logging = logging;
    }
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(val) = std::env::var("PAIRGATE_DB_PATH") {
        config.database.path = Some(PathBuf::from(val));
    }
    if let Ok(val) = std::env::var("PAIRGATE_SERVER_NAME") {
        config.server.name = val;
    }
    if let Ok(val) = std::env::var("PAIRGATE_CODE_TTL_MINUTES") {
        if let Ok(n) = val.parse() {
            config.codes.ttl_minutes = n;
        }
    }
    if let Ok(val) = std::env::var("PAIRGATE_CACHE_TTL_SECS") {
        if let Ok(n) = val.parse() {
            config.cache.ttl_secs = n;
        }
    }
    if let Ok(val) = std::env::var("PAIRGATE_LOG_LEVEL") {
        config.logging.level = val;
    }
}
