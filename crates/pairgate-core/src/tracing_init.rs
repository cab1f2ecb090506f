//! Shared tracing/logging initialization.
//!
//! The `pairgate` binary and host integrations embedding the access engine set
//! up `tracing_subscriber` the same way: an env-filter derived from
//! [`LoggingConfig`] plus optional JSON output.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Crates whose events are enabled at the configured level by default.
const PAIRGATE_TARGETS: &[&str] = &["pairgate", "pairgate_access", "pairgate_core"];

/// Build the default filter directive for a log level,
/// e.g. `"pairgate=info,pairgate_access=info,pairgate_core=info"`.
pub fn default_filter(level: &str) -> String {
    PAIRGATE_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` wins over `config.level` when it is set.
pub fn init_tracing(config: &LoggingConfig) {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter(&config.level)),
    );
    if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
