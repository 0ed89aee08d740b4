//! Configuration structures.
//!
//! Defaults are production values; `Config::from_env` applies `MIRU_*`
//! environment overrides on top of them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Global engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Backing store configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Watcher loop configuration.
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Build a config from defaults plus `MIRU_*` environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("MIRU_DATABASE_URL") {
            config.database.url = url;
        }
        if let Some(secs) = env_parse::<u64>("MIRU_TICK_INTERVAL_SECS") {
            config.watcher.tick_interval = Duration::from_secs(secs);
        }
        if let Some(limit) = env_parse::<u32>("MIRU_READY_LIMIT") {
            config.watcher.ready_limit = limit;
        }
        if let Some(capacity) = env_parse::<usize>("MIRU_QUEUE_CAPACITY") {
            config.watcher.queue_capacity = capacity;
        }
        if let Some(secs) = env_parse::<u64>("MIRU_DRAIN_GRACE_SECS") {
            config.watcher.drain_grace = Duration::from_secs(secs);
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Backing store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection URL.
    pub url: String,

    /// Maximum pooled connections.
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://miru.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

/// Watcher loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Interval between polls of the backing store.
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,

    /// Maximum monitors fetched per tick.
    pub ready_limit: u32,

    /// Admission queue capacity. Also bounds concurrently running scripts.
    /// `0` bypasses the queue and spawns every polled monitor directly.
    pub queue_capacity: usize,

    /// How long shutdown waits for in-flight scripts before giving up.
    #[serde(with = "humantime_serde")]
    pub drain_grace: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(10),
            ready_limit: 1,
            queue_capacity: 8,
            drain_grace: Duration::from_secs(5),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}
