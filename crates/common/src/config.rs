//! Application configuration.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Redis configuration.
    pub redis: RedisConfig,
    /// Feed pipeline policy.
    #[serde(default)]
    pub feed: FeedConfig,
    /// Per-queue tuning.
    #[serde(default)]
    pub queues: QueuesConfig,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// Key prefix for all Redis keys.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

/// Feed pipeline policy constants.
///
/// The dedup window and lock TTL have no derivation beyond operational
/// experience; both are deliberately configuration rather than code.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Window within which repeated "card collected" facts for the same
    /// `(actor, card)` pair merge into one activity.
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: u64,
    /// TTL of the advisory lock around check-then-create.
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
    /// Bounded attempts at acquiring the advisory lock.
    #[serde(default = "default_lock_acquire_attempts")]
    pub lock_acquire_attempts: u32,
    /// Log every dispatched event at info level (noisy; off by default).
    #[serde(default)]
    pub verbose_event_logging: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            dedup_window_secs: default_dedup_window_secs(),
            lock_ttl_secs: default_lock_ttl_secs(),
            lock_acquire_attempts: default_lock_acquire_attempts(),
            verbose_event_logging: false,
        }
    }
}

impl FeedConfig {
    /// Dedup window as a [`Duration`].
    #[must_use]
    pub const fn dedup_window(&self) -> Duration {
        Duration::from_secs(self.dedup_window_secs)
    }

    /// Lock TTL as a [`Duration`].
    #[must_use]
    pub const fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }
}

/// Tuning for one named queue.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueTuning {
    /// Maximum delivery attempts before a job is dead-lettered.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Initial retry backoff in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Backoff ceiling in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Concurrent jobs per queue per worker process.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for QueueTuning {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            concurrency: default_concurrency(),
        }
    }
}

/// Tuning for all named queues.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueuesConfig {
    /// Feed distribution queue.
    #[serde(default)]
    pub feed: QueueTuning,
    /// Search indexing queue.
    #[serde(default)]
    pub search: QueueTuning,
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

fn default_redis_prefix() -> String {
    "curio".to_string()
}

const fn default_dedup_window_secs() -> u64 {
    120
}

const fn default_lock_ttl_secs() -> u64 {
    10
}

const fn default_lock_acquire_attempts() -> u32 {
    5
}

const fn default_attempts() -> u32 {
    5
}

const fn default_initial_backoff_ms() -> u64 {
    1_000
}

const fn default_max_backoff_ms() -> u64 {
    60_000
}

const fn default_concurrency() -> usize {
    10
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `CURIO_ENV`)
    /// 3. Environment variables with `CURIO` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("CURIO_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("CURIO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("CURIO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_defaults() {
        let feed = FeedConfig::default();
        assert_eq!(feed.dedup_window(), Duration::from_secs(120));
        assert_eq!(feed.lock_ttl(), Duration::from_secs(10));
        assert!(!feed.verbose_event_logging);
    }

    #[test]
    fn test_queue_tuning_defaults() {
        let tuning = QueueTuning::default();
        assert_eq!(tuning.attempts, 5);
        assert_eq!(tuning.concurrency, 10);
        assert!(tuning.initial_backoff_ms < tuning.max_backoff_ms);
    }
}
