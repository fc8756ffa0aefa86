use std::path::PathBuf;
use std::time::Duration;

use crate::gateway::{CatalogPacing, LedgerPacing};
use crate::sync::{QueueConfig, SyncPacing};

/// Sync service configuration
///
/// # Environment variables
///
/// Every field can be overridden from the environment (`.env` is loaded first):
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | WORK_DIR | ./data | redb file and logs |
/// | HTTP_PORT | 3001 | webhook and status API port |
/// | LOG_LEVEL | info | tracing level |
/// | LOG_JSON | false | JSON log lines |
/// | CONNECTIVITY_PROBE_URL | https://httpbin.org/status/200 | reachability endpoint |
/// | CONNECTIVITY_INTERVAL_MS | 10000 | probe cadence |
/// | CONNECTIVITY_TIMEOUT_MS | 5000 | probe timeout |
/// | OFFLINE_QUEUE_CAPACITY | 1000 | queue bound |
/// | OFFLINE_QUEUE_EVICT | 100 | entries evicted when full |
/// | OFFLINE_MAX_RETRIES | 3 | per-operation retry budget |
/// | DRAIN_DELAY_MS | 500 | delay between replayed operations |
/// | RECONNECT_SALE_DELAY_MS | 2000 | pause between the reconnect drain and the cycle |
/// | SALE_SPACING_MS | 1000 | delay between pending-sale pushes |
/// | DEVICE_ID | generated | POS device identifier |
///
/// # Example
///
/// ```ignore
/// WORK_DIR=/var/lib/pos HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: String,
    pub http_port: u16,
    pub log_level: String,
    pub log_json: bool,
    pub probe_url: String,
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    /// Overrides the persisted device id when set
    pub device_id: Option<String>,
    pub queue: QueueConfig,
    pub sync: SyncPacing,
    pub catalog: CatalogPacing,
    pub ledger: LedgerPacing,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_millis(key: &str, default: u64) -> Duration {
    Duration::from_millis(env_or(key, default))
}

impl Config {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let queue = QueueConfig {
            capacity: env_or("OFFLINE_QUEUE_CAPACITY", 1000),
            evict_count: env_or("OFFLINE_QUEUE_EVICT", 100),
            max_retries: env_or("OFFLINE_MAX_RETRIES", 3),
            drain_delay: env_millis("DRAIN_DELAY_MS", 500),
            ..QueueConfig::default()
        };

        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into()),
            http_port: env_or("HTTP_PORT", 3001),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: env_or("LOG_JSON", false),
            probe_url: std::env::var("CONNECTIVITY_PROBE_URL")
                .unwrap_or_else(|_| "https://httpbin.org/status/200".into()),
            probe_interval: env_millis("CONNECTIVITY_INTERVAL_MS", 10_000),
            probe_timeout: env_millis("CONNECTIVITY_TIMEOUT_MS", 5_000),
            device_id: std::env::var("DEVICE_ID")
                .ok()
                .filter(|id| !id.trim().is_empty()),
            queue,
            sync: SyncPacing {
                sale_spacing: env_millis("SALE_SPACING_MS", 1000),
                reconnect_delay: env_millis("RECONNECT_SALE_DELAY_MS", 2000),
            },
            catalog: CatalogPacing::default(),
            ledger: LedgerPacing::default(),
        }
    }

    /// Override the work dir and port, with every delay zeroed
    ///
    /// For tests against local fake servers.
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config.queue.drain_delay = Duration::ZERO;
        config.sync = SyncPacing::unthrottled();
        config.catalog = CatalogPacing::unthrottled();
        config.ledger = LedgerPacing::unthrottled();
        config
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("pos-sync.redb")
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
