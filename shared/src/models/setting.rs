//! Keys of the local settings table used by the sync core

pub const SUBDOMAIN_DB_URL: &str = "subdomain_db_url";
pub const SUBDOMAIN_API_KEY: &str = "subdomain_api_key";
pub const WOOCOMMERCE_URL: &str = "woocommerce_url";
pub const WOOCOMMERCE_CONSUMER_KEY: &str = "woocommerce_consumer_key";
pub const WOOCOMMERCE_CONSUMER_SECRET: &str = "woocommerce_consumer_secret";
pub const AUTO_SYNC_ENABLED: &str = "auto_sync_enabled";
pub const SYNC_INTERVAL_MINUTES: &str = "sync_interval_minutes";
pub const CONFLICT_RESOLUTION: &str = "conflict_resolution";
pub const LAST_SYNC_TIME: &str = "last_sync_time";
pub const POS_DEVICE_ID: &str = "pos_device_id";
pub const WEBHOOK_SECRET: &str = "webhook_secret";

/// A persisted setting
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub encrypted: bool,
    pub updated_at: i64,
}
