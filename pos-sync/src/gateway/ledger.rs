//! Remote ledger gateway (central "subdomain" service)
//!
//! Plain JSON over HTTP with `Authorization: Bearer {api_key}`. Batch pushes
//! (product deltas, sale mirror) attempt every item and tally the results.

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Serialize;
use shared::models::{Product, Sale, SaleItem, StepSummary, StoreStats, setting};
use std::time::Duration;

use super::endpoint::{ConfigurationCheck, Credentials, RemoteEndpointConfig};
use super::error::GatewayError;
use super::retry::{Backoff, RetryPolicy, retry_with_backoff};
use super::ConfigureOutcome;
use crate::store::SharedStore;

const GATEWAY_NAME: &str = "ledger";

pub const HEALTH_PATH: &str = "/api/health";
pub const SALES_PATH: &str = "/api/sales";
pub const SALES_SYNC_PATH: &str = "/api/sales/sync";
pub const PRODUCTS_SYNC_PATH: &str = "/api/products/sync";
pub const HEARTBEAT_PATH: &str = "/api/devices/heartbeat";

/// Timeouts and spacing of the ledger gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerPacing {
    /// Timeout of a single sale push
    pub sale_timeout: Duration,
    /// Timeout of batch items (product deltas, sale mirror)
    pub batch_timeout: Duration,
    /// Timeout of heartbeat and health probe
    pub probe_timeout: Duration,
    /// Delay between batch items
    pub item_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for LedgerPacing {
    fn default() -> Self {
        Self {
            sale_timeout: Duration::from_secs(30),
            batch_timeout: Duration::from_secs(15),
            probe_timeout: Duration::from_secs(10),
            item_delay: Duration::from_millis(500),
            retry: RetryPolicy::new(2, Backoff::Linear(Duration::from_millis(1000))),
        }
    }
}

impl LedgerPacing {
    /// No spacing and no backoff (for tests against a local server)
    pub fn unthrottled() -> Self {
        Self {
            sale_timeout: Duration::from_secs(5),
            batch_timeout: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(5),
            item_delay: Duration::ZERO,
            retry: RetryPolicy::new(2, Backoff::Fixed(Duration::ZERO)),
        }
    }
}

// ========== Wire bodies ==========

#[derive(Debug, Serialize)]
struct SaleBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    local_id: Option<i64>,
    sale_number: &'a str,
    subtotal: f64,
    discount: f64,
    total: f64,
    payment_method: &'a str,
    customer_name: Option<&'a str>,
    customer_phone: Option<&'a str>,
    items: &'a [SaleItem],
    created_at: i64,
    pos_device_id: &'a str,
}

impl<'a> SaleBody<'a> {
    fn new(sale: &'a Sale, device_id: &'a str, local_id: Option<i64>) -> Self {
        Self {
            local_id,
            sale_number: &sale.sale_number,
            subtotal: sale.subtotal,
            discount: sale.discount,
            total: sale.total,
            payment_method: &sale.payment_method,
            customer_name: sale.customer_name.as_deref(),
            customer_phone: sale.customer_phone.as_deref(),
            items: &sale.items,
            created_at: sale.created_at,
            pos_device_id: device_id,
        }
    }
}

#[derive(Debug, Serialize)]
struct ProductBody<'a> {
    local_id: i64,
    name: &'a str,
    barcode: &'a str,
    price: f64,
    stock: i64,
    category: &'a str,
    description: &'a str,
    image: Option<&'a str>,
    /// Catalog id of the product
    woocommerce_id: Option<i64>,
    is_active: bool,
    updated_at: i64,
}

impl<'a> From<&'a Product> for ProductBody<'a> {
    fn from(product: &'a Product) -> Self {
        Self {
            local_id: product.id,
            name: &product.name,
            barcode: &product.barcode,
            price: product.price,
            stock: product.stock,
            category: &product.category,
            description: &product.description,
            image: product.image.as_deref(),
            woocommerce_id: product.remote_id,
            is_active: product.is_active,
            updated_at: product.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct HeartbeatBody<'a> {
    device_id: &'a str,
    stats: &'a StoreStats,
    last_sync: i64,
    version: &'static str,
    status: &'static str,
}

/// Ledger gateway status for the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerStatus {
    pub configured: bool,
    pub base_url: String,
    pub has_api_key: bool,
}

// ========== Gateway ==========

/// Operations the sync core needs from the ledger service
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Persist and probe; succeeds even when the probe fails
    async fn configure(&self, url: &str, api_key: &str) -> Result<ConfigureOutcome, GatewayError>;

    /// Re-read credentials from the local store
    async fn reload(&self) -> Result<(), GatewayError>;

    fn check_configuration(&self) -> ConfigurationCheck;

    fn status(&self) -> LedgerStatus;

    async fn health_check(&self) -> Result<(), GatewayError>;

    /// Push one locally-created sale
    async fn push_sale(&self, sale: &Sale, device_id: &str) -> Result<(), GatewayError>;

    async fn push_product_delta(&self, product: &Product) -> Result<(), GatewayError>;

    /// Mirror an already-synced sale so the ledger holds the full history
    async fn mirror_sale(&self, sale: &Sale, device_id: &str) -> Result<(), GatewayError>;

    async fn send_heartbeat(
        &self,
        device_id: &str,
        stats: &StoreStats,
        last_sync: Option<i64>,
    ) -> Result<(), GatewayError>;

    /// Push every product, spaced, tallying per item
    async fn push_product_deltas(&self, products: &[Product]) -> StepSummary;

    /// Mirror every sale, spaced, tallying per item
    async fn mirror_sales(&self, sales: &[Sale], device_id: &str) -> StepSummary;
}

/// HTTP implementation of [`LedgerGateway`]
pub struct LedgerClient {
    http: reqwest::Client,
    store: SharedStore,
    endpoint: parking_lot::RwLock<RemoteEndpointConfig>,
    pacing: LedgerPacing,
}

impl LedgerClient {
    pub fn new(store: SharedStore, pacing: LedgerPacing) -> Self {
        Self {
            http: reqwest::Client::new(),
            store,
            endpoint: parking_lot::RwLock::new(RemoteEndpointConfig::ledger_unconfigured()),
            pacing,
        }
    }

    fn authorized_endpoint(&self) -> Result<(RemoteEndpointConfig, String), GatewayError> {
        let endpoint = self.endpoint.read().clone();
        match &endpoint.credentials {
            Credentials::BearerToken { api_key } if endpoint.is_configured() => {
                let bearer = format!("Bearer {}", api_key);
                Ok((endpoint, bearer))
            }
            _ => Err(GatewayError::Unconfigured(GATEWAY_NAME)),
        }
    }

    async fn send_once<B: Serialize + Sync>(
        &self,
        method: &Method,
        url: &str,
        bearer: &str,
        body: Option<&B>,
        timeout: Duration,
    ) -> Result<(), GatewayError> {
        let mut request = self
            .http
            .request(method.clone(), url)
            .header(AUTHORIZATION, bearer)
            .header(ACCEPT, "application/json")
            .timeout(timeout);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::from_status(status, text));
        }
        Ok(())
    }

    async fn call<B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        timeout: Duration,
        policy: &RetryPolicy,
    ) -> Result<(), GatewayError> {
        let (endpoint, bearer) = self.authorized_endpoint()?;
        let url = endpoint.url(path);
        retry_with_backoff(policy, GatewayError::is_retryable, |_| {
            self.send_once(&method, &url, &bearer, body, timeout)
        })
        .await
        .map_err(GatewayError::from)
    }

    async fn post<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<(), GatewayError> {
        self.call(Method::POST, path, Some(body), timeout, &self.pacing.retry)
            .await
    }

    async fn pause_between(&self, index: usize) {
        if index > 0 && !self.pacing.item_delay.is_zero() {
            tokio::time::sleep(self.pacing.item_delay).await;
        }
    }
}

#[async_trait]
impl LedgerGateway for LedgerClient {
    fn is_configured(&self) -> bool {
        self.endpoint.read().is_configured()
    }

    async fn configure(&self, url: &str, api_key: &str) -> Result<ConfigureOutcome, GatewayError> {
        let config = RemoteEndpointConfig::ledger(url, api_key);
        if !config.is_configured() {
            return Err(GatewayError::Unconfigured(GATEWAY_NAME));
        }

        self.store
            .set_setting(setting::SUBDOMAIN_DB_URL, &config.base_url, true)
            .await?;
        self.store
            .set_setting(setting::SUBDOMAIN_API_KEY, api_key.trim(), true)
            .await?;
        *self.endpoint.write() = config;
        tracing::info!("Ledger gateway configured");

        Ok(match self.health_check().await {
            Ok(()) => ConfigureOutcome::connected(),
            Err(e) => {
                tracing::warn!("Ledger health check failed after configure: {e}");
                ConfigureOutcome::probe_failed(e.to_string())
            }
        })
    }

    async fn reload(&self) -> Result<(), GatewayError> {
        let url = self.store.get_setting(setting::SUBDOMAIN_DB_URL).await?;
        let api_key = self.store.get_setting(setting::SUBDOMAIN_API_KEY).await?;
        let config = RemoteEndpointConfig::ledger(
            url.as_deref().unwrap_or_default(),
            api_key.unwrap_or_default(),
        );
        tracing::debug!(configured = config.is_configured(), "Ledger settings loaded");
        *self.endpoint.write() = config;
        Ok(())
    }

    fn check_configuration(&self) -> ConfigurationCheck {
        self.endpoint.read().check()
    }

    fn status(&self) -> LedgerStatus {
        let endpoint = self.endpoint.read();
        let check = endpoint.check();
        LedgerStatus {
            configured: check.is_complete(),
            base_url: endpoint.base_url.clone(),
            has_api_key: check.has_key,
        }
    }

    async fn health_check(&self) -> Result<(), GatewayError> {
        self.call::<()>(
            Method::GET,
            HEALTH_PATH,
            None,
            self.pacing.probe_timeout,
            &RetryPolicy::none(),
        )
        .await
    }

    async fn push_sale(&self, sale: &Sale, device_id: &str) -> Result<(), GatewayError> {
        let body = SaleBody::new(sale, device_id, None);
        self.post(SALES_PATH, &body, self.pacing.sale_timeout).await
    }

    async fn push_product_delta(&self, product: &Product) -> Result<(), GatewayError> {
        let body = ProductBody::from(product);
        self.post(PRODUCTS_SYNC_PATH, &body, self.pacing.batch_timeout)
            .await
    }

    async fn mirror_sale(&self, sale: &Sale, device_id: &str) -> Result<(), GatewayError> {
        let body = SaleBody::new(sale, device_id, Some(sale.id));
        self.post(SALES_SYNC_PATH, &body, self.pacing.batch_timeout)
            .await
    }

    async fn send_heartbeat(
        &self,
        device_id: &str,
        stats: &StoreStats,
        last_sync: Option<i64>,
    ) -> Result<(), GatewayError> {
        let body = HeartbeatBody {
            device_id,
            stats,
            last_sync: last_sync.unwrap_or(0),
            version: env!("CARGO_PKG_VERSION"),
            status: "online",
        };
        self.post(HEARTBEAT_PATH, &body, self.pacing.probe_timeout)
            .await
    }

    async fn push_product_deltas(&self, products: &[Product]) -> StepSummary {
        if !self.is_configured() {
            return StepSummary::skipped("Ledger gateway not configured");
        }
        let mut summary = StepSummary::started(products.len());
        for (index, product) in products.iter().enumerate() {
            self.pause_between(index).await;
            match self.push_product_delta(product).await {
                Ok(()) => summary.record_success(),
                Err(e) => {
                    tracing::warn!(product_id = product.id, "Product delta push failed: {e}");
                    summary.record_failure(format!("{}: {}", product.name, e));
                }
            }
        }
        summary.finish()
    }

    async fn mirror_sales(&self, sales: &[Sale], device_id: &str) -> StepSummary {
        if !self.is_configured() {
            return StepSummary::skipped("Ledger gateway not configured");
        }
        let mut summary = StepSummary::started(sales.len());
        for (index, sale) in sales.iter().enumerate() {
            self.pause_between(index).await;
            match self.mirror_sale(sale, device_id).await {
                Ok(()) => summary.record_success(),
                Err(e) => {
                    tracing::warn!(sale_id = sale.id, "Sale mirror push failed: {e}");
                    summary.record_failure(format!("{}: {}", sale.sale_number, e));
                }
            }
        }
        summary.finish()
    }
}
