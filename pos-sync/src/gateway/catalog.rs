//! Remote catalog gateway (WooCommerce-style REST API)
//!
//! Every request is OAuth 1.0a signed (see [`super::oauth`]), spaced by at least
//! [`CatalogPacing::min_request_interval`] and retried on transport errors, 429
//! and 5xx with linear backoff.
//!
//! # Pull semantics
//!
//! A pulled product never overwrites a local edit made since the last sync. Such
//! products are returned as [`DeferredProduct`]s and settled by the conflict
//! resolver instead.

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared::models::{
    DEFAULT_CATEGORY, Product, ProductUpsert, SaleItem, StepSummary, SyncLogStatus, setting,
};
use shared::util::{now_millis, parse_timestamp_millis};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::endpoint::{ConfigurationCheck, Credentials, RemoteEndpointConfig};
use super::error::GatewayError;
use super::oauth::OAuthSigner;
use super::retry::{Backoff, RetryPolicy, retry_with_backoff};
use super::ConfigureOutcome;
use crate::store::SharedStore;

const GATEWAY_NAME: &str = "catalog";
const USER_AGENT_VALUE: &str = concat!("pos-sync/", env!("CARGO_PKG_VERSION"));
const TOTAL_PAGES_HEADER: &str = "x-wp-totalpages";

/// Delays and limits of the catalog gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogPacing {
    /// Minimum spacing between two requests
    pub min_request_interval: Duration,
    /// Delay between stock pushes of one sale
    pub item_delay: Duration,
    /// Delay between page pulls
    pub page_delay: Duration,
    pub max_pages: u32,
    pub page_size: u32,
    /// Per-request timeout
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for CatalogPacing {
    fn default() -> Self {
        Self {
            min_request_interval: Duration::from_millis(1000),
            item_delay: Duration::from_millis(500),
            page_delay: Duration::from_millis(2000),
            max_pages: 50,
            page_size: 100,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::new(3, Backoff::Linear(Duration::from_millis(2000))),
        }
    }
}

impl CatalogPacing {
    /// No spacing and no backoff (for tests against a local server)
    pub fn unthrottled() -> Self {
        Self {
            min_request_interval: Duration::ZERO,
            item_delay: Duration::ZERO,
            page_delay: Duration::ZERO,
            retry: RetryPolicy::new(3, Backoff::Fixed(Duration::ZERO)),
            timeout: Duration::from_secs(5),
            ..Self::default()
        }
    }
}

// ========== Wire types ==========

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteCategoryRef {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteImage {
    #[serde(default)]
    pub src: String,
}

/// Product as listed by the catalog API
///
/// `price` and `stock_quantity` arrive as strings, numbers or null depending on the
/// store setup; they are kept raw and parsed leniently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteProduct {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub price: serde_json::Value,
    #[serde(default)]
    pub stock_quantity: serde_json::Value,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub categories: Vec<RemoteCategoryRef>,
    #[serde(default)]
    pub images: Vec<RemoteImage>,
    #[serde(default)]
    pub date_modified_gmt: Option<String>,
    #[serde(default)]
    pub date_modified: Option<String>,
}

/// Decimal price; anything unparsable or non-finite is 0
pub fn parse_price(value: &serde_json::Value) -> f64 {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|p| p.is_finite()).unwrap_or(0.0)
}

/// Integer stock; a fractional value is truncated, anything else is 0
pub fn parse_stock(value: &serde_json::Value) -> i64 {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(0),
        serde_json::Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.trunc() as i64)
                })
                .unwrap_or(0)
        }
        _ => 0,
    }
}

impl RemoteProduct {
    pub fn price(&self) -> f64 {
        parse_price(&self.price)
    }

    pub fn stock(&self) -> i64 {
        parse_stock(&self.stock_quantity)
    }

    /// `date_modified_gmt`, falling back to `date_modified`, as Unix millis
    pub fn modified_at(&self) -> Option<i64> {
        self.date_modified_gmt
            .as_deref()
            .and_then(parse_timestamp_millis)
            .or_else(|| self.date_modified.as_deref().and_then(parse_timestamp_millis))
    }

    /// Local natural key: the SKU, or a synthetic one for SKU-less products
    pub fn barcode(&self) -> String {
        if self.sku.trim().is_empty() {
            format!("WC{}", self.id)
        } else {
            self.sku.trim().to_string()
        }
    }

    /// Map onto a local upsert (matching is left to the store)
    pub fn to_upsert(&self, local_id: Option<i64>) -> ProductUpsert {
        let description = if !self.short_description.is_empty() {
            self.short_description.clone()
        } else {
            self.description.clone()
        };
        ProductUpsert {
            id: local_id,
            name: self.name.clone(),
            barcode: self.barcode(),
            price: self.price(),
            stock: self.stock(),
            category: self
                .categories
                .first()
                .map(|c| c.name.clone())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            description,
            image: self.images.first().map(|i| i.src.clone()).filter(|s| !s.is_empty()),
            remote_id: Some(self.id),
            is_active: self.status == "publish",
            remote_updated_at: self.modified_at(),
            from_remote: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteCategory {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Fields written back to a catalog product
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RemoteProductUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The API takes prices as decimal strings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regular_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<i64>,
}

impl RemoteProductUpdate {
    pub fn from_product(product: &Product) -> Self {
        Self {
            name: Some(product.name.clone()),
            regular_price: Some(format!("{:.2}", product.price)),
            stock_quantity: Some(product.stock),
        }
    }

    pub fn stock_only(stock: i64) -> Self {
        Self {
            stock_quantity: Some(stock),
            ..Default::default()
        }
    }
}

// ========== Reports ==========

/// Catalog gateway status for the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogStatus {
    pub configured: bool,
    pub base_url: String,
    pub has_credentials: bool,
    /// Unix millis of the last request, if any
    pub last_call: Option<i64>,
}

/// Outcome of one stock write-back
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockPushItem {
    pub product_id: i64,
    pub remote_id: Option<i64>,
    pub previous_stock: Option<i64>,
    pub new_stock: Option<i64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StockPushReport {
    pub summary: StepSummary,
    pub items: Vec<StockPushItem>,
}

/// Local product kept back from a pull because it was edited locally
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredProduct {
    pub local: Product,
    pub remote: RemoteProduct,
}

/// One page of a catalog pull
#[derive(Debug, Clone, Default)]
pub struct PageReport {
    pub page: u32,
    pub total_pages: u32,
    pub has_more: bool,
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub errors: Vec<String>,
    pub deferred: Vec<DeferredProduct>,
}

/// A full paginated pull
#[derive(Debug, Clone, Default)]
pub struct CatalogPullReport {
    pub pages: u32,
    pub summary: StepSummary,
    pub created: usize,
    pub updated: usize,
    pub deferred: Vec<DeferredProduct>,
}

// ========== Gateway ==========

/// Operations the sync core needs from the remote catalog
#[async_trait]
pub trait CatalogGateway: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Normalize, persist and probe; succeeds even when the probe fails
    async fn configure(
        &self,
        url: &str,
        consumer_key: &str,
        consumer_secret: &str,
    ) -> Result<ConfigureOutcome, GatewayError>;

    /// Re-read credentials from the local store
    async fn reload(&self) -> Result<(), GatewayError>;

    async fn clear_configuration(&self) -> Result<(), GatewayError>;

    fn check_configuration(&self) -> ConfigurationCheck;

    fn status(&self) -> CatalogStatus;

    async fn test_connection(&self) -> Result<(), GatewayError>;

    /// Decrement remote stock for every sold item; per-item failures are collected
    async fn push_stock_decrement(&self, items: &[SaleItem]) -> StockPushReport;

    /// Fetch one page of published products and upsert it locally
    async fn pull_catalog_page(
        &self,
        page: u32,
        page_size: u32,
        last_sync: Option<i64>,
    ) -> Result<PageReport, GatewayError>;

    /// Page through the whole catalog (bounded by `max_pages`)
    async fn pull_all(&self, last_sync: Option<i64>) -> Result<CatalogPullReport, GatewayError>;

    async fn pull_categories(&self) -> Result<StepSummary, GatewayError>;

    async fn fetch_product(&self, remote_id: i64) -> Result<RemoteProduct, GatewayError>;

    async fn update_remote_product(
        &self,
        remote_id: i64,
        update: &RemoteProductUpdate,
    ) -> Result<RemoteProduct, GatewayError>;
}

/// Raw successful reply
struct Reply {
    body: String,
    total_pages: Option<u32>,
}

/// HTTP implementation of [`CatalogGateway`]
pub struct CatalogClient {
    http: reqwest::Client,
    store: SharedStore,
    endpoint: parking_lot::RwLock<RemoteEndpointConfig>,
    last_call: Mutex<Option<Instant>>,
    last_call_millis: AtomicI64,
    pacing: CatalogPacing,
}

impl CatalogClient {
    pub fn new(store: SharedStore, pacing: CatalogPacing) -> Self {
        Self {
            http: reqwest::Client::new(),
            store,
            endpoint: parking_lot::RwLock::new(RemoteEndpointConfig::catalog_unconfigured()),
            last_call: Mutex::new(None),
            last_call_millis: AtomicI64::new(0),
            pacing,
        }
    }

    pub fn pacing(&self) -> &CatalogPacing {
        &self.pacing
    }

    fn signed_endpoint(&self) -> Result<(RemoteEndpointConfig, OAuthSigner), GatewayError> {
        let endpoint = self.endpoint.read().clone();
        if !endpoint.is_configured() {
            return Err(GatewayError::Unconfigured(GATEWAY_NAME));
        }
        match &endpoint.credentials {
            Credentials::ConsumerPair {
                consumer_key,
                consumer_secret,
            } => {
                let signer = OAuthSigner::new(consumer_key.clone(), consumer_secret.clone());
                Ok((endpoint, signer))
            }
            Credentials::BearerToken { .. } => Err(GatewayError::Unconfigured(GATEWAY_NAME)),
        }
    }

    /// Wait until the minimum spacing since the previous request has passed
    async fn pace(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.pacing.min_request_interval {
                tokio::time::sleep(self.pacing.min_request_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
        self.last_call_millis.store(now_millis(), Ordering::Relaxed);
    }

    async fn send_once(
        &self,
        endpoint: &RemoteEndpointConfig,
        signer: &OAuthSigner,
        method: &Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<Reply, GatewayError> {
        self.pace().await;

        let url = endpoint.url(path);
        let mut params = query.to_vec();
        params.extend(signer.sign_now(method.as_str(), &url, query));

        let mut request = self
            .http
            .request(method.clone(), &url)
            .query(&params)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, USER_AGENT_VALUE)
            .timeout(self.pacing.timeout);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let total_pages = response
            .headers()
            .get(TOTAL_PAGES_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u32>().ok());
        let text = response.text().await?;

        if !status.is_success() {
            tracing::debug!(%method, path, status = status.as_u16(), "Catalog request rejected");
            return Err(GatewayError::from_status(status, text));
        }
        Ok(Reply {
            body: text,
            total_pages,
        })
    }

    /// Signed, paced, retried request
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<Reply, GatewayError> {
        let (endpoint, signer) = self.signed_endpoint()?;
        retry_with_backoff(&self.pacing.retry, GatewayError::is_retryable, |_| {
            self.send_once(&endpoint, &signer, &method, path, query, body)
        })
        .await
        .map_err(GatewayError::from)
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<(T, Option<u32>), GatewayError> {
        let reply = self.request(method, path, query, body).await?;
        let value = serde_json::from_str(&reply.body)
            .map_err(|e| GatewayError::Decode(format!("{path}: {e}")))?;
        Ok((value, reply.total_pages))
    }

    async fn log(&self, operation: &str, record_id: Option<&str>, status: SyncLogStatus, message: &str) {
        if let Err(e) = self
            .store
            .append_sync_log(operation, "product", record_id, status, message)
            .await
        {
            tracing::warn!(operation, "Failed to append sync log: {e}");
        }
    }

    /// Stock write-back for one sold item
    async fn push_item_stock(&self, item: &SaleItem) -> StockPushItem {
        let mut outcome = StockPushItem {
            product_id: item.product_id,
            remote_id: None,
            previous_stock: None,
            new_stock: None,
            error: None,
        };

        let remote_id = match self.store.get_product(item.product_id).await {
            Ok(Some(product)) => product.remote_id,
            Ok(None) => None,
            Err(e) => {
                outcome.error = Some(format!("Local lookup failed: {e}"));
                return outcome;
            }
        };
        let Some(remote_id) = remote_id else {
            outcome.error = Some(format!(
                "Product {} has no catalog id",
                item.product_name
            ));
            return outcome;
        };
        outcome.remote_id = Some(remote_id);

        let current = match self.fetch_product(remote_id).await {
            Ok(remote) => remote.stock(),
            Err(e) => {
                outcome.error = Some(e.to_string());
                return outcome;
            }
        };
        let new_stock = (current - item.quantity).max(0);
        outcome.previous_stock = Some(current);

        match self
            .update_remote_product(remote_id, &RemoteProductUpdate::stock_only(new_stock))
            .await
        {
            Ok(_) => outcome.new_stock = Some(new_stock),
            Err(e) => outcome.error = Some(e.to_string()),
        }
        outcome
    }
}

fn page_query(page: u32, page_size: u32) -> Vec<(String, String)> {
    vec![
        ("page".to_string(), page.to_string()),
        ("per_page".to_string(), page_size.to_string()),
        ("status".to_string(), "publish".to_string()),
    ]
}

#[async_trait]
impl CatalogGateway for CatalogClient {
    fn is_configured(&self) -> bool {
        self.endpoint.read().is_configured()
    }

    async fn configure(
        &self,
        url: &str,
        consumer_key: &str,
        consumer_secret: &str,
    ) -> Result<ConfigureOutcome, GatewayError> {
        let config = RemoteEndpointConfig::catalog(url, consumer_key, consumer_secret);
        if !config.is_configured() {
            return Err(GatewayError::Unconfigured(GATEWAY_NAME));
        }

        self.store
            .set_setting(setting::WOOCOMMERCE_URL, &config.base_url, true)
            .await?;
        self.store
            .set_setting(setting::WOOCOMMERCE_CONSUMER_KEY, consumer_key.trim(), true)
            .await?;
        self.store
            .set_setting(setting::WOOCOMMERCE_CONSUMER_SECRET, consumer_secret.trim(), true)
            .await?;
        *self.endpoint.write() = config;
        tracing::info!("Catalog gateway configured");

        Ok(match self.test_connection().await {
            Ok(()) => ConfigureOutcome::connected(),
            Err(e) => {
                tracing::warn!("Catalog connection test failed after configure: {e}");
                ConfigureOutcome::probe_failed(e.to_string())
            }
        })
    }

    async fn reload(&self) -> Result<(), GatewayError> {
        let url = self.store.get_setting(setting::WOOCOMMERCE_URL).await?;
        let key = self.store.get_setting(setting::WOOCOMMERCE_CONSUMER_KEY).await?;
        let secret = self.store.get_setting(setting::WOOCOMMERCE_CONSUMER_SECRET).await?;
        let config = RemoteEndpointConfig::catalog(
            url.as_deref().unwrap_or_default(),
            key.unwrap_or_default(),
            secret.unwrap_or_default(),
        );
        tracing::debug!(configured = config.is_configured(), "Catalog settings loaded");
        *self.endpoint.write() = config;
        Ok(())
    }

    async fn clear_configuration(&self) -> Result<(), GatewayError> {
        for key in [
            setting::WOOCOMMERCE_URL,
            setting::WOOCOMMERCE_CONSUMER_KEY,
            setting::WOOCOMMERCE_CONSUMER_SECRET,
        ] {
            self.store.set_setting(key, "", true).await?;
        }
        *self.endpoint.write() = RemoteEndpointConfig::catalog_unconfigured();
        tracing::info!("Catalog gateway configuration cleared");
        Ok(())
    }

    fn check_configuration(&self) -> ConfigurationCheck {
        self.endpoint.read().check()
    }

    fn status(&self) -> CatalogStatus {
        let endpoint = self.endpoint.read();
        let check = endpoint.check();
        let last_call = self.last_call_millis.load(Ordering::Relaxed);
        CatalogStatus {
            configured: check.is_complete(),
            base_url: endpoint.base_url.clone(),
            has_credentials: check.has_key && check.has_secret,
            last_call: (last_call > 0).then_some(last_call),
        }
    }

    async fn test_connection(&self) -> Result<(), GatewayError> {
        let query = vec![("per_page".to_string(), "1".to_string())];
        self.request(Method::GET, "/products", &query, None).await?;
        tracing::info!("Catalog connection OK");
        Ok(())
    }

    async fn push_stock_decrement(&self, items: &[SaleItem]) -> StockPushReport {
        if !self.is_configured() {
            return StockPushReport {
                summary: StepSummary::skipped("Catalog gateway not configured"),
                items: Vec::new(),
            };
        }

        let mut summary = StepSummary::started(items.len());
        let mut outcomes = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            if index > 0 && !self.pacing.item_delay.is_zero() {
                tokio::time::sleep(self.pacing.item_delay).await;
            }

            let outcome = self.push_item_stock(item).await;
            let record_id = item.product_id.to_string();
            match (&outcome.error, outcome.previous_stock, outcome.new_stock) {
                (None, Some(previous), Some(new_stock)) => {
                    summary.record_success();
                    self.log(
                        "stock_update",
                        Some(&record_id),
                        SyncLogStatus::Success,
                        &format!("Stock updated: {previous} -> {new_stock}"),
                    )
                    .await;
                }
                (error, _, _) => {
                    let message = error.clone().unwrap_or_else(|| "Unknown error".to_string());
                    tracing::warn!(product_id = item.product_id, "Stock push failed: {message}");
                    summary.record_failure(format!("{}: {}", item.product_name, message));
                    self.log("stock_update", Some(&record_id), SyncLogStatus::Error, &message)
                        .await;
                }
            }
            outcomes.push(outcome);
        }

        StockPushReport {
            summary: summary.finish(),
            items: outcomes,
        }
    }

    async fn pull_catalog_page(
        &self,
        page: u32,
        page_size: u32,
        last_sync: Option<i64>,
    ) -> Result<PageReport, GatewayError> {
        let (products, total_pages): (Vec<RemoteProduct>, _) = self
            .request_json(Method::GET, "/products", &page_query(page, page_size), None)
            .await?;
        let total_pages = total_pages.unwrap_or(1);

        let mut report = PageReport {
            page,
            total_pages,
            has_more: page < total_pages,
            fetched: products.len(),
            ..Default::default()
        };

        for remote in products {
            let barcode = remote.barcode();
            let existing = match self
                .store
                .find_product_by_remote_or_sku(Some(remote.id), Some(&barcode))
                .await
            {
                Ok(existing) => existing,
                Err(e) => {
                    report.errors.push(format!("{}: {}", remote.name, e));
                    continue;
                }
            };

            let local_id = existing.as_ref().map(|p| p.id);
            if let Some(local) = existing.filter(|p| p.is_locally_modified(last_sync)) {
                tracing::debug!(
                    product_id = local.id,
                    remote_id = remote.id,
                    "Local edit pending, deferring catalog overwrite"
                );
                report.deferred.push(DeferredProduct { local, remote });
                continue;
            }

            match self.store.upsert_product(remote.to_upsert(local_id)).await {
                Ok(upserted) if upserted.created => report.created += 1,
                Ok(_) => report.updated += 1,
                Err(e) => report.errors.push(format!("{}: {}", remote.name, e)),
            }
        }

        tracing::debug!(
            page,
            total_pages,
            created = report.created,
            updated = report.updated,
            deferred = report.deferred.len(),
            "Catalog page pulled"
        );
        Ok(report)
    }

    async fn pull_all(&self, last_sync: Option<i64>) -> Result<CatalogPullReport, GatewayError> {
        if !self.is_configured() {
            return Err(GatewayError::Unconfigured(GATEWAY_NAME));
        }

        let mut report = CatalogPullReport {
            summary: StepSummary::started(0),
            ..Default::default()
        };
        let mut page = 1;

        loop {
            let page_report = match self
                .pull_catalog_page(page, self.pacing.page_size, last_sync)
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(page, "Catalog pull aborted: {e}");
                    self.log("catalog_pull", None, SyncLogStatus::Error, &e.to_string())
                        .await;
                    return Err(e);
                }
            };

            report.pages = page;
            report.summary.total += page_report.fetched;
            report.created += page_report.created;
            report.updated += page_report.updated;
            report.summary.succeeded += page_report.created + page_report.updated;
            for error in page_report.errors {
                report.summary.record_failure(error);
            }
            report.deferred.extend(page_report.deferred);

            if !page_report.has_more || page >= self.pacing.max_pages {
                break;
            }
            page += 1;
            tokio::time::sleep(self.pacing.page_delay).await;
        }

        let message = format!(
            "Pulled {} products over {} pages: {} created, {} updated, {} deferred, {} failed",
            report.summary.total,
            report.pages,
            report.created,
            report.updated,
            report.deferred.len(),
            report.summary.failed
        );
        tracing::info!("{message}");
        self.log("catalog_pull", None, SyncLogStatus::Success, &message)
            .await;
        report.summary.message = Some(message);
        report.summary = report.summary.finish();
        Ok(report)
    }

    async fn pull_categories(&self) -> Result<StepSummary, GatewayError> {
        let query = vec![("per_page".to_string(), "100".to_string())];
        let (categories, _): (Vec<RemoteCategory>, _) = self
            .request_json(Method::GET, "/products/categories", &query, None)
            .await?;

        let mut summary = StepSummary::started(categories.len());
        for category in &categories {
            if category.name.trim().is_empty() {
                summary.record_failure(format!("Category {} has no name", category.id));
                continue;
            }
            match self
                .store
                .upsert_category(&category.name, &category.description, Some(category.id))
                .await
            {
                Ok(_) => summary.record_success(),
                Err(e) => summary.record_failure(format!("{}: {}", category.name, e)),
            }
        }
        tracing::info!(
            total = summary.total,
            synced = summary.succeeded,
            "Catalog categories pulled"
        );
        Ok(summary.finish())
    }

    async fn fetch_product(&self, remote_id: i64) -> Result<RemoteProduct, GatewayError> {
        let (product, _) = self
            .request_json(Method::GET, &format!("/products/{remote_id}"), &[], None)
            .await?;
        Ok(product)
    }

    async fn update_remote_product(
        &self,
        remote_id: i64,
        update: &RemoteProductUpdate,
    ) -> Result<RemoteProduct, GatewayError> {
        let body = serde_json::to_value(update).map_err(|e| GatewayError::Decode(e.to_string()))?;
        let (product, _) = self
            .request_json(
                Method::PUT,
                &format!("/products/{remote_id}"),
                &[],
                Some(&body),
            )
            .await?;
        Ok(product)
    }
}
