//! Webhook handlers
//!
//! Catalog notifications are authoritative remote writes: they upsert the local
//! row as catalog-written. Deleted products are deactivated, never removed.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use shared::models::SyncLogStatus;
use shared::util::now_millis;

use super::signature::SignedPayload;
use crate::core::AppContext;
use crate::gateway::catalog::{RemoteProduct, parse_stock};
use crate::utils::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookAction {
    Created,
    Updated,
    Deactivated,
    StockUpdated,
    Ignored,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub success: bool,
    pub action: WebhookAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WebhookAck {
    fn new(action: WebhookAction, product_id: Option<i64>) -> Self {
        Self {
            success: true,
            action,
            product_id,
            message: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StockPayload {
    #[serde(alias = "id")]
    product_id: i64,
    #[serde(default)]
    stock_quantity: serde_json::Value,
}

fn parse<T: serde::de::DeserializeOwned>(payload: &SignedPayload) -> AppResult<T> {
    serde_json::from_slice(&payload.body)
        .map_err(|e| AppError::invalid_request(format!("Invalid webhook payload: {e}")))
}

async fn log(ctx: &AppContext, operation: &str, record_id: impl ToString, message: String) {
    if let Err(e) = ctx
        .store
        .append_sync_log(
            operation,
            "products",
            Some(&record_id.to_string()),
            SyncLogStatus::Success,
            &message,
        )
        .await
    {
        tracing::warn!(operation, "Failed to append sync log: {e}");
    }
}

async fn upsert_remote(ctx: &AppContext, product: &RemoteProduct) -> AppResult<WebhookAck> {
    let sku = product.barcode();
    let existing = ctx
        .store
        .find_product_by_remote_or_sku(Some(product.id), Some(&sku))
        .await?;
    let upserted = ctx
        .store
        .upsert_product(product.to_upsert(existing.map(|p| p.id)))
        .await?;

    let (operation, action) = if upserted.created {
        ("webhook_product_create", WebhookAction::Created)
    } else {
        ("webhook_product_update", WebhookAction::Updated)
    };
    tracing::info!(remote_id = product.id, product_id = upserted.id, ?action, "Product webhook applied");
    log(
        ctx,
        operation,
        upserted.id,
        format!("Product {} via webhook: {}", if upserted.created { "created" } else { "updated" }, product.name),
    )
    .await;
    Ok(WebhookAck::new(action, Some(upserted.id)))
}

async fn deactivate(ctx: &AppContext, product: &RemoteProduct) -> AppResult<WebhookAck> {
    let found = ctx.store.deactivate_by_remote_id(product.id).await?;
    if !found {
        tracing::debug!(remote_id = product.id, "Delete webhook for unknown product");
        let mut ack = WebhookAck::new(WebhookAction::Ignored, None);
        ack.message = Some(format!("No local product for catalog id {}", product.id));
        return Ok(ack);
    }
    tracing::info!(remote_id = product.id, "Product deactivated via webhook");
    log(
        ctx,
        "webhook_product_delete",
        product.id,
        format!("Product deactivated via webhook: {}", product.name),
    )
    .await;
    Ok(WebhookAck::new(WebhookAction::Deactivated, None))
}

/// POST /webhook/product/created
pub async fn product_created(
    State(ctx): State<AppContext>,
    payload: SignedPayload,
) -> AppResult<Json<WebhookAck>> {
    let product: RemoteProduct = parse(&payload)?;
    upsert_remote(&ctx, &product).await.map(Json)
}

/// POST /webhook/product/updated
pub async fn product_updated(
    State(ctx): State<AppContext>,
    payload: SignedPayload,
) -> AppResult<Json<WebhookAck>> {
    let product: RemoteProduct = parse(&payload)?;
    upsert_remote(&ctx, &product).await.map(Json)
}

/// POST /webhook/product/deleted
pub async fn product_deleted(
    State(ctx): State<AppContext>,
    payload: SignedPayload,
) -> AppResult<Json<WebhookAck>> {
    let product: RemoteProduct = parse(&payload)?;
    deactivate(&ctx, &product).await.map(Json)
}

/// POST /webhook/product/stock
pub async fn stock_updated(
    State(ctx): State<AppContext>,
    payload: SignedPayload,
) -> AppResult<Json<WebhookAck>> {
    let data: StockPayload = parse(&payload)?;
    let stock = parse_stock(&data.stock_quantity);

    let Some(product) = ctx
        .store
        .find_product_by_remote_or_sku(Some(data.product_id), None)
        .await?
    else {
        tracing::debug!(remote_id = data.product_id, "Stock webhook for unknown product");
        return Ok(Json(WebhookAck::new(WebhookAction::Ignored, None)));
    };

    ctx.store.update_stock(product.id, stock, true).await?;
    tracing::info!(product_id = product.id, stock, "Stock updated via webhook");
    log(&ctx, "webhook_stock_update", product.id, format!("Stock updated via webhook: {stock}")).await;
    Ok(Json(WebhookAck::new(WebhookAction::StockUpdated, Some(product.id))))
}

/// POST /webhook/woocommerce - dispatch on `X-WC-Webhook-Topic`
pub async fn generic(
    State(ctx): State<AppContext>,
    payload: SignedPayload,
) -> AppResult<Json<WebhookAck>> {
    let topic = payload.topic.clone().unwrap_or_default();
    tracing::debug!(%topic, "Generic webhook received");

    let ack = match topic.as_str() {
        "product.created" | "product.updated" | "product.restored" => {
            upsert_remote(&ctx, &parse(&payload)?).await?
        }
        "product.deleted" => deactivate(&ctx, &parse(&payload)?).await?,
        _ => {
            tracing::info!(%topic, "Unhandled webhook topic");
            let mut ack = WebhookAck::new(WebhookAction::Ignored, None);
            ack.message = Some("Webhook received but not processed".to_string());
            ack
        }
    };
    Ok(Json(ack))
}

#[derive(Debug, Serialize)]
pub struct WebhookHealth {
    status: &'static str,
    timestamp: i64,
}

/// GET /webhook/health
pub async fn health() -> Json<WebhookHealth> {
    Json(WebhookHealth {
        status: "ok",
        timestamp: now_millis(),
    })
}

#[derive(Debug, Serialize)]
pub struct WebhookInfo {
    port: u16,
    secret_configured: bool,
    paths: [&'static str; 5],
}

/// GET /webhook/info - endpoints to register in the catalog admin
pub async fn info(State(ctx): State<AppContext>) -> Json<WebhookInfo> {
    Json(WebhookInfo {
        port: ctx.config.http_port,
        secret_configured: !ctx.webhook_secret().is_empty(),
        paths: [
            "/webhook/product/created",
            "/webhook/product/updated",
            "/webhook/product/deleted",
            "/webhook/product/stock",
            "/webhook/woocommerce",
        ],
    })
}
