//! Sync API handlers

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use shared::models::{OfflineOperation, OfflineOperationKind, SyncLogEntry, SyncSettingsUpdate, SyncStatus};

use crate::core::AppContext;
use crate::gateway::catalog::CatalogStatus;
use crate::gateway::endpoint::ConfigurationCheck;
use crate::gateway::ledger::LedgerStatus;
use crate::gateway::ConfigureOutcome;
use crate::sync::queue::{FailedOperation, OfflineStatus};
use crate::sync::{CycleOutcome, Disposition, QueueStats};
use crate::utils::{AppError, AppResult};

const DEFAULT_LOG_LIMIT: usize = 50;
const MAX_LOG_LIMIT: usize = 500;

/// GET /api/sync/status
pub async fn status(State(ctx): State<AppContext>) -> Json<SyncStatus> {
    Json(ctx.orchestrator.status())
}

/// POST /api/sync/now - returns `already_in_progress` instead of starting a second cycle
pub async fn sync_now(State(ctx): State<AppContext>) -> Json<CycleOutcome> {
    Json(ctx.orchestrator.request_manual_sync().await)
}

/// POST /api/sync/force
pub async fn force_sync(State(ctx): State<AppContext>) -> Json<CycleOutcome> {
    Json(ctx.orchestrator.force_sync().await)
}

/// PUT /api/sync/settings
pub async fn update_settings(
    State(ctx): State<AppContext>,
    Json(update): Json<SyncSettingsUpdate>,
) -> AppResult<Json<SyncStatus>> {
    ctx.orchestrator.update_settings(update).await.map(Json)
}

#[derive(Debug, Serialize)]
pub struct QueueView {
    pub offline: OfflineStatus,
    pub stats: QueueStats,
    pub operations: Vec<OfflineOperation>,
    pub failed: Vec<FailedOperation>,
}

/// GET /api/sync/queue
pub async fn queue(State(ctx): State<AppContext>) -> Json<QueueView> {
    let queue = &ctx.queue;
    Json(QueueView {
        offline: queue.offline_status(),
        stats: queue.stats(),
        operations: queue.snapshot(),
        failed: queue.failed_operations(),
    })
}

/// POST /api/sync/queue
pub async fn submit_operation(
    State(ctx): State<AppContext>,
    Json(kind): Json<OfflineOperationKind>,
) -> Json<Disposition> {
    Json(ctx.orchestrator.submit_operation(kind).await)
}

#[derive(Debug, Serialize)]
pub struct Cleared {
    pub cleared_count: usize,
}

/// DELETE /api/sync/queue
pub async fn clear_queue(State(ctx): State<AppContext>) -> Json<Cleared> {
    let cleared_count = ctx.orchestrator.clear_offline_queue();
    tracing::info!(cleared_count, "Offline queue cleared");
    Json(Cleared { cleared_count })
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub limit: Option<usize>,
}

/// GET /api/sync/logs?limit=50
pub async fn logs(
    State(ctx): State<AppContext>,
    Query(query): Query<LogQuery>,
) -> AppResult<Json<Vec<SyncLogEntry>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT);
    Ok(Json(ctx.store.recent_sync_logs(limit).await?))
}

#[derive(Debug, Serialize)]
pub struct GatewaysView {
    pub catalog: CatalogStatus,
    pub catalog_check: ConfigurationCheck,
    pub ledger: LedgerStatus,
    pub ledger_check: ConfigurationCheck,
}

/// GET /api/sync/gateways
pub async fn gateways(State(ctx): State<AppContext>) -> Json<GatewaysView> {
    Json(GatewaysView {
        catalog: ctx.catalog.status(),
        catalog_check: ctx.catalog.check_configuration(),
        ledger: ctx.ledger.status(),
        ledger_check: ctx.ledger.check_configuration(),
    })
}

#[derive(Debug, Deserialize)]
pub struct CatalogCredentials {
    pub url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
}

/// PUT /api/sync/gateways/catalog
pub async fn configure_catalog(
    State(ctx): State<AppContext>,
    Json(body): Json<CatalogCredentials>,
) -> AppResult<Json<ConfigureOutcome>> {
    ctx.orchestrator
        .configure_catalog_gateway(&body.url, &body.consumer_key, &body.consumer_secret)
        .await
        .map(Json)
}

/// DELETE /api/sync/gateways/catalog
pub async fn clear_catalog(State(ctx): State<AppContext>) -> AppResult<Json<CatalogStatus>> {
    ctx.catalog.clear_configuration().await.map_err(AppError::from)?;
    tracing::info!("Catalog configuration cleared");
    Ok(Json(ctx.catalog.status()))
}

#[derive(Debug, Deserialize)]
pub struct LedgerCredentials {
    pub url: String,
    pub api_key: String,
}

/// PUT /api/sync/gateways/ledger
pub async fn configure_ledger(
    State(ctx): State<AppContext>,
    Json(body): Json<LedgerCredentials>,
) -> AppResult<Json<ConfigureOutcome>> {
    ctx.orchestrator
        .configure_ledger_gateway(&body.url, &body.api_key)
        .await
        .map(Json)
}
