//! Sync orchestrator
//!
//! Top-level state machine of the sync core:
//!
//! ```text
//!            edge: WentOnline (queue non-empty)
//!   Idle ──────────────────────────────────────► Draining
//!    │ manual / scheduled / force                   │ drain done
//!    └────────────────────► Syncing ◄───────────────┘
//!                             │  │
//!                    complete │  │ panic / persist failure
//!                             ▼  ▼
//!                          Idle  Error ──► Idle
//! ```
//!
//! Only one cycle runs at a time: `syncing` is claimed with a compare-exchange and
//! a request made while it is held returns [`CycleOutcome::AlreadyInProgress`].
//! Steps inside a cycle are independent; a failing step is reported in its
//! [`StepSummary`] and the cycle carries on.

use futures::FutureExt;
use parking_lot::RwLock;
use serde::Serialize;
use shared::models::{
    ConfiguredGateways, ConflictStrategy, OfflineOperation, OfflineOperationKind, OperationId,
    ProductFilter,
    StepSummary, SyncLogStatus, SyncPhase, SyncSettingsUpdate, SyncStatus, setting,
};
use shared::util::now_millis;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, broadcast, watch};

use super::conflict::ConflictResolver;
use super::connectivity::{ConnectivityEdge, ConnectivityMonitor};
use super::executor::{GatewayExecutor, push_sale};
use super::queue::{DrainReport, OfflineQueue, OperationExecutor, QueueBusy};
use crate::gateway::catalog::DeferredProduct;
use crate::gateway::{ConfigureOutcome, SharedCatalog, SharedLedger};
use crate::store::SharedStore;
use crate::utils::{AppError, AppResult, ErrorCode};

pub const MIN_SYNC_INTERVAL_MINUTES: u32 = 1;
pub const MAX_SYNC_INTERVAL_MINUTES: u32 = 1440;
pub const DEFAULT_SYNC_INTERVAL_MINUTES: u32 = 15;

/// Delays applied by the orchestrator itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPacing {
    /// Between two pending-sale pushes
    pub sale_spacing: Duration,
    /// Between the reconnect drain and the cycle that follows it
    pub reconnect_delay: Duration,
}

impl Default for SyncPacing {
    fn default() -> Self {
        Self {
            sale_spacing: Duration::from_millis(1000),
            reconnect_delay: Duration::from_millis(2000),
        }
    }
}

impl SyncPacing {
    pub fn unthrottled() -> Self {
        Self {
            sale_spacing: Duration::ZERO,
            reconnect_delay: Duration::ZERO,
        }
    }
}

/// What started a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleTrigger {
    Manual,
    Scheduled,
    /// Offline→online edge: drain first
    Reconnect,
    /// Manual plus a full conflict scan of locally edited products
    Force,
}

/// Per-step results of one completed cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub trigger: CycleTrigger,
    pub started_at: i64,
    pub finished_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offline_queue: Option<DrainReport>,
    pub pending_sales: StepSummary,
    pub catalog_products: StepSummary,
    pub catalog_categories: StepSummary,
    pub ledger_products: StepSummary,
    pub ledger_sales: StepSummary,
    pub heartbeat: StepSummary,
    pub conflicts: StepSummary,
    /// `last_sync_time` after the cycle
    pub last_sync_time: Option<i64>,
}

impl CycleReport {
    fn new(trigger: CycleTrigger, started_at: i64) -> Self {
        let idle = || StepSummary::skipped("Not run");
        Self {
            trigger,
            started_at,
            finished_at: started_at,
            offline_queue: None,
            pending_sales: idle(),
            catalog_products: idle(),
            catalog_categories: idle(),
            ledger_products: idle(),
            ledger_sales: idle(),
            heartbeat: idle(),
            conflicts: idle(),
            last_sync_time: None,
        }
    }

    fn steps(&self) -> [(&'static str, &StepSummary); 7] {
        [
            ("pending_sales", &self.pending_sales),
            ("catalog_products", &self.catalog_products),
            ("catalog_categories", &self.catalog_categories),
            ("ledger_products", &self.ledger_products),
            ("ledger_sales", &self.ledger_sales),
            ("heartbeat", &self.heartbeat),
            ("conflicts", &self.conflicts),
        ]
    }

    /// One-line summary for the sync log
    pub fn describe(&self) -> String {
        self.steps()
            .iter()
            .filter(|(_, s)| !s.skipped)
            .map(|(name, s)| format!("{name} {}/{}", s.succeeded, s.total))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// A cycle is already running; nothing was started
    AlreadyInProgress,
    Failed { error: String },
}

impl CycleOutcome {
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            Self::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// Schedule-relevant settings, published to the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSettings {
    pub auto_sync_enabled: bool,
    pub interval_minutes: u32,
}

impl ScheduleSettings {
    pub fn period(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval_minutes.max(MIN_SYNC_INTERVAL_MINUTES)) * 60)
    }
}

/// How a submitted mutation was handled
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum Disposition {
    Applied,
    Queued { operation_id: OperationId },
}

#[derive(Debug, Clone)]
struct SyncState {
    phase: SyncPhase,
    last_sync_time: Option<i64>,
    auto_sync_enabled: bool,
    sync_interval_minutes: u32,
    conflict_strategy: ConflictStrategy,
    device_id: String,
    last_error: Option<String>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            phase: SyncPhase::Idle,
            last_sync_time: None,
            auto_sync_enabled: true,
            sync_interval_minutes: DEFAULT_SYNC_INTERVAL_MINUTES,
            conflict_strategy: ConflictStrategy::default(),
            device_id: String::new(),
            last_error: None,
        }
    }
}

/// Releases the cycle flag and returns to `Idle` however the cycle ends
struct CycleGuard<'a>(&'a SyncOrchestrator);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.set_phase(SyncPhase::Idle);
        self.0.syncing.store(false, Ordering::Release);
        if self.0.rerun.swap(false, Ordering::AcqRel) {
            self.0.wake.notify_one();
        }
    }
}

pub struct SyncOrchestrator {
    store: SharedStore,
    catalog: SharedCatalog,
    ledger: SharedLedger,
    queue: Arc<OfflineQueue>,
    monitor: Arc<ConnectivityMonitor>,
    resolver: ConflictResolver,
    pacing: SyncPacing,
    state: RwLock<SyncState>,
    syncing: AtomicBool,
    /// A reconnect arrived mid-cycle; wake the worker when the cycle ends
    rerun: AtomicBool,
    phases: broadcast::Sender<SyncPhase>,
    schedule: watch::Sender<ScheduleSettings>,
    wake: Notify,
}

impl SyncOrchestrator {
    pub fn new(
        store: SharedStore,
        catalog: SharedCatalog,
        ledger: SharedLedger,
        queue: Arc<OfflineQueue>,
        monitor: Arc<ConnectivityMonitor>,
        pacing: SyncPacing,
    ) -> Self {
        let state = SyncState::default();
        let (phases, _) = broadcast::channel(32);
        let (schedule, _) = watch::channel(ScheduleSettings {
            auto_sync_enabled: state.auto_sync_enabled,
            interval_minutes: state.sync_interval_minutes,
        });
        Self {
            resolver: ConflictResolver::new(store.clone(), catalog.clone()),
            store,
            catalog,
            ledger,
            queue,
            monitor,
            pacing,
            state: RwLock::new(state),
            syncing: AtomicBool::new(false),
            rerun: AtomicBool::new(false),
            phases,
            schedule,
            wake: Notify::new(),
        }
    }

    // ========== Accessors ==========

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn queue(&self) -> &Arc<OfflineQueue> {
        &self.queue
    }

    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    pub fn catalog(&self) -> &SharedCatalog {
        &self.catalog
    }

    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> SyncPhase {
        self.state.read().phase
    }

    pub fn last_sync_time(&self) -> Option<i64> {
        self.state.read().last_sync_time
    }

    pub fn device_id(&self) -> String {
        self.state.read().device_id.clone()
    }

    pub fn conflict_strategy(&self) -> ConflictStrategy {
        self.state.read().conflict_strategy
    }

    /// Phase transitions, in order
    pub fn subscribe_phases(&self) -> broadcast::Receiver<SyncPhase> {
        self.phases.subscribe()
    }

    pub fn schedule(&self) -> watch::Receiver<ScheduleSettings> {
        self.schedule.subscribe()
    }

    /// Ask the worker to run a cycle without waiting for it
    pub fn request_background_sync(&self) {
        self.wake.notify_one();
    }

    pub(crate) async fn background_sync_requested(&self) {
        self.wake.notified().await;
    }

    fn set_phase(&self, phase: SyncPhase) {
        self.state.write().phase = phase;
        let _ = self.phases.send(phase);
    }

    fn publish_schedule(&self) {
        let state = self.state.read();
        self.schedule.send_replace(ScheduleSettings {
            auto_sync_enabled: state.auto_sync_enabled,
            interval_minutes: state.sync_interval_minutes,
        });
    }

    async fn log(&self, operation: &str, entity: &str, record_id: Option<&str>, status: SyncLogStatus, message: &str) {
        if let Err(e) = self
            .store
            .append_sync_log(operation, entity, record_id, status, message)
            .await
        {
            tracing::warn!(operation, "Failed to append sync log: {e}");
        }
    }

    // ========== Startup ==========

    /// Load persisted settings, gateway credentials and the device id
    pub async fn initialize(&self) -> AppResult<()> {
        let store = &self.store;
        let auto_sync = store.get_setting(setting::AUTO_SYNC_ENABLED).await?;
        let interval = store.get_setting(setting::SYNC_INTERVAL_MINUTES).await?;
        let strategy = store.get_setting(setting::CONFLICT_RESOLUTION).await?;
        let last_sync = store.get_setting(setting::LAST_SYNC_TIME).await?;

        let device_id = match store.get_setting(setting::POS_DEVICE_ID).await? {
            Some(id) if !id.trim().is_empty() => id,
            _ => {
                let id = uuid::Uuid::new_v4().to_string();
                store.set_setting(setting::POS_DEVICE_ID, &id, false).await?;
                tracing::info!(device_id = %id, "Generated POS device id");
                id
            }
        };

        {
            let mut state = self.state.write();
            state.auto_sync_enabled = auto_sync.as_deref().map(|v| v == "1").unwrap_or(true);
            state.sync_interval_minutes = interval
                .as_deref()
                .and_then(|v| v.trim().parse::<u32>().ok())
                .filter(|m| (MIN_SYNC_INTERVAL_MINUTES..=MAX_SYNC_INTERVAL_MINUTES).contains(m))
                .unwrap_or(DEFAULT_SYNC_INTERVAL_MINUTES);
            state.conflict_strategy = strategy
                .as_deref()
                .and_then(|v| ConflictStrategy::from_str(v).ok())
                .unwrap_or_default();
            state.last_sync_time = last_sync
                .as_deref()
                .and_then(|v| v.trim().parse::<i64>().ok())
                .filter(|t| *t > 0);
            state.device_id = device_id;
        }

        self.catalog.reload().await?;
        self.ledger.reload().await?;
        self.publish_schedule();

        let state = self.state.read();
        tracing::info!(
            auto_sync = state.auto_sync_enabled,
            interval_minutes = state.sync_interval_minutes,
            strategy = state.conflict_strategy.as_str(),
            last_sync = ?state.last_sync_time,
            catalog = self.catalog.is_configured(),
            ledger = self.ledger.is_configured(),
            "Sync settings loaded"
        );
        Ok(())
    }

    // ========== UI surface ==========

    pub fn status(&self) -> SyncStatus {
        let state = self.state.read();
        SyncStatus {
            is_online: self.monitor.is_online(),
            is_syncing: self.is_syncing(),
            phase: state.phase,
            last_sync_time: state.last_sync_time,
            queue_depth: self.queue.len(),
            configured_gateways: ConfiguredGateways {
                catalog: self.catalog.is_configured(),
                ledger: self.ledger.is_configured(),
            },
            auto_sync_enabled: state.auto_sync_enabled,
            sync_interval_minutes: state.sync_interval_minutes,
            conflict_strategy: state.conflict_strategy,
            offline_since: self.queue.offline_since(),
            last_error: state.last_error.clone(),
        }
    }

    /// Validate, persist and apply; the worker re-arms its timer on change
    pub async fn update_settings(&self, update: SyncSettingsUpdate) -> AppResult<SyncStatus> {
        if let Some(minutes) = update.sync_interval_minutes
            && !(MIN_SYNC_INTERVAL_MINUTES..=MAX_SYNC_INTERVAL_MINUTES).contains(&minutes)
        {
            return Err(AppError::with_message(
                ErrorCode::InvalidSyncInterval,
                format!(
                    "Sync interval must be between {} and {} minutes, got {}",
                    MIN_SYNC_INTERVAL_MINUTES, MAX_SYNC_INTERVAL_MINUTES, minutes
                ),
            ));
        }

        if let Some(enabled) = update.auto_sync_enabled {
            self.store
                .set_setting(setting::AUTO_SYNC_ENABLED, if enabled { "1" } else { "0" }, false)
                .await?;
            self.state.write().auto_sync_enabled = enabled;
        }
        if let Some(minutes) = update.sync_interval_minutes {
            self.store
                .set_setting(setting::SYNC_INTERVAL_MINUTES, &minutes.to_string(), false)
                .await?;
            self.state.write().sync_interval_minutes = minutes;
        }
        if let Some(strategy) = update.conflict_strategy {
            self.store
                .set_setting(setting::CONFLICT_RESOLUTION, strategy.as_str(), false)
                .await?;
            self.state.write().conflict_strategy = strategy;
        }

        self.publish_schedule();
        tracing::info!(?update, "Sync settings updated");
        Ok(self.status())
    }

    pub fn enqueue_offline_operation(&self, kind: OfflineOperationKind) -> OperationId {
        self.queue.enqueue(kind)
    }

    pub fn clear_offline_queue(&self) -> usize {
        self.queue.clear()
    }

    /// Apply a mutation now when online, otherwise (or on failure) queue it
    pub async fn submit_operation(&self, kind: OfflineOperationKind) -> Disposition {
        if self.monitor.is_online() {
            let executor = self.executor();
            let operation = OfflineOperation {
                id: String::new(),
                kind: kind.clone(),
                enqueued_at: now_millis(),
                retry_count: 0,
                max_retries: 0,
                last_error: None,
            };
            match executor.execute(&operation).await {
                Ok(()) => return Disposition::Applied,
                Err(e) => {
                    tracing::warn!(kind = kind.type_name(), "Remote apply failed, queueing: {e}")
                }
            }
        }
        Disposition::Queued {
            operation_id: self.queue.enqueue(kind),
        }
    }

    pub async fn configure_catalog_gateway(
        &self,
        url: &str,
        consumer_key: &str,
        consumer_secret: &str,
    ) -> AppResult<ConfigureOutcome> {
        let outcome = self
            .catalog
            .configure(url, consumer_key, consumer_secret)
            .await
            .map_err(|e| {
                if e.is_unconfigured() {
                    AppError::validation("Catalog URL, consumer key and consumer secret are required")
                } else {
                    AppError::from(e)
                }
            })?;
        self.log(
            "configure",
            "catalog",
            None,
            SyncLogStatus::Info,
            &format!("Catalog configured (connection ok: {})", outcome.connection_ok),
        )
        .await;
        Ok(outcome)
    }

    pub async fn configure_ledger_gateway(&self, url: &str, api_key: &str) -> AppResult<ConfigureOutcome> {
        let outcome = self.ledger.configure(url, api_key).await.map_err(|e| {
            if e.is_unconfigured() {
                AppError::validation("Ledger URL and API key are required")
            } else {
                AppError::from(e)
            }
        })?;
        self.log(
            "configure",
            "ledger",
            None,
            SyncLogStatus::Info,
            &format!("Ledger configured (connection ok: {})", outcome.connection_ok),
        )
        .await;
        Ok(outcome)
    }

    // ========== Triggers ==========

    pub async fn request_manual_sync(&self) -> CycleOutcome {
        self.run_cycle(CycleTrigger::Manual).await
    }

    pub async fn force_sync(&self) -> CycleOutcome {
        self.run_cycle(CycleTrigger::Force).await
    }

    /// React to a connectivity edge
    ///
    /// Going offline starts offline mode. Coming back ends it and runs a reconnect
    /// cycle (drain first). When another cycle holds the guard, the worker is woken
    /// as soon as that cycle ends so the queue is not left until the next tick.
    pub async fn on_connectivity_edge(&self, edge: ConnectivityEdge) -> Option<CycleOutcome> {
        match edge {
            ConnectivityEdge::WentOffline => {
                if self.queue.enter_offline_mode() {
                    tracing::warn!("Entered offline mode");
                    self.log("offline_mode", "system", None, SyncLogStatus::Info, "Entered offline mode")
                        .await;
                }
                None
            }
            ConnectivityEdge::WentOnline => {
                if let Some(duration) = self.queue.exit_offline_mode() {
                    let message = format!("Exited offline mode after {} seconds", (duration + 500) / 1000);
                    tracing::info!(queued = self.queue.len(), "{message}");
                    self.log("offline_mode", "system", None, SyncLogStatus::Info, &message)
                        .await;
                }
                let outcome = self.run_cycle(CycleTrigger::Reconnect).await;
                if matches!(outcome, CycleOutcome::AlreadyInProgress) {
                    self.rerun.store(true, Ordering::Release);
                    // the running cycle may have ended before the flag was set
                    if !self.is_syncing() && self.rerun.swap(false, Ordering::AcqRel) {
                        self.wake.notify_one();
                    }
                    tracing::info!("Reconnect during a running cycle, follow-up sync scheduled");
                }
                Some(outcome)
            }
        }
    }

    // ========== Cycle ==========

    fn executor(&self) -> GatewayExecutor {
        GatewayExecutor::new(
            self.store.clone(),
            self.catalog.clone(),
            self.ledger.clone(),
            self.device_id(),
        )
    }

    /// Run one cycle unless one is already running
    pub async fn run_cycle(&self, trigger: CycleTrigger) -> CycleOutcome {
        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(?trigger, "Sync already in progress");
            return CycleOutcome::AlreadyInProgress;
        }
        let _guard = CycleGuard(self);

        let result = AssertUnwindSafe(self.execute_cycle(trigger))
            .catch_unwind()
            .await;

        let error = match result {
            Ok(Ok(report)) => {
                self.state.write().last_error = None;
                tracing::info!(?trigger, summary = %report.describe(), "Sync cycle completed");
                self.log("sync", "system", None, SyncLogStatus::Success, &report.describe())
                    .await;
                return CycleOutcome::Completed(report);
            }
            Ok(Err(e)) => e.to_string(),
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                format!("Sync cycle panicked: {message}")
            }
        };

        self.set_phase(SyncPhase::Error);
        self.state.write().last_error = Some(error.clone());
        tracing::error!(?trigger, "Sync cycle failed: {error}");
        self.log("sync", "system", None, SyncLogStatus::Error, &error).await;
        CycleOutcome::Failed { error }
    }

    async fn execute_cycle(&self, trigger: CycleTrigger) -> AppResult<CycleReport> {
        let started_at = now_millis();
        let last_sync = self.last_sync_time();
        let mut report = CycleReport::new(trigger, started_at);
        let online = self.monitor.is_online();

        // (1) offline queue
        if trigger == CycleTrigger::Reconnect && !self.queue.is_empty() {
            self.set_phase(SyncPhase::Draining);
            report.offline_queue = self.drain_queue().await;
            if !self.pacing.reconnect_delay.is_zero() {
                tokio::time::sleep(self.pacing.reconnect_delay).await;
            }
        }
        self.set_phase(SyncPhase::Syncing);
        if report.offline_queue.is_none() && online && !self.queue.is_empty() {
            report.offline_queue = self.drain_queue().await;
        }

        if !online {
            tracing::info!(?trigger, "Offline, remote sync steps skipped");
            for step in [
                &mut report.pending_sales,
                &mut report.catalog_products,
                &mut report.catalog_categories,
                &mut report.ledger_products,
                &mut report.ledger_sales,
                &mut report.heartbeat,
                &mut report.conflicts,
            ] {
                *step = StepSummary::skipped("Offline");
            }
            report.finished_at = now_millis();
            report.last_sync_time = last_sync;
            return Ok(report);
        }

        // (2) pending sales
        report.pending_sales = self.push_pending_sales().await;

        // (3) catalog
        let mut deferred = Vec::new();
        if self.catalog.is_configured() {
            match self.catalog.pull_all(last_sync).await {
                Ok(pull) => {
                    report.catalog_products = pull.summary;
                    deferred = pull.deferred;
                    report.catalog_categories = match self.catalog.pull_categories().await {
                        Ok(summary) => summary,
                        Err(e) => StepSummary::failed(e.to_string()),
                    };
                }
                Err(e) => {
                    report.catalog_products = StepSummary::failed(e.to_string());
                    report.catalog_categories = StepSummary::skipped("Product pull failed");
                }
            }
        } else {
            report.catalog_products = StepSummary::skipped("Catalog gateway not configured");
            report.catalog_categories = StepSummary::skipped("Catalog gateway not configured");
        }

        // (4) ledger
        if self.ledger.is_configured() {
            report.ledger_products = self.push_product_deltas(last_sync).await;
            report.ledger_sales = self.mirror_recent_sales(last_sync).await;
            report.heartbeat = self.send_heartbeat(last_sync).await;
        } else {
            let skipped = StepSummary::skipped("Ledger gateway not configured");
            report.ledger_products = skipped.clone();
            report.ledger_sales = skipped.clone();
            report.heartbeat = skipped;
        }

        // (5) conflicts
        report.conflicts = if self.catalog.is_configured() {
            self.resolve_conflicts(trigger, deferred, last_sync).await
        } else {
            StepSummary::skipped("Catalog gateway not configured")
        };

        report.last_sync_time = Some(self.advance_last_sync(started_at).await?);
        report.finished_at = now_millis();
        Ok(report)
    }

    async fn drain_queue(&self) -> Option<DrainReport> {
        let executor = self.executor();
        match self.queue.drain(&executor).await {
            Ok(report) => {
                for failed in &report.failed_operations {
                    let message = format!(
                        "Failed offline operation: {} - {}",
                        failed.operation.kind.type_name(),
                        failed.error
                    );
                    let record_id = failed.operation.kind.record_id().to_string();
                    self.log(
                        "offline_operation_failed",
                        "system",
                        Some(&record_id),
                        SyncLogStatus::Error,
                        &message,
                    )
                    .await;
                }
                Some(report)
            }
            Err(QueueBusy) => {
                tracing::warn!("Offline queue drain already running, skipped");
                None
            }
        }
    }

    /// Push every `synced == false` sale, oldest first
    async fn push_pending_sales(&self) -> StepSummary {
        let sales = match self.store.pending_sales().await {
            Ok(sales) => sales,
            Err(e) => return StepSummary::failed(format!("Failed to load pending sales: {e}")),
        };
        if sales.is_empty() {
            let mut summary = StepSummary::started(0);
            summary.message = Some("No pending sales".to_string());
            return summary;
        }

        tracing::info!(count = sales.len(), "Pushing pending sales");
        let device_id = self.device_id();
        let mut summary = StepSummary::started(sales.len());

        for (index, sale) in sales.iter().enumerate() {
            if index > 0 && !self.pacing.sale_spacing.is_zero() {
                tokio::time::sleep(self.pacing.sale_spacing).await;
            }
            let record_id = sale.id.to_string();
            match push_sale(&self.store, &self.catalog, &self.ledger, sale, &device_id).await {
                Ok(_) => {
                    summary.record_success();
                    self.log(
                        "sale_sync",
                        "sales",
                        Some(&record_id),
                        SyncLogStatus::Success,
                        &format!("Sale synced: {}", sale.sale_number),
                    )
                    .await;
                }
                Err(e) => {
                    tracing::warn!(sale_id = sale.id, "Pending sale push failed: {e}");
                    summary.record_failure(format!("{}: {}", sale.sale_number, e));
                    self.log("sale_sync", "sales", Some(&record_id), SyncLogStatus::Error, &e.to_string())
                        .await;
                }
            }
        }
        summary.finish()
    }

    async fn push_product_deltas(&self, last_sync: Option<i64>) -> StepSummary {
        let filter = ProductFilter {
            updated_since: last_sync,
            ..Default::default()
        };
        match self.store.list_products(&filter).await {
            Ok(products) => self.ledger.push_product_deltas(&products).await,
            Err(e) => StepSummary::failed(format!("Failed to load products: {e}")),
        }
    }

    async fn mirror_recent_sales(&self, last_sync: Option<i64>) -> StepSummary {
        match self.store.sales_created_since(last_sync.unwrap_or(0)).await {
            Ok(mut sales) => {
                sales.retain(|s| s.synced);
                self.ledger.mirror_sales(&sales, &self.device_id()).await
            }
            Err(e) => StepSummary::failed(format!("Failed to load sales: {e}")),
        }
    }

    async fn send_heartbeat(&self, last_sync: Option<i64>) -> StepSummary {
        let stats = match self.store.stats().await {
            Ok(stats) => stats,
            Err(e) => return StepSummary::failed(format!("Failed to read store stats: {e}")),
        };
        let mut summary = StepSummary::started(1);
        match self
            .ledger
            .send_heartbeat(&self.device_id(), &stats, last_sync)
            .await
        {
            Ok(()) => summary.record_success(),
            Err(e) => summary.record_failure(e.to_string()),
        }
        summary.finish()
    }

    async fn resolve_conflicts(
        &self,
        trigger: CycleTrigger,
        mut candidates: Vec<DeferredProduct>,
        last_sync: Option<i64>,
    ) -> StepSummary {
        if trigger == CycleTrigger::Force {
            match self.resolver.scan(last_sync).await {
                Ok(scanned) => {
                    for candidate in scanned {
                        if !candidates.iter().any(|c| c.local.id == candidate.local.id) {
                            candidates.push(candidate);
                        }
                    }
                }
                Err(e) => return StepSummary::failed(format!("Conflict scan failed: {e}")),
            }
        }

        let conflicts = self.resolver.find_conflicts(&candidates, last_sync);
        if conflicts.is_empty() {
            let mut summary = StepSummary::started(0);
            summary.message = Some("No conflicts".to_string());
            return summary;
        }
        let strategy = self.conflict_strategy();
        tracing::info!(count = conflicts.len(), strategy = strategy.as_str(), "Resolving conflicts");
        self.resolver.resolve_all(&conflicts, strategy).await
    }

    /// Persist the new sync baseline; never moves backwards
    async fn advance_last_sync(&self, started_at: i64) -> AppResult<i64> {
        let next = self
            .last_sync_time()
            .map_or(started_at, |previous| previous.max(started_at));
        self.store
            .set_setting(setting::LAST_SYNC_TIME, &next.to_string(), false)
            .await
            .map_err(|e| AppError::database(format!("Failed to persist last sync time: {e}")))?;
        self.state.write().last_sync_time = Some(next);
        Ok(next)
    }
}
