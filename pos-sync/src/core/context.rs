use parking_lot::RwLock;
use rand::RngCore;
use shared::models::setting;
use std::sync::Arc;

use crate::core::Config;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::gateway::{CatalogClient, LedgerClient, SharedCatalog, SharedLedger};
use crate::store::{RedbStore, SharedStore};
use crate::sync::{ConnectivityMonitor, HttpProber, OfflineQueue, Prober, SyncOrchestrator, SyncWorker};
use crate::utils::{AppError, AppResult};

/// Composition root: one instance per running service
///
/// | Field | Role |
/// |-------|------|
/// | config | immutable configuration |
/// | store | local storage (redb) |
/// | catalog / ledger | remote gateways |
/// | queue | offline operation queue |
/// | monitor | connectivity monitor |
/// | orchestrator | sync state machine |
///
/// Cloning is cheap (all fields are `Arc`), so the context doubles as the axum state.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub store: SharedStore,
    pub catalog: SharedCatalog,
    pub ledger: SharedLedger,
    pub queue: Arc<OfflineQueue>,
    pub monitor: Arc<ConnectivityMonitor>,
    pub orchestrator: Arc<SyncOrchestrator>,
    webhook_secret: Arc<RwLock<String>>,
}

impl AppContext {
    /// Open the on-disk store under `work_dir` and probe the configured endpoint
    pub fn open(config: Config) -> AppResult<Self> {
        std::fs::create_dir_all(&config.work_dir).map_err(|e| {
            AppError::internal(format!("Failed to create work dir {}: {e}", config.work_dir))
        })?;
        let store: SharedStore = Arc::new(RedbStore::open(config.database_path())?);
        let prober = Arc::new(HttpProber::new(config.probe_url.clone(), config.probe_timeout));
        Ok(Self::new(config, store, prober))
    }

    /// Wire every component around an existing store and prober
    pub fn new(config: Config, store: SharedStore, prober: Arc<dyn Prober>) -> Self {
        let catalog: SharedCatalog = Arc::new(CatalogClient::new(store.clone(), config.catalog));
        let ledger: SharedLedger = Arc::new(LedgerClient::new(store.clone(), config.ledger));
        let queue = Arc::new(OfflineQueue::new(config.queue));
        let monitor = Arc::new(ConnectivityMonitor::new(prober, config.probe_interval));
        let orchestrator = Arc::new(SyncOrchestrator::new(
            store.clone(),
            catalog.clone(),
            ledger.clone(),
            queue.clone(),
            monitor.clone(),
            config.sync,
        ));

        Self {
            config: Arc::new(config),
            store,
            catalog,
            ledger,
            queue,
            monitor,
            orchestrator,
            webhook_secret: Arc::new(RwLock::new(String::new())),
        }
    }

    /// Load persisted state: settings, credentials, device id and webhook secret
    pub async fn initialize(&self) -> AppResult<()> {
        if let Some(device_id) = &self.config.device_id {
            self.store
                .set_setting(setting::POS_DEVICE_ID, device_id, false)
                .await?;
        }
        self.orchestrator.initialize().await?;

        let secret = match self.store.get_setting(setting::WEBHOOK_SECRET).await? {
            Some(secret) if !secret.is_empty() => secret,
            _ => {
                let mut bytes = [0u8; 32];
                rand::thread_rng().fill_bytes(&mut bytes);
                let secret = hex::encode(bytes);
                self.store
                    .set_setting(setting::WEBHOOK_SECRET, &secret, true)
                    .await?;
                tracing::info!("Generated webhook secret");
                secret
            }
        };
        *self.webhook_secret.write() = secret;
        Ok(())
    }

    pub fn webhook_secret(&self) -> String {
        self.webhook_secret.read().clone()
    }

    /// Register the connectivity monitor and the sync worker
    pub fn start_background_tasks(&self, tasks: &mut BackgroundTasks) {
        let token = tasks.shutdown_token();
        tasks.spawn(
            "connectivity_monitor",
            TaskKind::Periodic,
            self.monitor.clone().run(token.clone()),
        );
        tasks.spawn(
            "sync_worker",
            TaskKind::Worker,
            SyncWorker::new(self.orchestrator.clone(), token).run(),
        );
    }
}
