//! Sync worker
//!
//! Long-running task that turns connectivity edges, the auto-sync timer and
//! background requests into orchestrator cycles.

use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::orchestrator::{CycleOutcome, CycleTrigger, ScheduleSettings, SyncOrchestrator};

pub struct SyncWorker {
    orchestrator: Arc<SyncOrchestrator>,
    shutdown: CancellationToken,
}

impl SyncWorker {
    pub fn new(orchestrator: Arc<SyncOrchestrator>, shutdown: CancellationToken) -> Self {
        Self {
            orchestrator,
            shutdown,
        }
    }

    fn ticker(settings: &ScheduleSettings) -> Interval {
        let period = settings.period();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    pub async fn run(self) {
        let mut edges = self.orchestrator.monitor().subscribe();
        let mut schedule = self.orchestrator.schedule();
        let mut settings = *schedule.borrow_and_update();
        let mut ticker = Self::ticker(&settings);

        tracing::info!(
            auto_sync = settings.auto_sync_enabled,
            interval_minutes = settings.interval_minutes,
            "Sync worker started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Sync worker received shutdown signal");
                    break;
                }

                edge = edges.recv() => match edge {
                    Ok(edge) => {
                        if let Some(outcome) = self.orchestrator.on_connectivity_edge(edge).await {
                            Self::report(CycleTrigger::Reconnect, &outcome);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Sync worker lagged behind connectivity edges");
                    }
                    Err(RecvError::Closed) => {
                        tracing::info!("Connectivity channel closed, stopping sync worker");
                        break;
                    }
                },

                changed = schedule.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let next = *schedule.borrow_and_update();
                    if next != settings {
                        tracing::info!(
                            auto_sync = next.auto_sync_enabled,
                            interval_minutes = next.interval_minutes,
                            "Sync schedule updated"
                        );
                        settings = next;
                        ticker = Self::ticker(&settings);
                    }
                }

                _ = ticker.tick() => {
                    if !settings.auto_sync_enabled {
                        continue;
                    }
                    if !self.orchestrator.monitor().is_online() {
                        tracing::debug!("Scheduled sync skipped: offline");
                        continue;
                    }
                    if self.orchestrator.is_syncing() {
                        tracing::debug!("Scheduled sync skipped: cycle in progress");
                        continue;
                    }
                    let outcome = self.orchestrator.run_cycle(CycleTrigger::Scheduled).await;
                    Self::report(CycleTrigger::Scheduled, &outcome);
                }

                _ = self.orchestrator.background_sync_requested() => {
                    let outcome = self.orchestrator.run_cycle(CycleTrigger::Manual).await;
                    Self::report(CycleTrigger::Manual, &outcome);
                }
            }
        }

        tracing::info!("Sync worker stopped");
    }

    fn report(trigger: CycleTrigger, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::Completed(_) => {}
            CycleOutcome::AlreadyInProgress => {
                tracing::debug!(?trigger, "Cycle request dropped: already in progress")
            }
            CycleOutcome::Failed { error } => {
                tracing::warn!(?trigger, "Background cycle failed: {error}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{CatalogClient, CatalogPacing, LedgerClient, LedgerPacing};
    use crate::store::{RedbStore, SharedStore};
    use crate::sync::connectivity::{ConnectivityMonitor, Prober};
    use crate::sync::orchestrator::SyncPacing;
    use crate::sync::queue::{OfflineQueue, QueueConfig};
    use async_trait::async_trait;
    use shared::models::{SyncPhase, SyncSettingsUpdate};
    use std::time::Duration;

    struct Unreachable;

    #[async_trait]
    impl Prober for Unreachable {
        async fn probe(&self) -> bool {
            false
        }
    }

    async fn orchestrator(online: bool) -> Arc<SyncOrchestrator> {
        let store: SharedStore = Arc::new(RedbStore::open_in_memory().unwrap());
        let monitor = Arc::new(ConnectivityMonitor::new(Arc::new(Unreachable), Duration::from_secs(10)));
        monitor.set_online(online);
        let orchestrator = Arc::new(SyncOrchestrator::new(
            store.clone(),
            Arc::new(CatalogClient::new(store.clone(), CatalogPacing::unthrottled())),
            Arc::new(LedgerClient::new(store, LedgerPacing::unthrottled())),
            Arc::new(OfflineQueue::new(QueueConfig::default())),
            monitor,
            SyncPacing::unthrottled(),
        ));
        orchestrator.initialize().await.unwrap();
        orchestrator
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_runs_cycles_when_enabled() {
        let orchestrator = orchestrator(true).await;
        let mut phases = orchestrator.subscribe_phases();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(SyncWorker::new(orchestrator.clone(), shutdown.clone()).run());

        // default interval is 15 minutes
        tokio::time::sleep(Duration::from_secs(15 * 60 + 1)).await;
        assert_eq!(phases.recv().await.unwrap(), SyncPhase::Syncing);
        assert_eq!(phases.recv().await.unwrap(), SyncPhase::Idle);
        assert!(orchestrator.last_sync_time().is_some());

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_auto_sync_never_fires() {
        let orchestrator = orchestrator(true).await;
        orchestrator
            .update_settings(SyncSettingsUpdate {
                auto_sync_enabled: Some(false),
                sync_interval_minutes: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(SyncWorker::new(orchestrator.clone(), shutdown.clone()).run());

        tokio::time::sleep(Duration::from_secs(10 * 60)).await;
        assert_eq!(orchestrator.last_sync_time(), None);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_edge_triggers_cycle() {
        let orchestrator = orchestrator(false).await;
        let mut phases = orchestrator.subscribe_phases();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(SyncWorker::new(orchestrator.clone(), shutdown.clone()).run());
        tokio::task::yield_now().await;

        orchestrator.monitor().set_online(true);
        assert_eq!(phases.recv().await.unwrap(), SyncPhase::Syncing);
        assert_eq!(phases.recv().await.unwrap(), SyncPhase::Idle);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
