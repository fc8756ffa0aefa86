//! Offline operation queue
//!
//! In-memory, capacity-bounded FIFO of mutations captured while offline (or while
//! a remote call failed). When full, the oldest `evict_count` entries are dropped
//! before appending: availability wins over completeness.
//!
//! [`OfflineQueue::drain`] replays oldest-first through an [`OperationExecutor`].
//! A failed operation stays queued with `retry_count + 1` until it reaches
//! `max_retries`, then moves to the bounded failure record.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use shared::models::{OfflineOperation, OfflineOperationKind, OperationId};
use shared::util::now_millis;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::store::StorageError;

/// Queue limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    pub capacity: usize,
    /// Entries dropped from the front when full
    pub evict_count: usize,
    /// Drain attempts before an operation is declared failed
    pub max_retries: u32,
    /// Pause between two operations of one drain
    pub drain_delay: Duration,
    /// Bound of the failure record
    pub failed_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            evict_count: 100,
            max_retries: shared::models::DEFAULT_MAX_RETRIES,
            drain_delay: Duration::from_millis(500),
            failed_capacity: 100,
        }
    }
}

/// Why an operation could not be replayed
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Rejected(String),
}

/// Replays one queued operation
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    async fn execute(&self, operation: &OfflineOperation) -> Result<(), ExecuteError>;
}

/// Operation removed after exhausting its retry budget
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedOperation {
    pub operation: OfflineOperation,
    pub error: String,
    pub failed_at: i64,
}

/// Result of one drain
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DrainReport {
    /// Replayed successfully and removed
    pub processed: usize,
    /// Exhausted during this drain and removed
    pub failed: usize,
    /// Still queued afterwards
    pub remaining: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_operations: Vec<FailedOperation>,
}

/// Another drain is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Offline queue is already draining")]
pub struct QueueBusy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuedSummary {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub enqueued_at: i64,
    pub age_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub by_type: BTreeMap<&'static str, usize>,
    pub oldest: Option<QueuedSummary>,
    pub newest: Option<QueuedSummary>,
}

/// Offline mode bookkeeping for the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfflineStatus {
    pub is_offline_mode: bool,
    pub offline_since: Option<i64>,
    pub offline_duration_ms: i64,
    pub queued_operations: usize,
    pub capacity: usize,
}

/// Resets the drain flag even if the drain future is dropped
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct OfflineQueue {
    config: QueueConfig,
    entries: Mutex<VecDeque<OfflineOperation>>,
    failed: Mutex<VecDeque<FailedOperation>>,
    draining: AtomicBool,
    offline_since: RwLock<Option<i64>>,
}

impl OfflineQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(VecDeque::new()),
            failed: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
            offline_since: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Append an operation, evicting the oldest entries first when full
    pub fn enqueue(&self, kind: OfflineOperationKind) -> OperationId {
        let operation = OfflineOperation {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            enqueued_at: now_millis(),
            retry_count: 0,
            max_retries: self.config.max_retries,
            last_error: None,
        };
        let id = operation.id.clone();
        let kind = operation.kind.type_name();

        let mut entries = self.entries.lock();
        if entries.len() >= self.config.capacity {
            let evict = self.config.evict_count.clamp(1, entries.len());
            entries.drain(..evict);
            tracing::warn!(
                evicted = evict,
                capacity = self.config.capacity,
                "Offline queue full, dropped oldest operations"
            );
        }
        entries.push_back(operation);
        tracing::debug!(operation_id = %id, kind, depth = entries.len(), "Queued offline operation");
        id
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Drop every queued operation
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let cleared = entries.len();
        entries.clear();
        tracing::info!(cleared, "Cleared offline queue");
        cleared
    }

    /// Copy of the queue, oldest first
    pub fn snapshot(&self) -> Vec<OfflineOperation> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Operations removed after exhausting their retries, oldest first
    pub fn failed_operations(&self) -> Vec<FailedOperation> {
        self.failed.lock().iter().cloned().collect()
    }

    pub fn stats(&self) -> QueueStats {
        let entries = self.entries.lock();
        let now = now_millis();
        let summary = |op: &OfflineOperation| QueuedSummary {
            kind: op.kind.type_name(),
            enqueued_at: op.enqueued_at,
            age_ms: now - op.enqueued_at,
        };

        let mut by_type = BTreeMap::new();
        for op in entries.iter() {
            *by_type.entry(op.kind.type_name()).or_insert(0) += 1;
        }
        QueueStats {
            total: entries.len(),
            by_type,
            oldest: entries.iter().min_by_key(|op| op.enqueued_at).map(summary),
            newest: entries.iter().max_by_key(|op| op.enqueued_at).map(summary),
        }
    }

    // ========== Offline mode ==========

    /// Start the offline clock; returns false if already offline
    pub fn enter_offline_mode(&self) -> bool {
        let mut since = self.offline_since.write();
        if since.is_some() {
            return false;
        }
        *since = Some(now_millis());
        true
    }

    /// Stop the offline clock; returns the offline duration in millis
    pub fn exit_offline_mode(&self) -> Option<i64> {
        self.offline_since
            .write()
            .take()
            .map(|since| (now_millis() - since).max(0))
    }

    pub fn offline_since(&self) -> Option<i64> {
        *self.offline_since.read()
    }

    pub fn offline_status(&self) -> OfflineStatus {
        let since = self.offline_since();
        OfflineStatus {
            is_offline_mode: since.is_some(),
            offline_since: since,
            offline_duration_ms: since.map(|s| (now_millis() - s).max(0)).unwrap_or(0),
            queued_operations: self.len(),
            capacity: self.config.capacity,
        }
    }

    // ========== Drain ==========

    /// Replay every queued operation once, oldest first
    ///
    /// Operations enqueued while the drain runs wait for the next drain.
    pub async fn drain(&self, executor: &dyn OperationExecutor) -> Result<DrainReport, QueueBusy> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(QueueBusy);
        }
        let _guard = DrainGuard(&self.draining);

        let ids: Vec<OperationId> = self.entries.lock().iter().map(|op| op.id.clone()).collect();
        let mut report = DrainReport::default();
        if ids.is_empty() {
            return Ok(report);
        }
        tracing::info!(count = ids.len(), "Draining offline queue");

        for (index, id) in ids.iter().enumerate() {
            if index > 0 && !self.config.drain_delay.is_zero() {
                tokio::time::sleep(self.config.drain_delay).await;
            }

            // Cleared or evicted since the drain started
            let Some(operation) = self.entries.lock().iter().find(|op| &op.id == id).cloned()
            else {
                continue;
            };

            match executor.execute(&operation).await {
                Ok(()) => {
                    self.remove(id);
                    report.processed += 1;
                    tracing::debug!(operation_id = %id, kind = operation.kind.type_name(), "Replayed offline operation");
                }
                Err(e) => {
                    if let Some(failed) = self.record_failure(id, e.to_string()) {
                        tracing::error!(
                            operation_id = %id,
                            kind = failed.operation.kind.type_name(),
                            retries = failed.operation.retry_count,
                            "Offline operation failed permanently: {}",
                            failed.error
                        );
                        report.failed += 1;
                        report.failed_operations.push(failed);
                    } else {
                        tracing::warn!(operation_id = %id, "Offline operation failed, will retry: {e}");
                    }
                }
            }
        }

        report.remaining = self.len();
        tracing::info!(
            processed = report.processed,
            failed = report.failed,
            remaining = report.remaining,
            "Offline queue drained"
        );
        Ok(report)
    }

    fn remove(&self, id: &str) -> Option<OfflineOperation> {
        let mut entries = self.entries.lock();
        let position = entries.iter().position(|op| op.id == id)?;
        entries.remove(position)
    }

    /// Count a failed attempt; returns the failure record if the budget ran out
    fn record_failure(&self, id: &str, error: String) -> Option<FailedOperation> {
        let exhausted = {
            let mut entries = self.entries.lock();
            let position = entries.iter().position(|op| op.id == id)?;
            let operation = &mut entries[position];
            operation.retry_count += 1;
            operation.last_error = Some(error.clone());
            if !operation.is_exhausted() {
                return None;
            }
            entries.remove(position)?
        };

        let failed = FailedOperation {
            operation: exhausted,
            error,
            failed_at: now_millis(),
        };
        let mut record = self.failed.lock();
        if record.len() >= self.config.failed_capacity.max(1) {
            record.pop_front();
        }
        record.push_back(failed.clone());
        Some(failed)
    }
}
