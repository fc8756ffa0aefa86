//! Sync core
//!
//! - [`connectivity`]: reachability polling, publishes online/offline edges
//! - [`queue`]: bounded in-memory queue of mutations made while offline
//! - [`conflict`]: detection and resolution of concurrent catalog edits
//! - [`executor`]: replays queued operations against the store and gateways
//! - [`orchestrator`]: the sync cycle state machine
//! - [`worker`]: background task driving the orchestrator

pub mod conflict;
pub mod connectivity;
pub mod executor;
pub mod orchestrator;
pub mod queue;
pub mod worker;

pub use conflict::{Conflict, ConflictField, ConflictResolver, Resolution};
pub use connectivity::{ConnectivityEdge, ConnectivityMonitor, HttpProber, Prober};
pub use executor::GatewayExecutor;
pub use orchestrator::{
    CycleOutcome, CycleReport, CycleTrigger, Disposition, ScheduleSettings, SyncOrchestrator,
    SyncPacing,
};
pub use queue::{DrainReport, OfflineQueue, OperationExecutor, QueueConfig, QueueStats};
pub use worker::SyncWorker;
