//! Sync status and summary DTOs shared with the UI shell

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Global conflict resolution strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// Push the local value to the catalog
    #[default]
    LocalWins,
    /// Overwrite the local value with the catalog's
    RemoteWins,
    /// Field-level reconciliation written to both sides
    Merge,
}

impl ConflictStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalWins => "local_wins",
            Self::RemoteWins => "remote_wins",
            Self::Merge => "merge",
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unknown strategy name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStrategy(pub String);

impl fmt::Display for UnknownStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown conflict resolution strategy: {}", self.0)
    }
}

impl std::error::Error for UnknownStrategy {}

impl FromStr for ConflictStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local_wins" => Ok(Self::LocalWins),
            "remote_wins" => Ok(Self::RemoteWins),
            "merge" => Ok(Self::Merge),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

/// Observable phase of the orchestrator state machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    #[default]
    Idle,
    Draining,
    Syncing,
    Error,
}

/// Per-step tally handed to the UI
///
/// `success` is the step-level verdict, the counters are per item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    pub success: bool,
    pub skipped: bool,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StepSummary {
    /// Step not run because its precondition does not hold (e.g. unconfigured gateway)
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            success: true,
            skipped: true,
            message: Some(reason.into()),
            ..Default::default()
        }
    }

    /// Step aborted before any item was attempted
    pub fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            message: Some(error.clone()),
            errors: vec![error],
            ..Default::default()
        }
    }

    /// Empty, successful step that items are tallied into
    pub fn started(total: usize) -> Self {
        Self {
            success: true,
            total,
            ..Default::default()
        }
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.failed += 1;
        self.errors.push(error.into());
    }

    /// Close the tally: a step with items is successful unless every item failed
    pub fn finish(mut self) -> Self {
        self.success = self.failed == 0 || self.succeeded > 0;
        self
    }
}

/// Which gateways hold complete credentials
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfiguredGateways {
    pub catalog: bool,
    pub ledger: bool,
}

/// Snapshot returned by the status endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub is_online: bool,
    pub is_syncing: bool,
    pub phase: SyncPhase,
    pub last_sync_time: Option<i64>,
    pub queue_depth: usize,
    pub configured_gateways: ConfiguredGateways,
    pub auto_sync_enabled: bool,
    pub sync_interval_minutes: u32,
    pub conflict_strategy: ConflictStrategy,
    pub offline_since: Option<i64>,
    pub last_error: Option<String>,
}

/// Partial settings update from the UI shell
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSettingsUpdate {
    #[serde(default)]
    pub auto_sync_enabled: Option<bool>,
    #[serde(default)]
    pub sync_interval_minutes: Option<u32>,
    #[serde(default)]
    pub conflict_strategy: Option<ConflictStrategy>,
}

/// Local store counters pushed with the heartbeat
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_products: u64,
    pub active_products: u64,
    pub total_sales: u64,
    pub pending_sales: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_round_trips_through_setting_value() {
        for s in [
            ConflictStrategy::LocalWins,
            ConflictStrategy::RemoteWins,
            ConflictStrategy::Merge,
        ] {
            assert_eq!(s.as_str().parse::<ConflictStrategy>(), Ok(s));
        }
        assert!("newest_wins".parse::<ConflictStrategy>().is_err());
    }

    #[test]
    fn skipped_step_is_successful() {
        let step = StepSummary::skipped("catalog gateway not configured");
        assert!(step.success);
        assert!(step.skipped);
        assert_eq!(step.total, 0);
    }

    #[test]
    fn partial_failure_still_counts_as_success() {
        let mut step = StepSummary::started(3);
        step.record_success();
        step.record_failure("sale 2: ledger returned 500");
        step.record_success();
        let step = step.finish();
        assert!(step.success);
        assert_eq!((step.succeeded, step.failed), (2, 1));

        let mut step = StepSummary::started(1);
        step.record_failure("boom");
        assert!(!step.finish().success);
    }
}
