//! Sync audit log

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncLogStatus {
    Success,
    Error,
    Info,
}

impl SyncLogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Info => "info",
        }
    }
}

/// Append-only audit entry, never mutated after insert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub id: i64,
    pub operation: String,
    pub target_entity: String,
    pub record_id: Option<String>,
    pub status: SyncLogStatus,
    pub message: String,
    pub timestamp: i64,
}
