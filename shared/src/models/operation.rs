//! Offline operations
//!
//! Mutations captured while the POS is offline (or when a remote call fails inside a
//! cycle) and replayed oldest-first once connectivity returns.

use super::product::ProductPatch;
use serde::{Deserialize, Serialize};

/// Queue-assigned operation identifier (UUID v4)
pub type OperationId = String;

/// Default retry budget per operation
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Payload of an offline operation
///
/// Stock and product updates carry absolute values, so replaying twice is harmless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OfflineOperationKind {
    /// Re-push a locally persisted sale
    Sale { sale_id: i64 },
    /// Set the stock of a product to an absolute value
    StockUpdate { product_id: i64, new_stock: i64 },
    /// Overwrite selected product fields
    ProductUpdate(ProductPatch),
}

impl OfflineOperationKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Sale { .. } => "sale",
            Self::StockUpdate { .. } => "stock_update",
            Self::ProductUpdate(_) => "product_update",
        }
    }

    /// Local record the operation targets, for logging
    pub fn record_id(&self) -> i64 {
        match self {
            Self::Sale { sale_id } => *sale_id,
            Self::StockUpdate { product_id, .. } => *product_id,
            Self::ProductUpdate(patch) => patch.product_id,
        }
    }
}

/// A queued operation with its retry accounting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineOperation {
    pub id: OperationId,
    pub kind: OfflineOperationKind,
    pub enqueued_at: i64,
    pub retry_count: u32,
    pub max_retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl OfflineOperation {
    pub fn is_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_tagged_by_type() {
        let kind = OfflineOperationKind::StockUpdate {
            product_id: 3,
            new_stock: 9,
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "stock_update");
        assert_eq!(json["new_stock"], 9);

        let patch: OfflineOperationKind = serde_json::from_str(
            r#"{"type":"product_update","product_id":5,"price":3.5}"#,
        )
        .unwrap();
        assert_eq!(patch.type_name(), "product_update");
        assert_eq!(patch.record_id(), 5);
    }
}
