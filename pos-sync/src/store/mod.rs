//! Local storage collaborator
//!
//! The sync core only talks to storage through [`LocalStore`]. The shipped
//! implementation is [`RedbStore`]; tests may substitute their own.

mod redb_store;

pub use redb_store::RedbStore;

use async_trait::async_trait;
use shared::models::{
    Category, Product, ProductFilter, ProductUpsert, Sale, SaleCreate, StoreStats, SyncLogEntry,
    SyncLogStatus, Upserted,
};
use std::sync::Arc;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for shared::error::AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => Self::not_found(what),
            other => Self::database(other.to_string()),
        }
    }
}

/// Shared handle used across the sync core
pub type SharedStore = Arc<dyn LocalStore>;

/// Operations the sync core needs from local storage
#[async_trait]
pub trait LocalStore: Send + Sync {
    // ========== Sales ==========

    /// All sales with `synced == false`, oldest first
    async fn pending_sales(&self) -> StorageResult<Vec<Sale>>;

    /// Sales created strictly after `since`, oldest first
    async fn sales_created_since(&self, since: i64) -> StorageResult<Vec<Sale>>;

    async fn get_sale(&self, id: i64) -> StorageResult<Option<Sale>>;

    async fn save_sale(&self, sale: SaleCreate) -> StorageResult<Sale>;

    async fn mark_sale_synced(&self, id: i64) -> StorageResult<()>;

    // ========== Products ==========

    async fn get_product(&self, id: i64) -> StorageResult<Option<Product>>;

    /// Match on catalog id first, then on SKU (local barcode)
    async fn find_product_by_remote_or_sku(
        &self,
        remote_id: Option<i64>,
        sku: Option<&str>,
    ) -> StorageResult<Option<Product>>;

    async fn list_products(&self, filter: &ProductFilter) -> StorageResult<Vec<Product>>;

    async fn upsert_product(&self, data: ProductUpsert) -> StorageResult<Upserted>;

    /// `from_remote` marks the write as catalog-originated, like [`ProductUpsert::from_remote`]
    async fn update_stock(&self, id: i64, stock: i64, from_remote: bool) -> StorageResult<()>;

    /// Returns `false` when no product carries that catalog id
    async fn deactivate_by_remote_id(&self, remote_id: i64) -> StorageResult<bool>;

    // ========== Categories ==========

    async fn upsert_category(
        &self,
        name: &str,
        description: &str,
        remote_id: Option<i64>,
    ) -> StorageResult<Upserted>;

    async fn list_categories(&self) -> StorageResult<Vec<Category>>;

    // ========== Settings ==========

    async fn get_setting(&self, key: &str) -> StorageResult<Option<String>>;

    async fn set_setting(&self, key: &str, value: &str, encrypted: bool) -> StorageResult<()>;

    async fn delete_setting(&self, key: &str) -> StorageResult<()>;

    // ========== Sync log ==========

    async fn append_sync_log(
        &self,
        operation: &str,
        target_entity: &str,
        record_id: Option<&str>,
        status: SyncLogStatus,
        message: &str,
    ) -> StorageResult<()>;

    /// Newest first
    async fn recent_sync_logs(&self, limit: usize) -> StorageResult<Vec<SyncLogEntry>>;

    // ========== Stats ==========

    async fn stats(&self) -> StorageResult<StoreStats>;
}
