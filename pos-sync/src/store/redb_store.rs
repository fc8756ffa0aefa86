//! redb-backed local store
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `products` | `id` | `Product` | Local catalog |
//! | `sales` | `id` | `Sale` | Sales with their items and `synced` flag |
//! | `sync_log` | `id` | `SyncLogEntry` | Append-only audit trail |
//! | `settings` | `key` | `Setting` | Runtime settings and credentials |
//! | `categories` | `id` | `Category` | Category names |
//! | `counters` | `name` | `u64` | ID sequences |
//!
//! # Durability
//!
//! redb commits are durable as soon as `commit()` returns (copy-on-write with an
//! atomic pointer swap), so a power cut never leaves a half-written sale behind.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use shared::models::{
    Category, Product, ProductFilter, ProductUpsert, Sale, SaleCreate, Setting, StoreStats,
    SyncLogEntry, SyncLogStatus, Upserted,
};
use shared::util::now_millis;
use std::path::Path;
use std::sync::Arc;

use super::{LocalStore, StorageError, StorageResult};

const PRODUCTS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("products");
const SALES_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("sales");
const SYNC_LOG_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("sync_log");
const SETTINGS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("settings");
const CATEGORIES_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("categories");
const COUNTERS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("counters");

const PRODUCT_SEQ: &str = "product_id";
const SALE_SEQ: &str = "sale_id";
const SYNC_LOG_SEQ: &str = "sync_log_id";
const CATEGORY_SEQ: &str = "category_id";

/// Local store backed by redb
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            // Create all tables if they don't exist
            let _ = write_txn.open_table(PRODUCTS_TABLE)?;
            let _ = write_txn.open_table(SALES_TABLE)?;
            let _ = write_txn.open_table(SYNC_LOG_TABLE)?;
            let _ = write_txn.open_table(SETTINGS_TABLE)?;
            let _ = write_txn.open_table(CATEGORIES_TABLE)?;
            let _ = write_txn.open_table(COUNTERS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    // ========== Helpers ==========

    fn next_id(txn: &WriteTransaction, sequence: &str) -> StorageResult<i64> {
        let mut table = txn.open_table(COUNTERS_TABLE)?;
        let next = table.get(sequence)?.map(|g| g.value()).unwrap_or(0) + 1;
        table.insert(sequence, next)?;
        Ok(next as i64)
    }

    fn read_all<T: serde::de::DeserializeOwned>(
        &self,
        definition: TableDefinition<i64, &[u8]>,
    ) -> StorageResult<Vec<T>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(definition)?;

        let mut rows = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            rows.push(serde_json::from_slice(value.value())?);
        }
        Ok(rows)
    }

    fn read_one<T: serde::de::DeserializeOwned>(
        &self,
        definition: TableDefinition<i64, &[u8]>,
        id: i64,
    ) -> StorageResult<Option<T>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(definition)?;

        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn write_product(txn: &WriteTransaction, product: &Product) -> StorageResult<()> {
        let mut table = txn.open_table(PRODUCTS_TABLE)?;
        let value = serde_json::to_vec(product)?;
        table.insert(product.id, value.as_slice())?;
        Ok(())
    }

    /// Upsert matching order: id, remote id, barcode
    fn match_product(txn: &WriteTransaction, data: &ProductUpsert) -> StorageResult<Option<Product>> {
        let table = txn.open_table(PRODUCTS_TABLE)?;

        if let Some(id) = data.id {
            return match table.get(id)? {
                Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
                None => Err(StorageError::NotFound(format!("Product {}", id))),
            };
        }

        let mut by_sku = None;
        for result in table.iter()? {
            let (_key, value) = result?;
            let product: Product = serde_json::from_slice(value.value())?;
            if data.remote_id.is_some() && product.remote_id == data.remote_id {
                return Ok(Some(product));
            }
            if by_sku.is_none() && !data.barcode.is_empty() && product.barcode == data.barcode {
                by_sku = Some(product);
            }
        }
        Ok(by_sku)
    }

    fn find_product<F>(&self, mut predicate: F) -> StorageResult<Option<Product>>
    where
        F: FnMut(&Product) -> bool,
    {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PRODUCTS_TABLE)?;

        for result in table.iter()? {
            let (_key, value) = result?;
            let product: Product = serde_json::from_slice(value.value())?;
            if predicate(&product) {
                return Ok(Some(product));
            }
        }
        Ok(None)
    }

    fn read_setting(&self, key: &str) -> StorageResult<Option<Setting>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SETTINGS_TABLE)?;

        match table.get(key)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl LocalStore for RedbStore {
    // ========== Sales ==========

    async fn pending_sales(&self) -> StorageResult<Vec<Sale>> {
        let mut sales: Vec<Sale> = self.read_all(SALES_TABLE)?;
        sales.retain(|s| !s.synced);
        Ok(sales)
    }

    async fn sales_created_since(&self, since: i64) -> StorageResult<Vec<Sale>> {
        let mut sales: Vec<Sale> = self.read_all(SALES_TABLE)?;
        sales.retain(|s| s.created_at > since);
        Ok(sales)
    }

    async fn get_sale(&self, id: i64) -> StorageResult<Option<Sale>> {
        self.read_one(SALES_TABLE, id)
    }

    async fn save_sale(&self, data: SaleCreate) -> StorageResult<Sale> {
        let txn = self.db.begin_write()?;
        let sale = Sale {
            id: Self::next_id(&txn, SALE_SEQ)?,
            sale_number: data.sale_number,
            subtotal: data.subtotal,
            discount: data.discount,
            total: data.total,
            payment_method: data.payment_method,
            customer_name: data.customer_name,
            customer_phone: data.customer_phone,
            items: data.items,
            synced: false,
            created_at: now_millis(),
        };
        {
            let mut table = txn.open_table(SALES_TABLE)?;
            let value = serde_json::to_vec(&sale)?;
            table.insert(sale.id, value.as_slice())?;
        }
        txn.commit()?;
        Ok(sale)
    }

    async fn mark_sale_synced(&self, id: i64) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SALES_TABLE)?;
            let mut sale: Sale = match table.get(id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StorageError::NotFound(format!("Sale {}", id))),
            };
            sale.synced = true;
            let value = serde_json::to_vec(&sale)?;
            table.insert(id, value.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    // ========== Products ==========

    async fn get_product(&self, id: i64) -> StorageResult<Option<Product>> {
        self.read_one(PRODUCTS_TABLE, id)
    }

    async fn find_product_by_remote_or_sku(
        &self,
        remote_id: Option<i64>,
        sku: Option<&str>,
    ) -> StorageResult<Option<Product>> {
        if let Some(remote_id) = remote_id
            && let Some(product) = self.find_product(|p| p.remote_id == Some(remote_id))?
        {
            return Ok(Some(product));
        }
        match sku.filter(|s| !s.is_empty()) {
            Some(sku) => self.find_product(|p| p.barcode == sku),
            None => Ok(None),
        }
    }

    async fn list_products(&self, filter: &ProductFilter) -> StorageResult<Vec<Product>> {
        let mut products: Vec<Product> = self.read_all(PRODUCTS_TABLE)?;
        products.retain(|p| filter.matches(p));
        Ok(products)
    }

    async fn upsert_product(&self, data: ProductUpsert) -> StorageResult<Upserted> {
        let now = now_millis();
        let txn = self.db.begin_write()?;

        let existing = Self::match_product(&txn, &data)?;
        let created = existing.is_none();
        let mut product = match existing {
            Some(mut product) => {
                product.name = data.name;
                product.barcode = data.barcode;
                product.price = data.price;
                product.stock = data.stock;
                product.category = data.category;
                product.description = data.description;
                product.image = data.image;
                product.remote_id = data.remote_id.or(product.remote_id);
                product.is_active = data.is_active;
                product.remote_updated_at = data.remote_updated_at.or(product.remote_updated_at);
                product.updated_at = now;
                product
            }
            None => Product {
                id: Self::next_id(&txn, PRODUCT_SEQ)?,
                name: data.name,
                barcode: data.barcode,
                price: data.price,
                stock: data.stock,
                category: data.category,
                description: data.description,
                image: data.image,
                remote_id: data.remote_id,
                is_active: data.is_active,
                created_at: now,
                updated_at: now,
                remote_updated_at: data.remote_updated_at,
                pulled_at: None,
            },
        };
        if data.from_remote {
            product.pulled_at = Some(now);
        }

        Self::write_product(&txn, &product)?;
        txn.commit()?;

        Ok(Upserted {
            id: product.id,
            created,
        })
    }

    async fn update_stock(&self, id: i64, stock: i64, from_remote: bool) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        let mut product: Product = {
            let table = txn.open_table(PRODUCTS_TABLE)?;
            match table.get(id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StorageError::NotFound(format!("Product {}", id))),
            }
        };
        let now = now_millis();
        product.stock = stock;
        product.updated_at = now;
        if from_remote {
            product.pulled_at = Some(now);
        }
        Self::write_product(&txn, &product)?;
        txn.commit()?;
        Ok(())
    }

    async fn deactivate_by_remote_id(&self, remote_id: i64) -> StorageResult<bool> {
        let Some(mut product) = self.find_product(|p| p.remote_id == Some(remote_id))? else {
            return Ok(false);
        };

        let now = now_millis();
        product.is_active = false;
        product.updated_at = now;
        product.pulled_at = Some(now);

        let txn = self.db.begin_write()?;
        Self::write_product(&txn, &product)?;
        txn.commit()?;
        Ok(true)
    }

    // ========== Categories ==========

    async fn upsert_category(
        &self,
        name: &str,
        description: &str,
        remote_id: Option<i64>,
    ) -> StorageResult<Upserted> {
        let txn = self.db.begin_write()?;

        let existing = {
            let table = txn.open_table(CATEGORIES_TABLE)?;
            let mut found: Option<Category> = None;
            for result in table.iter()? {
                let (_key, value) = result?;
                let category: Category = serde_json::from_slice(value.value())?;
                let same_remote = remote_id.is_some() && category.remote_id == remote_id;
                if same_remote || category.name == name {
                    found = Some(category);
                    break;
                }
            }
            found
        };

        let created = existing.is_none();
        let category = Category {
            id: match &existing {
                Some(c) => c.id,
                None => Self::next_id(&txn, CATEGORY_SEQ)?,
            },
            name: name.to_string(),
            description: description.to_string(),
            remote_id: remote_id.or(existing.and_then(|c| c.remote_id)),
            updated_at: now_millis(),
        };
        {
            let mut table = txn.open_table(CATEGORIES_TABLE)?;
            let value = serde_json::to_vec(&category)?;
            table.insert(category.id, value.as_slice())?;
        }
        txn.commit()?;

        Ok(Upserted {
            id: category.id,
            created,
        })
    }

    async fn list_categories(&self) -> StorageResult<Vec<Category>> {
        self.read_all(CATEGORIES_TABLE)
    }

    // ========== Settings ==========

    async fn get_setting(&self, key: &str) -> StorageResult<Option<String>> {
        let Some(setting) = self.read_setting(key)? else {
            return Ok(None);
        };
        if !setting.encrypted {
            return Ok(Some(setting.value));
        }
        let bytes = BASE64
            .decode(setting.value.as_bytes())
            .map_err(|e| StorageError::Corrupt(format!("setting {}: {}", key, e)))?;
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| StorageError::Corrupt(format!("setting {}: {}", key, e)))
    }

    async fn set_setting(&self, key: &str, value: &str, encrypted: bool) -> StorageResult<()> {
        let setting = Setting {
            key: key.to_string(),
            value: if encrypted {
                BASE64.encode(value.as_bytes())
            } else {
                value.to_string()
            },
            encrypted,
            updated_at: now_millis(),
        };

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS_TABLE)?;
            let value = serde_json::to_vec(&setting)?;
            table.insert(key, value.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    async fn delete_setting(&self, key: &str) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS_TABLE)?;
            table.remove(key)?;
        }
        txn.commit()?;
        Ok(())
    }

    // ========== Sync log ==========

    async fn append_sync_log(
        &self,
        operation: &str,
        target_entity: &str,
        record_id: Option<&str>,
        status: SyncLogStatus,
        message: &str,
    ) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        let entry = SyncLogEntry {
            id: Self::next_id(&txn, SYNC_LOG_SEQ)?,
            operation: operation.to_string(),
            target_entity: target_entity.to_string(),
            record_id: record_id.map(str::to_string),
            status,
            message: message.to_string(),
            timestamp: now_millis(),
        };
        {
            let mut table = txn.open_table(SYNC_LOG_TABLE)?;
            let value = serde_json::to_vec(&entry)?;
            table.insert(entry.id, value.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    async fn recent_sync_logs(&self, limit: usize) -> StorageResult<Vec<SyncLogEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SYNC_LOG_TABLE)?;

        let mut entries = Vec::with_capacity(limit.min(table.len()? as usize));
        for result in table.iter()?.rev().take(limit) {
            let (_key, value) = result?;
            entries.push(serde_json::from_slice(value.value())?);
        }
        Ok(entries)
    }

    // ========== Stats ==========

    async fn stats(&self) -> StorageResult<StoreStats> {
        let products: Vec<Product> = self.read_all(PRODUCTS_TABLE)?;
        let sales: Vec<Sale> = self.read_all(SALES_TABLE)?;

        Ok(StoreStats {
            total_products: products.len() as u64,
            active_products: products.iter().filter(|p| p.is_active).count() as u64,
            total_sales: sales.len() as u64,
            pending_sales: sales.iter().filter(|s| !s.synced).count() as u64,
        })
    }
}
