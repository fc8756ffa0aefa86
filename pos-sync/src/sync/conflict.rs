//! Conflict detection and resolution for catalog products
//!
//! # Detection
//!
//! A product is in conflict when, relative to the last completed sync:
//!
//! - it was edited locally (`updated_at > last_sync` and after the last catalog write),
//! - the catalog copy changed too (`date_modified > last_sync` and newer than the
//!   `remote_updated_at` recorded at the last pull),
//! - and the two disagree on name, price or stock.
//!
//! # Resolution
//!
//! | Strategy | Effect |
//! |----------|--------|
//! | `LocalWins` | local name/price/stock written to the catalog |
//! | `RemoteWins` | catalog copy written over the local row |
//! | `Merge` | stock = min of both; name and price from the later edit; written to both sides |
//!
//! After any resolution the local row is marked as catalog-written, so the same
//! conflict is not detected again.

use serde::Serialize;
use shared::models::{
    ConflictStrategy, Product, ProductFilter, ProductUpsert, StepSummary, SyncLogStatus,
};

use crate::gateway::catalog::{DeferredProduct, RemoteProduct, RemoteProductUpdate};
use crate::gateway::{GatewayError, SharedCatalog};
use crate::store::SharedStore;

const PRICE_EPSILON: f64 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictField {
    Name,
    Price,
    Stock,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub local: Product,
    pub remote: RemoteProduct,
    pub fields: Vec<ConflictField>,
}

impl Conflict {
    /// Detect a conflict between a local product and its catalog copy
    pub fn detect(local: &Product, remote: &RemoteProduct, last_sync: Option<i64>) -> Option<Self> {
        let last_sync = last_sync?;
        if !local.is_locally_modified(Some(last_sync)) {
            return None;
        }

        let remote_modified = remote.modified_at()?;
        let remote_changed = remote_modified > last_sync
            && local.remote_updated_at.is_none_or(|seen| remote_modified > seen);
        if !remote_changed {
            return None;
        }

        let mut fields = Vec::new();
        if local.name != remote.name {
            fields.push(ConflictField::Name);
        }
        if (local.price - remote.price()).abs() > PRICE_EPSILON {
            fields.push(ConflictField::Price);
        }
        if local.stock != remote.stock() {
            fields.push(ConflictField::Stock);
        }
        if fields.is_empty() {
            return None;
        }

        Some(Self {
            local: local.clone(),
            remote: remote.clone(),
            fields,
        })
    }

    /// Field-level merge: conservative stock, latest edit for name and price
    pub fn merged(&self) -> MergedValues {
        let local_is_newer = self
            .remote
            .modified_at()
            .is_none_or(|remote| self.local.updated_at >= remote);
        let (name, price) = if local_is_newer {
            (self.local.name.clone(), self.local.price)
        } else {
            (self.remote.name.clone(), self.remote.price())
        };
        MergedValues {
            name,
            price,
            stock: self.local.stock.min(self.remote.stock()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedValues {
    pub name: String,
    pub price: f64,
    pub stock: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    PushedLocal,
    PulledRemote,
    Merged(MergedValues),
}

pub struct ConflictResolver {
    store: SharedStore,
    catalog: SharedCatalog,
}

impl ConflictResolver {
    pub fn new(store: SharedStore, catalog: SharedCatalog) -> Self {
        Self { store, catalog }
    }

    /// Keep only the deferred pull results that are real conflicts
    pub fn find_conflicts(&self, deferred: &[DeferredProduct], last_sync: Option<i64>) -> Vec<Conflict> {
        deferred
            .iter()
            .filter_map(|d| Conflict::detect(&d.local, &d.remote, last_sync))
            .collect()
    }

    /// Fetch the catalog copy of every locally edited, linked product
    pub async fn scan(&self, last_sync: Option<i64>) -> Result<Vec<DeferredProduct>, GatewayError> {
        if last_sync.is_none() {
            return Ok(Vec::new());
        }
        let filter = ProductFilter {
            updated_since: last_sync,
            linked_only: true,
            active_only: false,
        };
        let mut candidates = Vec::new();
        for local in self.store.list_products(&filter).await? {
            if !local.is_locally_modified(last_sync) {
                continue;
            }
            let Some(remote_id) = local.remote_id else {
                continue;
            };
            match self.catalog.fetch_product(remote_id).await {
                Ok(remote) => candidates.push(DeferredProduct { local, remote }),
                Err(e) if e.is_unconfigured() => return Err(e),
                Err(e) => {
                    tracing::warn!(product_id = local.id, remote_id, "Conflict scan fetch failed: {e}")
                }
            }
        }
        Ok(candidates)
    }

    pub async fn resolve(
        &self,
        conflict: &Conflict,
        strategy: ConflictStrategy,
    ) -> Result<Resolution, GatewayError> {
        let local = &conflict.local;
        let remote_id = conflict.remote.id;

        let resolution = match strategy {
            ConflictStrategy::LocalWins => {
                let written = self
                    .catalog
                    .update_remote_product(remote_id, &RemoteProductUpdate::from_product(local))
                    .await?;
                self.mark_settled(local, &written, None).await?;
                Resolution::PushedLocal
            }
            ConflictStrategy::RemoteWins => {
                self.store
                    .upsert_product(conflict.remote.to_upsert(Some(local.id)))
                    .await?;
                Resolution::PulledRemote
            }
            ConflictStrategy::Merge => {
                let merged = conflict.merged();
                let update = RemoteProductUpdate {
                    name: Some(merged.name.clone()),
                    regular_price: Some(format!("{:.2}", merged.price)),
                    stock_quantity: Some(merged.stock),
                };
                let written = self.catalog.update_remote_product(remote_id, &update).await?;
                self.mark_settled(local, &written, Some(&merged)).await?;
                Resolution::Merged(merged)
            }
        };

        tracing::info!(
            product_id = local.id,
            remote_id,
            strategy = strategy.as_str(),
            "Conflict resolved"
        );
        Ok(resolution)
    }

    /// Rewrite the local row as catalog-written, optionally with merged values
    async fn mark_settled(
        &self,
        local: &Product,
        written: &RemoteProduct,
        merged: Option<&MergedValues>,
    ) -> Result<(), GatewayError> {
        let mut upsert = ProductUpsert::from_product(local);
        if let Some(merged) = merged {
            upsert.name = merged.name.clone();
            upsert.price = merged.price;
            upsert.stock = merged.stock;
        }
        upsert.remote_updated_at = written.modified_at().or(local.remote_updated_at);
        upsert.from_remote = true;
        self.store.upsert_product(upsert).await?;
        Ok(())
    }

    /// Resolve every conflict with one strategy, tallying the results
    pub async fn resolve_all(&self, conflicts: &[Conflict], strategy: ConflictStrategy) -> StepSummary {
        let mut summary = StepSummary::started(conflicts.len());
        for conflict in conflicts {
            let record_id = conflict.local.id.to_string();
            match self.resolve(conflict, strategy).await {
                Ok(_) => {
                    summary.record_success();
                    self.log(
                        &record_id,
                        SyncLogStatus::Success,
                        &format!("Resolved with {}", strategy),
                    )
                    .await;
                }
                Err(e) => {
                    tracing::warn!(product_id = conflict.local.id, "Conflict resolution failed: {e}");
                    summary.record_failure(format!("{}: {}", conflict.local.name, e));
                    self.log(&record_id, SyncLogStatus::Error, &e.to_string()).await;
                }
            }
        }
        summary.finish()
    }

    async fn log(&self, record_id: &str, status: SyncLogStatus, message: &str) {
        if let Err(e) = self
            .store
            .append_sync_log("conflict_resolution", "product", Some(record_id), status, message)
            .await
        {
            tracing::warn!("Failed to append sync log: {e}");
        }
    }
}
