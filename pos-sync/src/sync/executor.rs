//! Replay of queued operations and the per-sale push shared with the cycle

use async_trait::async_trait;
use shared::models::{
    OfflineOperation, OfflineOperationKind, ProductPatch, ProductUpsert, Sale, StepSummary,
};

use super::queue::{ExecuteError, OperationExecutor};
use crate::gateway::catalog::RemoteProductUpdate;
use crate::gateway::{GatewayError, SharedCatalog, SharedLedger};
use crate::store::SharedStore;

/// Result of pushing one pending sale
#[derive(Debug, Clone)]
pub struct SalePush {
    /// `false` when the ledger is not configured
    pub sent_to_ledger: bool,
    /// Best-effort catalog stock write-back
    pub stock: StepSummary,
}

/// Push one sale and flip its `synced` flag
///
/// The ledger push is required: on failure the sale stays pending and its stock is
/// left untouched. The flag is persisted before the catalog stock push, so a sale
/// whose flag could not be written is replayed without having decremented the
/// catalog. The stock push itself is best-effort and never unflips the sale.
pub async fn push_sale(
    store: &SharedStore,
    catalog: &SharedCatalog,
    ledger: &SharedLedger,
    sale: &Sale,
    device_id: &str,
) -> Result<SalePush, GatewayError> {
    let sent_to_ledger = match ledger.push_sale(sale, device_id).await {
        Ok(()) => true,
        Err(e) if e.is_unconfigured() => false,
        Err(e) => return Err(e),
    };

    if let Err(e) = store.mark_sale_synced(sale.id).await {
        tracing::error!(
            sale_id = sale.id,
            sent_to_ledger,
            "Sale accepted remotely but not marked synced, catalog stock untouched: {e}"
        );
        return Err(e.into());
    }

    let stock = catalog.push_stock_decrement(&sale.items).await.summary;
    if stock.failed > 0 {
        tracing::warn!(
            sale_id = sale.id,
            failed = stock.failed,
            "Catalog stock push incomplete for sale"
        );
    }

    Ok(SalePush {
        sent_to_ledger,
        stock,
    })
}

/// Executes queued operations against the store and the gateways
pub struct GatewayExecutor {
    store: SharedStore,
    catalog: SharedCatalog,
    ledger: SharedLedger,
    device_id: String,
}

impl GatewayExecutor {
    pub fn new(
        store: SharedStore,
        catalog: SharedCatalog,
        ledger: SharedLedger,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            catalog,
            ledger,
            device_id: device_id.into(),
        }
    }

    async fn replay_sale(&self, sale_id: i64) -> Result<(), ExecuteError> {
        let sale = self
            .store
            .get_sale(sale_id)
            .await?
            .ok_or_else(|| ExecuteError::Rejected(format!("Sale {sale_id} not found")))?;
        if sale.synced {
            return Ok(());
        }
        push_sale(&self.store, &self.catalog, &self.ledger, &sale, &self.device_id).await?;
        Ok(())
    }

    async fn replay_stock(&self, product_id: i64, new_stock: i64) -> Result<(), ExecuteError> {
        self.store.update_stock(product_id, new_stock, false).await?;
        self.push_to_catalog(product_id, RemoteProductUpdate::stock_only(new_stock))
            .await
    }

    async fn replay_patch(&self, patch: &ProductPatch) -> Result<(), ExecuteError> {
        let mut product = self
            .store
            .get_product(patch.product_id)
            .await?
            .ok_or_else(|| {
                ExecuteError::Rejected(format!("Product {} not found", patch.product_id))
            })?;
        if patch.apply_to(&mut product) {
            self.store
                .upsert_product(ProductUpsert::from_product(&product))
                .await?;
        }
        self.push_to_catalog(product.id, RemoteProductUpdate::from_product(&product))
            .await
    }

    /// Write to the catalog when it is configured and the product is linked
    async fn push_to_catalog(
        &self,
        product_id: i64,
        update: RemoteProductUpdate,
    ) -> Result<(), ExecuteError> {
        if !self.catalog.is_configured() {
            return Ok(());
        }
        let Some(remote_id) = self
            .store
            .get_product(product_id)
            .await?
            .and_then(|p| p.remote_id)
        else {
            return Ok(());
        };
        self.catalog.update_remote_product(remote_id, &update).await?;
        Ok(())
    }
}

#[async_trait]
impl OperationExecutor for GatewayExecutor {
    async fn execute(&self, operation: &OfflineOperation) -> Result<(), ExecuteError> {
        match &operation.kind {
            OfflineOperationKind::Sale { sale_id } => self.replay_sale(*sale_id).await,
            OfflineOperationKind::StockUpdate {
                product_id,
                new_stock,
            } => self.replay_stock(*product_id, *new_stock).await,
            OfflineOperationKind::ProductUpdate(patch) => self.replay_patch(patch).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::catalog::{
        CatalogPullReport, CatalogStatus, PageReport, RemoteProduct, StockPushReport,
    };
    use crate::gateway::{
        CatalogGateway, ConfigurationCheck, ConfigureOutcome, LedgerClient, LedgerPacing,
    };
    use crate::store::RedbStore;
    use parking_lot::Mutex;
    use shared::models::{SaleCreate, SaleItem};
    use std::sync::Arc;

    /// Catalog that records whether the sale was already flagged when stock was pushed
    struct ObservingCatalog {
        store: SharedStore,
        flagged_before_push: Mutex<Option<bool>>,
    }

    impl ObservingCatalog {
        fn refuse<T>(&self) -> Result<T, GatewayError> {
            Err(GatewayError::Unconfigured("Catalog"))
        }
    }

    #[async_trait]
    impl CatalogGateway for ObservingCatalog {
        fn is_configured(&self) -> bool {
            true
        }
        async fn configure(&self, _: &str, _: &str, _: &str) -> Result<ConfigureOutcome, GatewayError> {
            self.refuse()
        }
        async fn reload(&self) -> Result<(), GatewayError> {
            Ok(())
        }
        async fn clear_configuration(&self) -> Result<(), GatewayError> {
            Ok(())
        }
        fn check_configuration(&self) -> ConfigurationCheck {
            ConfigurationCheck::default()
        }
        fn status(&self) -> CatalogStatus {
            CatalogStatus {
                configured: true,
                base_url: "http://catalog.test".into(),
                has_credentials: true,
                last_call: None,
            }
        }
        async fn test_connection(&self) -> Result<(), GatewayError> {
            Ok(())
        }
        async fn push_stock_decrement(&self, items: &[SaleItem]) -> StockPushReport {
            let pending = self.store.pending_sales().await.unwrap();
            *self.flagged_before_push.lock() = Some(pending.is_empty());
            let mut summary = StepSummary::started(items.len());
            items.iter().for_each(|_| summary.record_success());
            StockPushReport {
                summary: summary.finish(),
                items: Vec::new(),
            }
        }
        async fn pull_catalog_page(&self, _: u32, _: u32, _: Option<i64>) -> Result<PageReport, GatewayError> {
            self.refuse()
        }
        async fn pull_all(&self, _: Option<i64>) -> Result<CatalogPullReport, GatewayError> {
            self.refuse()
        }
        async fn pull_categories(&self) -> Result<StepSummary, GatewayError> {
            self.refuse()
        }
        async fn fetch_product(&self, _: i64) -> Result<RemoteProduct, GatewayError> {
            self.refuse()
        }
        async fn update_remote_product(&self, _: i64, _: &RemoteProductUpdate) -> Result<RemoteProduct, GatewayError> {
            self.refuse()
        }
    }

    #[tokio::test]
    async fn test_sale_is_flagged_before_catalog_stock_push() {
        let store: SharedStore = Arc::new(RedbStore::open_in_memory().unwrap());
        let observing = Arc::new(ObservingCatalog {
            store: store.clone(),
            flagged_before_push: Mutex::new(None),
        });
        let catalog: SharedCatalog = observing.clone();
        // unconfigured ledger: the sale is accepted locally only
        let ledger: SharedLedger = Arc::new(LedgerClient::new(store.clone(), LedgerPacing::unthrottled()));

        let sale = store
            .save_sale(SaleCreate {
                sale_number: "S-1".into(),
                subtotal: 5.0,
                discount: 0.0,
                total: 5.0,
                payment_method: "cash".into(),
                customer_name: None,
                customer_phone: None,
                items: vec![SaleItem {
                    product_id: 1,
                    product_name: "Cola".into(),
                    product_barcode: "SKU-COLA".into(),
                    quantity: 2,
                    unit_price: 2.5,
                    total_price: 5.0,
                }],
            })
            .await
            .unwrap();

        let pushed = push_sale(&store, &catalog, &ledger, &sale, "till-1").await.unwrap();
        assert!(!pushed.sent_to_ledger);
        assert_eq!(pushed.stock.succeeded, 1);
        assert_eq!(*observing.flagged_before_push.lock(), Some(true));
        assert!(store.get_sale(sale.id).await.unwrap().unwrap().synced);
    }
}
