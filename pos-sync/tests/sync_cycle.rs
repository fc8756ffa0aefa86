mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header::CONTENT_TYPE};
use common::{API_KEY, CONSUMER_KEY, CONSUMER_SECRET, FakeRemote, ScriptedProber, product_json, spawn_remote};
use pos_sync::api::{self, webhook::signature::{SIGNATURE_HEADER, sign_payload}};
use pos_sync::store::{LocalStore, RedbStore, SharedStore};
use pos_sync::sync::{CycleOutcome, Disposition};
use pos_sync::{AppContext, Config};
use shared::models::{OfflineOperationKind, ProductUpsert, SaleCreate, SaleItem, SyncLogStatus};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

struct Harness {
    ctx: AppContext,
    remote: Arc<FakeRemote>,
    prober: Arc<ScriptedProber>,
    _dir: tempfile::TempDir,
}

async fn harness(online: bool) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let remote = spawn_remote().await;
    remote.add_product(product_json(7, "Cola", "SKU-COLA", "2.50", 2));
    remote.add_product(product_json(8, "Chips", "SKU-CHIPS", "1.20", 10));

    let store: SharedStore = Arc::new(RedbStore::open_in_memory().unwrap());
    let prober = ScriptedProber::new(online);
    let config = Config::with_overrides(dir.path().to_string_lossy(), 0);
    let ctx = AppContext::new(config, store, prober.clone());
    ctx.initialize().await.unwrap();
    ctx.monitor.set_online(online);

    ctx.orchestrator
        .configure_catalog_gateway(&remote.catalog_url(), CONSUMER_KEY, CONSUMER_SECRET)
        .await
        .unwrap();
    ctx.orchestrator
        .configure_ledger_gateway(&remote.ledger_url(), API_KEY)
        .await
        .unwrap();

    Harness {
        ctx,
        remote,
        prober,
        _dir: dir,
    }
}

async fn linked_cola(store: &SharedStore) -> i64 {
    store
        .upsert_product(ProductUpsert {
            id: None,
            name: "Cola".into(),
            barcode: "SKU-COLA".into(),
            price: 2.5,
            stock: 2,
            category: "Drinks".into(),
            description: String::new(),
            image: None,
            remote_id: Some(7),
            is_active: true,
            remote_updated_at: None,
            from_remote: true,
        })
        .await
        .unwrap()
        .id
}

async fn record_sale(store: &SharedStore, product_id: i64, quantity: i64) -> i64 {
    store
        .save_sale(SaleCreate {
            sale_number: format!("S-{product_id}-{quantity}"),
            subtotal: 2.5 * quantity as f64,
            discount: 0.0,
            total: 2.5 * quantity as f64,
            payment_method: "cash".into(),
            customer_name: None,
            customer_phone: None,
            items: vec![SaleItem {
                product_id,
                product_name: "Cola".into(),
                product_barcode: "SKU-COLA".into(),
                quantity,
                unit_price: 2.5,
                total_price: 2.5 * quantity as f64,
            }],
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_cycle_pushes_sales_then_pulls_and_reports() {
    let h = harness(true).await;
    let store = h.ctx.store.clone();
    let cola = linked_cola(&store).await;
    let sale_id = record_sale(&store, cola, 3).await;

    let outcome = h.ctx.orchestrator.request_manual_sync().await;
    let report = outcome.report().expect("cycle completed").clone();

    // pending sale reached the ledger and the catalog stock was clamped
    assert_eq!(report.pending_sales.succeeded, 1);
    assert_eq!(h.remote.requests_to(Method::POST, "/api/sales").len(), 1);
    assert_eq!(h.remote.product(7).unwrap()["stock_quantity"], 0);
    assert!(store.get_sale(sale_id).await.unwrap().unwrap().synced);

    // catalog pull brought in the other product and the new stock
    assert_eq!(report.catalog_products.total, 2);
    assert!(report.catalog_categories.success);
    let chips = store
        .find_product_by_remote_or_sku(Some(8), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(chips.stock, 10);
    assert_eq!(store.get_product(cola).await.unwrap().unwrap().stock, 0);

    // ledger mirror and heartbeat
    assert_eq!(report.ledger_products.succeeded, 2);
    assert_eq!(report.ledger_sales.succeeded, 1);
    assert_eq!(report.heartbeat.succeeded, 1);
    assert_eq!(h.remote.requests_to(Method::POST, "/api/devices/heartbeat").len(), 1);

    assert!(report.last_sync_time.is_some());
    assert_eq!(h.ctx.orchestrator.last_sync_time(), report.last_sync_time);
    assert!(h.remote.requests().iter().all(|r| r.authorized));

    let logs = store.recent_sync_logs(50).await.unwrap();
    assert!(
        logs.iter()
            .any(|l| l.operation == "sale_sync" && l.status == SyncLogStatus::Success)
    );
}

#[tokio::test]
async fn test_second_cycle_only_sends_changes() {
    let h = harness(true).await;
    let first = h.ctx.orchestrator.request_manual_sync().await;
    let first_sync = first.report().unwrap().last_sync_time;
    assert_eq!(h.remote.requests_to(Method::POST, "/api/products/sync").len(), 2);

    let report = h.ctx.orchestrator.request_manual_sync().await;
    let report = report.report().unwrap();
    assert_eq!(report.pending_sales.total, 0);
    assert_eq!(report.ledger_sales.total, 0);
    assert!(report.last_sync_time >= first_sync);
    assert_eq!(h.remote.requests_to(Method::POST, "/api/sales").len(), 0);
}

#[tokio::test]
async fn test_reconnect_replays_offline_work_first() {
    let h = harness(false).await;
    let store = h.ctx.store.clone();
    let cola = linked_cola(&store).await;

    let disposition = h
        .ctx
        .orchestrator
        .submit_operation(OfflineOperationKind::StockUpdate {
            product_id: cola,
            new_stock: 9,
        })
        .await;
    assert!(matches!(disposition, Disposition::Queued { .. }));
    assert_eq!(h.ctx.queue.len(), 1);
    // nothing reached the catalog while offline
    assert!(h.remote.requests_to(Method::PUT, "/wp-json/wc/v3/products/7").is_empty());

    h.prober.set(true);
    let edge = h.ctx.monitor.set_online(true).expect("edge");
    let outcome = h.ctx.orchestrator.on_connectivity_edge(edge).await.unwrap();
    let report = outcome.report().unwrap();

    let drained = report.offline_queue.as_ref().unwrap();
    assert_eq!(drained.processed, 1);
    assert_eq!(drained.remaining, 0);
    assert!(h.ctx.queue.is_empty());

    let puts = h.remote.requests_to(Method::PUT, "/wp-json/wc/v3/products/7");
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].body.as_ref().unwrap()["stock_quantity"], 9);

    // replay happened before the pull of the same cycle
    let first_put = h.remote.requests().iter().position(|r| r.method == Method::PUT);
    let first_page = h
        .remote
        .requests()
        .iter()
        .position(|r| r.query.contains_key("page"));
    assert!(first_put < first_page);
}

#[tokio::test]
async fn test_catalog_outage_does_not_fail_the_cycle() {
    let h = harness(true).await;
    // one attempt plus three retries
    h.remote.fail_next(&[StatusCode::SERVICE_UNAVAILABLE; 4]);

    let outcome = h.ctx.orchestrator.request_manual_sync().await;
    let report = match outcome {
        CycleOutcome::Completed(report) => report,
        other => panic!("unexpected outcome {other:?}"),
    };
    assert!(!report.catalog_products.success);
    assert!(report.catalog_categories.skipped);
    assert_eq!(report.heartbeat.succeeded, 1);
    assert!(report.last_sync_time.is_some());
}

#[tokio::test]
async fn test_offline_cycle_keeps_sales_pending() {
    let h = harness(false).await;
    let store = h.ctx.store.clone();
    let cola = linked_cola(&store).await;
    let sale_id = record_sale(&store, cola, 1).await;
    let before = h.remote.requests().len();

    let report = h.ctx.orchestrator.request_manual_sync().await;
    let report = report.report().unwrap();
    assert!(report.pending_sales.skipped);
    assert_eq!(report.last_sync_time, None);
    assert_eq!(h.remote.requests().len(), before);
    assert!(!store.get_sale(sale_id).await.unwrap().unwrap().synced);
}

#[tokio::test]
async fn test_stock_webhook_does_not_conflict_with_later_catalog_edit() {
    let h = harness(true).await;
    let store = h.ctx.store.clone();
    h.ctx.orchestrator.request_manual_sync().await.report().unwrap();
    let cola = store
        .find_product_by_remote_or_sku(Some(7), None)
        .await
        .unwrap()
        .unwrap();

    let body = json!({ "product_id": 7, "stock_quantity": 17 }).to_string();
    let signature = sign_payload(&h.ctx.webhook_secret(), body.as_bytes()).unwrap();
    let request = Request::post("/webhook/product/stock")
        .header(CONTENT_TYPE, "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body))
        .unwrap();
    let response = api::router(h.ctx.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let after_webhook = store.get_product(cola.id).await.unwrap().unwrap();
    assert_eq!(after_webhook.stock, 17);
    assert!(!after_webhook.is_locally_modified(h.ctx.orchestrator.last_sync_time()));

    // the catalog moves on after the webhook
    let mut edited = product_json(7, "Cola", "SKU-COLA", "2.50", 20);
    let modified = chrono::Utc::now() + chrono::Duration::minutes(1);
    edited["date_modified_gmt"] = json!(modified.format("%Y-%m-%dT%H:%M:%S").to_string());
    h.remote.add_product(edited);

    let outcome = h.ctx.orchestrator.force_sync().await;
    let report = outcome.report().unwrap();
    assert!(report.catalog_products.success);
    assert_eq!(report.conflicts.total, 0);

    // catalog value wins without a push back of the webhook stock
    assert_eq!(store.get_product(cola.id).await.unwrap().unwrap().stock, 20);
    assert!(h.remote.requests_to(Method::PUT, "/wp-json/wc/v3/products/7").is_empty());
    assert_eq!(h.remote.product(7).unwrap()["stock_quantity"], 20);
}
