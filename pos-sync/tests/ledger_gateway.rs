mod common;

use axum::http::{Method, StatusCode};
use common::{API_KEY, spawn_remote};
use pos_sync::gateway::{GatewayError, LedgerClient, LedgerGateway, LedgerPacing};
use pos_sync::store::{LocalStore, RedbStore, SharedStore};
use shared::models::{SaleCreate, SaleItem, setting};
use std::sync::Arc;

fn store() -> SharedStore {
    Arc::new(RedbStore::open_in_memory().unwrap())
}

async fn sample_sale(store: &SharedStore) -> shared::models::Sale {
    store
        .save_sale(SaleCreate {
            sale_number: "S-0001".into(),
            subtotal: 7.5,
            discount: 0.5,
            total: 7.0,
            payment_method: "card".into(),
            customer_name: None,
            customer_phone: None,
            items: vec![SaleItem {
                product_id: 1,
                product_name: "Cola".into(),
                product_barcode: "SKU-COLA".into(),
                quantity: 3,
                unit_price: 2.5,
                total_price: 7.5,
            }],
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_configure_probes_health_with_bearer() {
    let remote = spawn_remote().await;
    let store = store();
    let client = LedgerClient::new(store.clone(), LedgerPacing::unthrottled());

    let outcome = client.configure(&remote.ledger_url(), API_KEY).await.unwrap();
    assert!(outcome.connection_ok);

    let health = remote.requests_to(Method::GET, "/api/health");
    assert_eq!(health.len(), 1);
    assert!(health[0].authorized);

    // trailing slash is trimmed before persisting
    let url = store.get_setting(setting::SUBDOMAIN_DB_URL).await.unwrap().unwrap();
    assert_eq!(url, remote.base_url);
}

#[tokio::test]
async fn test_failing_health_check_still_configures() {
    let remote = spawn_remote().await;
    let store = store();
    let client = LedgerClient::new(store.clone(), LedgerPacing::unthrottled());

    remote.fail_next(&[StatusCode::SERVICE_UNAVAILABLE]);
    let outcome = client.configure(&remote.ledger_url(), API_KEY).await.unwrap();
    assert!(outcome.configured);
    assert!(!outcome.connection_ok);
    assert!(outcome.probe_error.is_some());
    assert!(client.is_configured());

    // health check is not retried
    assert_eq!(remote.requests_to(Method::GET, "/api/health").len(), 1);
    let key = store.get_setting(setting::SUBDOMAIN_API_KEY).await.unwrap();
    assert_eq!(key.as_deref(), Some(API_KEY));

    let sale = sample_sale(&store).await;
    client.push_sale(&sale, "till-1").await.unwrap();
}

#[tokio::test]
async fn test_push_sale_sends_device_and_items() {
    let remote = spawn_remote().await;
    let store = store();
    let client = LedgerClient::new(store.clone(), LedgerPacing::unthrottled());
    client.configure(&remote.ledger_url(), API_KEY).await.unwrap();

    let sale = sample_sale(&store).await;
    client.push_sale(&sale, "till-1").await.unwrap();

    let posts = remote.requests_to(Method::POST, "/api/sales");
    assert_eq!(posts.len(), 1);
    let body = posts[0].body.as_ref().unwrap();
    assert_eq!(body["sale_number"], "S-0001");
    assert_eq!(body["pos_device_id"], "till-1");
    assert_eq!(body["items"][0]["quantity"], 3);
    assert!(body.get("local_id").is_none());

    client.mirror_sale(&sale, "till-1").await.unwrap();
    let mirrored = remote.requests_to(Method::POST, "/api/sales/sync");
    assert_eq!(mirrored[0].body.as_ref().unwrap()["local_id"], sale.id);
}

#[tokio::test]
async fn test_wrong_key_is_not_retried() {
    let remote = spawn_remote().await;
    let store = store();
    let client = LedgerClient::new(store.clone(), LedgerPacing::unthrottled());
    let outcome = client.configure(&remote.ledger_url(), "wrong").await.unwrap();
    assert!(!outcome.connection_ok);

    let sale = sample_sale(&store).await;
    let err = client.push_sale(&sale, "till-1").await.unwrap_err();
    assert!(matches!(err, GatewayError::ClientError { status: 401, .. }), "{err:?}");
    assert_eq!(remote.requests_to(Method::POST, "/api/sales").len(), 1);
}

#[tokio::test]
async fn test_server_errors_are_retried_twice() {
    let remote = spawn_remote().await;
    let store = store();
    let client = LedgerClient::new(store.clone(), LedgerPacing::unthrottled());
    client.configure(&remote.ledger_url(), API_KEY).await.unwrap();
    let sale = sample_sale(&store).await;

    remote.fail_next(&[StatusCode::INTERNAL_SERVER_ERROR, StatusCode::BAD_GATEWAY]);
    client.push_sale(&sale, "till-1").await.unwrap();
    assert_eq!(remote.requests_to(Method::POST, "/api/sales").len(), 3);

    remote.fail_next(&[StatusCode::SERVICE_UNAVAILABLE; 3]);
    let err = client.push_sale(&sale, "till-1").await.unwrap_err();
    assert!(matches!(err, GatewayError::Exhausted { attempts: 3, .. }), "{err:?}");
}

#[tokio::test]
async fn test_heartbeat_reports_stats() {
    let remote = spawn_remote().await;
    let store = store();
    let client = LedgerClient::new(store.clone(), LedgerPacing::unthrottled());
    client.configure(&remote.ledger_url(), API_KEY).await.unwrap();
    sample_sale(&store).await;

    let stats = store.stats().await.unwrap();
    client
        .send_heartbeat("till-1", &stats, Some(1_700_000_000_000))
        .await
        .unwrap();

    let beats = remote.requests_to(Method::POST, "/api/devices/heartbeat");
    assert_eq!(beats.len(), 1);
    let body = beats[0].body.as_ref().unwrap();
    assert_eq!(body["device_id"], "till-1");
    assert_eq!(body["status"], "online");
    assert_eq!(body["last_sync"], 1_700_000_000_000_i64);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_batch_push_collects_failures() {
    let remote = spawn_remote().await;
    let store = store();
    let client = LedgerClient::new(store.clone(), LedgerPacing::unthrottled());
    client.configure(&remote.ledger_url(), API_KEY).await.unwrap();
    let sale = sample_sale(&store).await;

    // first item fails permanently, second goes through
    remote.fail_next(&[StatusCode::UNPROCESSABLE_ENTITY]);
    let summary = client.mirror_sales(&[sale.clone(), sale], "till-1").await;
    assert_eq!(summary.total, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert!(summary.success);
}
