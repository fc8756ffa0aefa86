mod common;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header::CONTENT_TYPE};
use common::{ScriptedProber, product_json};
use pos_sync::api::{self, webhook::signature::sign_payload};
use pos_sync::store::{LocalStore, RedbStore, SharedStore};
use pos_sync::{AppContext, Config};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

async fn context() -> AppContext {
    let store: SharedStore = Arc::new(RedbStore::open_in_memory().unwrap());
    let config = Config::with_overrides("/tmp/pos-sync-http-test", 0);
    let ctx = AppContext::new(config, store, ScriptedProber::new(false));
    ctx.initialize().await.unwrap();
    ctx
}

async fn send(ctx: &AppContext, request: Request<Body>) -> (StatusCode, Value) {
    let response = api::router(ctx.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn webhook(path: &str, body: &Value, signature: Option<String>, topic: Option<&str>) -> Request<Body> {
    let mut builder = Request::post(path).header(CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header("x-wc-webhook-signature", signature);
    }
    if let Some(topic) = topic {
        builder = builder.header("x-wc-webhook-topic", topic);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn signed(ctx: &AppContext, path: &str, body: &Value, topic: Option<&str>) -> (StatusCode, Value) {
    let signature = sign_payload(&ctx.webhook_secret(), body.to_string().as_bytes()).unwrap();
    send(ctx, webhook(path, body, Some(signature), topic)).await
}

#[tokio::test]
async fn test_signed_create_upserts_product() {
    let ctx = context().await;
    let payload = product_json(41, "Lemonade", "SKU-LEM", "3.10", 6);

    let (status, body) = signed(&ctx, "/webhook/product/created", &payload, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["action"], "created");

    let product = ctx
        .store
        .find_product_by_remote_or_sku(Some(41), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.name, "Lemonade");
    assert_eq!(product.stock, 6);
    assert!((product.price - 3.10).abs() < 1e-9);
    assert_eq!(body["product_id"], product.id);

    // same product again is an update of the same row
    let (_, body) = signed(&ctx, "/webhook/product/updated", &payload, None).await;
    assert_eq!(body["action"], "updated");
    assert_eq!(body["product_id"], product.id);
}

#[tokio::test]
async fn test_missing_signature_is_unauthorized() {
    let ctx = context().await;
    let payload = product_json(41, "Lemonade", "SKU-LEM", "3.10", 6);

    let (status, body) = send(&ctx, webhook("/webhook/product/created", &payload, None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 1002);
    assert!(
        ctx.store
            .find_product_by_remote_or_sku(Some(41), None)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_tampered_body_is_unauthorized() {
    let ctx = context().await;
    let payload = product_json(41, "Lemonade", "SKU-LEM", "3.10", 6);
    let signature = sign_payload(&ctx.webhook_secret(), payload.to_string().as_bytes()).unwrap();
    let tampered = product_json(41, "Lemonade", "SKU-LEM", "0.01", 6);

    let (status, body) = send(
        &ctx,
        webhook("/webhook/product/updated", &tampered, Some(signature), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 1003);

    let (status, _) = send(
        &ctx,
        webhook("/webhook/product/updated", &tampered, Some("not base64!".into()), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_delete_deactivates_and_unknown_is_ignored() {
    let ctx = context().await;
    let payload = product_json(41, "Lemonade", "SKU-LEM", "3.10", 6);
    signed(&ctx, "/webhook/product/created", &payload, None).await;

    let (status, body) = signed(&ctx, "/webhook/product/deleted", &json!({ "id": 41 }), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["action"], "deactivated");
    let product = ctx
        .store
        .find_product_by_remote_or_sku(Some(41), None)
        .await
        .unwrap()
        .unwrap();
    assert!(!product.is_active);

    let (status, body) = signed(&ctx, "/webhook/product/deleted", &json!({ "id": 999 }), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["action"], "ignored");
}

#[tokio::test]
async fn test_stock_webhook_sets_absolute_stock() {
    let ctx = context().await;
    let payload = product_json(41, "Lemonade", "SKU-LEM", "3.10", 6);
    signed(&ctx, "/webhook/product/created", &payload, None).await;

    let (_, body) = signed(
        &ctx,
        "/webhook/product/stock",
        &json!({ "product_id": 41, "stock_quantity": "17" }),
        None,
    )
    .await;
    assert_eq!(body["action"], "stock_updated");
    let product = ctx
        .store
        .find_product_by_remote_or_sku(Some(41), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.stock, 17);
    // written on behalf of the catalog, not a local edit
    assert_eq!(product.pulled_at, Some(product.updated_at));
    assert!(!product.is_locally_modified(Some(product.updated_at - 1)));

    let logs = ctx.store.recent_sync_logs(10).await.unwrap();
    assert!(logs.iter().any(|l| l.operation == "webhook_stock_update"));
}

#[tokio::test]
async fn test_generic_endpoint_dispatches_on_topic() {
    let ctx = context().await;
    let payload = product_json(52, "Water", "SKU-H2O", "0.90", 40);

    let (_, body) = signed(&ctx, "/webhook/woocommerce", &payload, Some("product.created")).await;
    assert_eq!(body["action"], "created");

    let (_, body) = signed(&ctx, "/webhook/woocommerce", &payload, Some("product.deleted")).await;
    assert_eq!(body["action"], "deactivated");

    let (status, body) = signed(&ctx, "/webhook/woocommerce", &json!({ "id": 1 }), Some("order.created")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["action"], "ignored");
}

#[tokio::test]
async fn test_unauthenticated_endpoints() {
    let ctx = context().await;

    let (status, body) = send(&ctx, Request::get("/webhook/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (_, body) = send(&ctx, Request::get("/webhook/info").body(Body::empty()).unwrap()).await;
    assert_eq!(body["secret_configured"], true);

    let (_, body) = send(&ctx, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(body["is_online"], false);
    assert_eq!(body["queue_depth"], 0);
}

#[tokio::test]
async fn test_sync_settings_are_validated() {
    let ctx = context().await;
    let put = |body: Value| {
        Request::put("/api/sync/settings")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    };

    let (status, body) = send(&ctx, put(json!({ "sync_interval_minutes": 0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 2005);

    let (status, body) = send(
        &ctx,
        put(json!({ "sync_interval_minutes": 30, "auto_sync_enabled": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sync_interval_minutes"], 30);
    assert_eq!(body["auto_sync_enabled"], false);

    let (_, status) = send(&ctx, Request::get("/api/sync/status").body(Body::empty()).unwrap()).await;
    assert_eq!(status["sync_interval_minutes"], 30);
}

#[tokio::test]
async fn test_offline_submission_is_queued_and_clearable() {
    let ctx = context().await;
    let request = Request::post("/api/sync/queue")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "type": "stock_update", "product_id": 1, "new_stock": 4 }).to_string(),
        ))
        .unwrap();

    let (status, body) = send(&ctx, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["disposition"], "queued");
    assert_eq!(ctx.queue.len(), 1);

    let (_, body) = send(&ctx, Request::delete("/api/sync/queue").body(Body::empty()).unwrap()).await;
    assert_eq!(body["cleared_count"], 1);
    assert!(ctx.queue.is_empty());
}
