//! In-process fake of the remote catalog and ledger
//!
//! One axum server on an ephemeral port serves both the catalog routes
//! (`/wp-json/wc/v3/...`, OAuth 1.0a verified) and the ledger routes
//! (`/api/...`, bearer verified), and records every request it sees.

#![allow(dead_code)]

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode, Uri, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use parking_lot::Mutex;
use pos_sync::gateway::oauth::OAuthSigner;
use pos_sync::sync::Prober;
use serde_json::{Value, json};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Instant;
use tokio::net::TcpListener;

pub const CONSUMER_KEY: &str = "ck_test";
pub const CONSUMER_SECRET: &str = "cs_test";
pub const API_KEY: &str = "ledger_key";

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub body: Option<Value>,
    /// Signature (catalog) or bearer token (ledger) checked out
    pub authorized: bool,
    pub at: Instant,
}

pub struct FakeRemote {
    pub base_url: String,
    products: Mutex<BTreeMap<i64, Value>>,
    total_pages: AtomicU32,
    scripted_failures: Mutex<VecDeque<StatusCode>>,
    requests: Mutex<Vec<Recorded>>,
}

impl FakeRemote {
    pub fn catalog_url(&self) -> String {
        self.base_url.clone()
    }

    pub fn ledger_url(&self) -> String {
        format!("{}/", self.base_url)
    }

    pub fn add_product(&self, product: Value) {
        let id = product["id"].as_i64().unwrap();
        self.products.lock().insert(id, product);
    }

    pub fn product(&self, id: i64) -> Option<Value> {
        self.products.lock().get(&id).cloned()
    }

    pub fn set_total_pages(&self, pages: u32) {
        self.total_pages.store(pages, Ordering::SeqCst);
    }

    /// Answer the next requests with these statuses before serving normally
    pub fn fail_next(&self, statuses: &[StatusCode]) {
        self.scripted_failures.lock().extend(statuses.iter().copied());
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().clone()
    }

    pub fn requests_to(&self, method: Method, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    /// Catalog list requests that asked for a given page
    pub fn page_requests(&self) -> Vec<Recorded> {
        self.requests_to(Method::GET, "/wp-json/wc/v3/products")
            .into_iter()
            .filter(|r| r.query.contains_key("page"))
            .collect()
    }

    fn record(
        &self,
        method: Method,
        uri: &Uri,
        query: BTreeMap<String, String>,
        body: Option<Value>,
        authorized: bool,
    ) -> Option<StatusCode> {
        self.requests.lock().push(Recorded {
            method,
            path: uri.path().to_string(),
            query,
            body,
            authorized,
            at: Instant::now(),
        });
        self.scripted_failures.lock().pop_front()
    }

    fn oauth_valid(&self, method: &Method, uri: &Uri, query: &BTreeMap<String, String>) -> bool {
        let Some(received) = query.get("oauth_signature") else {
            return false;
        };
        if query.get("oauth_consumer_key").map(String::as_str) != Some(CONSUMER_KEY) {
            return false;
        }
        let signed: BTreeMap<String, String> = query
            .iter()
            .filter(|(k, _)| k.as_str() != "oauth_signature")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let url = format!("{}{}", self.base_url, uri.path());
        let expected =
            OAuthSigner::new(CONSUMER_KEY, CONSUMER_SECRET).signature(method.as_str(), &url, &signed);
        &expected == received
    }
}

pub fn product_json(id: i64, name: &str, sku: &str, price: &str, stock: i64) -> Value {
    json!({
        "id": id,
        "name": name,
        "sku": sku,
        "price": price,
        "stock_quantity": stock,
        "status": "publish",
        "description": format!("{name} description"),
        "short_description": "",
        "categories": [{ "id": 15, "name": "Drinks" }],
        "images": [],
        "date_modified_gmt": "2024-05-01T10:00:00"
    })
}

pub async fn spawn_remote() -> Arc<FakeRemote> {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let remote = Arc::new(FakeRemote {
        base_url,
        products: Mutex::new(BTreeMap::new()),
        total_pages: AtomicU32::new(1),
        scripted_failures: Mutex::new(VecDeque::new()),
        requests: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route("/wp-json/wc/v3/products", get(list_products))
        .route("/wp-json/wc/v3/products/categories", get(list_categories))
        .route("/wp-json/wc/v3/products/{id}", get(get_product).put(put_product))
        .route("/api/health", get(ledger_call))
        .route("/api/sales", post(ledger_call))
        .route("/api/sales/sync", post(ledger_call))
        .route("/api/products/sync", post(ledger_call))
        .route("/api/devices/heartbeat", post(ledger_call))
        .with_state(remote.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    remote
}

type Remote = State<Arc<FakeRemote>>;

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "code": "woocommerce_rest_authentication_error" })))
        .into_response()
}

/// Record a catalog request; `Err` carries the response to short-circuit with
fn catalog_gate(
    remote: &FakeRemote,
    method: Method,
    uri: &Uri,
    query: Vec<(String, String)>,
    body: Option<Value>,
) -> Result<(), Response> {
    let query: BTreeMap<String, String> = query.into_iter().collect();
    let valid = remote.oauth_valid(&method, uri, &query);
    if let Some(status) = remote.record(method, uri, query, body, valid) {
        return Err((status, "scripted failure").into_response());
    }
    if !valid {
        return Err(unauthorized());
    }
    Ok(())
}

async fn list_products(
    State(remote): Remote,
    method: Method,
    uri: Uri,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    let page: usize = query
        .iter()
        .find(|(k, _)| k == "page")
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(1);
    let per_page: usize = query
        .iter()
        .find(|(k, _)| k == "per_page")
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(10);
    if let Err(response) = catalog_gate(&remote, method, &uri, query, None) {
        return response;
    }

    let items: Vec<Value> = remote
        .products
        .lock()
        .values()
        .skip((page.saturating_sub(1)) * per_page)
        .take(per_page)
        .cloned()
        .collect();
    let total_pages = remote.total_pages.load(Ordering::SeqCst).to_string();
    ([("x-wp-totalpages", total_pages)], Json(items)).into_response()
}

async fn list_categories(
    State(remote): Remote,
    method: Method,
    uri: Uri,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    if let Err(response) = catalog_gate(&remote, method, &uri, query, None) {
        return response;
    }
    Json(json!([
        { "id": 15, "name": "Drinks", "description": "Cold and hot" },
        { "id": 16, "name": "Snacks", "description": "" }
    ]))
    .into_response()
}

async fn get_product(
    State(remote): Remote,
    Path(id): Path<i64>,
    method: Method,
    uri: Uri,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    if let Err(response) = catalog_gate(&remote, method, &uri, query, None) {
        return response;
    }
    match remote.product(id) {
        Some(product) => Json(product).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "code": "woocommerce_rest_product_invalid_id" })))
            .into_response(),
    }
}

async fn put_product(
    State(remote): Remote,
    Path(id): Path<i64>,
    method: Method,
    uri: Uri,
    Query(query): Query<Vec<(String, String)>>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(response) = catalog_gate(&remote, method, &uri, query, Some(body.clone())) {
        return response;
    }
    let mut products = remote.products.lock();
    let Some(product) = products.get_mut(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if let (Some(target), Some(fields)) = (product.as_object_mut(), body.as_object()) {
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
    }
    Json(product.clone()).into_response()
}

async fn ledger_call(
    State(remote): Remote,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let expected = format!("Bearer {API_KEY}");
    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);
    if let Some(status) = remote.record(method, &uri, BTreeMap::new(), serde_json::from_slice(&body).ok(), authorized) {
        return (status, "scripted failure").into_response();
    }
    if !authorized {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "invalid api key" }))).into_response();
    }
    Json(json!({ "success": true })).into_response()
}

/// Prober whose answer the test flips
pub struct ScriptedProber {
    online: AtomicBool,
}

impl ScriptedProber {
    pub fn new(online: bool) -> Arc<Self> {
        Arc::new(Self {
            online: AtomicBool::new(online),
        })
    }

    pub fn set(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
