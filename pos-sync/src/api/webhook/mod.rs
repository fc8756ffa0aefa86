//! Catalog webhook receiver
//!
//! | Path | Method | Auth |
//! |------|--------|------|
//! | /webhook/product/created | POST | signature |
//! | /webhook/product/updated | POST | signature |
//! | /webhook/product/deleted | POST | signature |
//! | /webhook/product/stock | POST | signature |
//! | /webhook/woocommerce | POST | signature (dispatch on topic) |
//! | /webhook/health | GET | none |
//! | /webhook/info | GET | none |

mod handler;
pub mod signature;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::AppContext;

pub use handler::{WebhookAck, WebhookAction};

pub fn router() -> Router<AppContext> {
    Router::new().nest("/webhook", routes())
}

fn routes() -> Router<AppContext> {
    Router::new()
        .route("/product/created", post(handler::product_created))
        .route("/product/updated", post(handler::product_updated))
        .route("/product/deleted", post(handler::product_deleted))
        .route("/product/stock", post(handler::stock_updated))
        .route("/woocommerce", post(handler::generic))
        .route("/health", get(handler::health))
        .route("/info", get(handler::info))
}
