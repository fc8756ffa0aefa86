//! HTTP API
//!
//! - [`health`] - liveness
//! - [`webhook`] - catalog webhook receiver
//! - [`sync`] - sync control for the UI shell

pub mod health;
pub mod sync;
pub mod webhook;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::AppContext;

/// Full application router with state attached
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .merge(health::router())
        .merge(webhook::router())
        .merge(sync::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
