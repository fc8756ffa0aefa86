//! Sync control API for the UI shell
//!
//! | Path | Method | Description |
//! |------|--------|-------------|
//! | /api/sync/status | GET | current sync status |
//! | /api/sync/now | POST | run a cycle now |
//! | /api/sync/force | POST | run a cycle with a full conflict scan |
//! | /api/sync/settings | PUT | update schedule and conflict strategy |
//! | /api/sync/queue | GET | offline queue contents and stats |
//! | /api/sync/queue | POST | apply a mutation now or queue it |
//! | /api/sync/queue | DELETE | clear the offline queue |
//! | /api/sync/logs | GET | recent sync log entries |
//! | /api/sync/gateways | GET | gateway configuration status |
//! | /api/sync/gateways/catalog | PUT / DELETE | configure or clear the catalog |
//! | /api/sync/gateways/ledger | PUT | configure the ledger |

mod handler;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::core::AppContext;

pub fn router() -> Router<AppContext> {
    Router::new().nest("/api/sync", routes())
}

fn routes() -> Router<AppContext> {
    Router::new()
        .route("/status", get(handler::status))
        .route("/now", post(handler::sync_now))
        .route("/force", post(handler::force_sync))
        .route("/settings", put(handler::update_settings))
        .route(
            "/queue",
            get(handler::queue)
                .post(handler::submit_operation)
                .delete(handler::clear_queue),
        )
        .route("/logs", get(handler::logs))
        .route("/gateways", get(handler::gateways))
        .route(
            "/gateways/catalog",
            put(handler::configure_catalog).delete(handler::clear_catalog),
        )
        .route("/gateways/ledger", put(handler::configure_ledger))
}
