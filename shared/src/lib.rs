//! Shared types for the POS sync workspace
//!
//! Domain models, the offline operation sum type, error codes and the
//! unified API response envelope used by `pos-sync` and the UI shell.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use axum::{Json, body};
pub use http;
pub use serde::{Deserialize, Serialize};
