//! Data models
//!
//! Shared between pos-sync and the UI shell (via API).
//! All local IDs are `i64`; timestamps are Unix millis.

pub mod operation;
pub mod product;
pub mod sale;
pub mod setting;
pub mod sync;
pub mod sync_log;

// Re-exports
pub use operation::*;
pub use product::*;
pub use sale::*;
pub use setting::Setting;
pub use sync::*;
pub use sync_log::*;
