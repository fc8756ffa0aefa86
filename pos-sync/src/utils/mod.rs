//! Utilities
//!
//! - [`AppError`] / [`ApiResponse`] (from `shared::error`)
//! - logging setup

pub mod error;
pub mod logger;

pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
