//! Unified error handling
//!
//! The application error type lives in `shared::error` so the UI shell decodes the
//! same envelope. Error code ranges:
//!
//! | Range | Category |
//! |-------|----------|
//! | 0xxx | general |
//! | 1xxx | webhook authentication |
//! | 2xxx | sync control |
//! | 3xxx | remote gateways |
//! | 9xxx | system |

pub use shared::error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
