//! Unified error codes for the POS sync workspace
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors (webhook signatures)
//! - 2xxx: Sync errors
//! - 3xxx: Gateway errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility with the UI shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Invalid request
    InvalidRequest = 5,

    // ==================== 1xxx: Auth ====================
    /// Webhook signature header missing
    SignatureMissing = 1002,
    /// Webhook signature does not match the payload
    SignatureInvalid = 1003,

    // ==================== 2xxx: Sync ====================
    /// Sync interval outside 1..=1440 minutes
    InvalidSyncInterval = 2005,

    // ==================== 3xxx: Gateway ====================
    /// Gateway has no credentials
    GatewayUnconfigured = 3001,
    /// DNS failure, refused, timeout or reset
    GatewayTransport = 3002,
    /// Remote answered 429
    GatewayRateLimited = 3003,
    /// Remote answered 5xx
    GatewayServerError = 3004,
    /// Remote answered 4xx other than 429
    GatewayClientError = 3005,
    /// Remote body could not be decoded
    GatewayDecode = 3006,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the default message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::InvalidRequest => "Invalid request",

            // Auth
            ErrorCode::SignatureMissing => "Missing signature",
            ErrorCode::SignatureInvalid => "Invalid signature",

            // Sync
            ErrorCode::InvalidSyncInterval => "Sync interval must be between 1 and 1440 minutes",

            // Gateway
            ErrorCode::GatewayUnconfigured => "Remote gateway is not configured",
            ErrorCode::GatewayTransport => "Remote connection failed",
            ErrorCode::GatewayRateLimited => "Too many requests, please wait",
            ErrorCode::GatewayServerError => "Remote server error",
            ErrorCode::GatewayClientError => "Remote rejected the request",
            ErrorCode::GatewayDecode => "Remote response could not be read",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code as u16
    }
}

/// Error returned when a u16 does not map to a known [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ErrorCode::Success),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            5 => Ok(ErrorCode::InvalidRequest),

            1002 => Ok(ErrorCode::SignatureMissing),
            1003 => Ok(ErrorCode::SignatureInvalid),

            2005 => Ok(ErrorCode::InvalidSyncInterval),

            3001 => Ok(ErrorCode::GatewayUnconfigured),
            3002 => Ok(ErrorCode::GatewayTransport),
            3003 => Ok(ErrorCode::GatewayRateLimited),
            3004 => Ok(ErrorCode::GatewayServerError),
            3005 => Ok(ErrorCode::GatewayClientError),
            3006 => Ok(ErrorCode::GatewayDecode),

            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
