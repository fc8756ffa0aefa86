//! Gateway error taxonomy

use reqwest::StatusCode;
use shared::error::{AppError, ErrorCode};
use thiserror::Error;

use super::retry::RetryError;

/// Errors returned by the remote gateways
///
/// `Transport`, `RateLimited` and `ServerError` are retryable; everything else
/// is surfaced to the caller on the first occurrence.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// DNS failure, connection refused, timeout or reset
    #[error("Transport error: {0}")]
    Transport(String),

    /// HTTP 429
    #[error("Rate limited by remote (429)")]
    RateLimited,

    /// HTTP 5xx
    #[error("Remote server error {status}: {body}")]
    ServerError { status: u16, body: String },

    /// HTTP 4xx other than 429
    #[error("Remote rejected request {status}: {body}")]
    ClientError { status: u16, body: String },

    /// Gateway has no complete credentials; callers treat this as a skip
    #[error("{0} gateway is not configured")]
    Unconfigured(&'static str),

    /// Retry budget consumed
    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<GatewayError>,
    },

    /// Response body could not be decoded
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// Local store failed while applying remote data
    #[error("Local storage error: {0}")]
    Storage(String),
}

impl GatewayError {
    /// Retry predicate shared by both gateways
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::RateLimited | Self::ServerError { .. }
        )
    }

    /// Map a non-success status to its error class
    pub fn from_status(status: StatusCode, body: String) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS {
            Self::RateLimited
        } else if status.is_server_error() {
            Self::ServerError {
                status: status.as_u16(),
                body,
            }
        } else {
            Self::ClientError {
                status: status.as_u16(),
                body,
            }
        }
    }

    pub fn is_unconfigured(&self) -> bool {
        matches!(self, Self::Unconfigured(_))
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Transport(_) => ErrorCode::GatewayTransport,
            Self::RateLimited => ErrorCode::GatewayRateLimited,
            Self::ServerError { .. } => ErrorCode::GatewayServerError,
            Self::ClientError { .. } => ErrorCode::GatewayClientError,
            Self::Unconfigured(_) => ErrorCode::GatewayUnconfigured,
            Self::Exhausted { last, .. } => last.error_code(),
            Self::Decode(_) => ErrorCode::GatewayDecode,
            Self::Storage(_) => ErrorCode::DatabaseError,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            Self::from_status(status, e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl From<crate::store::StorageError> for GatewayError {
    fn from(e: crate::store::StorageError) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<RetryError<GatewayError>> for GatewayError {
    fn from(e: RetryError<GatewayError>) -> Self {
        match e {
            RetryError::Permanent(e) => e,
            RetryError::Exhausted { attempts, last } => Self::Exhausted {
                attempts,
                last: Box::new(last),
            },
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        AppError::with_message(e.error_code(), e.to_string())
    }
}
