//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,

            Self::NotFound => StatusCode::NOT_FOUND,

            Self::SignatureMissing | Self::SignatureInvalid => StatusCode::UNAUTHORIZED,

            Self::ValidationFailed | Self::InvalidRequest | Self::InvalidSyncInterval => {
                StatusCode::BAD_REQUEST
            }

            Self::GatewayUnconfigured => StatusCode::PRECONDITION_FAILED,
            Self::GatewayRateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::GatewayTransport
            | Self::GatewayServerError
            | Self::GatewayClientError
            | Self::GatewayDecode => StatusCode::BAD_GATEWAY,

            Self::InternalError | Self::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
