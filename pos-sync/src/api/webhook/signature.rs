//! Webhook body authentication
//!
//! `X-WC-Webhook-Signature` carries base64(HMAC-SHA256(secret, raw body)).

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::core::AppContext;
use crate::utils::AppError;

pub const SIGNATURE_HEADER: &str = "x-wc-webhook-signature";
pub const TOPIC_HEADER: &str = "x-wc-webhook-topic";

type HmacSha256 = Hmac<Sha256>;

/// Signature the catalog would send for `body`
pub fn sign_payload(secret: &str, body: &[u8]) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::internal(format!("Invalid webhook secret: {e}")))?;
    mac.update(body);
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a received signature
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> Result<(), AppError> {
    let expected = BASE64
        .decode(signature.trim())
        .map_err(|_| AppError::signature_invalid())?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::internal(format!("Invalid webhook secret: {e}")))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| AppError::signature_invalid())
}

/// Raw webhook body whose signature has been verified
#[derive(Debug)]
pub struct SignedPayload {
    pub body: Bytes,
    pub topic: Option<String>,
}

impl FromRequest<AppContext> for SignedPayload {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppContext) -> Result<Self, Self::Rejection> {
        let (signature, topic) = {
            let headers = req.headers();
            let header = |name: &str| {
                headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned)
            };
            (header(SIGNATURE_HEADER), header(TOPIC_HEADER))
        };

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::invalid_request(format!("Unreadable body: {e}")))?;

        let Some(signature) = signature else {
            tracing::warn!("Webhook rejected: missing signature");
            return Err(AppError::signature_missing());
        };
        if let Err(e) = verify_signature(&state.webhook_secret(), &body, &signature) {
            tracing::warn!(topic = ?topic, "Webhook rejected: invalid signature");
            return Err(e);
        }

        Ok(Self { body, topic })
    }
}
