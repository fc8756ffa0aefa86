//! OAuth 1.0a one-legged request signing (HMAC-SHA1)
//!
//! The catalog API authenticates plain-HTTP requests by a signed parameter set
//! appended to the query string:
//!
//! ```text
//! base   = METHOD & enc(url) & enc(sorted "k=v" pairs joined by '&')
//! key    = enc(consumer_secret) & ""
//! oauth_signature = base64(HMAC-SHA1(key, base))
//! ```
//!
//! `url` excludes the query string; query parameters of GET requests take part in
//! the sorted pair list instead.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::Sha1;
use std::collections::BTreeMap;

type HmacSha1 = Hmac<Sha1>;

pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";
pub const OAUTH_VERSION: &str = "1.0";

/// RFC 3986 percent-encoding (unreserved: `A-Z a-z 0-9 - _ . ~`)
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Signs catalog requests with a consumer key/secret pair
#[derive(Clone)]
pub struct OAuthSigner {
    consumer_key: String,
    consumer_secret: String,
}

impl std::fmt::Debug for OAuthSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthSigner")
            .field("consumer_key", &self.consumer_key)
            .finish_non_exhaustive()
    }
}

impl OAuthSigner {
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
        }
    }

    /// Signature over `params`, which must already contain every `oauth_*` field
    pub fn signature(&self, method: &str, url: &str, params: &BTreeMap<String, String>) -> String {
        let param_string = params
            .iter()
            .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let base_string = format!(
            "{}&{}&{}",
            method.to_ascii_uppercase(),
            percent_encode(url),
            percent_encode(&param_string)
        );
        let signing_key = format!("{}&", percent_encode(&self.consumer_secret));

        // HMAC accepts keys of any length
        let mut mac = match HmacSha1::new_from_slice(signing_key.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return String::new(),
        };
        mac.update(base_string.as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }

    /// Full `oauth_*` parameter set (signature included) for fixed timestamp/nonce
    ///
    /// `query` holds the request's own query parameters; they are signed but not
    /// returned.
    pub fn sign_params(
        &self,
        method: &str,
        url: &str,
        query: &[(String, String)],
        timestamp: u64,
        nonce: &str,
    ) -> Vec<(String, String)> {
        let mut oauth = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            (
                "oauth_signature_method".to_string(),
                SIGNATURE_METHOD.to_string(),
            ),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_version".to_string(), OAUTH_VERSION.to_string()),
        ];

        let mut all: BTreeMap<String, String> = oauth.iter().cloned().collect();
        if method.eq_ignore_ascii_case("GET") {
            all.extend(query.iter().cloned());
        }

        let signature = self.signature(method, url, &all);
        oauth.push(("oauth_signature".to_string(), signature));
        oauth
    }

    /// Sign with the current time and a fresh random nonce
    pub fn sign_now(&self, method: &str, url: &str, query: &[(String, String)]) -> Vec<(String, String)> {
        let timestamp = chrono::Utc::now().timestamp().max(0) as u64;
        self.sign_params(method, url, query, timestamp, &generate_nonce())
    }
}

/// 16 random bytes, hex encoded
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
