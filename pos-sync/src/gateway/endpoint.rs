//! Remote endpoint configuration shared by both gateways

use serde::Serialize;

/// Versioned REST path of the catalog API
pub const CATALOG_API_PATH: &str = "/wp-json/wc/v3";

/// Credential material of a remote endpoint
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Catalog: OAuth 1.0a consumer key + secret
    ConsumerPair {
        consumer_key: String,
        consumer_secret: String,
    },
    /// Ledger: bearer API key
    BearerToken { api_key: String },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConsumerPair { consumer_key, .. } => f
                .debug_struct("ConsumerPair")
                .field("consumer_key", consumer_key)
                .finish_non_exhaustive(),
            Self::BearerToken { .. } => f.debug_struct("BearerToken").finish_non_exhaustive(),
        }
    }
}

/// Base URL plus credentials; `configured` is derived, never stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpointConfig {
    pub base_url: String,
    pub credentials: Credentials,
}

/// Which required fields are present
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfigurationCheck {
    pub has_url: bool,
    pub has_key: bool,
    pub has_secret: bool,
}

impl ConfigurationCheck {
    pub fn is_complete(&self) -> bool {
        self.has_url && self.has_key && self.has_secret
    }
}

fn present(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Strip the trailing slash and append the versioned API path if absent
pub fn normalize_catalog_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() || trimmed.contains(CATALOG_API_PATH) {
        trimmed.to_string()
    } else {
        format!("{}{}", trimmed, CATALOG_API_PATH)
    }
}

impl RemoteEndpointConfig {
    pub fn catalog(
        url: &str,
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: normalize_catalog_url(url),
            credentials: Credentials::ConsumerPair {
                consumer_key: consumer_key.into().trim().to_string(),
                consumer_secret: consumer_secret.into().trim().to_string(),
            },
        }
    }

    pub fn ledger(url: &str, api_key: impl Into<String>) -> Self {
        Self {
            base_url: url.trim().trim_end_matches('/').to_string(),
            credentials: Credentials::BearerToken {
                api_key: api_key.into().trim().to_string(),
            },
        }
    }

    /// Catalog endpoint with no credentials
    pub fn catalog_unconfigured() -> Self {
        Self::catalog("", "", "")
    }

    /// Ledger endpoint with no credentials
    pub fn ledger_unconfigured() -> Self {
        Self::ledger("", "")
    }

    pub fn check(&self) -> ConfigurationCheck {
        match &self.credentials {
            Credentials::ConsumerPair {
                consumer_key,
                consumer_secret,
            } => ConfigurationCheck {
                has_url: present(&self.base_url),
                has_key: present(consumer_key),
                has_secret: present(consumer_secret),
            },
            Credentials::BearerToken { api_key } => ConfigurationCheck {
                has_url: present(&self.base_url),
                has_key: present(api_key),
                has_secret: true,
            },
        }
    }

    pub fn is_configured(&self) -> bool {
        self.check().is_complete()
    }

    /// Join the base URL and an absolute path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
