//! Remote gateways
//!
//! - [`catalog`]: e-commerce product catalog, OAuth 1.0a signed
//! - [`ledger`]: central ledger service, bearer token
//!
//! Both share the retry helper in [`retry`] and the [`GatewayError`] taxonomy, and
//! both report "not configured" as [`GatewayError::Unconfigured`], which callers
//! treat as a skip.

pub mod catalog;
pub mod endpoint;
pub mod error;
pub mod ledger;
pub mod oauth;
pub mod retry;

pub use catalog::{CatalogClient, CatalogGateway, CatalogPacing};
pub use endpoint::{ConfigurationCheck, Credentials, RemoteEndpointConfig};
pub use error::GatewayError;
pub use ledger::{LedgerClient, LedgerGateway, LedgerPacing};
pub use retry::{Backoff, RetryError, RetryPolicy, retry_with_backoff};

use serde::Serialize;
use std::sync::Arc;

pub type SharedCatalog = Arc<dyn CatalogGateway>;
pub type SharedLedger = Arc<dyn LedgerGateway>;

/// Result of a configuration update
///
/// The settings are stored regardless of the probe, so a flaky network never
/// blocks onboarding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigureOutcome {
    pub configured: bool,
    pub connection_ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_error: Option<String>,
}

impl ConfigureOutcome {
    pub fn connected() -> Self {
        Self {
            configured: true,
            connection_ok: true,
            probe_error: None,
        }
    }

    pub fn probe_failed(error: impl Into<String>) -> Self {
        Self {
            configured: true,
            connection_ok: false,
            probe_error: Some(error.into()),
        }
    }
}
