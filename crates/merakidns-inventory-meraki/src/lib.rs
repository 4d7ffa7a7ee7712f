// # Meraki Dashboard Inventory Client
//
// This crate provides the Meraki Dashboard API implementation of
// `InventoryClient` for merakidns.
//
// ## Behavior
//
// - One HTTP request per trait call
// - Errors propagate unchanged to the reconciler, which owns backoff
// - HTTP timeout configured (30 seconds)
// - Status codes mapped to `Error::Transport` with the code attached
// - Undecodable bodies mapped to `Error::Schema`
// - No retries, no caching, no background tasks
//
// ## Security Requirements
//
// - API key NEVER appears in logs or `Debug` output
// - Client MUST fail fast if the key is empty
//
// ## API Reference
//
// Every request is `GET {base_url}{path}?perPage={per_page}` with the key in
// the `X-Cisco-Meraki-API-Key` header.
//
// - List Organizations: `organizations`
// - List Networks: `organizations/:organization_id/networks`
// - List Clients: `networks/:network_id/clients`

use async_trait::async_trait;
use merakidns_core::config::{DEFAULT_MERAKI_BASE_URL, InventoryConfig};
use merakidns_core::model::{Client, Network, Organization};
use merakidns_core::traits::{InventoryClient, InventoryClientFactory};
use merakidns_core::{Error, Registry, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Name used for registration and in transport errors
pub const INVENTORY_NAME: &str = "meraki";

/// Header carrying the Dashboard API key
pub const API_KEY_HEADER: &str = "X-Cisco-Meraki-API-Key";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default page size requested from list endpoints
const DEFAULT_PER_PAGE: u32 = 1000;

/// Error payload returned by the Dashboard API on failures
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// Meraki Dashboard API client
///
/// Stateless and single-shot. All coordination (throttling, backoff,
/// scheduling) is owned by the reconciler and controller.
///
/// # Security
///
/// The Debug implementation does NOT expose the API key.
pub struct MerakiClient {
    /// Dashboard API key
    /// ⚠️ NEVER log this value
    api_key: String,

    /// API base URL, ends with `/`
    base_url: String,

    /// Page size sent as `perPage`
    per_page: u32,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for MerakiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MerakiClient")
            .field("api_key", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("per_page", &self.per_page)
            .finish()
    }
}

impl MerakiClient {
    /// Create a client against the public Dashboard API
    ///
    /// # Errors
    ///
    /// - `Error::Config` if the key is empty or the HTTP client cannot be built
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_MERAKI_BASE_URL, DEFAULT_PER_PAGE)
    }

    /// Create a client against a specific base URL
    ///
    /// A missing trailing `/` on `base_url` is added.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        per_page: u32,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::config("Meraki API key cannot be empty"));
        }

        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key,
            base_url,
            per_page,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue one GET and decode the body as a list
    ///
    /// A `null` body is an empty list.
    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .query(&[("perPage", self.per_page)])
            .header(API_KEY_HEADER, &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                Error::transport(INVENTORY_NAME, None, format!("HTTP request failed: {e}"))
            })?;

        let status = response.status();
        tracing::debug!(path, status = status.as_u16(), "meraki request");

        let body = response.bytes().await.map_err(|e| {
            Error::transport(
                INVENTORY_NAME,
                Some(status.as_u16()),
                format!("Failed to read response body: {e}"),
            )
        })?;

        if status != reqwest::StatusCode::OK {
            return Err(status_error(status.as_u16(), path, &body));
        }

        let items: Option<Vec<T>> = serde_json::from_slice(&body).map_err(|e| {
            Error::schema(format!("Unexpected response for {path}: {e}"))
        })?;
        Ok(items.unwrap_or_default())
    }
}

/// Map a non-200 status to a transport error
fn status_error(status: u16, path: &str, body: &[u8]) -> Error {
    let detail = serde_json::from_slice::<ApiErrorBody>(body)
        .ok()
        .filter(|parsed| !parsed.errors.is_empty())
        .map(|parsed| parsed.errors.join("; "))
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());

    let message = match status {
        401 | 403 => format!(
            "Authentication failed for {path}: invalid API key or insufficient permissions ({detail})"
        ),
        404 => format!("Not found: {path} ({detail})"),
        429 => format!("Rate limit exceeded for {path}, retry later ({detail})"),
        500..=599 => format!("Meraki server error (transient) for {path}: {detail}"),
        _ => format!("Unexpected response status for {path}: {detail}"),
    };

    Error::transport(INVENTORY_NAME, Some(status), message)
}

#[async_trait]
impl InventoryClient for MerakiClient {
    async fn organizations(&self) -> Result<Vec<Organization>> {
        self.get_list("organizations").await
    }

    async fn networks(&self, organization_id: &str) -> Result<Vec<Network>> {
        self.get_list(&format!("organizations/{organization_id}/networks"))
            .await
    }

    async fn clients(&self, network_id: &str) -> Result<Vec<Client>> {
        self.get_list(&format!("networks/{network_id}/clients")).await
    }

    fn inventory_name(&self) -> &'static str {
        INVENTORY_NAME
    }
}

/// Factory for creating Meraki clients
pub struct MerakiInventoryFactory;

impl InventoryClientFactory for MerakiInventoryFactory {
    fn create(&self, config: &InventoryConfig) -> Result<Arc<dyn InventoryClient>> {
        match config {
            InventoryConfig::Meraki {
                api_key,
                base_url,
                per_page,
            } => {
                if api_key.is_empty() {
                    return Err(Error::config("Meraki API key is required"));
                }
                Ok(Arc::new(MerakiClient::with_base_url(
                    api_key.clone(),
                    base_url.clone(),
                    *per_page,
                )?))
            }
            _ => Err(Error::config("Invalid config for Meraki inventory")),
        }
    }
}

/// Register the Meraki inventory with a registry
///
/// # Example
///
/// ```rust
/// use merakidns_core::Registry;
///
/// let mut registry = Registry::with_builtin_kinds();
/// merakidns_inventory_meraki::register(&mut registry);
/// assert!(registry.has_inventory("meraki"));
/// ```
pub fn register(registry: &mut Registry) {
    registry.register_inventory(INVENTORY_NAME, Box::new(MerakiInventoryFactory));
}
