//! Configuration types for the merakidns system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Main merakidns configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MerakiDnsConfig {
    /// Inventory collaborator configuration
    pub inventory: InventoryConfig,

    /// Resource store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Optional reconciler settings
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

impl MerakiDnsConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.inventory.validate()?;
        self.store.validate()?;
        self.reconciler.validate()?;
        Ok(())
    }
}

/// Default Meraki Dashboard API base URL
pub const DEFAULT_MERAKI_BASE_URL: &str = "https://api.meraki.com/api/v0/";

/// Inventory collaborator configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InventoryConfig {
    /// Meraki Dashboard API
    Meraki {
        /// Dashboard API key
        api_key: String,
        /// API base URL (must end with `/`)
        #[serde(default = "default_meraki_base_url")]
        base_url: String,
        /// Page size requested from list endpoints
        #[serde(default = "default_per_page")]
        per_page: u32,
    },

    /// Custom inventory client
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

// Custom Debug implementation that hides the API key
impl fmt::Debug for InventoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InventoryConfig::Meraki {
                base_url, per_page, ..
            } => f
                .debug_struct("Meraki")
                .field("api_key", &"<REDACTED>")
                .field("base_url", base_url)
                .field("per_page", per_page)
                .finish(),
            InventoryConfig::Custom { factory, config } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .field("config", config)
                .finish(),
        }
    }
}

impl InventoryConfig {
    /// Meraki configuration with default base URL and page size
    pub fn meraki(api_key: impl Into<String>) -> Self {
        InventoryConfig::Meraki {
            api_key: api_key.into(),
            base_url: default_meraki_base_url(),
            per_page: default_per_page(),
        }
    }

    /// Validate the inventory configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            InventoryConfig::Meraki {
                api_key,
                base_url,
                per_page,
            } => {
                if api_key.is_empty() {
                    return Err(crate::Error::config("A Meraki API key is required"));
                }
                if !base_url.starts_with("https://") && !base_url.starts_with("http://") {
                    return Err(crate::Error::config(format!(
                        "Meraki base URL must use HTTP or HTTPS scheme. Got: {base_url}"
                    )));
                }
                if !base_url.ends_with('/') {
                    return Err(crate::Error::config(format!(
                        "Meraki base URL must end with '/'. Got: {base_url}"
                    )));
                }
                if *per_page == 0 || *per_page > 1000 {
                    return Err(crate::Error::config(format!(
                        "Meraki page size must be between 1 and 1000. Got: {per_page}"
                    )));
                }
                Ok(())
            }
            InventoryConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom inventory factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom inventory config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the inventory type name, as registered in the registry
    pub fn type_name(&self) -> &str {
        match self {
            InventoryConfig::Meraki { .. } => "meraki",
            InventoryConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        InventoryConfig::meraki(String::new())
    }
}

fn default_meraki_base_url() -> String {
    DEFAULT_MERAKI_BASE_URL.to_string()
}

fn default_per_page() -> u32 {
    1000
}

/// Resource store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// File-backed JSON store
    File {
        /// Path to the store file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("File store path cannot be empty"))
            }
            StoreConfig::Custom { factory, .. } if factory.is_empty() => {
                Err(crate::Error::config("Custom store factory cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the store type name, as registered in the registry
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Reconciler and scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Minimum time between inventory queries for one source (in seconds)
    ///
    /// Reconciles inside this window reuse the existing record set.
    #[serde(default = "default_throttle_interval_secs")]
    pub throttle_interval_secs: u64,

    /// Delay before a source is reconciled again with no new events (in seconds)
    #[serde(default = "default_requeue_interval_secs")]
    pub requeue_interval_secs: u64,

    /// Deadline for each inventory or store call (in seconds)
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Maximum number of sources reconciled concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// First retry delay after a failed reconcile (in seconds)
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,

    /// Upper bound for the retry delay (in seconds)
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,
}

/// Upper bound for every reconciler interval (one week)
pub const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

impl ReconcilerConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.requeue_interval_secs == 0 {
            return Err(crate::Error::config("Requeue interval must be > 0"));
        }
        for (name, secs) in [
            ("Throttle interval", self.throttle_interval_secs),
            ("Requeue interval", self.requeue_interval_secs),
            ("Call timeout", self.call_timeout_secs),
            ("Backoff max", self.backoff_max_secs),
        ] {
            if secs > MAX_INTERVAL_SECS {
                return Err(crate::Error::config(format!(
                    "{name} must be at most {MAX_INTERVAL_SECS}s. Got: {secs}s"
                )));
            }
        }
        if self.call_timeout_secs == 0 {
            return Err(crate::Error::config("Call timeout must be > 0"));
        }
        if self.workers == 0 {
            return Err(crate::Error::config("Worker count must be > 0"));
        }
        if self.backoff_base_secs == 0 || self.backoff_base_secs > self.backoff_max_secs {
            return Err(crate::Error::config(format!(
                "Backoff base ({}s) must be > 0 and <= backoff max ({}s)",
                self.backoff_base_secs, self.backoff_max_secs
            )));
        }
        Ok(())
    }

    pub fn throttle_interval(&self) -> Duration {
        Duration::from_secs(self.throttle_interval_secs)
    }

    pub fn requeue_interval(&self) -> Duration {
        Duration::from_secs(self.requeue_interval_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs(self.backoff_base_secs)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            throttle_interval_secs: default_throttle_interval_secs(),
            requeue_interval_secs: default_requeue_interval_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            workers: default_workers(),
            backoff_base_secs: default_backoff_base_secs(),
            backoff_max_secs: default_backoff_max_secs(),
        }
    }
}

fn default_throttle_interval_secs() -> u64 {
    60
}

fn default_requeue_interval_secs() -> u64 {
    300
}

fn default_call_timeout_secs() -> u64 {
    30
}

fn default_workers() -> usize {
    4
}

fn default_backoff_base_secs() -> u64 {
    5
}

fn default_backoff_max_secs() -> u64 {
    300
}
