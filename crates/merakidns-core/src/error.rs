//! Error types for the merakidns system
//!
//! This module defines all error types used throughout the crate.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for merakidns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Which inventory entity a name lookup was resolving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Organization,
    Network,
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupKind::Organization => f.write_str("organization"),
            LookupKind::Network => f.write_str("network"),
        }
    }
}

/// Core error type for the merakidns system
#[derive(Error, Debug)]
pub enum Error {
    /// Resource absent from the store
    #[error("Not found: {0}")]
    NotFound(String),

    /// An organization or network name did not resolve
    #[error("{kind} '{name}' not found. check the name, organization, or API key")]
    Lookup {
        /// What was being resolved
        kind: LookupKind,
        /// The name that failed to match
        name: String,
    },

    /// Inventory collaborator unreachable or answered with a non-success status
    #[error("Transport error ({source_name}): {message}")]
    Transport {
        /// Inventory implementation name
        source_name: String,
        /// HTTP status, when the server answered
        status: Option<u16>,
        /// Error message
        message: String,
    },

    /// Optimistic-concurrency write lost a race
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unexpected payload shape
    #[error("Schema error: {0}")]
    Schema(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Kind or factory missing from the registry
    #[error("Registry error: {0}")]
    Registry(String),

    /// Resource store failures other than conflicts and misses
    #[error("Store error: {0}")]
    Store(String),

    /// A collaborator call exceeded its deadline
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The reconcile was cancelled (shutdown or superseded)
    #[error("Cancelled")]
    Cancelled,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a lookup error
    pub fn lookup(kind: LookupKind, name: impl Into<String>) -> Self {
        Self::Lookup {
            kind,
            name: name.into(),
        }
    }

    /// Create a transport error
    pub fn transport(
        source_name: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::Transport {
            source_name: source_name.into(),
            status,
            message: message.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a schema error
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a registry error
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Whether a later attempt may succeed without any change to the source.
    ///
    /// Lookup and schema failures need a corrected source or API key, the
    /// rest are worth retrying on backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { status, .. } => !matches!(status, Some(401 | 403 | 404)),
            Self::Conflict(_) | Self::Timeout(_) | Self::Io(_) | Self::Store(_) => true,
            _ => false,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
