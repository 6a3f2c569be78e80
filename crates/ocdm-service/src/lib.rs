//! Content decryption service interface for OCDM exchanges.
//!
//! The control plane around the shared memory channel: a plugin host
//! hands the service its callsign and a JSON configuration line, the
//! service registers the key systems it supports, and media pipelines
//! open sessions against those key systems. Every session owns one
//! [`ocdm_exchange::DataExchange`] region through which the actual
//! decryption requests flow.
//!
//! Enumerations ([`ContentDecryption::systems`],
//! [`ContentDecryption::designators`], [`ContentDecryption::sessions`]) are
//! returned as [`StringIterator`] snapshots taken at call time.

#![warn(missing_docs)]

use thiserror::Error;

// Service configuration
pub mod config;

// Restartable string enumeration
pub mod iterator;

// Key system and session bookkeeping
pub mod registry;

// ContentDecryption trait and the in-memory service
pub mod service;

// Plugin host boundary
pub mod shell;

pub use config::{KeySystemConfig, ServiceConfig};
pub use iterator::StringIterator;
pub use registry::SessionRegistry;
pub use service::{ContentDecryption, DecryptionService};
pub use shell::{ServiceShell, StaticShell};

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors returned by the content decryption service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service has not been initialized.
    #[error("service not initialized")]
    NotInitialized,

    /// The service is already initialized.
    #[error("service already initialized")]
    AlreadyInitialized,

    /// Key system is not registered.
    #[error("unknown key system: {0}")]
    UnknownKeySystem(String),

    /// Session id is not open.
    #[error("unknown session: {0}")]
    UnknownSession(String),

    /// Configuration line could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Exchange region could not be created or opened.
    #[error("exchange error: {0}")]
    Exchange(#[from] ocdm_exchange::ExchangeError),
}

impl From<serde_json::Error> for ServiceError {
    fn from(error: serde_json::Error) -> Self {
        Self::Config(error.to_string())
    }
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
