//! Shared memory data exchange for OpenCDM decryption requests.
//!
//! A media pipeline process and a content decryption module (CDM) host
//! pass decryption parameters through a named shared memory region
//! instead of serializing every call. The region holds two parts:
//!
//! - **Administration record**: fixed-size header with the status code,
//!   key id, IV, sub-sample map and the init-with-last-15 flag
//! - **Payload**: caller-sized byte area for the encrypted or clear sample
//!
//! The producer writes key id, IV, sub-sample map and the encrypted bytes;
//! the consumer decrypts, then writes a status code and optionally the
//! clear output back through the same region. The meaning of the status
//! code is a convention between the two sides.
//!
//! # Example
//!
//! ```rust,no_run
//! use ocdm_exchange::DataExchange;
//!
//! # fn example() -> ocdm_exchange::Result<()> {
//! // Producer
//! let mut producer = DataExchange::create("ocdm-session-1", 64 * 1024)?;
//! producer.set_key_id(&[0xDE, 0xAD, 0xBE, 0xEF])?;
//! producer.set_iv(&[0u8; 16])?;
//! assert!(producer.write(b"encrypted sample"));
//! producer.set_status(1);
//!
//! // Consumer, usually in another process
//! let mut consumer = DataExchange::open("ocdm-session-1")?;
//! let mut sample = vec![0u8; consumer.payload_len()];
//! consumer.read(&mut sample);
//! consumer.set_status(2);
//! # Ok(())
//! # }
//! ```
//!
//! Synchronization between the two processes is not performed implicitly.
//! Callers agree on field ownership (the producer writes key id, IV and
//! sub-samples, the consumer writes the status) or hold a
//! [`shmem::RegionLock`] around their accesses.

#![warn(missing_docs)]

use thiserror::Error;

// Administration record layout and codec
pub mod admin;

// Bounded writes with per-field overflow policy
pub mod bounded;

// Configuration
pub mod config;

// Data exchange channel
pub mod exchange;

// Named shared buffer primitive
pub mod shmem;

pub use admin::AdministrationRecord;
pub use bounded::{Field, OnOverflow};
pub use config::{ExchangeConfig, SubSampleFill};
pub use exchange::DataExchange;

/// Result type for exchange operations.
pub type Result<T> = std::result::Result<T, ExchangeError>;

/// Errors that can occur while setting up or using an exchange region.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing region could not be created or sized.
    #[error("Allocation failed: {0}")]
    Allocation(String),

    /// The named region does not exist or could not be mapped.
    #[error("Open failed: {0}")]
    Open(String),

    /// The region name cannot be used with the platform primitive.
    #[error("Invalid region name: {0}")]
    InvalidName(String),

    /// The region exists but does not carry the expected layout.
    #[error("Invalid region layout: {0}")]
    Layout(String),

    /// A bounded write was rejected.
    #[error("{field} length {requested} exceeds capacity {capacity}")]
    CapacityExceeded {
        /// Field the write was aimed at
        field: Field,
        /// Requested length in bytes
        requested: usize,
        /// Capacity of the field in bytes
        capacity: usize,
    },

    /// The region lock could not be acquired in time.
    #[error("Lock timeout: {0}")]
    LockTimeout(String),
}

/// Version information for the exchange crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
