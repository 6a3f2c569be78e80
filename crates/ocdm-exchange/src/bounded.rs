//! Bounded writes into fixed-capacity fields.
//!
//! Every write into the exchange region goes through [`bounded_len`],
//! which applies the overflow policy of the target field:
//!
//! | Field | Policy |
//! |-------|--------|
//! | Key id | [`OnOverflow::Fatal`] |
//! | IV | [`OnOverflow::Fatal`] |
//! | Sub-sample map | [`OnOverflow::Clamp`] |
//! | Payload | [`OnOverflow::Reject`] |
//!
//! `Fatal` marks a programmer error. Debug builds and builds with the
//! `hardened` feature panic on it; release builds clamp and log a warning.

use std::fmt;

use tracing::debug;

use crate::{ExchangeError, Result};

/// What to do when a write is longer than its field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnOverflow {
    /// Refuse the write entirely.
    Reject,
    /// Store as much as fits.
    Clamp,
    /// Caller bug: panic in debug or hardened builds, clamp otherwise.
    Fatal,
}

/// Fields of the exchange region that accept bounded writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Key identifier (max 16 bytes).
    KeyId,
    /// Initialization vector (max 24 bytes).
    Iv,
    /// Sub-sample map (max 2048 bytes).
    SubSampleData,
    /// Payload area (capacity fixed at region creation).
    Payload,
}

impl Field {
    /// Overflow policy applied to this field.
    pub const fn policy(self) -> OnOverflow {
        match self {
            Self::KeyId | Self::Iv => OnOverflow::Fatal,
            Self::SubSampleData => OnOverflow::Clamp,
            Self::Payload => OnOverflow::Reject,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::KeyId => "key id",
            Self::Iv => "IV",
            Self::SubSampleData => "sub-sample data",
            Self::Payload => "payload",
        };
        f.write_str(name)
    }
}

/// Resolve the number of bytes a write of `requested` bytes may store in
/// a field of `capacity` bytes, using the field's own policy.
pub fn bounded_len(field: Field, requested: usize, capacity: usize) -> Result<usize> {
    bounded_len_with(field, requested, capacity, field.policy())
}

/// Like [`bounded_len`] but with an explicit policy.
pub fn bounded_len_with(
    field: Field,
    requested: usize,
    capacity: usize,
    policy: OnOverflow,
) -> Result<usize> {
    if requested <= capacity {
        return Ok(requested);
    }

    match policy {
        OnOverflow::Reject => Err(ExchangeError::CapacityExceeded {
            field,
            requested,
            capacity,
        }),
        OnOverflow::Clamp => {
            debug!("{field} length {requested} clamped to {capacity}");
            Ok(capacity)
        }
        OnOverflow::Fatal => fatal(field, requested, capacity),
    }
}

#[cfg(any(feature = "hardened", debug_assertions))]
#[allow(clippy::panic)]
fn fatal(field: Field, requested: usize, capacity: usize) -> Result<usize> {
    panic!("invariant violation: {field} length {requested} exceeds maximum {capacity}");
}

#[cfg(not(any(feature = "hardened", debug_assertions)))]
fn fatal(field: Field, requested: usize, capacity: usize) -> Result<usize> {
    tracing::warn!("{field} length {requested} exceeds maximum {capacity}, clamping");
    Ok(capacity)
}

/// Copy `src` into the front of `dst` under the field's policy.
///
/// Returns the number of bytes copied. Bytes of `dst` past that count are
/// left untouched.
pub fn bounded_copy(field: Field, dst: &mut [u8], src: &[u8]) -> Result<usize> {
    let length = bounded_len(field, src.len(), dst.len())?;
    dst[..length].copy_from_slice(&src[..length]);
    Ok(length)
}
