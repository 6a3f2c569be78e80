//! Windows shared memory surface.
//!
//! Mirrors the Unix API so the rest of the crate compiles unchanged.
//! Regions cannot be created or opened yet: `create` and `open` fail with
//! a "not yet implemented" error. Names map to `Local\<name>`.

use crate::{ExchangeError, Result};

/// Longest accepted region name.
pub const MAX_NAME_LENGTH: usize = 255;

/// Platform shared memory handle for Windows.
pub struct PlatformShmem {
    /// Size of the mapped region.
    size: usize,
    /// The name used for the file mapping object.
    name: String,
}

impl PlatformShmem {
    /// Create a region of `size` bytes.
    pub fn create(name: &str, size: usize, mode: u32) -> Result<Self> {
        let name = shmem_name(name)?;
        Err(ExchangeError::Allocation(format!(
            "Windows shared memory not yet implemented (name={name}, size={size}, mode={mode:o})"
        )))
    }

    /// Attach to an existing region.
    pub fn open(name: &str) -> Result<Self> {
        let name = shmem_name(name)?;
        Err(ExchangeError::Open(format!(
            "Windows shared memory not yet implemented (name={name})"
        )))
    }

    /// Remove a region name. Pagefile-backed mappings vanish with their
    /// last handle, so there is nothing to do.
    pub fn unlink(name: &str) -> Result<()> {
        shmem_name(name).map(|_| ())
    }

    /// Get a shared slice of the mapped memory.
    pub fn as_slice(&self) -> &[u8] {
        &[]
    }

    /// Get a mutable slice of the mapped memory.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut []
    }

    /// Get the size of the mapped region.
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Get the shared memory name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Turn a caller-supplied region name into a Windows mapping name.
///
/// Format: `Local\<name>`
pub fn shmem_name(name: &str) -> Result<String> {
    let bare = name.strip_prefix('/').unwrap_or(name);
    if bare.is_empty() || bare.contains('\\') || bare.contains('\0') {
        return Err(ExchangeError::InvalidName(format!("{name:?}")));
    }
    let mapped = format!("Local\\{bare}");
    if mapped.len() > MAX_NAME_LENGTH {
        return Err(ExchangeError::InvalidName(format!(
            "{} bytes exceeds the {MAX_NAME_LENGTH} byte limit",
            mapped.len()
        )));
    }
    Ok(mapped)
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shmem_name() {
        assert_eq!(shmem_name("ocdm-1").expect("name"), "Local\\ocdm-1");
        assert!(shmem_name("").is_err());
        assert!(shmem_name("a\\b").is_err());
    }
}
