//! POSIX shared memory regions for the exchange channel.
//!
//! Regions are POSIX shared memory objects mapped with `MAP_SHARED`.
//! Permissions are applied with `fchmod` after creation so the process
//! umask cannot narrow them; both cooperating processes may run under
//! different accounts.

use std::ffi::CString;
use std::os::unix::io::RawFd;
use std::{io, ptr, slice};

use libc::{MAP_SHARED, O_CREAT, O_EXCL, O_RDWR, PROT_READ, PROT_WRITE};
use libc::{c_uint, c_void, mode_t, off_t, size_t};
use libc::{close, fchmod, fstat, ftruncate, mmap, munmap, shm_open, shm_unlink};
use tracing::debug;

use crate::{ExchangeError, Result};

/// Longest accepted region name including the leading `/`.
pub const MAX_NAME_LENGTH: usize = 255;

/// Mapped POSIX shared memory object.
///
/// Dropping the handle unmaps the region and closes the descriptor. The
/// shared memory object itself persists until [`PlatformShmem::unlink`].
#[allow(unsafe_code)]
pub struct PlatformShmem {
    /// Descriptor returned by `shm_open`.
    fd: RawFd,
    /// Start of the `MAP_SHARED` mapping.
    ptr: *mut c_void,
    /// Mapping length in bytes.
    size: usize,
    /// POSIX shared memory name (e.g., `/ocdm-session-1`).
    name: String,
}

impl PlatformShmem {
    /// Create a new region of `size` bytes.
    ///
    /// Uses `shm_open` with `O_CREAT | O_EXCL | O_RDWR`, then
    /// `fchmod(mode)`, `ftruncate(size)` and `mmap`. A name that already
    /// exists is never resized or reused. Any failure, including an
    /// existing name, is an [`ExchangeError::Allocation`]; a partially
    /// set up object is unlinked again.
    #[allow(unsafe_code)]
    pub fn create(name: &str, size: usize, mode: u32) -> Result<Self> {
        let shm_name = shmem_name(name)?;
        let c_name = c_name(&shm_name)?;

        let fd = unsafe {
            shm_open(
                c_name.as_ptr(),
                O_CREAT | O_EXCL | O_RDWR,
                mode as mode_t as c_uint,
            )
        };
        if fd == -1 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::AlreadyExists {
                return Err(ExchangeError::Allocation(format!(
                    "{shm_name} already exists"
                )));
            }
            return Err(ExchangeError::Allocation(format!(
                "shm_open failed for {shm_name}: {err}"
            )));
        }

        let abandon = |what: String| {
            unsafe {
                close(fd);
                shm_unlink(c_name.as_ptr());
            }
            ExchangeError::Allocation(format!("{what} for {shm_name}"))
        };

        if unsafe { fchmod(fd, mode as mode_t) } == -1 {
            let err = io::Error::last_os_error();
            return Err(abandon(format!("fchmod failed ({err})")));
        }

        let Ok(size_off_t) = off_t::try_from(size) else {
            return Err(abandon(format!("region size {size} is too large")));
        };
        if unsafe { ftruncate(fd, size_off_t) } == -1 {
            let err = io::Error::last_os_error();
            return Err(abandon(format!("ftruncate failed ({err})")));
        }

        let ptr = map(fd, size).map_err(|err| abandon(format!("mmap failed ({err})")))?;

        debug!("created shared memory {shm_name} ({size} bytes, mode {mode:o})");
        Ok(Self {
            fd,
            ptr,
            size,
            name: shm_name,
        })
    }

    /// Attach to an existing region.
    ///
    /// The mapping covers the whole object as reported by `fstat`. Missing
    /// or empty regions are an [`ExchangeError::Open`].
    #[allow(unsafe_code)]
    pub fn open(name: &str) -> Result<Self> {
        let shm_name = shmem_name(name)?;
        let c_name = c_name(&shm_name)?;

        let fd = unsafe { shm_open(c_name.as_ptr(), O_RDWR, 0) };
        if fd == -1 {
            return Err(ExchangeError::Open(format!(
                "shm_open failed for {shm_name}: {}",
                io::Error::last_os_error()
            )));
        }

        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        if unsafe { fstat(fd, &raw mut stat) } == -1 {
            let err = io::Error::last_os_error();
            unsafe { close(fd) };
            return Err(ExchangeError::Open(format!(
                "fstat failed for {shm_name}: {err}"
            )));
        }

        let size = usize::try_from(stat.st_size).unwrap_or(0);
        if size == 0 {
            unsafe { close(fd) };
            return Err(ExchangeError::Open(format!("{shm_name} is empty")));
        }

        let ptr = map(fd, size).map_err(|err| {
            unsafe { close(fd) };
            ExchangeError::Open(format!("mmap failed for {shm_name}: {err}"))
        })?;

        debug!("opened shared memory {shm_name} ({size} bytes)");
        Ok(Self {
            fd,
            ptr,
            size,
            name: shm_name,
        })
    }

    /// Remove a region name. Existing mappings stay valid until dropped.
    #[allow(unsafe_code)]
    pub fn unlink(name: &str) -> Result<()> {
        let shm_name = shmem_name(name)?;
        let c_name = c_name(&shm_name)?;

        if unsafe { shm_unlink(c_name.as_ptr()) } == -1 {
            return Err(ExchangeError::Open(format!(
                "shm_unlink failed for {shm_name}: {}",
                io::Error::last_os_error()
            )));
        }

        debug!("unlinked shared memory {shm_name}");
        Ok(())
    }

    /// Whole mapping as bytes.
    ///
    /// # Concurrency
    ///
    /// Another process may write these bytes at any time. Readers that need
    /// a consistent view hold a region lock.
    #[allow(unsafe_code)]
    pub fn as_slice(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr.cast::<u8>(), self.size) }
    }

    /// Whole mapping as writable bytes.
    ///
    /// # Concurrency
    ///
    /// The caller must ensure exclusive write access to the bytes it
    /// modifies (field ownership or a region lock).
    #[allow(unsafe_code)]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.ptr.cast::<u8>(), self.size) }
    }

    /// Mapping length in bytes.
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Normalized name, with the leading `/`.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for PlatformShmem {
    #[allow(unsafe_code)]
    fn drop(&mut self) {
        unsafe {
            if !self.ptr.is_null() {
                munmap(self.ptr, self.size as size_t);
            }
            if self.fd != -1 {
                close(self.fd);
            }
        }
    }
}

// SAFETY: the handle owns a descriptor and a mapping of kernel-managed
// pages; neither is tied to the creating thread.
#[allow(unsafe_code)]
unsafe impl Send for PlatformShmem {}

// SAFETY: shared references only hand out `&[u8]`; writers need `&mut`.
// Cross-process writers are coordinated by field ownership or RegionLock.
#[allow(unsafe_code)]
unsafe impl Sync for PlatformShmem {}

#[allow(unsafe_code)]
fn map(fd: RawFd, size: usize) -> io::Result<*mut c_void> {
    let ptr = unsafe {
        mmap(
            ptr::null_mut(),
            size as size_t,
            PROT_READ | PROT_WRITE,
            MAP_SHARED,
            fd,
            0,
        )
    };

    if ptr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    Ok(ptr)
}

fn c_name(shm_name: &str) -> Result<CString> {
    CString::new(shm_name)
        .map_err(|e| ExchangeError::InvalidName(format!("{shm_name}: {e}")))
}

/// Turn a caller-supplied region name into a POSIX shared memory name.
///
/// Two processes rendezvous by passing the identical name. A leading `/`
/// is added when missing; empty names, names with an interior `/` or NUL,
/// and names longer than [`MAX_NAME_LENGTH`] are rejected.
pub fn shmem_name(name: &str) -> Result<String> {
    let bare = name.strip_prefix('/').unwrap_or(name);

    if bare.is_empty() {
        return Err(ExchangeError::InvalidName("empty region name".to_string()));
    }
    if bare.contains('/') || bare.contains('\0') {
        return Err(ExchangeError::InvalidName(format!(
            "{name:?} contains '/' or NUL"
        )));
    }

    let shm_name = format!("/{bare}");
    if shm_name.len() > MAX_NAME_LENGTH {
        return Err(ExchangeError::InvalidName(format!(
            "{} bytes exceeds the {MAX_NAME_LENGTH} byte limit",
            shm_name.len()
        )));
    }
    Ok(shm_name)
}
