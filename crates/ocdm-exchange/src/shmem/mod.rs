//! Named shared memory primitive for the exchange channel.
//!
//! The exchange is layered on a generic shared buffer: create-or-open by
//! name, fixed total size, a reserved administration sub-region and
//! byte-range reads and writes of the payload.
//!
//! ## Platform support
//!
//! - Unix: `shm_open` / `mmap`, permissions applied with `fchmod`
//! - Windows: `CreateFileMappingW` / `MapViewOfFile` (not yet implemented)
//!
//! Cross-process synchronization is explicit: [`RegionLock`] provides
//! mutual exclusion through a lock file. Nothing here takes it implicitly.

pub mod buffer;
pub mod lock;
#[cfg(unix)]
pub mod platform_unix;
#[cfg(target_os = "windows")]
pub mod platform_windows;

pub use buffer::SharedBuffer;
pub use lock::{RegionLock, lock_file_path};

// Platform-specific re-exports
#[cfg(unix)]
pub use platform_unix::{PlatformShmem, shmem_name};

#[cfg(target_os = "windows")]
pub use platform_windows::{PlatformShmem, shmem_name};
