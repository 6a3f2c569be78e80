//! Cross-process lock for an exchange region.
//!
//! The channel performs no locking of its own. Processes that need mutual
//! exclusion around a sequence of accesses hold a [`RegionLock`], a lock
//! file created with `create_new` next to the other lock files of the
//! host. Dropping the guard removes the file.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::{ExchangeError, Result};

/// Lock file suffix.
pub const LOCK_FILE_SUFFIX: &str = ".ocdm.lock";

/// Lock file retry interval in milliseconds.
const LOCK_RETRY_MS: u64 = 50;

/// Held lock on a named region.
pub struct RegionLock {
    /// The lock file handle (kept open while the lock is held).
    _file: File,
    /// Path to the lock file.
    path: PathBuf,
}

impl RegionLock {
    /// Acquire the lock for `name` in the system temporary directory.
    pub fn acquire(name: &str, timeout: Duration) -> Result<Self> {
        Self::acquire_in(&std::env::temp_dir(), name, timeout)
    }

    /// Acquire the lock for `name` in `dir`.
    ///
    /// Retries every 50ms until `timeout` expires, then fails with
    /// [`ExchangeError::LockTimeout`].
    pub fn acquire_in(dir: &Path, name: &str, timeout: Duration) -> Result<Self> {
        let path = lock_file_path(dir, name);
        let retry_interval = Duration::from_millis(LOCK_RETRY_MS);
        let start = Instant::now();

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    debug!("acquired region lock {}", path.display());
                    return Ok(Self { _file: file, path });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if start.elapsed() >= timeout {
                        return Err(ExchangeError::LockTimeout(format!(
                            "{} after {}ms",
                            path.display(),
                            timeout.as_millis()
                        )));
                    }
                    std::thread::sleep(retry_interval);
                }
                Err(e) => return Err(ExchangeError::Io(e)),
            }
        }
    }

    /// Get the lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RegionLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Derive the lock file path for a region name.
pub fn lock_file_path(dir: &Path, name: &str) -> PathBuf {
    let bare = name.trim_start_matches('/').replace(['/', '\\'], "_");
    dir.join(format!("{bare}{LOCK_FILE_SUFFIX}"))
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_file_path() {
        let path = lock_file_path(Path::new("/tmp"), "/ocdm-1");
        assert_eq!(path, Path::new("/tmp/ocdm-1.ocdm.lock"));

        let path = lock_file_path(Path::new("/tmp"), "a/b");
        assert_eq!(path, Path::new("/tmp/a_b.ocdm.lock"));
    }

    #[test]
    fn test_acquire_release() {
        let dir = tempfile::tempdir().expect("tempdir");

        let lock = RegionLock::acquire_in(dir.path(), "region", Duration::from_secs(1))
            .expect("lock");
        assert!(lock.path().exists());

        let lock_path = lock.path().to_path_buf();
        drop(lock);
        assert!(!lock_path.exists());
    }

    #[test]
    fn test_contended_lock_times_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let _held = RegionLock::acquire_in(dir.path(), "region", Duration::from_secs(1))
            .expect("lock");

        let result = RegionLock::acquire_in(dir.path(), "region", Duration::from_millis(120));
        assert!(matches!(result, Err(ExchangeError::LockTimeout(_))));
    }

    #[test]
    fn test_lock_released_to_waiter() {
        let dir = tempfile::tempdir().expect("tempdir");
        let held = RegionLock::acquire_in(dir.path(), "region", Duration::from_secs(1))
            .expect("lock");

        let path = dir.path().to_path_buf();
        let waiter = std::thread::spawn(move || {
            RegionLock::acquire_in(&path, "region", Duration::from_secs(5)).is_ok()
        });

        std::thread::sleep(Duration::from_millis(100));
        drop(held);
        assert!(waiter.join().expect("join"));
    }
}
