//! Named shared buffer with a reserved administration area.
//!
//! Region layout:
//! - Offset 0x00: magic (u32, `"OCDM"`)
//! - Offset 0x04: buffer format version (u32)
//! - Offset 0x08: payload capacity (u32)
//! - Offset 0x0C: payload bytes in use (u32)
//! - Offset 0x10: administration area (caller-defined size)
//! - After the administration area, aligned to 16 bytes: payload
//!
//! All header fields use native byte order. The header is written once by
//! the creator; openers validate it before touching anything else.

use tracing::{debug, info};

use crate::bounded::{Field, bounded_len};
use crate::{ExchangeError, Result};

use super::PlatformShmem;

/// Magic value at the start of every region ("OCDM").
pub const BUFFER_MAGIC: u32 = 0x4F43_444D;

/// Current buffer format version.
pub const BUFFER_VERSION: u32 = 1;

/// Size of the buffer header in bytes.
pub const BUFFER_HEADER_SIZE: usize = 0x10;

/// Payload alignment in bytes.
pub const PAYLOAD_ALIGNMENT: usize = 16;

const MAGIC_OFFSET: usize = 0x00;
const VERSION_OFFSET: usize = 0x04;
const CAPACITY_OFFSET: usize = 0x08;
const USED_OFFSET: usize = 0x0C;

/// Align a size up to the payload alignment.
///
/// `(size + 0xF) & !0xF`
pub const fn align_size(size: usize) -> usize {
    (size + (PAYLOAD_ALIGNMENT - 1)) & !(PAYLOAD_ALIGNMENT - 1)
}

/// Offset of the payload for a given administration area size.
pub const fn payload_offset(administration_size: usize) -> usize {
    align_size(BUFFER_HEADER_SIZE + administration_size)
}

/// Total region size for a given administration size and payload capacity.
pub const fn region_size(administration_size: usize, capacity: u32) -> usize {
    payload_offset(administration_size) + capacity as usize
}

/// Named shared buffer: header, administration area and payload.
pub struct SharedBuffer {
    shmem: PlatformShmem,
    administration_size: usize,
    capacity: usize,
}

impl SharedBuffer {
    /// Create a new region and initialize its header.
    ///
    /// The administration area is zeroed. Fails with
    /// [`ExchangeError::Allocation`] if the name already exists, so a live
    /// region is never reinitialized under its openers.
    pub fn create(
        name: &str,
        capacity: u32,
        administration_size: usize,
        mode: u32,
    ) -> Result<Self> {
        let size = region_size(administration_size, capacity);
        let shmem = PlatformShmem::create(name, size, mode)?;

        let mut buffer = Self {
            shmem,
            administration_size,
            capacity: capacity as usize,
        };

        let data = buffer.shmem.as_mut_slice();
        write_u32(data, MAGIC_OFFSET, BUFFER_MAGIC);
        write_u32(data, VERSION_OFFSET, BUFFER_VERSION);
        write_u32(data, CAPACITY_OFFSET, capacity);
        write_u32(data, USED_OFFSET, 0);
        buffer.administration_mut().fill(0);

        info!(
            "Created shared buffer {} (capacity {capacity}, region {size} bytes)",
            buffer.name()
        );
        Ok(buffer)
    }

    /// Attach to an existing region.
    ///
    /// Validates magic, version and that the mapping covers the header,
    /// the administration area and the recorded payload capacity.
    pub fn open(name: &str, administration_size: usize) -> Result<Self> {
        let shmem = PlatformShmem::open(name)?;
        let data = shmem.as_slice();

        if data.len() < BUFFER_HEADER_SIZE {
            return Err(ExchangeError::Layout(format!(
                "{}: region of {} bytes is smaller than the header",
                shmem.name(),
                data.len()
            )));
        }

        let magic = read_u32(data, MAGIC_OFFSET);
        if magic != BUFFER_MAGIC {
            return Err(ExchangeError::Layout(format!(
                "{}: bad magic {magic:#010x}",
                shmem.name()
            )));
        }

        let version = read_u32(data, VERSION_OFFSET);
        if version != BUFFER_VERSION {
            return Err(ExchangeError::Layout(format!(
                "{}: unsupported buffer version {version}",
                shmem.name()
            )));
        }

        let capacity = read_u32(data, CAPACITY_OFFSET);
        let required = region_size(administration_size, capacity);
        if data.len() < required {
            return Err(ExchangeError::Layout(format!(
                "{}: region of {} bytes cannot hold {required} bytes",
                shmem.name(),
                data.len()
            )));
        }

        debug!("Opened shared buffer {} (capacity {capacity})", shmem.name());
        Ok(Self {
            shmem,
            administration_size,
            capacity: capacity as usize,
        })
    }

    /// Validate and record the number of payload bytes in use.
    ///
    /// Returns `false` without changing anything if `length` exceeds the
    /// payload capacity.
    pub fn size(&mut self, length: usize) -> bool {
        match bounded_len(Field::Payload, length, self.capacity) {
            Ok(length) => {
                write_u32(self.shmem.as_mut_slice(), USED_OFFSET, length as u32);
                true
            }
            Err(e) => {
                debug!("{}: {e}", self.name());
                false
            }
        }
    }

    /// Payload bytes currently in use, as recorded by the last `size` call.
    pub fn used(&self) -> usize {
        (read_u32(self.shmem.as_slice(), USED_OFFSET) as usize).min(self.capacity)
    }

    /// Payload capacity in bytes.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Region name.
    pub fn name(&self) -> &str {
        self.shmem.name()
    }

    /// Copy `data` into the payload at `offset`.
    ///
    /// Returns `false` and copies nothing if the range leaves the payload.
    pub fn set_buffer(&mut self, offset: usize, data: &[u8]) -> bool {
        let Some(end) = offset.checked_add(data.len()) else {
            return false;
        };
        if end > self.capacity {
            return false;
        }
        self.payload_mut()[offset..end].copy_from_slice(data);
        true
    }

    /// Copy payload bytes starting at `offset` into `out`.
    ///
    /// Copies at most up to the end of the payload and returns the number
    /// of bytes copied.
    pub fn get_buffer(&self, offset: usize, out: &mut [u8]) -> usize {
        let payload = self.payload();
        if offset >= payload.len() {
            return 0;
        }
        let length = out.len().min(payload.len() - offset);
        out[..length].copy_from_slice(&payload[offset..offset + length]);
        length
    }

    /// Reserved administration area.
    pub fn administration(&self) -> &[u8] {
        &self.shmem.as_slice()[BUFFER_HEADER_SIZE..BUFFER_HEADER_SIZE + self.administration_size]
    }

    /// Reserved administration area, writable.
    pub fn administration_mut(&mut self) -> &mut [u8] {
        let end = BUFFER_HEADER_SIZE + self.administration_size;
        &mut self.shmem.as_mut_slice()[BUFFER_HEADER_SIZE..end]
    }

    fn payload(&self) -> &[u8] {
        let start = payload_offset(self.administration_size);
        &self.shmem.as_slice()[start..start + self.capacity]
    }

    fn payload_mut(&mut self) -> &mut [u8] {
        let start = payload_offset(self.administration_size);
        let end = start + self.capacity;
        &mut self.shmem.as_mut_slice()[start..end]
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_ne_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
}

#[cfg(all(test, unix))]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    const ADMIN: usize = 40;

    struct Unlink(String);

    impl Drop for Unlink {
        fn drop(&mut self) {
            let _ = PlatformShmem::unlink(&self.0);
        }
    }

    fn create_or_skip(tag: &str, capacity: u32) -> Option<(Unlink, SharedBuffer)> {
        let name = format!("ocdm-buffer-{tag}-{}", std::process::id());
        match SharedBuffer::create(&name, capacity, ADMIN, 0o666) {
            Ok(buffer) => Some((Unlink(name), buffer)),
            Err(e) => {
                eprintln!("skipping shmem test (not available): {e}");
                None
            }
        }
    }

    #[test]
    fn test_alignment() {
        assert_eq!(align_size(0), 0);
        assert_eq!(align_size(1), 16);
        assert_eq!(align_size(16), 16);
        assert_eq!(payload_offset(ADMIN), 64);
        assert_eq!(region_size(ADMIN, 100), 164);
    }

    #[test]
    fn test_size_accepts_up_to_capacity() {
        let Some((_guard, mut buffer)) = create_or_skip("size", 64) else {
            return;
        };
        assert!(buffer.size(64));
        assert_eq!(buffer.used(), 64);
        assert!(!buffer.size(65));
        assert_eq!(buffer.used(), 64);
        assert!(buffer.size(0));
        assert_eq!(buffer.used(), 0);
    }

    #[test]
    fn test_set_get_buffer_bounds() {
        let Some((_guard, mut buffer)) = create_or_skip("bounds", 8) else {
            return;
        };
        assert!(buffer.set_buffer(0, &[1, 2, 3, 4]));
        assert!(buffer.set_buffer(4, &[5, 6, 7, 8]));
        assert!(!buffer.set_buffer(5, &[0; 4]));
        assert!(!buffer.set_buffer(usize::MAX, &[0]));

        let mut out = [0u8; 12];
        assert_eq!(buffer.get_buffer(0, &mut out), 8);
        assert_eq!(&out[..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(buffer.get_buffer(6, &mut out), 2);
        assert_eq!(buffer.get_buffer(8, &mut out), 0);
    }

    #[test]
    fn test_administration_is_zeroed_and_separate() {
        let Some((_guard, mut buffer)) = create_or_skip("admin", 16) else {
            return;
        };
        assert_eq!(buffer.administration().len(), ADMIN);
        assert!(buffer.administration().iter().all(|&b| b == 0));

        assert!(buffer.set_buffer(0, &[0xFF; 16]));
        assert!(buffer.administration().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_open_validates_magic() {
        let name = format!("ocdm-buffer-foreign-{}", std::process::id());
        let Ok(mut raw) = PlatformShmem::create(&name, 4096, 0o666) else {
            eprintln!("skipping shmem test (not available)");
            return;
        };
        let _guard = Unlink(name.clone());
        raw.as_mut_slice()[..4].copy_from_slice(&0xDEAD_BEEFu32.to_ne_bytes());

        assert!(matches!(
            SharedBuffer::open(&name, ADMIN),
            Err(ExchangeError::Layout(_))
        ));
    }

    #[test]
    fn test_open_sees_creator_header() {
        let Some((guard, mut buffer)) = create_or_skip("reopen", 32) else {
            return;
        };
        assert!(buffer.size(10));
        buffer.administration_mut()[0] = 7;

        let other = SharedBuffer::open(&guard.0, ADMIN).expect("open");
        assert_eq!(other.capacity(), 32);
        assert_eq!(other.used(), 10);
        assert_eq!(other.administration()[0], 7);
    }
}
