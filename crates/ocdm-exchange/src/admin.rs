//! Administration record of the exchange region.
//!
//! The record lives in the reserved administration area of the shared
//! region, never in the payload. Both processes interpret it with the
//! layout below, in native byte order:
//!
//! - Offset 0x000: status (u32)
//! - Offset 0x004: key id (17 bytes, byte 0 = length, max 16)
//! - Offset 0x015: IV length (u8, max 24)
//! - Offset 0x016: IV (24 bytes, zero-padded past the length)
//! - Offset 0x02E: sub-sample length (u16, max 2048)
//! - Offset 0x030: sub-sample map (2048 bytes)
//! - Offset 0x830: init-with-last-15 flag (u8, boolean)
//!
//! The record is padded to 0x834 bytes, the size a C compiler gives the
//! same field sequence with a 4-byte aligned status.
//!
//! Two access styles are provided. [`AdministrationRecord`] is an owned
//! snapshot decoded with `from_mapped` and encoded with `to_mapped`. The
//! free functions (`read_*` / `write_*`) touch a single field in place, so
//! a writer never overwrites fields the other process owns.

use std::fmt;

use crate::Result;
use crate::bounded::{Field, bounded_copy, bounded_len};
use crate::config::SubSampleFill;

/// Offset of the status field.
pub const STATUS_OFFSET: usize = 0x000;

/// Offset of the key id field (length prefix byte).
pub const KEY_ID_OFFSET: usize = 0x004;

/// Size of the key id field including its length prefix.
pub const KEY_ID_FIELD_SIZE: usize = 17;

/// Maximum key id length in bytes.
pub const MAX_KEY_ID_LENGTH: usize = 16;

/// Offset of the IV length byte.
pub const IV_LENGTH_OFFSET: usize = 0x015;

/// Offset of the IV storage.
pub const IV_OFFSET: usize = 0x016;

/// Size of the IV storage, and so the maximum IV length.
pub const MAX_IV_LENGTH: usize = 24;

/// Offset of the sub-sample length (u16).
pub const SUB_LENGTH_OFFSET: usize = 0x02E;

/// Offset of the sub-sample map.
pub const SUB_OFFSET: usize = 0x030;

/// Size of the sub-sample map, and so its maximum length.
pub const MAX_SUB_SAMPLE_LENGTH: usize = 2048;

/// Offset of the init-with-last-15 flag.
pub const INIT_WITH_LAST_15_OFFSET: usize = 0x830;

/// Total administration record size including tail padding.
pub const ADMINISTRATION_SIZE: usize = 0x834;

const _: () = {
    assert!(KEY_ID_OFFSET + KEY_ID_FIELD_SIZE == IV_LENGTH_OFFSET);
    assert!(IV_LENGTH_OFFSET + 1 == IV_OFFSET);
    assert!(IV_OFFSET + MAX_IV_LENGTH == SUB_LENGTH_OFFSET);
    assert!(SUB_LENGTH_OFFSET + 2 == SUB_OFFSET);
    assert!(SUB_OFFSET + MAX_SUB_SAMPLE_LENGTH == INIT_WITH_LAST_15_OFFSET);
    assert!(ADMINISTRATION_SIZE > INIT_WITH_LAST_15_OFFSET);
    assert!(ADMINISTRATION_SIZE % 4 == 0);
};

/// Owned snapshot of the administration record.
#[derive(Clone, PartialEq, Eq)]
pub struct AdministrationRecord {
    /// Operation status; meaning agreed between producer and consumer.
    pub status: u32,
    /// Key id storage, byte 0 is the length.
    pub key_id: [u8; KEY_ID_FIELD_SIZE],
    /// Number of meaningful IV bytes.
    pub iv_length: u8,
    /// IV storage.
    pub iv: [u8; MAX_IV_LENGTH],
    /// Number of meaningful sub-sample bytes.
    pub sub_length: u16,
    /// Sub-sample map storage.
    pub sub: [u8; MAX_SUB_SAMPLE_LENGTH],
    /// Seed decryption state from the last 15 bytes of the previous block.
    pub init_with_last_15: bool,
}

impl Default for AdministrationRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl AdministrationRecord {
    /// Create a zeroed record.
    pub const fn new() -> Self {
        Self {
            status: 0,
            key_id: [0; KEY_ID_FIELD_SIZE],
            iv_length: 0,
            iv: [0; MAX_IV_LENGTH],
            sub_length: 0,
            sub: [0; MAX_SUB_SAMPLE_LENGTH],
            init_with_last_15: false,
        }
    }

    /// Read a record from a mapped administration area.
    ///
    /// Returns `None` if `data` is shorter than [`ADMINISTRATION_SIZE`].
    /// Stored lengths above their maximum are clamped, so the views of the
    /// returned record never exceed their storage.
    pub fn from_mapped(data: &[u8]) -> Option<Self> {
        if data.len() < ADMINISTRATION_SIZE {
            return None;
        }

        let mut key_id = [0u8; KEY_ID_FIELD_SIZE];
        key_id.copy_from_slice(&data[KEY_ID_OFFSET..KEY_ID_OFFSET + KEY_ID_FIELD_SIZE]);
        key_id[0] = key_id[0].min(MAX_KEY_ID_LENGTH as u8);

        let mut iv = [0u8; MAX_IV_LENGTH];
        iv.copy_from_slice(&data[IV_OFFSET..IV_OFFSET + MAX_IV_LENGTH]);

        let mut sub = [0u8; MAX_SUB_SAMPLE_LENGTH];
        sub.copy_from_slice(&data[SUB_OFFSET..SUB_OFFSET + MAX_SUB_SAMPLE_LENGTH]);

        Some(Self {
            status: read_u32(data, STATUS_OFFSET),
            key_id,
            iv_length: data[IV_LENGTH_OFFSET].min(MAX_IV_LENGTH as u8),
            iv,
            sub_length: read_u16(data, SUB_LENGTH_OFFSET).min(MAX_SUB_SAMPLE_LENGTH as u16),
            sub,
            init_with_last_15: data[INIT_WITH_LAST_15_OFFSET] != 0,
        })
    }

    /// Write the record to a mapped administration area.
    ///
    /// The caller must ensure `data` holds at least
    /// [`ADMINISTRATION_SIZE`] bytes. Padding bytes are written as zero.
    pub fn to_mapped(&self, data: &mut [u8]) {
        debug_assert!(
            data.len() >= ADMINISTRATION_SIZE,
            "administration area too small: {} < {}",
            data.len(),
            ADMINISTRATION_SIZE
        );

        data[STATUS_OFFSET..STATUS_OFFSET + 4].copy_from_slice(&self.status.to_ne_bytes());
        data[KEY_ID_OFFSET..KEY_ID_OFFSET + KEY_ID_FIELD_SIZE].copy_from_slice(&self.key_id);
        data[IV_LENGTH_OFFSET] = self.iv_length;
        data[IV_OFFSET..IV_OFFSET + MAX_IV_LENGTH].copy_from_slice(&self.iv);
        data[SUB_LENGTH_OFFSET..SUB_LENGTH_OFFSET + 2]
            .copy_from_slice(&self.sub_length.to_ne_bytes());
        data[SUB_OFFSET..SUB_OFFSET + MAX_SUB_SAMPLE_LENGTH].copy_from_slice(&self.sub);
        data[INIT_WITH_LAST_15_OFFSET] = u8::from(self.init_with_last_15);
        data[INIT_WITH_LAST_15_OFFSET + 1..ADMINISTRATION_SIZE].fill(0);
    }

    /// Key id bytes, or `None` when no key id is set.
    pub fn key_id(&self) -> Option<&[u8]> {
        let length = usize::from(self.key_id[0]).min(MAX_KEY_ID_LENGTH);
        (length > 0).then(|| &self.key_id[1..=length])
    }

    /// Meaningful IV bytes.
    pub fn iv(&self) -> &[u8] {
        &self.iv[..usize::from(self.iv_length).min(MAX_IV_LENGTH)]
    }

    /// Meaningful sub-sample bytes.
    pub fn sub_sample_data(&self) -> &[u8] {
        &self.sub[..usize::from(self.sub_length).min(MAX_SUB_SAMPLE_LENGTH)]
    }
}

impl fmt::Debug for AdministrationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdministrationRecord")
            .field("status", &self.status)
            .field("key_id", &self.key_id().map(hex::encode))
            .field("iv", &hex::encode(self.iv()))
            .field("sub_length", &self.sub_length)
            .field("init_with_last_15", &self.init_with_last_15)
            .finish_non_exhaustive()
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

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_ne_bytes([data[offset], data[offset + 1]])
}

/// Clear the whole administration area.
pub fn zero(admin: &mut [u8]) {
    admin[..ADMINISTRATION_SIZE].fill(0);
}

/// Read the status field.
pub fn read_status(admin: &[u8]) -> u32 {
    read_u32(admin, STATUS_OFFSET)
}

/// Overwrite the status field. Any value is accepted.
pub fn write_status(admin: &mut [u8], status: u32) {
    admin[STATUS_OFFSET..STATUS_OFFSET + 4].copy_from_slice(&status.to_ne_bytes());
}

/// Read the init-with-last-15 flag.
pub fn read_init_with_last_15(admin: &[u8]) -> bool {
    admin[INIT_WITH_LAST_15_OFFSET] != 0
}

/// Overwrite the init-with-last-15 flag.
pub fn write_init_with_last_15(admin: &mut [u8], flag: bool) {
    admin[INIT_WITH_LAST_15_OFFSET] = u8::from(flag);
}

/// Read the key id, or `None` when its length is zero.
pub fn read_key_id(admin: &[u8]) -> Option<&[u8]> {
    let length = usize::from(admin[KEY_ID_OFFSET]).min(MAX_KEY_ID_LENGTH);
    (length > 0).then(|| &admin[KEY_ID_OFFSET + 1..=KEY_ID_OFFSET + length])
}

/// Store a key id behind its length prefix.
///
/// Lengths above [`MAX_KEY_ID_LENGTH`] are a caller bug (see
/// [`crate::bounded`]). An empty key id only writes the prefix byte.
/// Returns the stored length.
pub fn write_key_id(admin: &mut [u8], key_id: &[u8]) -> Result<usize> {
    let length = bounded_len(Field::KeyId, key_id.len(), MAX_KEY_ID_LENGTH)?;
    admin[KEY_ID_OFFSET] = length as u8;
    if length != 0 {
        admin[KEY_ID_OFFSET + 1..=KEY_ID_OFFSET + length].copy_from_slice(&key_id[..length]);
    }
    Ok(length)
}

/// Length of the stored IV.
pub fn read_iv_length(admin: &[u8]) -> u8 {
    admin[IV_LENGTH_OFFSET].min(MAX_IV_LENGTH as u8)
}

/// Read the meaningful IV bytes.
pub fn read_iv(admin: &[u8]) -> &[u8] {
    let length = usize::from(read_iv_length(admin));
    &admin[IV_OFFSET..IV_OFFSET + length]
}

/// Store an IV and zero the rest of the IV storage.
///
/// Lengths above [`MAX_IV_LENGTH`] are a caller bug (see
/// [`crate::bounded`]). Returns the stored length.
pub fn write_iv(admin: &mut [u8], iv: &[u8]) -> Result<usize> {
    let storage = &mut admin[IV_OFFSET..IV_OFFSET + MAX_IV_LENGTH];
    let length = bounded_copy(Field::Iv, storage, iv)?;
    storage[length..].fill(0);
    admin[IV_LENGTH_OFFSET] = length as u8;
    Ok(length)
}

/// Length of the stored sub-sample map.
pub fn read_sub_sample_length(admin: &[u8]) -> u16 {
    read_u16(admin, SUB_LENGTH_OFFSET).min(MAX_SUB_SAMPLE_LENGTH as u16)
}

/// Read the meaningful sub-sample bytes.
pub fn read_sub_sample_data(admin: &[u8]) -> &[u8] {
    let length = usize::from(read_sub_sample_length(admin));
    &admin[SUB_OFFSET..SUB_OFFSET + length]
}

/// Store a sub-sample map.
///
/// `length` is clamped to [`MAX_SUB_SAMPLE_LENGTH`] without complaint.
/// With `data`, `min(length, data.len())` bytes are copied and recorded.
/// Without it only the length is recorded and the declared range is
/// handled according to `fill`. Returns the stored length.
pub fn write_sub_sample_data(
    admin: &mut [u8],
    length: usize,
    data: Option<&[u8]>,
    fill: SubSampleFill,
) -> Result<usize> {
    let declared = bounded_len(Field::SubSampleData, length, MAX_SUB_SAMPLE_LENGTH)?;
    let area = &mut admin[SUB_OFFSET..SUB_OFFSET + declared];

    let stored = match data {
        Some(data) => bounded_copy(Field::SubSampleData, area, data)?,
        None => {
            if fill == SubSampleFill::Zero {
                area.fill(0);
            }
            declared
        }
    };

    admin[SUB_LENGTH_OFFSET..SUB_LENGTH_OFFSET + 2]
        .copy_from_slice(&(stored as u16).to_ne_bytes());
    Ok(stored)
}
