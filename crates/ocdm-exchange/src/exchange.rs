//! Data exchange channel between a media pipeline and a CDM host.
//!
//! A [`DataExchange`] is a [`SharedBuffer`] whose administration area
//! holds the [`AdministrationRecord`](crate::AdministrationRecord). The
//! creating side sizes the region and zeroes the record once; the other
//! side attaches by name without touching either.
//!
//! The channel has no state machine of its own. Progress lives in the
//! status field, whose values are a convention between producer and
//! consumer (for example "request pending", "result ready", "consumed").

use std::time::Duration;

use tracing::{debug, info};

use crate::admin::{self, ADMINISTRATION_SIZE, AdministrationRecord};
use crate::config::{ExchangeConfig, SubSampleFill};
use crate::shmem::{PlatformShmem, RegionLock, SharedBuffer};
use crate::Result;

/// Shared memory channel carrying one decryption exchange.
pub struct DataExchange {
    buffer: SharedBuffer,
    sub_sample_fill: SubSampleFill,
    lock_timeout: Duration,
}

impl DataExchange {
    /// Attach to an existing region.
    ///
    /// Does not resize or clear it. Fails with
    /// [`ExchangeError::Open`](crate::ExchangeError::Open) if the name does
    /// not exist.
    pub fn open(name: &str) -> Result<Self> {
        Self::open_with_config(name, &ExchangeConfig::default())
    }

    /// Attach to an existing region using the local policies of `config`.
    ///
    /// The payload capacity and permissions of `config` are ignored; they
    /// belong to the creator.
    pub fn open_with_config(name: &str, config: &ExchangeConfig) -> Result<Self> {
        let buffer = SharedBuffer::open(name, ADMINISTRATION_SIZE)?;
        debug!(
            "Attached to exchange {} (payload capacity {})",
            buffer.name(),
            buffer.capacity()
        );
        Ok(Self {
            buffer,
            sub_sample_fill: config.sub_sample_fill,
            lock_timeout: config.lock_timeout(),
        })
    }

    /// Create a region with room for the administration record and
    /// `capacity` payload bytes, readable and writable by everyone.
    pub fn create(name: &str, capacity: u32) -> Result<Self> {
        Self::create_with_config(name, &ExchangeConfig::new(capacity))
    }

    /// Create a region as described by `config`.
    ///
    /// The name must not exist yet; an existing region is left untouched
    /// and [`ExchangeError::Allocation`](crate::ExchangeError::Allocation)
    /// is returned. The administration record is zeroed here and nowhere
    /// else.
    pub fn create_with_config(name: &str, config: &ExchangeConfig) -> Result<Self> {
        let mut buffer = SharedBuffer::create(
            name,
            config.payload_capacity,
            ADMINISTRATION_SIZE,
            config.mode,
        )?;
        admin::zero(buffer.administration_mut());

        info!(
            "Created exchange {} (payload capacity {})",
            buffer.name(),
            config.payload_capacity
        );
        Ok(Self {
            buffer,
            sub_sample_fill: config.sub_sample_fill,
            lock_timeout: config.lock_timeout(),
        })
    }

    /// Remove a region name. Called by the creator when the exchange ends.
    pub fn unlink(name: &str) -> Result<()> {
        PlatformShmem::unlink(name)
    }

    /// Region name.
    pub fn name(&self) -> &str {
        self.buffer.name()
    }

    /// Change how declared-but-unwritten sub-sample ranges are handled.
    pub fn set_sub_sample_fill(&mut self, fill: SubSampleFill) {
        self.sub_sample_fill = fill;
    }

    /// Take the cross-process lock for this region.
    pub fn lock(&self) -> Result<RegionLock> {
        RegionLock::acquire(self.name(), self.lock_timeout)
    }

    /// Current status code.
    pub fn status(&self) -> u32 {
        admin::read_status(self.buffer.administration())
    }

    /// Overwrite the status code.
    pub fn set_status(&mut self, status: u32) {
        admin::write_status(self.buffer.administration_mut(), status);
    }

    /// Whether decryption should seed state from the last 15 bytes of the
    /// previous block.
    pub fn init_with_last_15(&self) -> bool {
        admin::read_init_with_last_15(self.buffer.administration())
    }

    /// Set the init-with-last-15 flag.
    pub fn set_init_with_last_15(&mut self, flag: bool) {
        admin::write_init_with_last_15(self.buffer.administration_mut(), flag);
    }

    /// Store the IV. The unused part of the IV storage is zeroed.
    ///
    /// IVs longer than 24 bytes are a caller bug: fatal in debug and
    /// `hardened` builds, clamped in release. Returns the stored length.
    pub fn set_iv(&mut self, iv: &[u8]) -> Result<usize> {
        admin::write_iv(self.buffer.administration_mut(), iv)
    }

    /// Stored IV bytes.
    pub fn iv(&self) -> &[u8] {
        admin::read_iv(self.buffer.administration())
    }

    /// Stored IV length.
    pub fn iv_length(&self) -> u8 {
        admin::read_iv_length(self.buffer.administration())
    }

    /// Store the key id.
    ///
    /// Key ids longer than 16 bytes are a caller bug: fatal in debug and
    /// `hardened` builds, clamped in release. Returns the stored length.
    pub fn set_key_id(&mut self, key_id: &[u8]) -> Result<usize> {
        admin::write_key_id(self.buffer.administration_mut(), key_id)
    }

    /// Stored key id, or `None` when none is set.
    pub fn key_id(&self) -> Option<&[u8]> {
        admin::read_key_id(self.buffer.administration())
    }

    /// Store or declare the sub-sample map.
    ///
    /// `length` is silently clamped to 2048. Without `data` only the length
    /// is recorded and the declared range follows the sub-sample fill
    /// policy. Returns the stored length.
    pub fn set_sub_sample_data(&mut self, length: usize, data: Option<&[u8]>) -> Result<usize> {
        admin::write_sub_sample_data(
            self.buffer.administration_mut(),
            length,
            data,
            self.sub_sample_fill,
        )
    }

    /// Stored sub-sample map.
    pub fn sub_sample_data(&self) -> &[u8] {
        admin::read_sub_sample_data(self.buffer.administration())
    }

    /// Decoded snapshot of the whole administration record.
    pub fn administration(&self) -> Option<AdministrationRecord> {
        AdministrationRecord::from_mapped(self.buffer.administration())
    }

    /// Copy `data` into the payload.
    ///
    /// The payload size is validated first; if `data` does not fit nothing
    /// is copied and `false` is returned. No partial writes.
    pub fn write(&mut self, data: &[u8]) -> bool {
        if !self.buffer.size(data.len()) {
            debug!(
                "{}: skipped write of {} bytes (capacity {})",
                self.name(),
                data.len(),
                self.buffer.capacity()
            );
            return false;
        }
        self.buffer.set_buffer(0, data)
    }

    /// Copy payload bytes from offset 0 into `out`.
    ///
    /// Never reads past the payload capacity. Returns the number of bytes
    /// copied; the caller decides how many bytes are meaningful.
    pub fn read(&self, out: &mut [u8]) -> usize {
        self.buffer.get_buffer(0, out)
    }

    /// Payload capacity fixed at creation.
    pub const fn payload_capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Payload bytes recorded by the last successful write.
    pub fn payload_len(&self) -> usize {
        self.buffer.used()
    }
}
