//! Validated benchmark parameters.

use crate::cdb::Direction;
use crate::descriptor::DescriptorOptions;
use crate::sys::{DEFAULT_TIMEOUT_MS, MAX_DEVICES, RW10_MAX_BLOCKS, SECTOR_SIZE};
use crate::{Error, Result};

/// Parameters of one benchmark session, shared by every device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchConfig {
    /// Bytes per request.
    pub block_size: u64,
    /// Requests to complete on each device.
    pub count: u64,
    /// Requested per-device outstanding ceiling.
    pub outstanding: u64,
    /// Transfer direction.
    pub direction: Direction,
    /// Per-command timeout in milliseconds.
    pub timeout_ms: u32,
    /// Ask the transport to queue requests at the tail.
    pub at_tail: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            block_size: SECTOR_SIZE,
            count: 1,
            outstanding: 1,
            direction: Direction::Read,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            at_tail: false,
        }
    }
}

impl BenchConfig {
    /// Check the parameters for a session over `devices` devices.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] describing the first rejected value.
    pub fn validate(&self, devices: usize) -> Result<()> {
        if self.block_size == 0 || self.block_size % SECTOR_SIZE != 0 {
            return Err(Error::InvalidConfig(format!(
                "block size {} must be a non-zero multiple of {SECTOR_SIZE}",
                self.block_size
            )));
        }
        if self.block_size / SECTOR_SIZE > RW10_MAX_BLOCKS {
            return Err(Error::InvalidConfig(format!(
                "block size {} exceeds the {} byte limit of a 10-byte command",
                self.block_size,
                RW10_MAX_BLOCKS * SECTOR_SIZE
            )));
        }
        if self.count == 0 {
            return Err(Error::InvalidConfig("request count must not be zero".into()));
        }
        if self.outstanding == 0 {
            return Err(Error::InvalidConfig("outstanding count must not be zero".into()));
        }
        if devices == 0 {
            return Err(Error::InvalidConfig("at least one device is required".into()));
        }
        if devices > MAX_DEVICES {
            return Err(Error::InvalidConfig(format!(
                "{devices} devices given, at most {MAX_DEVICES} are supported"
            )));
        }
        Ok(())
    }

    /// Outstanding ceiling clamped to the request count.
    #[must_use]
    pub fn effective_outstanding(&self) -> u64 {
        self.outstanding.min(self.count)
    }

    /// Descriptor options derived from the timeout and tail flag.
    #[must_use]
    pub fn descriptor_options(&self) -> DescriptorOptions {
        DescriptorOptions::new(self.timeout_ms, self.at_tail)
    }
}
