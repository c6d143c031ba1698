//! Transport descriptor construction.
//!
//! A descriptor only records buffer addresses. The caller owns the command
//! block, sense buffer and data buffer, and must keep all three alive and
//! unmoved until the driver has returned the completed descriptor.

use crate::cdb::{self, Direction};
use crate::sys::{
    SgIoV4, BSG_PROTOCOL_SCSI, BSG_SUB_PROTOCOL_SCSI_CMD, DEFAULT_TIMEOUT_MS, RW10_CDB_LEN,
    SG_IO_V4_GUARD,
};
use crate::Result;

/// Data phase of a request. At most one direction is populated.
#[derive(Debug)]
pub enum DataBuffer<'a> {
    /// No data phase.
    None,
    /// Device-to-host transfer into this buffer.
    In(&'a mut [u8]),
    /// Host-to-device transfer from this buffer.
    Out(&'a [u8]),
}

impl DataBuffer<'_> {
    /// Number of bytes the data phase transfers.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            DataBuffer::None => 0,
            DataBuffer::In(buf) => buf.len(),
            DataBuffer::Out(buf) => buf.len(),
        }
    }

    /// Check if there is no data phase.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Options shared by every descriptor in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorOptions {
    /// Command timeout in milliseconds.
    pub timeout_ms: u32,
    /// Transport flag bits (for example [`crate::sys::BSG_FLAG_Q_AT_TAIL`]).
    pub flags: u32,
}

impl DescriptorOptions {
    /// Options for a command timeout and an optional tail-queue request.
    #[must_use]
    pub fn new(timeout_ms: u32, at_tail: bool) -> Self {
        let flags = if at_tail { crate::sys::BSG_FLAG_Q_AT_TAIL } else { 0 };
        Self { timeout_ms, flags }
    }
}

impl Default for DescriptorOptions {
    fn default() -> Self {
        Self { timeout_ms: DEFAULT_TIMEOUT_MS, flags: 0 }
    }
}

/// Build a descriptor for one SCSI command.
///
/// `tag` is stored in `usr_ptr` and comes back unchanged with the completion.
#[must_use]
pub fn build(
    cdb: &[u8],
    sense: &mut [u8],
    data: DataBuffer<'_>,
    options: DescriptorOptions,
    tag: u64,
) -> SgIoV4 {
    let mut hdr = SgIoV4 {
        guard: SG_IO_V4_GUARD,
        protocol: BSG_PROTOCOL_SCSI,
        subprotocol: BSG_SUB_PROTOCOL_SCSI_CMD,
        request_len: cdb.len() as u32,
        request: cdb.as_ptr() as u64,
        max_response_len: sense.len() as u32,
        response: sense.as_mut_ptr() as u64,
        timeout: options.timeout_ms,
        flags: options.flags,
        usr_ptr: tag,
        ..SgIoV4::default()
    };

    match data {
        DataBuffer::None => {}
        DataBuffer::In(buf) => {
            hdr.din_xfer_len = buf.len() as u32;
            hdr.din_xferp = buf.as_mut_ptr() as u64;
        }
        DataBuffer::Out(buf) => {
            hdr.dout_xfer_len = buf.len() as u32;
            hdr.dout_xferp = buf.as_ptr() as u64;
        }
    }

    hdr
}

/// Command block storage for one read/write request.
pub type Rw10Cdb = [u8; RW10_CDB_LEN];

/// Encode a READ(10)/WRITE(10) command into `cdb` and build its descriptor.
///
/// The data buffer length is the transfer length; reads use it as the input
/// buffer and writes as the output buffer.
///
/// # Errors
///
/// Propagates encoding errors from [`cdb::encode_rw10`].
pub fn build_rw(
    direction: Direction,
    offset: u64,
    cdb: &mut Rw10Cdb,
    sense: &mut [u8],
    data: &mut [u8],
    options: DescriptorOptions,
    tag: u64,
) -> Result<SgIoV4> {
    *cdb = cdb::encode_rw10(direction, data.len() as u64, offset)?;
    let data = match direction {
        Direction::Read => DataBuffer::In(data),
        Direction::Write => DataBuffer::Out(data),
    };
    Ok(build(&cdb[..], sense, data, options, tag))
}
