//! Raw bsg kernel interface definitions.
//!
//! Mirrors `struct sg_io_v4` from `include/uapi/linux/bsg.h` together with the
//! SCSI opcodes and limits used by the benchmark. The struct is written to and
//! read from the bsg character device verbatim, so its layout must match the
//! kernel byte for byte.

use std::mem::size_of;

// ============================================================================
// Protocol selectors
// ============================================================================

/// Version guard distinguishing `sg_io_v4` from the v3 header.
pub const SG_IO_V4_GUARD: i32 = b'Q' as i32;

pub const BSG_PROTOCOL_SCSI: u32 = 0;

pub const BSG_SUB_PROTOCOL_SCSI_CMD: u32 = 0;
pub const BSG_SUB_PROTOCOL_SCSI_TMF: u32 = 1;
pub const BSG_SUB_PROTOCOL_SCSI_TRANSPORT: u32 = 2;

/// Queue the request at the tail of the device queue instead of the head.
pub const BSG_FLAG_Q_AT_TAIL: u32 = 0x10;

/// `SG_IO` ioctl request number (`_IO` style, no size encoding).
pub const SG_IO: u32 = 0x2285;

// ============================================================================
// SCSI opcodes
// ============================================================================

pub const INQUIRY: u8 = 0x12;
pub const READ_CAPACITY_10: u8 = 0x25;
pub const READ_10: u8 = 0x28;
pub const WRITE_10: u8 = 0x2a;

// ============================================================================
// Limits
// ============================================================================

/// Fixed logical sector size used for all offset arithmetic.
pub const SECTOR_SIZE: u64 = 512;

/// Length of a READ(10)/WRITE(10) command block.
pub const RW10_CDB_LEN: usize = 10;

/// Length of the auxiliary sense buffer attached to every request.
pub const SENSE_BUFFER_LEN: usize = 32;

/// Largest block count a 10-byte command can carry.
pub const RW10_MAX_BLOCKS: u64 = u16::MAX as u64;

/// Largest LBA a 10-byte command can carry.
pub const RW10_MAX_LBA: u64 = u32::MAX as u64;

/// Default per-command timeout handed to the transport.
pub const DEFAULT_TIMEOUT_MS: u32 = 60_000;

/// Upper bound on devices driven by one benchmark session.
pub const MAX_DEVICES: usize = 8;

pub const BSG_SYSFS_CLASS: &str = "/sys/class/bsg";
pub const BSG_DEV_DIR: &str = "/dev/bsg";

// ============================================================================
// Kernel structure
// ============================================================================

/// Request/response envelope exchanged with the bsg driver (160 bytes).
///
/// Fields marked `[o]` in the kernel header are written by the driver on
/// completion; everything else is input.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SgIoV4 {
    pub guard: i32,
    pub protocol: u32,
    pub subprotocol: u32,

    pub request_len: u32,
    pub request: u64,
    pub request_tag: u64,
    pub request_attr: u32,
    pub request_priority: u32,
    pub request_extra: u32,
    pub max_response_len: u32,
    pub response: u64,

    pub dout_iovec_count: u32,
    pub dout_xfer_len: u32,
    pub din_iovec_count: u32,
    pub din_xfer_len: u32,
    pub dout_xferp: u64,
    pub din_xferp: u64,

    pub timeout: u32,
    pub flags: u32,
    /// Carried through the driver untouched; used as the correlation tag.
    pub usr_ptr: u64,
    pub spare_in: u32,

    pub driver_status: u32,
    pub transport_status: u32,
    pub device_status: u32,
    pub retry_delay: u32,
    pub info: u32,
    pub duration: u32,
    pub response_len: u32,
    pub din_resid: i32,
    pub dout_resid: i32,
    pub generated_tag: u64,
    pub spare_out: u32,

    pub padding: u32,
}

/// Size of one descriptor on the wire.
pub const SG_IO_V4_LEN: usize = size_of::<SgIoV4>();

impl SgIoV4 {
    /// View the descriptor as the bytes written to the device.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: SgIoV4 is repr(C), made only of integers, and has no padding
        // holes (asserted by the layout tests), so every byte is initialised.
        unsafe { std::slice::from_raw_parts((self as *const Self).cast::<u8>(), SG_IO_V4_LEN) }
    }

    /// View a slice of descriptors as a mutable byte buffer for a read.
    #[must_use]
    pub fn slice_as_bytes_mut(hdrs: &mut [Self]) -> &mut [u8] {
        // SAFETY: every bit pattern is a valid SgIoV4 (integers only), and the
        // byte length covers exactly the borrowed slice.
        unsafe {
            std::slice::from_raw_parts_mut(
                hdrs.as_mut_ptr().cast::<u8>(),
                hdrs.len() * SG_IO_V4_LEN,
            )
        }
    }
}
