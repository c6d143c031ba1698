//! SCSI command block encoding and response decoding.
//!
//! Only the fixed-format commands the benchmark issues are supported:
//! READ(10)/WRITE(10) for the data path, READ CAPACITY(10) for sizing and
//! INQUIRY for identification.

use crate::sys::{
    INQUIRY, READ_10, READ_CAPACITY_10, RW10_CDB_LEN, RW10_MAX_BLOCKS, RW10_MAX_LBA, SECTOR_SIZE,
    WRITE_10,
};
use crate::{Error, Result};

/// Transfer direction of a data command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Device to host.
    #[default]
    Read,
    /// Host to device.
    Write,
}

impl Direction {
    /// Opcode of the 10-byte command for this direction.
    #[must_use]
    pub const fn opcode(self) -> u8 {
        match self {
            Direction::Read => READ_10,
            Direction::Write => WRITE_10,
        }
    }

    /// Check if data flows towards the device.
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(self, Direction::Write)
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Read => f.write_str("read"),
            Direction::Write => f.write_str("write"),
        }
    }
}

/// Encode a READ(10) or WRITE(10) command block.
///
/// `len` and `offset` are byte quantities; the block fields are expressed in
/// 512-byte sectors.
///
/// # Errors
///
/// Returns [`Error::Unaligned`] if either quantity is not a sector multiple,
/// and [`Error::OutOfRange`] if the LBA or block count does not fit the
/// 10-byte layout.
pub fn encode_rw10(direction: Direction, len: u64, offset: u64) -> Result<[u8; RW10_CDB_LEN]> {
    check_aligned("transfer length", len)?;
    check_aligned("offset", offset)?;

    let blocks = len / SECTOR_SIZE;
    if blocks > RW10_MAX_BLOCKS {
        return Err(Error::OutOfRange { field: "block count", value: blocks, max: RW10_MAX_BLOCKS });
    }
    let lba = offset / SECTOR_SIZE;
    if lba > RW10_MAX_LBA {
        return Err(Error::OutOfRange { field: "lba", value: lba, max: RW10_MAX_LBA });
    }

    let mut cdb = [0u8; RW10_CDB_LEN];
    cdb[0] = direction.opcode();
    cdb[2..6].copy_from_slice(&(lba as u32).to_be_bytes());
    cdb[7..9].copy_from_slice(&(blocks as u16).to_be_bytes());
    Ok(cdb)
}

/// Fields of a decoded 10-byte data command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rw10Fields {
    /// Operation code (byte 0).
    pub opcode: u8,
    /// Logical block address.
    pub lba: u32,
    /// Transfer length in blocks.
    pub blocks: u16,
}

impl Rw10Fields {
    /// Byte offset addressed by the command.
    #[must_use]
    pub fn byte_offset(&self) -> u64 {
        u64::from(self.lba) * SECTOR_SIZE
    }

    /// Byte length transferred by the command.
    #[must_use]
    pub fn byte_len(&self) -> u64 {
        u64::from(self.blocks) * SECTOR_SIZE
    }
}

/// Decode the fields of a READ(10)/WRITE(10) command block.
///
/// # Errors
///
/// Returns [`Error::Truncated`] if the block is shorter than 10 bytes.
pub fn decode_rw10(cdb: &[u8]) -> Result<Rw10Fields> {
    if cdb.len() < RW10_CDB_LEN {
        return Err(Error::Truncated { needed: RW10_CDB_LEN, available: cdb.len() });
    }
    Ok(Rw10Fields {
        opcode: cdb[0],
        lba: u32::from_be_bytes([cdb[2], cdb[3], cdb[4], cdb[5]]),
        blocks: u16::from_be_bytes([cdb[7], cdb[8]]),
    })
}

/// Byte offset of the `seq`-th sequential request on a device.
///
/// Requests advance by `block_size` and wrap at the device end. The wrap
/// point is the capacity rounded down to whole blocks and capped at the
/// range a 10-byte command can address, so every request lies fully inside
/// the device. A device smaller than one block wraps to offset 0.
#[must_use]
pub fn wrap_offset(block_size: u64, seq: u64, capacity: u64) -> u64 {
    if block_size == 0 {
        return 0;
    }
    let addressable = (RW10_MAX_LBA + 1) * SECTOR_SIZE;
    let span = capacity.min(addressable);
    let span = span - span % block_size;
    if span == 0 {
        return 0;
    }
    // Reduce the sequence number first so the product cannot overflow.
    let blocks_per_span = span / block_size;
    (seq % blocks_per_span) * block_size
}

/// Encode a READ CAPACITY(10) command block.
#[must_use]
pub fn read_capacity10() -> [u8; RW10_CDB_LEN] {
    let mut cdb = [0u8; RW10_CDB_LEN];
    cdb[0] = READ_CAPACITY_10;
    cdb
}

/// Length of the READ CAPACITY(10) parameter data.
pub const READ_CAPACITY10_LEN: usize = 8;

/// Device geometry reported by READ CAPACITY(10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Capacity {
    /// Address of the last logical block.
    pub last_lba: u32,
    /// Logical block length in bytes.
    pub block_len: u32,
}

impl Capacity {
    /// Number of logical blocks on the device.
    #[must_use]
    pub fn block_count(&self) -> u64 {
        u64::from(self.last_lba) + 1
    }

    /// Device size in bytes.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.block_count() * u64::from(self.block_len)
    }
}

/// Decode READ CAPACITY(10) parameter data (two big-endian 32-bit words).
///
/// # Errors
///
/// Returns [`Error::Truncated`] if fewer than 8 bytes were returned.
pub fn decode_read_capacity10(data: &[u8]) -> Result<Capacity> {
    if data.len() < READ_CAPACITY10_LEN {
        return Err(Error::Truncated { needed: READ_CAPACITY10_LEN, available: data.len() });
    }
    Ok(Capacity {
        last_lba: u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
        block_len: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
    })
}

/// Length of an INQUIRY command block.
pub const INQUIRY_CDB_LEN: usize = 6;

/// Allocation length requested by [`inquiry`].
pub const INQUIRY_ALLOC_LEN: u8 = 64;

/// Encode a standard INQUIRY command block.
#[must_use]
pub fn inquiry(alloc_len: u8) -> [u8; INQUIRY_CDB_LEN] {
    let mut cdb = [0u8; INQUIRY_CDB_LEN];
    cdb[0] = INQUIRY;
    cdb[4] = alloc_len;
    cdb
}

/// Identification strings from standard INQUIRY data.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct InquiryData {
    /// Peripheral device type (low five bits of byte 0).
    pub device_type: u8,
    /// T10 vendor identification.
    pub vendor: String,
    /// Product identification.
    pub product: String,
    /// Product revision level.
    pub revision: String,
}

/// Decode standard INQUIRY data.
///
/// # Errors
///
/// Returns [`Error::Truncated`] if the data does not reach the end of the
/// revision field (36 bytes).
pub fn decode_inquiry(data: &[u8]) -> Result<InquiryData> {
    const NEEDED: usize = 36;
    if data.len() < NEEDED {
        return Err(Error::Truncated { needed: NEEDED, available: data.len() });
    }
    let text = |range: std::ops::Range<usize>| {
        String::from_utf8_lossy(&data[range]).trim_end_matches([' ', '\0']).to_string()
    };
    Ok(InquiryData {
        device_type: data[0] & 0x1f,
        vendor: text(8..16),
        product: text(16..32),
        revision: text(32..36),
    })
}

fn check_aligned(field: &'static str, value: u64) -> Result<()> {
    if value % SECTOR_SIZE == 0 {
        Ok(())
    } else {
        Err(Error::Unaligned { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // READ(10)/WRITE(10)
    // ========================================================================

    #[test]
    fn test_encode_one_block_at_1024() {
        let cdb = encode_rw10(Direction::Read, 512, 1024).unwrap();
        let fields = decode_rw10(&cdb).unwrap();
        assert_eq!(fields.opcode, READ_10);
        assert_eq!(fields.lba, 2);
        assert_eq!(fields.blocks, 1);
    }

    #[test]
    fn test_encode_is_big_endian() {
        let cdb = encode_rw10(Direction::Write, 0x0102 * 512, 0x0a0b_0c0d * 512).unwrap();
        assert_eq!(cdb, [WRITE_10, 0, 0x0a, 0x0b, 0x0c, 0x0d, 0, 0x01, 0x02, 0]);
    }

    #[test]
    fn test_encode_rejects_unaligned_length() {
        let err = encode_rw10(Direction::Read, 1000, 0).unwrap_err();
        assert!(matches!(err, Error::Unaligned { field: "transfer length", value: 1000 }));
    }

    #[test]
    fn test_encode_rejects_unaligned_offset() {
        let err = encode_rw10(Direction::Read, 512, 513).unwrap_err();
        assert!(matches!(err, Error::Unaligned { field: "offset", value: 513 }));
    }

    #[test]
    fn test_encode_rejects_oversized_transfer() {
        let err = encode_rw10(Direction::Read, (RW10_MAX_BLOCKS + 1) * 512, 0).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { field: "block count", .. }));
    }

    #[test]
    fn test_encode_rejects_unaddressable_lba() {
        let err = encode_rw10(Direction::Read, 512, (RW10_MAX_LBA + 1) * 512).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { field: "lba", .. }));
    }

    #[test]
    fn test_decode_rw10_truncated() {
        assert!(matches!(decode_rw10(&[0u8; 6]), Err(Error::Truncated { needed: 10, .. })));
    }

    #[test]
    fn test_fields_byte_helpers() {
        let fields = decode_rw10(&encode_rw10(Direction::Read, 4096, 8192).unwrap()).unwrap();
        assert_eq!(fields.byte_offset(), 8192);
        assert_eq!(fields.byte_len(), 4096);
    }

    // ========================================================================
    // Offset wrap
    // ========================================================================

    #[test]
    fn test_wrap_offset_tenth_request() {
        assert_eq!(wrap_offset(512, 10, 4096), 1024);
    }

    #[test]
    fn test_wrap_offset_sequential_before_wrap() {
        let offsets: Vec<u64> = (0..4).map(|n| wrap_offset(1024, n, 1 << 20)).collect();
        assert_eq!(offsets, vec![0, 1024, 2048, 3072]);
    }

    #[test]
    fn test_wrap_offset_keeps_request_inside_device() {
        // 4096 / 1536 leaves a 1024-byte tail that a full block cannot use.
        for n in 0..32 {
            let offset = wrap_offset(1536, n, 4096);
            assert!(offset + 1536 <= 4096, "request {n} at {offset} overruns");
        }
    }

    #[test]
    fn test_wrap_offset_device_smaller_than_block() {
        assert_eq!(wrap_offset(8192, 5, 4096), 0);
    }

    #[test]
    fn test_wrap_offset_large_sequence_does_not_overflow() {
        let offset = wrap_offset(512, u64::MAX, 1 << 30);
        assert!(offset < 1 << 30);
        assert_eq!(offset % 512, 0);
    }

    // ========================================================================
    // READ CAPACITY / INQUIRY
    // ========================================================================

    #[test]
    fn test_read_capacity_cdb() {
        let cdb = read_capacity10();
        assert_eq!(cdb[0], READ_CAPACITY_10);
        assert!(cdb[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_decode_read_capacity() {
        let data = [0x00, 0x00, 0x0f, 0xff, 0x00, 0x00, 0x02, 0x00];
        let cap = decode_read_capacity10(&data).unwrap();
        assert_eq!(cap.last_lba, 4095);
        assert_eq!(cap.block_len, 512);
        assert_eq!(cap.block_count(), 4096);
        assert_eq!(cap.bytes(), 2 * 1024 * 1024);
    }

    #[test]
    fn test_decode_read_capacity_truncated() {
        assert!(decode_read_capacity10(&[0u8; 4]).is_err());
    }

    #[test]
    fn test_inquiry_cdb() {
        assert_eq!(inquiry(INQUIRY_ALLOC_LEN), [INQUIRY, 0, 0, 0, 64, 0]);
    }

    #[test]
    fn test_decode_inquiry_trims_padding() {
        let mut data = [b' '; 64];
        data[0] = 0x00;
        data[8..12].copy_from_slice(b"ATA ");
        data[16..27].copy_from_slice(b"Samsung SSD");
        data[32..36].copy_from_slice(b"1B6Q");
        let inq = decode_inquiry(&data).unwrap();
        assert_eq!(inq.device_type, 0);
        assert_eq!(inq.vendor, "ATA");
        assert_eq!(inq.product, "Samsung SSD");
        assert_eq!(inq.revision, "1B6Q");
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Read.to_string(), "read");
        assert_eq!(Direction::Write.to_string(), "write");
        assert!(Direction::Write.is_write());
    }
}
