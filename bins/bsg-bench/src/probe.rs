//! One-shot device queries: READ CAPACITY(10) and INQUIRY.

use crate::device::{BsgDevice, DeviceError, SyncMode};
use bsgbench_core::cdb::{self, INQUIRY_ALLOC_LEN, READ_CAPACITY10_LEN};
use bsgbench_core::{Capacity, DataBuffer, DescriptorOptions, InquiryData};
use tracing::debug;

/// Query the block count and block length of `dev`.
pub fn read_capacity(
    dev: &BsgDevice,
    mode: SyncMode,
    options: DescriptorOptions,
) -> Result<Capacity, DeviceError> {
    let mut buf = [0u8; READ_CAPACITY10_LEN];
    dev.execute(&cdb::read_capacity10(), DataBuffer::In(&mut buf), mode, options)?;
    let cap = cdb::decode_read_capacity10(&buf)
        .map_err(|source| DeviceError::Encode { path: dev.path().to_string(), source })?;
    debug!(
        device = dev.path(),
        last_lba = cap.last_lba,
        block_len = cap.block_len,
        "read capacity"
    );
    Ok(cap)
}

/// Device size in bytes.
pub fn probe(dev: &BsgDevice, mode: SyncMode, options: DescriptorOptions) -> Result<u64, DeviceError> {
    read_capacity(dev, mode, options).map(|cap| cap.bytes())
}

/// Standard INQUIRY data of `dev`.
pub fn inquiry(
    dev: &BsgDevice,
    mode: SyncMode,
    options: DescriptorOptions,
) -> Result<InquiryData, DeviceError> {
    let mut buf = [0u8; INQUIRY_ALLOC_LEN as usize];
    let hdr = dev.execute(&cdb::inquiry(INQUIRY_ALLOC_LEN), DataBuffer::In(&mut buf), mode, options)?;

    // Short responses leave the tail of the buffer unwritten.
    let got = buf.len().saturating_sub(usize::try_from(hdr.din_resid.max(0)).unwrap_or(0));
    cdb::decode_inquiry(&buf[..got])
        .map_err(|source| DeviceError::Encode { path: dev.path().to_string(), source })
}
