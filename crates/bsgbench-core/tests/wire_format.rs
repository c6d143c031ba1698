//! Wire format tests
//!
//! Checks the bytes a built descriptor puts on the wire, as the bsg driver
//! would see them after `write(2)`.

use bsgbench_core::cdb::decode_rw10;
use bsgbench_core::descriptor::{self, DataBuffer};
use bsgbench_core::sys::{BSG_FLAG_Q_AT_TAIL, READ_10, WRITE_10};
use bsgbench_core::{BenchConfig, DescriptorOptions, Direction, SgIoV4, SENSE_BUFFER_LEN, SG_IO_V4_LEN};

fn u32_at(bytes: &[u8], off: usize) -> u32 {
    u32::from_ne_bytes(bytes[off..off + 4].try_into().unwrap())
}

fn u64_at(bytes: &[u8], off: usize) -> u64 {
    u64::from_ne_bytes(bytes[off..off + 8].try_into().unwrap())
}

#[test]
fn test_read_descriptor_bytes() {
    let mut cmd = [0u8; 10];
    let mut sense = [0u8; SENSE_BUFFER_LEN];
    let mut data = vec![0u8; 4096];
    let hdr = descriptor::build_rw(
        Direction::Read,
        1 << 20,
        &mut cmd,
        &mut sense,
        &mut data,
        DescriptorOptions { timeout_ms: 5_000, flags: BSG_FLAG_Q_AT_TAIL },
        0x1234,
    )
    .unwrap();

    let bytes = hdr.as_bytes();
    assert_eq!(bytes.len(), SG_IO_V4_LEN);
    assert_eq!(bytes[0], b'Q');
    assert_eq!(u32_at(bytes, 12), 10); // request_len
    assert_eq!(u64_at(bytes, 16), cmd.as_ptr() as u64); // request
    assert_eq!(u32_at(bytes, 44), SENSE_BUFFER_LEN as u32); // max_response_len
    assert_eq!(u32_at(bytes, 60), 0); // dout_xfer_len
    assert_eq!(u32_at(bytes, 68), 4096); // din_xfer_len
    assert_eq!(u64_at(bytes, 80), data.as_ptr() as u64); // din_xferp
    assert_eq!(u32_at(bytes, 88), 5_000); // timeout
    assert_eq!(u32_at(bytes, 92), BSG_FLAG_Q_AT_TAIL); // flags
    assert_eq!(u64_at(bytes, 96), 0x1234); // usr_ptr

    let fields = decode_rw10(&cmd).unwrap();
    assert_eq!(fields.opcode, READ_10);
    assert_eq!(fields.lba, 2048);
    assert_eq!(fields.blocks, 8);
}

#[test]
fn test_write_descriptor_uses_output_buffer() {
    let mut cmd = [0u8; 10];
    let mut sense = [0u8; SENSE_BUFFER_LEN];
    let mut data = vec![0xa5u8; 512];
    let hdr = descriptor::build_rw(
        Direction::Write,
        0,
        &mut cmd,
        &mut sense,
        &mut data,
        BenchConfig::default().descriptor_options(),
        7,
    )
    .unwrap();

    assert_eq!(cmd[0], WRITE_10);
    assert_eq!(hdr.dout_xfer_len, 512);
    assert_eq!(hdr.dout_xferp, data.as_ptr() as u64);
    assert_eq!(hdr.din_xfer_len, 0);
    assert_eq!(hdr.din_xferp, 0);
}

#[test]
fn test_completion_bytes_read_back() {
    // Simulate the driver filling a completion in place.
    let mut hdrs = [SgIoV4::default(); 2];
    {
        let bytes = SgIoV4::slice_as_bytes_mut(&mut hdrs);
        assert_eq!(bytes.len(), 2 * SG_IO_V4_LEN);
        bytes[SG_IO_V4_LEN + 96..SG_IO_V4_LEN + 104].copy_from_slice(&9u64.to_ne_bytes());
        bytes[SG_IO_V4_LEN + 116..SG_IO_V4_LEN + 120].copy_from_slice(&2u32.to_ne_bytes());
    }
    assert_eq!(hdrs[1].usr_ptr, 9);
    assert_eq!(hdrs[1].device_status, 2);
    assert_eq!(hdrs[0], SgIoV4::default());
}

#[test]
fn test_no_data_command() {
    let cmd = bsgbench_core::cdb::read_capacity10();
    let mut sense = [0u8; SENSE_BUFFER_LEN];
    let hdr = descriptor::build(&cmd, &mut sense, DataBuffer::None, DescriptorOptions::default(), 0);
    assert_eq!(hdr.din_xfer_len, 0);
    assert_eq!(hdr.dout_xfer_len, 0);
    assert_eq!(hdr.request_len, 10);
}
