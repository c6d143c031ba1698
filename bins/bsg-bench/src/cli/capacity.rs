//! Capacity command

use super::{format_size, OutputFormat, ProbeArgs};
use anyhow::Result;
use bsg_bench::{device, probe};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct CapacityReport<'a> {
    device: &'a str,
    last_lba: u32,
    block_len: u32,
    blocks: u64,
    bytes: u64,
}

pub fn run(args: ProbeArgs) -> Result<()> {
    let dev = device::open(&args.device)?;
    let options = args.transport.descriptor_options();
    let cap = probe::read_capacity(&dev, args.transport.sync_mode(), options)?;

    let report = CapacityReport {
        device: &args.device,
        last_lba: cap.last_lba,
        block_len: cap.block_len,
        blocks: cap.block_count(),
        bytes: cap.bytes(),
    };

    match args.format {
        OutputFormat::Text => {
            println!("{}", report.device);
            println!("  blocks     : {}", report.blocks);
            println!("  block size : {}", report.block_len);
            println!("  capacity   : {} bytes ({})", report.bytes, format_size(report.bytes));
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
