//! Inquiry command

use super::{OutputFormat, ProbeArgs};
use anyhow::Result;
use bsg_bench::{device, probe};

pub fn run(args: ProbeArgs) -> Result<()> {
    let dev = device::open(&args.device)?;
    let options = args.transport.descriptor_options();
    let data = probe::inquiry(&dev, args.transport.sync_mode(), options)?;

    match args.format {
        OutputFormat::Text => {
            println!("{}", args.device);
            println!("  type     : {:#04x}", data.device_type);
            println!("  vendor   : {}", data.vendor);
            println!("  product  : {}", data.product);
            println!("  revision : {}", data.revision);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&data)?),
    }
    Ok(())
}
