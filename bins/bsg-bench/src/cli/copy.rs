//! Copy command: dd-style block copy where at least one side is a bsg device.

use super::{format_size, parse_size, CopyArgs};
use anyhow::{bail, Context, Result};
use bsg_bench::device::{self, BsgDevice, SyncMode};
use bsgbench_core::{DescriptorOptions, SECTOR_SIZE};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::time::Instant;

/// Byte ranges touched by a copy.
#[derive(Debug, PartialEq, Eq)]
struct Extent {
    if_offset: u64,
    of_offset: u64,
    bytes: u64,
}

impl Extent {
    /// Scale block counts to bytes; both ranges must end inside `u64`.
    fn new(bs: u64, skip: u64, seek: u64, count: u64) -> Result<Self> {
        let scale = |blocks: u64, what: &str| {
            blocks
                .checked_mul(bs)
                .with_context(|| format!("{what} of {blocks} blocks of {bs} bytes overflows"))
        };
        let if_offset = scale(skip, "skip")?;
        let of_offset = scale(seek, "seek")?;
        let bytes = scale(count, "count")?;
        if if_offset.checked_add(bytes).is_none() || of_offset.checked_add(bytes).is_none() {
            bail!("copy of {bytes} bytes runs past the end of the addressable range");
        }
        Ok(Self { if_offset, of_offset, bytes })
    }
}

/// One side of a copy.
enum Endpoint {
    Bsg(BsgDevice),
    File(File),
}

impl Endpoint {
    fn open_input(path: &str) -> Result<Self> {
        if device::is_bsg_path(path) {
            return Ok(Self::Bsg(device::open(path)?));
        }
        let file = File::open(path).with_context(|| format!("can't open input {path}"))?;
        Ok(Self::File(file))
    }

    fn open_output(path: &str) -> Result<Self> {
        if device::is_bsg_path(path) {
            return Ok(Self::Bsg(device::open(path)?));
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("can't open output {path}"))?;
        Ok(Self::File(file))
    }

    fn read_block(&self, buf: &mut [u8], offset: u64, mode: SyncMode, options: DescriptorOptions) -> Result<()> {
        match self {
            Self::Bsg(dev) => dev.read_at(buf, offset, mode, options)?,
            Self::File(file) => file
                .read_exact_at(buf, offset)
                .with_context(|| format!("short read at offset {offset}"))?,
        }
        Ok(())
    }

    fn write_block(&self, buf: &[u8], offset: u64, mode: SyncMode, options: DescriptorOptions) -> Result<()> {
        match self {
            Self::Bsg(dev) => dev.write_at(buf, offset, mode, options)?,
            Self::File(file) => file
                .write_all_at(buf, offset)
                .with_context(|| format!("short write at offset {offset}"))?,
        }
        Ok(())
    }
}

pub fn run(args: CopyArgs) -> Result<()> {
    if !device::is_bsg_path(&args.input) && !device::is_bsg_path(&args.output) {
        bail!(
            "either input ({}) or output ({}) must be a bsg device",
            args.input,
            args.output
        );
    }

    let bs = parse_size(&args.block_size)
        .with_context(|| format!("invalid block size {:?}", args.block_size))?;
    if bs == 0 || bs % SECTOR_SIZE != 0 {
        bail!("bs must be a multiple of {SECTOR_SIZE}, got {bs}");
    }
    if args.count == 0 {
        bail!("count must not be zero");
    }

    let input = Endpoint::open_input(&args.input)?;
    let output = Endpoint::open_output(&args.output)?;
    let mode = args.transport.sync_mode();
    let options = args.transport.descriptor_options();

    let extent = Extent::new(bs, args.skip, args.seek, args.count)?;
    let mut buf = vec![0u8; usize::try_from(bs)?];
    let mut if_offset = extent.if_offset;
    let mut of_offset = extent.of_offset;

    let start = Instant::now();
    for n in 0..args.count {
        input
            .read_block(&mut buf, if_offset, mode, options)
            .with_context(|| format!("block {n}: reading {}", args.input))?;
        output
            .write_block(&buf, of_offset, mode, options)
            .with_context(|| format!("block {n}: writing {}", args.output))?;
        if_offset += bs;
        of_offset += bs;
    }

    let total = extent.bytes;
    let secs = start.elapsed().as_secs_f64();
    tracing::info!(blocks = args.count, bytes = total, secs, "copy complete");
    eprintln!(
        "{} blocks ({}) copied in {:.6} s",
        args.count,
        format_size(total),
        secs
    );
    Ok(())
}
