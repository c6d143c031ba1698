//! Bench command: asynchronous throughput run over one or more devices.

use super::{format_size, parse_size, BenchArgs, OutputFormat};
use anyhow::{Context, Result};
use bsg_bench::device;
use bsg_bench::engine::{Attached, PollPoller, Session};
use bsg_bench::probe;
use bsgbench_core::{BenchConfig, Direction, RunReport};

pub fn run(args: BenchArgs) -> Result<()> {
    let block_size = parse_size(&args.block_size)
        .with_context(|| format!("invalid block size {:?}", args.block_size))?;

    let config = BenchConfig {
        block_size,
        count: args.count,
        outstanding: args.outstanding,
        direction: if args.write { Direction::Write } else { Direction::Read },
        timeout_ms: args.transport.timeout_ms,
        at_tail: args.transport.at_tail,
    };
    config.validate(args.devices.len())?;

    tracing::info!(
        block_size = %format_size(block_size),
        count = config.count,
        outstanding = config.outstanding,
        direction = %config.direction,
        devices = args.devices.len(),
        "starting benchmark"
    );

    // Every device is opened and sized before the first request goes out.
    let mut attached = Vec::with_capacity(args.devices.len());
    for path in &args.devices {
        let dev = device::open(path)?;
        let capacity = probe::probe(&dev, args.transport.sync_mode(), config.descriptor_options())
            .with_context(|| format!("{path}: capacity probe failed"))?;
        tracing::debug!(device = %path, capacity = %format_size(capacity), "device ready");
        attached.push(Attached::new(path.clone(), dev, capacity));
    }

    let mut session = Session::new(config, attached)?;
    let report = session.run(&mut PollPoller)?;

    match args.format {
        OutputFormat::Text => print!("{}", report.to_text()),
        OutputFormat::Json => output_json(&report)?,
    }
    Ok(())
}

fn output_json(report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    println!("{json}");
    Ok(())
}
