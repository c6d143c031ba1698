//! bsg-bench - asynchronous block I/O benchmark over the Linux bsg interface
//!
//! # Usage
//!
//! ```bash
//! # 4 KiB reads, 10000 per device, up to 32 in flight on each
//! bsg-bench bench -b 4k -n 10000 -o 32 /sys/class/bsg/0:0:0:0 /sys/class/bsg/1:0:0:0
//!
//! # Writes, JSON report
//! bsg-bench bench -w -b 64k -n 1000 -o 8 -f json /sys/class/bsg/0:0:0:0
//!
//! # Device size and identification
//! bsg-bench capacity /sys/class/bsg/0:0:0:0
//! bsg-bench inquiry /sys/class/bsg/0:0:0:0
//!
//! # Copy the first 4 KiB of a device into a file
//! bsg-bench copy --if /sys/class/bsg/0:0:0:0 --of /tmp/head.bin --bs 4k --count 1
//! ```

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Bench(args) => cli::bench::run(args),
        Commands::Capacity(args) => cli::capacity::run(args),
        Commands::Inquiry(args) => cli::inquiry::run(args),
        Commands::Copy(args) => cli::copy::run(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; stdout carries only reports.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
