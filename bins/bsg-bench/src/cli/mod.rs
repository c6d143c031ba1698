//! CLI module for bsg-bench
//!
//! `bench` drives the asynchronous READ(10)/WRITE(10) benchmark; the other
//! subcommands are one-shot helpers built on the synchronous request path.

pub mod bench;
pub mod capacity;
pub mod copy;
pub mod inquiry;

use bsg_bench::device::SyncMode;
use bsgbench_core::sys::DEFAULT_TIMEOUT_MS;
use bsgbench_core::DescriptorOptions;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

/// bsg-bench - asynchronous block I/O benchmark over the Linux bsg interface
#[derive(Parser)]
#[command(name = "bsg-bench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Measure read or write throughput on one or more devices
    Bench(BenchArgs),

    /// Print device capacity (READ CAPACITY)
    Capacity(ProbeArgs),

    /// Print device identification (INQUIRY)
    Inquiry(ProbeArgs),

    /// Copy blocks between a bsg device and a file
    Copy(CopyArgs),
}

/// Report format
#[derive(Clone, Copy, Debug, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text (default)
    #[default]
    Text,
    /// JSON
    Json,
}

/// Options shared by every command that talks to a device
#[derive(Args, Clone, Copy, Debug)]
pub struct TransportArgs {
    /// Per-command timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout_ms: u32,

    /// Ask the transport to queue requests at the tail
    #[arg(long)]
    pub at_tail: bool,

    /// Use the SG_IO ioctl for synchronous commands instead of write/read
    #[arg(long)]
    pub sgio: bool,
}

impl TransportArgs {
    pub fn sync_mode(&self) -> SyncMode {
        if self.sgio {
            SyncMode::Ioctl
        } else {
            SyncMode::ReadWrite
        }
    }

    pub fn descriptor_options(&self) -> DescriptorOptions {
        DescriptorOptions::new(self.timeout_ms, self.at_tail)
    }
}

/// Bench command arguments
#[derive(Parser)]
pub struct BenchArgs {
    /// Bytes per request, a multiple of 512 (e.g., 4k, 64k, 1m)
    #[arg(short, long, default_value = "512")]
    pub block_size: String,

    /// Requests to complete on each device
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: u64,

    /// Issue WRITE(10) instead of READ(10)
    #[arg(short, long)]
    pub write: bool,

    /// Maximum outstanding requests per device
    #[arg(short, long, default_value_t = 1)]
    pub outstanding: u64,

    /// Report format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    #[command(flatten)]
    pub transport: TransportArgs,

    /// bsg device paths (e.g., /sys/class/bsg/0:0:0:0)
    #[arg(required = true)]
    pub devices: Vec<String>,
}

/// Capacity and inquiry arguments
#[derive(Parser)]
pub struct ProbeArgs {
    /// bsg device path
    pub device: String,

    /// Report format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    #[command(flatten)]
    pub transport: TransportArgs,
}

/// Copy command arguments
#[derive(Parser)]
pub struct CopyArgs {
    /// Input: bsg device or regular file
    #[arg(long = "if", value_name = "PATH")]
    pub input: String,

    /// Output: bsg device or regular file
    #[arg(long = "of", value_name = "PATH")]
    pub output: String,

    /// Bytes per transfer, a multiple of 512
    #[arg(long = "bs", default_value = "512")]
    pub block_size: String,

    /// Blocks to copy
    #[arg(long, default_value_t = 1)]
    pub count: u64,

    /// Blocks to skip on the input
    #[arg(long, default_value_t = 0)]
    pub skip: u64,

    /// Blocks to skip on the output
    #[arg(long, default_value_t = 0)]
    pub seek: u64,

    #[command(flatten)]
    pub transport: TransportArgs,
}

/// Parse size string like "4k", "1M", "512" into bytes
pub fn parse_size(s: &str) -> anyhow::Result<u64> {
    let s = s.trim().to_uppercase();
    let (num, multiplier) = if s.ends_with('G') || s.ends_with("GIB") {
        (s.trim_end_matches("GIB").trim_end_matches('G'), 1u64 << 30)
    } else if s.ends_with('M') || s.ends_with("MIB") {
        (s.trim_end_matches("MIB").trim_end_matches('M'), 1u64 << 20)
    } else if s.ends_with('K') || s.ends_with("KIB") {
        (s.trim_end_matches("KIB").trim_end_matches('K'), 1u64 << 10)
    } else {
        (s.as_str(), 1u64)
    };

    let num: u64 = num.trim().parse()?;
    num.checked_mul(multiplier)
        .ok_or_else(|| anyhow::anyhow!("size {s} overflows"))
}

/// Format bytes as human-readable string
pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;
    const TIB: u64 = GIB * 1024;

    if bytes >= TIB {
        format!("{:.1}T", bytes as f64 / TIB as f64)
    } else if bytes >= GIB {
        format!("{:.1}G", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1}M", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1}K", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes}B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("512").unwrap(), 512);
        assert_eq!(parse_size("4k").unwrap(), 4096);
        assert_eq!(parse_size("64K").unwrap(), 65536);
        assert_eq!(parse_size("1m").unwrap(), 1 << 20);
        assert_eq!(parse_size("2MiB").unwrap(), 2 << 20);
        assert_eq!(parse_size("1G").unwrap(), 1 << 30);
        assert!(parse_size("abc").is_err());
        assert!(parse_size("").is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(4096), "4.0K");
        assert_eq!(format_size(1536 * 1024), "1.5M");
        assert_eq!(format_size(1 << 40), "1.0T");
    }

    #[test]
    fn test_bench_args() {
        let cli = Cli::try_parse_from([
            "bsg-bench", "-vv", "bench", "-b", "4k", "-n", "100", "-w", "-o", "8",
            "/sys/class/bsg/0:0:0:0", "/sys/class/bsg/1:0:0:0",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Bench(args) = cli.command else { panic!("expected bench") };
        assert_eq!(args.block_size, "4k");
        assert_eq!(args.count, 100);
        assert!(args.write);
        assert_eq!(args.outstanding, 8);
        assert_eq!(args.devices.len(), 2);
        assert_eq!(args.format, OutputFormat::Text);
        assert_eq!(args.transport.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(args.transport.sync_mode(), SyncMode::ReadWrite);
    }

    #[test]
    fn test_transport_descriptor_options() {
        let cli = Cli::try_parse_from([
            "bsg-bench", "capacity", "--at-tail", "--timeout-ms", "250", "/dev/bsg/0:0:0:0",
        ])
        .unwrap();
        let Commands::Capacity(args) = cli.command else { panic!("expected capacity") };
        let opts = args.transport.descriptor_options();
        assert_eq!(opts, DescriptorOptions::new(250, true));
        assert_eq!(opts.flags, bsgbench_core::sys::BSG_FLAG_Q_AT_TAIL);
    }

    #[test]
    fn test_bench_requires_device() {
        assert!(Cli::try_parse_from(["bsg-bench", "bench"]).is_err());
    }

    #[test]
    fn test_copy_args() {
        let cli = Cli::try_parse_from([
            "bsg-bench", "copy", "--if", "/dev/bsg/0:0:0:0", "--of", "out.img", "--bs", "1k",
            "--count", "4", "--sgio",
        ])
        .unwrap();
        let Commands::Copy(args) = cli.command else { panic!("expected copy") };
        assert_eq!(args.input, "/dev/bsg/0:0:0:0");
        assert_eq!(args.output, "out.img");
        assert_eq!(args.count, 4);
        assert_eq!(args.transport.sync_mode(), SyncMode::Ioctl);
    }
}
