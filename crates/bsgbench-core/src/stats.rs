//! Run statistics: elapsed time, bytes moved and derived throughput.

use serde::Serialize;
use std::time::{Duration, Instant};

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// Start and end timestamps of a benchmark run.
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    start: Instant,
    end: Option<Instant>,
}

impl RunClock {
    /// Record the start timestamp.
    #[must_use]
    pub fn start() -> Self {
        Self { start: Instant::now(), end: None }
    }

    /// Record the end timestamp. Later calls keep the first end.
    pub fn stop(&mut self) {
        self.end.get_or_insert_with(Instant::now);
    }

    /// Time between start and end, or until now while running.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.end.unwrap_or_else(Instant::now).duration_since(self.start)
    }
}

/// Throughput in KiB/s for `bytes` moved over `elapsed_secs`.
///
/// Returns 0.0 for a non-positive interval.
#[must_use]
pub fn kb_per_sec(bytes: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.0 {
        return 0.0;
    }
    bytes as f64 / elapsed_secs / KIB
}

/// Throughput in MiB/s for `bytes` moved over `elapsed_secs`.
#[must_use]
pub fn mb_per_sec(bytes: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.0 {
        return 0.0;
    }
    bytes as f64 / elapsed_secs / MIB
}

/// Per-device outcome of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceThroughput {
    /// Device path as given on the command line.
    pub device: String,
    /// Completed requests.
    pub done: u64,
    /// Completed requests whose status check failed.
    pub failed: u64,
    /// Bytes moved (`done * block_size`).
    pub bytes: u64,
    /// Throughput in KiB/s.
    pub kb_per_sec: f64,
    /// Throughput in MiB/s.
    pub mb_per_sec: f64,
}

impl DeviceThroughput {
    /// Derive throughput for one device.
    #[must_use]
    pub fn new(device: impl Into<String>, done: u64, failed: u64, block_size: u64, elapsed_secs: f64) -> Self {
        let bytes = done * block_size;
        Self {
            device: device.into(),
            done,
            failed,
            bytes,
            kb_per_sec: kb_per_sec(bytes, elapsed_secs),
            mb_per_sec: mb_per_sec(bytes, elapsed_secs),
        }
    }
}

/// Final report of a benchmark run, printed once at the end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Bytes per request.
    pub block_size: u64,
    /// Effective per-device outstanding ceiling.
    pub outstanding: u64,
    /// Wall-clock duration in seconds.
    pub elapsed_secs: f64,
    /// Per-device results.
    pub devices: Vec<DeviceThroughput>,
    /// Sum over all devices.
    pub total: DeviceThroughput,
}

impl RunReport {
    /// Build a report from per-device `(path, done, failed)` counters.
    #[must_use]
    pub fn new<'a, I>(block_size: u64, outstanding: u64, elapsed: Duration, counters: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, u64, u64)>,
    {
        let elapsed_secs = elapsed.as_secs_f64();
        let devices: Vec<DeviceThroughput> = counters
            .into_iter()
            .map(|(path, done, failed)| {
                DeviceThroughput::new(path, done, failed, block_size, elapsed_secs)
            })
            .collect();

        let done = devices.iter().map(|d| d.done).sum();
        let failed = devices.iter().map(|d| d.failed).sum();
        let total = DeviceThroughput::new("total", done, failed, block_size, elapsed_secs);

        Self { block_size, outstanding, elapsed_secs, devices, total }
    }

    /// Render the plain-text report.
    #[must_use]
    pub fn to_text(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let _ = writeln!(out, "block size   : {}", self.block_size);
        let _ = writeln!(out, "outstanding  : {}", self.outstanding);
        let _ = writeln!(out, "elapsed time : {:.6} [s]", self.elapsed_secs);
        for dev in &self.devices {
            let _ = writeln!(out, "{}", dev.device);
            write_counters(&mut out, dev);
        }
        if self.devices.len() > 1 {
            let _ = writeln!(out, "total");
            write_counters(&mut out, &self.total);
        }
        out
    }
}

fn write_counters(out: &mut String, dev: &DeviceThroughput) {
    use std::fmt::Write;

    let _ = writeln!(out, "  done       : {}", dev.done);
    if dev.failed > 0 {
        let _ = writeln!(out, "  failed     : {}", dev.failed);
    }
    let _ = writeln!(out, "  total bytes: {} [bytes]", dev.bytes);
    let _ = writeln!(
        out,
        "  bandwidth  : {:.6} [KB/s], {:.6} [MB/s]",
        dev.kb_per_sec, dev.mb_per_sec
    );
}
