//! Submission/completion engine
//!
//! Drives every device channel from one thread. Each pass tops up the
//! in-flight requests of every unfinished channel, blocks once until at
//! least one channel has completions, then drains what is available. The
//! outstanding ceiling bounds how many buffers a channel holds; it never
//! makes submission wait for completions.
//!
//! The engine is generic over [`Channel`] and [`Poller`] so the state
//! machine can be exercised without a kernel device.

use crate::device::BsgDevice;
use crate::pool::RequestPool;
use bsgbench_core::cdb::wrap_offset;
use bsgbench_core::{
    BenchConfig, CompletionStatus, DescriptorOptions, RunClock, RunReport, SenseData, SgIoV4,
};
use nix::errno::Errno;
use nix::libc;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::io;
use std::os::fd::AsFd;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

// =============================================================================
// Seams
// =============================================================================

/// A duplex handle accepting request descriptors and returning completions.
pub trait Channel {
    /// Prepare the handle for non-blocking submission and draining.
    fn set_nonblocking(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Queue one descriptor without blocking.
    fn submit(&mut self, hdr: &SgIoV4) -> io::Result<()>;

    /// Read up to `out.len()` completed descriptors without blocking.
    ///
    /// Returns 0 when nothing is available. A channel that has been closed
    /// underneath the session reports an error instead.
    fn reap(&mut self, out: &mut [SgIoV4]) -> io::Result<usize>;
}

/// Blocking readiness wait over several channels.
pub trait Poller<C> {
    /// Block until at least one of `channels` has completions to read.
    ///
    /// Returns the positions in `channels` that are ready.
    fn wait(&mut self, channels: &[&C]) -> io::Result<Vec<usize>>;
}

impl Channel for BsgDevice {
    fn set_nonblocking(&mut self) -> io::Result<()> {
        BsgDevice::set_nonblocking(self)
    }

    fn submit(&mut self, hdr: &SgIoV4) -> io::Result<()> {
        self.write_descriptor(hdr)
    }

    fn reap(&mut self, out: &mut [SgIoV4]) -> io::Result<usize> {
        match self.read_descriptors(out) {
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Ok(0) => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "device queue closed")),
            other => other,
        }
    }
}

/// `poll(2)` over the channels' descriptors with no timeout.
#[derive(Debug, Default, Clone, Copy)]
pub struct PollPoller;

impl<C: AsFd> Poller<C> for PollPoller {
    fn wait(&mut self, channels: &[&C]) -> io::Result<Vec<usize>> {
        let mut fds: Vec<PollFd<'_>> = channels
            .iter()
            .map(|c| PollFd::new(c.as_fd(), PollFlags::POLLIN))
            .collect();

        loop {
            match poll(&mut fds, PollTimeout::NONE) {
                Ok(_) => break,
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(io::Error::from(e)),
            }
        }

        // Error conditions count as ready so the following read reports them.
        let ready = PollFlags::POLLIN | PollFlags::POLLERR | PollFlags::POLLHUP | PollFlags::POLLNVAL;
        Ok(fds
            .iter()
            .enumerate()
            .filter(|(_, fd)| fd.revents().is_some_and(|r| r.intersects(ready)))
            .map(|(i, _)| i)
            .collect())
    }
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    InvalidConfig(#[from] bsgbench_core::Error),

    #[error("{device}: capacity of {capacity} bytes is smaller than one {block_size} byte block")]
    CapacityTooSmall {
        device: String,
        capacity: u64,
        block_size: u64,
    },

    #[error("{device}: channel setup failed: {source}")]
    Setup { device: String, source: io::Error },

    #[error("{device}: cannot encode request at offset {offset}: {source}")]
    Encode {
        device: String,
        offset: u64,
        source: bsgbench_core::Error,
    },

    #[error("{device}: submit failed: {source}")]
    Submit { device: String, source: io::Error },

    #[error("readiness wait failed: {source}")]
    Wait { source: io::Error },

    #[error("{device}: reading completions failed: {source}")]
    Reap { device: String, source: io::Error },

    #[error("{device}: completion carries unknown tag {tag:#x}")]
    UnknownTag { device: String, tag: u64 },

    #[error("{device}: no free request slot")]
    PoolExhausted { device: String },
}

impl EngineError {
    /// Convert to negative errno for POSIX compatibility.
    pub fn to_errno(&self) -> i32 {
        match self {
            Self::InvalidConfig(_) | Self::CapacityTooSmall { .. } | Self::Encode { .. } => -libc::EINVAL,
            Self::Setup { source, .. }
            | Self::Submit { source, .. }
            | Self::Wait { source }
            | Self::Reap { source, .. } => -source.raw_os_error().unwrap_or(libc::EIO),
            Self::UnknownTag { .. } => -libc::EIO,
            Self::PoolExhausted { .. } => -libc::ENOMEM,
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// Where a channel is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPhase {
    Idle,
    Submitting,
    Draining,
    Done,
}

/// A device handed to a session.
#[derive(Debug)]
pub struct Attached<C> {
    pub path: String,
    pub channel: C,
    /// Device size in bytes, used to wrap request offsets.
    pub capacity: u64,
}

impl<C> Attached<C> {
    pub fn new(path: impl Into<String>, channel: C, capacity: u64) -> Self {
        Self { path: path.into(), channel, capacity }
    }
}

/// Per-channel state owned by the session.
#[derive(Debug)]
pub struct ChannelState<C> {
    path: String,
    channel: C,
    capacity: u64,
    pool: RequestPool,
    submitted: u64,
    done: u64,
    failed: u64,
    phase: ChannelPhase,
}

impl<C> ChannelState<C> {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    pub fn done(&self) -> u64 {
        self.done
    }

    /// Requests that completed with a non-zero status.
    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn outstanding(&self) -> u64 {
        self.pool.in_flight() as u64
    }

    pub fn phase(&self) -> ChannelPhase {
        self.phase
    }

    pub fn get_ref(&self) -> &C {
        &self.channel
    }
}

/// One benchmark run over a set of channels.
#[derive(Debug)]
pub struct Session<C> {
    config: BenchConfig,
    ceiling: u64,
    options: DescriptorOptions,
    channels: Vec<ChannelState<C>>,
    completions: Vec<SgIoV4>,
}

impl<C: Channel> Session<C> {
    /// Validate `config` and allocate a request pool per device.
    ///
    /// The outstanding ceiling is clamped to the request count.
    pub fn new(config: BenchConfig, devices: Vec<Attached<C>>) -> Result<Self, EngineError> {
        config.validate(devices.len())?;
        let ceiling = config.effective_outstanding();
        if ceiling < config.outstanding {
            debug!(requested = config.outstanding, ceiling, "outstanding clamped to request count");
        }

        let depth = usize::try_from(ceiling).unwrap_or(usize::MAX);
        let block_size = usize::try_from(config.block_size).unwrap_or(usize::MAX);

        let mut channels = Vec::with_capacity(devices.len());
        for dev in devices {
            if dev.capacity < config.block_size {
                return Err(EngineError::CapacityTooSmall {
                    device: dev.path,
                    capacity: dev.capacity,
                    block_size: config.block_size,
                });
            }
            let pool = RequestPool::new(depth, block_size)
                .map_err(|source| EngineError::Setup { device: dev.path.clone(), source })?;
            debug!(device = %dev.path, capacity = dev.capacity, slots = pool.depth(), "channel attached");
            channels.push(ChannelState {
                path: dev.path,
                channel: dev.channel,
                capacity: dev.capacity,
                pool,
                submitted: 0,
                done: 0,
                failed: 0,
                phase: ChannelPhase::Idle,
            });
        }

        Ok(Self {
            config,
            ceiling,
            options: config.descriptor_options(),
            channels,
            completions: vec![SgIoV4::default(); depth],
        })
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    pub fn channels(&self) -> &[ChannelState<C>] {
        &self.channels
    }

    /// Run until every channel has completed its target.
    ///
    /// Completion status failures are logged and counted; any failed
    /// transport call aborts the run.
    pub fn run<P: Poller<C>>(&mut self, poller: &mut P) -> Result<RunReport, EngineError> {
        for ch in &mut self.channels {
            ch.channel
                .set_nonblocking()
                .map_err(|source| EngineError::Setup { device: ch.path.clone(), source })?;
        }

        info!(
            devices = self.channels.len(),
            block_size = self.config.block_size,
            count = self.config.count,
            outstanding = self.ceiling,
            direction = %self.config.direction,
            "starting run"
        );
        let mut clock = RunClock::start();

        loop {
            for idx in 0..self.channels.len() {
                self.fill(idx)?;
            }

            let watched: Vec<usize> = self
                .channels
                .iter()
                .enumerate()
                .filter(|(_, ch)| ch.phase != ChannelPhase::Done)
                .map(|(i, _)| i)
                .collect();
            if watched.is_empty() {
                break;
            }

            let ready = {
                let handles: Vec<&C> = watched.iter().map(|&i| &self.channels[i].channel).collect();
                poller.wait(&handles).map_err(|source| EngineError::Wait { source })?
            };
            trace!(watched = watched.len(), ready = ready.len(), "wait returned");

            for pos in ready {
                if let Some(&idx) = watched.get(pos) {
                    self.drain(idx)?;
                }
            }
        }

        clock.stop();
        let elapsed = clock.elapsed();
        info!(elapsed_secs = elapsed.as_secs_f64(), "run complete");

        Ok(RunReport::new(
            self.config.block_size,
            self.ceiling,
            elapsed,
            self.channels.iter().map(|ch| (ch.path.as_str(), ch.done, ch.failed)),
        ))
    }

    /// Submit until the channel hits its ceiling or has its whole target in flight.
    fn fill(&mut self, idx: usize) -> Result<(), EngineError> {
        let target = self.config.count;
        let ceiling = self.ceiling;
        let block_size = self.config.block_size;
        let direction = self.config.direction;
        let options = self.options;
        let ch = &mut self.channels[idx];

        if ch.phase == ChannelPhase::Done {
            return Ok(());
        }

        while ch.outstanding() < ceiling && ch.done + ch.outstanding() < target {
            let seq = ch.done + ch.outstanding();
            let offset = wrap_offset(block_size, seq, ch.capacity);

            let (tag, hdr) = ch
                .pool
                .prepare(direction, offset, options)
                .map_err(|source| EngineError::Encode { device: ch.path.clone(), offset, source })?
                .ok_or_else(|| EngineError::PoolExhausted { device: ch.path.clone() })?;

            ch.channel
                .submit(&hdr)
                .map_err(|source| EngineError::Submit { device: ch.path.clone(), source })?;
            ch.submitted += 1;
            ch.phase = ChannelPhase::Submitting;
            trace!(device = %ch.path, tag, offset, outstanding = ch.outstanding(), "submitted");
        }

        debug_assert!(ch.outstanding() <= ceiling);
        debug_assert!(ch.done + ch.outstanding() <= target);
        Ok(())
    }

    /// Retire everything the channel has completed.
    fn drain(&mut self, idx: usize) -> Result<(), EngineError> {
        let target = self.config.count;
        let direction = self.config.direction;
        let Self { channels, completions, .. } = self;
        let ch = &mut channels[idx];

        let n = ch
            .channel
            .reap(completions)
            .map_err(|source| EngineError::Reap { device: ch.path.clone(), source })?;
        trace!(device = %ch.path, n, "reaped");

        for hdr in &completions[..n] {
            let tag = hdr.usr_ptr;
            let status = CompletionStatus::from_wire(hdr, direction);
            let sense = if status.is_success() {
                None
            } else {
                ch.pool.sense(tag, hdr.response_len).and_then(SenseData::parse)
            };

            let retired = ch
                .pool
                .retire(tag)
                .ok_or_else(|| EngineError::UnknownTag { device: ch.path.clone(), tag })?;
            ch.done += 1;

            if !status.is_success() {
                ch.failed += 1;
                match sense {
                    Some(sense) => warn!(
                        device = %ch.path,
                        offset = retired.offset,
                        %status,
                        %sense,
                        "request completed with error status"
                    ),
                    None => warn!(
                        device = %ch.path,
                        offset = retired.offset,
                        %status,
                        "request completed with error status"
                    ),
                }
            }
        }

        debug_assert!(ch.done + ch.outstanding() <= target);
        ch.phase = if ch.done == target {
            debug!(device = %ch.path, done = ch.done, failed = ch.failed, "channel finished");
            ChannelPhase::Done
        } else {
            ChannelPhase::Draining
        };
        Ok(())
    }
}
