//! bsg-bench - asynchronous block I/O over the Linux bsg interface
//!
//! Opens bsg control nodes, sizes them with READ CAPACITY, and drives many
//! READ(10)/WRITE(10) requests per device from a single thread using
//! non-blocking descriptor writes and a `poll(2)` readiness wait.
//!
//! # Example
//!
//! ```no_run
//! use bsg_bench::device::{self, SyncMode};
//! use bsg_bench::engine::{Attached, PollPoller, Session};
//! use bsg_bench::probe;
//! use bsgbench_core::{BenchConfig, Direction};
//!
//! let config = BenchConfig {
//!     block_size: 4096,
//!     count: 1000,
//!     outstanding: 16,
//!     direction: Direction::Read,
//!     ..BenchConfig::default()
//! };
//!
//! let dev = device::open("/sys/class/bsg/0:0:0:0").unwrap();
//! let capacity = probe::probe(&dev, SyncMode::ReadWrite, config.descriptor_options()).unwrap();
//!
//! let mut session = Session::new(config, vec![Attached::new("sda", dev, capacity)]).unwrap();
//! let report = session.run(&mut PollPoller).unwrap();
//! print!("{}", report.to_text());
//! ```

pub mod device;
pub mod engine;
pub mod pool;
pub mod probe;

pub use device::{BsgDevice, DeviceError, DeviceProvider, SyncMode};
pub use engine::{Attached, Channel, ChannelPhase, EngineError, PollPoller, Poller, Session};
pub use pool::RequestPool;
