//! Command encoding, descriptor layout and run statistics for bsg benchmarks.
//!
//! This crate holds the pieces of the benchmark that do not touch a device:
//! the `sg_io_v4` wire layout, the READ(10)/WRITE(10) request builder, the
//! completion status gate and the throughput aggregator.
//!
//! # Example
//!
//! ```
//! use bsgbench_core::{cdb, descriptor, Direction, DescriptorOptions, SENSE_BUFFER_LEN};
//!
//! let mut cmd = [0u8; 10];
//! let mut sense = [0u8; SENSE_BUFFER_LEN];
//! let mut data = vec![0u8; 512];
//!
//! let hdr = descriptor::build_rw(
//!     Direction::Read,
//!     1024,
//!     &mut cmd,
//!     &mut sense,
//!     &mut data,
//!     DescriptorOptions::default(),
//!     0,
//! )
//! .unwrap();
//!
//! let fields = cdb::decode_rw10(&cmd).unwrap();
//! assert_eq!(fields.lba, 2);
//! assert_eq!(fields.blocks, 1);
//! assert_eq!(hdr.din_xfer_len, 512);
//! ```

#![deny(missing_docs)]
#![deny(clippy::panic)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::cast_possible_truncation, clippy::cast_precision_loss)]

pub mod cdb;
mod config;
pub mod descriptor;
mod error;
pub mod stats;
#[allow(missing_docs)]
pub mod sys;
pub mod validate;

pub use cdb::{Capacity, Direction, InquiryData};
pub use config::BenchConfig;
pub use descriptor::{DataBuffer, DescriptorOptions};
pub use error::{Error, Result};
pub use stats::{DeviceThroughput, RunClock, RunReport};
pub use sys::{SgIoV4, MAX_DEVICES, SECTOR_SIZE, SENSE_BUFFER_LEN, SG_IO_V4_LEN};
pub use validate::{CompletionStatus, SenseData};
