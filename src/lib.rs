//! # bsgbench
//!
//! Asynchronous block I/O benchmarking over the Linux bsg (`sg_io_v4`)
//! interface.
//!
//! This is the workspace root crate that re-exports core functionality.
//! For direct usage, depend on individual sub-crates:
//!
//! - [`bsgbench-core`] - Descriptor layout, READ(10)/WRITE(10) encoding,
//!   completion validation and throughput accounting
//! - [`bsg-bench`] - Device handles, request pool, submission/completion
//!   engine and the `bsg-bench` binary

pub use bsg_bench;
pub use bsgbench_core;

pub use bsg_bench::{Attached, Session};
pub use bsgbench_core::{BenchConfig, Direction, RunReport};

pub mod verification_specs;
