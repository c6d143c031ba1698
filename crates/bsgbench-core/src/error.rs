//! Error types for bsgbench-core.

use thiserror::Error;

/// Errors raised while building commands, decoding responses or validating
/// benchmark parameters.
#[derive(Debug, Error)]
pub enum Error {
    /// A byte quantity is not a whole number of sectors.
    #[error("{field} {value} is not a multiple of {sector} bytes", sector = crate::SECTOR_SIZE)]
    Unaligned {
        /// Name of the offending quantity.
        field: &'static str,
        /// Value supplied by the caller.
        value: u64,
    },

    /// A value does not fit the command field that carries it.
    #[error("{field} {value} exceeds the command limit of {max}")]
    OutOfRange {
        /// Name of the command field.
        field: &'static str,
        /// Value supplied by the caller.
        value: u64,
        /// Largest value the field can encode.
        max: u64,
    },

    /// A response payload is shorter than its fixed layout.
    #[error("response too short: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes needed.
        needed: usize,
        /// Bytes available.
        available: usize,
    },

    /// Benchmark parameters rejected before the run starts.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
