//! Formal Verification Specifications for bsgbench
//!
//! Design-by-contract specifications using Verus-style pre/postconditions
//! for request addressing and per-channel queue accounting.
//!
//! # Examples
//!
//! ```rust,ignore
//! use crate::verification_specs::request_contracts;
//! assert!(request_contracts::is_sector_aligned(4096));
//! ```
//!
//! ```rust,ignore
//! use crate::verification_specs::queue_contracts;
//! assert!(queue_contracts::may_submit(0, 1, 2, 4));
//! ```

use bsgbench_core::SECTOR_SIZE;

/// Request addressing invariants
///
/// #[invariant(offset % SECTOR_SIZE == 0)]
/// #[invariant(len % SECTOR_SIZE == 0)]
/// #[requires(block_size > 0 && block_size % SECTOR_SIZE == 0)]
/// #[ensures(result < capacity)]
pub mod request_contracts {
    use super::SECTOR_SIZE;

    /// #[ensures(result == true ==> value % SECTOR_SIZE == 0)]
    pub fn is_sector_aligned(value: u64) -> bool {
        value % SECTOR_SIZE == 0
    }

    /// #[requires(block_size > 0)]
    /// #[requires(capacity >= block_size)]
    /// #[ensures(result + block_size <= capacity)]
    /// #[ensures(result % block_size == 0)]
    pub fn offset_in_bounds(offset: u64, block_size: u64, capacity: u64) -> bool {
        offset % block_size == 0 && offset.checked_add(block_size).is_some_and(|end| end <= capacity)
    }
}

/// Per-channel queue invariants
///
/// #[invariant(outstanding <= ceiling)]
/// #[invariant(done + outstanding <= target)]
/// #[requires(ceiling > 0 && ceiling <= target)]
/// #[decreases(target - done)]
pub mod queue_contracts {
    /// #[ensures(result == true ==> outstanding + 1 <= ceiling)]
    /// #[ensures(result == true ==> done + outstanding + 1 <= target)]
    pub fn may_submit(done: u64, outstanding: u64, ceiling: u64, target: u64) -> bool {
        outstanding < ceiling && done + outstanding < target
    }

    /// #[ensures(result == (outstanding <= ceiling && done + outstanding <= target))]
    pub fn within_bounds(done: u64, outstanding: u64, ceiling: u64, target: u64) -> bool {
        outstanding <= ceiling && done + outstanding <= target
    }

    /// #[ensures(result == true ==> outstanding == 0)]
    pub fn is_finished(done: u64, outstanding: u64, target: u64) -> bool {
        done == target && outstanding == 0
    }
}


// ─── Kani Proof Stubs ────────────────────────────────────────────
// Model-checking proofs for critical invariants
// Requires: cargo install --locked kani-verifier

#[cfg(kani)]
mod kani_proofs {
    use bsgbench_core::cdb::wrap_offset;

    #[kani::proof]
    fn verify_wrap_offset_in_bounds() {
        let blocks: u64 = kani::any();
        kani::assume(blocks > 0 && blocks <= 128);
        let block_size = blocks * 512;
        let capacity: u64 = kani::any();
        kani::assume(capacity >= block_size && capacity <= 1 << 40);
        let seq: u64 = kani::any();
        let offset = wrap_offset(block_size, seq, capacity);
        assert!(offset % block_size == 0);
        assert!(offset + block_size <= capacity);
    }

    #[kani::proof]
    fn verify_submit_keeps_bounds() {
        let ceiling: u64 = kani::any();
        let target: u64 = kani::any();
        let done: u64 = kani::any();
        let outstanding: u64 = kani::any();
        kani::assume(ceiling > 0 && ceiling <= target && target <= 1 << 20);
        kani::assume(done + outstanding <= target && outstanding <= ceiling);
        if super::queue_contracts::may_submit(done, outstanding, ceiling, target) {
            assert!(super::queue_contracts::within_bounds(done, outstanding + 1, ceiling, target));
        }
    }
}
