//! Property-based tests for invariants

use bsgbench::bsgbench_core::cdb::{decode_rw10, encode_rw10, wrap_offset};
use bsgbench::verification_specs::{queue_contracts, request_contracts};
use bsgbench::Direction;

#[test]
fn test_wrapped_offsets_stay_in_device() {
    for blocks in [1u64, 2, 7, 8, 128] {
        let bs = blocks * 512;
        for capacity in [bs, bs * 3 + 512, 1 << 20, (1 << 20) + 4096] {
            for seq in 0..200 {
                let offset = wrap_offset(bs, seq, capacity);
                assert!(
                    request_contracts::offset_in_bounds(offset, bs, capacity),
                    "bs {bs} capacity {capacity} seq {seq} -> {offset}"
                );
            }
        }
    }
}

#[test]
fn test_encode_preserves_addressing() {
    for lba in [0u64, 1, 255, 256, 65_535, 65_536, 0xdead_beef] {
        for blocks in [1u64, 8, 255, 256, 65_535] {
            let cdb = encode_rw10(Direction::Read, blocks * 512, lba * 512).unwrap();
            let f = decode_rw10(&cdb).unwrap();
            assert_eq!(u64::from(f.lba), lba);
            assert_eq!(u64::from(f.blocks), blocks);
        }
    }
}

#[test]
fn test_unaligned_requests_rejected() {
    for bad in [1u64, 100, 511, 513, 4095] {
        assert!(encode_rw10(Direction::Read, bad, 0).is_err());
        assert!(encode_rw10(Direction::Read, 512, bad).is_err());
    }
}

#[test]
fn test_fill_loop_respects_bounds() {
    // Model the submission loop for every small ceiling/target pair.
    for target in 1u64..=12 {
        for ceiling in 1u64..=target {
            let (mut done, mut outstanding) = (0u64, 0u64);
            while !queue_contracts::is_finished(done, outstanding, target) {
                while queue_contracts::may_submit(done, outstanding, ceiling, target) {
                    outstanding += 1;
                }
                assert!(queue_contracts::within_bounds(done, outstanding, ceiling, target));
                // Retire one per wait, the slowest possible progress.
                outstanding -= 1;
                done += 1;
            }
            assert_eq!(done, target);
        }
    }
}
