//! Per-channel request slots
//!
//! Every in-flight request owns one slot: its command block, sense buffer and
//! a `block_size` window of a single page-aligned anonymous mapping. Slots are
//! addressed by tag; the tag travels through the driver in `usr_ptr` so a
//! completion can be matched to the buffers it used.

use bsgbench_core::descriptor::{self, DescriptorOptions, Rw10Cdb};
use bsgbench_core::sys::{RW10_CDB_LEN, SENSE_BUFFER_LEN};
use bsgbench_core::{Direction, SgIoV4};
use nix::libc::{self, mmap, munmap, MAP_ANONYMOUS, MAP_PRIVATE, PROT_READ, PROT_WRITE};
use std::io;
use std::ptr::null_mut;

#[derive(Debug, Clone, Copy)]
struct Slot {
    cdb: Rw10Cdb,
    sense: [u8; SENSE_BUFFER_LEN],
    offset: u64,
    busy: bool,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            cdb: [0; RW10_CDB_LEN],
            sense: [0; SENSE_BUFFER_LEN],
            offset: 0,
            busy: false,
        }
    }
}

/// A request slot handed back on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retired {
    pub tag: usize,
    pub offset: u64,
}

/// Fixed set of request slots backed by one data mapping.
pub struct RequestPool {
    slots: Box<[Slot]>,
    free: Vec<usize>,
    data: *mut u8,
    data_len: usize,
    block_size: usize,
}

impl RequestPool {
    /// Allocate `depth` slots of `block_size` bytes each.
    ///
    /// Write payloads are pre-filled with a per-slot byte pattern.
    pub fn new(depth: usize, block_size: usize) -> io::Result<Self> {
        if depth == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("pool depth {depth} out of range"),
            ));
        }
        let data_len = depth
            .checked_mul(block_size)
            .filter(|&len| len > 0)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "pool size overflow"))?;

        let data = unsafe {
            mmap(
                null_mut(),
                data_len,
                PROT_READ | PROT_WRITE,
                MAP_PRIVATE | MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if data == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        let mut pool = Self {
            slots: vec![Slot::default(); depth].into_boxed_slice(),
            // Pop from the back so tag 0 is handed out first.
            free: (0..depth).rev().collect(),
            data: data.cast::<u8>(),
            data_len,
            block_size,
        };
        for tag in 0..depth {
            pool.data_mut(tag).fill(0xa5 ^ tag as u8);
        }
        Ok(pool)
    }

    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    pub fn in_flight(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Claim a free slot and build the descriptor for a request at `offset`.
    ///
    /// Returns `Ok(None)` when every slot is in flight.
    pub fn prepare(
        &mut self,
        direction: Direction,
        offset: u64,
        options: DescriptorOptions,
    ) -> bsgbench_core::Result<Option<(usize, SgIoV4)>> {
        let Some(tag) = self.free.pop() else {
            return Ok(None);
        };
        let data = self.data_ptr(tag);
        let block_size = self.block_size;
        let slot = &mut self.slots[tag];
        // SAFETY: `data` addresses this slot's private window of the mapping,
        // which no other live borrow overlaps.
        let buf = unsafe { std::slice::from_raw_parts_mut(data, block_size) };

        match descriptor::build_rw(
            direction,
            offset,
            &mut slot.cdb,
            &mut slot.sense,
            buf,
            options,
            tag as u64,
        ) {
            Ok(hdr) => {
                slot.offset = offset;
                slot.busy = true;
                Ok(Some((tag, hdr)))
            }
            Err(e) => {
                self.free.push(tag);
                Err(e)
            }
        }
    }

    /// Sense bytes the driver reported for the in-flight request `tag`.
    pub fn sense(&self, tag: u64, response_len: u32) -> Option<&[u8]> {
        let slot = self.busy_slot(tag)?;
        let len = (response_len as usize).min(SENSE_BUFFER_LEN);
        Some(&slot.sense[..len])
    }

    /// Return the slot named by a completion's correlation tag.
    ///
    /// Returns `None` if the tag does not name an in-flight slot.
    pub fn retire(&mut self, tag: u64) -> Option<Retired> {
        let slot = self.busy_slot(tag)?;
        let offset = slot.offset;
        let tag = tag as usize;
        let slot = &mut self.slots[tag];
        slot.busy = false;
        slot.sense = [0; SENSE_BUFFER_LEN];
        self.free.push(tag);
        Some(Retired { tag, offset })
    }

    fn busy_slot(&self, tag: u64) -> Option<&Slot> {
        let idx = usize::try_from(tag).ok()?;
        self.slots.get(idx).filter(|slot| slot.busy)
    }

    fn data_ptr(&self, tag: usize) -> *mut u8 {
        // SAFETY: tag < depth, so the window lies inside the mapping.
        unsafe { self.data.add(tag * self.block_size) }
    }

    fn data_mut(&mut self, tag: usize) -> &mut [u8] {
        let ptr = self.data_ptr(tag);
        // SAFETY: exclusive borrow of self; the window is inside the mapping.
        unsafe { std::slice::from_raw_parts_mut(ptr, self.block_size) }
    }
}

impl Drop for RequestPool {
    fn drop(&mut self) {
        unsafe {
            munmap(self.data.cast::<libc::c_void>(), self.data_len);
        }
    }
}

impl std::fmt::Debug for RequestPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPool")
            .field("depth", &self.slots.len())
            .field("in_flight", &self.in_flight())
            .field("block_size", &self.block_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsgbench_core::cdb::decode_rw10;
    use std::collections::HashSet;

    #[test]
    fn test_new_rejects_zero_depth() {
        assert!(RequestPool::new(0, 512).is_err());
        assert!(RequestPool::new(4, 0).is_err());
    }

    #[test]
    fn test_prepare_hands_out_distinct_buffers() {
        let mut pool = RequestPool::new(4, 4096).unwrap();
        let mut tags = HashSet::new();
        let mut bufs = HashSet::new();
        for n in 0..4u64 {
            let (tag, hdr) = pool
                .prepare(Direction::Read, n * 4096, DescriptorOptions::default())
                .unwrap()
                .unwrap();
            assert_eq!(hdr.usr_ptr, tag as u64);
            assert_eq!(hdr.din_xfer_len, 4096);
            assert!(tags.insert(tag));
            assert!(bufs.insert(hdr.din_xferp));
        }
        assert_eq!(pool.in_flight(), 4);
        assert!(pool.prepare(Direction::Read, 0, DescriptorOptions::default()).unwrap().is_none());
    }

    #[test]
    fn test_data_windows_are_page_aligned_and_disjoint() {
        let mut pool = RequestPool::new(3, 8192).unwrap();
        let mut addrs: Vec<u64> = (0..3)
            .map(|_| {
                let (_, hdr) = pool
                    .prepare(Direction::Write, 0, DescriptorOptions::default())
                    .unwrap()
                    .unwrap();
                hdr.dout_xferp
            })
            .collect();
        addrs.sort_unstable();
        assert_eq!(addrs[0] % 4096, 0);
        assert_eq!(addrs[1] - addrs[0], 8192);
        assert_eq!(addrs[2] - addrs[1], 8192);
    }

    #[test]
    fn test_cdb_pointer_targets_slot_command() {
        let mut pool = RequestPool::new(1, 1024).unwrap();
        let (_, hdr) = pool
            .prepare(Direction::Read, 2048, DescriptorOptions::default())
            .unwrap()
            .unwrap();
        let cdb = unsafe { std::slice::from_raw_parts(hdr.request as *const u8, 10) };
        let fields = decode_rw10(cdb).unwrap();
        assert_eq!(fields.lba, 4);
        assert_eq!(fields.blocks, 2);
    }

    #[test]
    fn test_retire_frees_slot_once() {
        let mut pool = RequestPool::new(2, 512).unwrap();
        let (tag, _) = pool
            .prepare(Direction::Read, 1536, DescriptorOptions::default())
            .unwrap()
            .unwrap();
        let retired = pool.retire(tag as u64).unwrap();
        assert_eq!(retired, Retired { tag, offset: 1536 });
        assert_eq!(pool.in_flight(), 0);
        assert!(pool.retire(tag as u64).is_none());
    }

    #[test]
    fn test_depth_beyond_sixteen_bit_tags() {
        let mut pool = RequestPool::new(70_000, 512).unwrap();
        assert_eq!(pool.depth(), 70_000);
        let mut last = None;
        while let Some((tag, hdr)) = pool.prepare(Direction::Read, 0, DescriptorOptions::default()).unwrap() {
            assert_eq!(hdr.usr_ptr, tag as u64);
            last = Some(tag);
        }
        assert_eq!(last, Some(69_999));
        assert_eq!(pool.retire(69_999).unwrap().tag, 69_999);
        assert_eq!(pool.in_flight(), 69_999);
    }

    #[test]
    fn test_retire_unknown_tag() {
        let mut pool = RequestPool::new(2, 512).unwrap();
        assert!(pool.retire(7).is_none());
        assert!(pool.retire(u64::MAX).is_none());
    }

    #[test]
    fn test_prepare_error_returns_slot() {
        let mut pool = RequestPool::new(1, 512).unwrap();
        assert!(pool.prepare(Direction::Read, 100, DescriptorOptions::default()).is_err());
        assert_eq!(pool.in_flight(), 0);
        assert!(pool.prepare(Direction::Read, 0, DescriptorOptions::default()).unwrap().is_some());
    }

    #[test]
    fn test_sense_limited_to_response_len() {
        let mut pool = RequestPool::new(1, 512).unwrap();
        let (tag, _) = pool.prepare(Direction::Read, 0, DescriptorOptions::default()).unwrap().unwrap();
        assert_eq!(pool.sense(tag as u64, 18).unwrap().len(), 18);
        assert_eq!(pool.sense(tag as u64, 200).unwrap().len(), SENSE_BUFFER_LEN);
        pool.retire(tag as u64);
        assert!(pool.sense(tag as u64, 18).is_none());
    }
}
