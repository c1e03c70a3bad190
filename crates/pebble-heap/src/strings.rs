//! Runtime (GC-managed) string storage, backed by the block allocator.

use crate::allocator::BlockAllocator;
use pebble_common_core::mad::Mad;
use rustc_hash::FxHashMap;

/// Marker type for `Mad<HeapString>` handles.
pub struct HeapString;

struct Record {
    start_block: u16,
    len_blocks: u16,
    len_bytes: u32,
    marked: bool,
}

pub struct StringHeap {
    alloc: BlockAllocator,
    bytes: Vec<u8>,
    records: FxHashMap<u16, Record>,
}

impl StringHeap {
    pub fn new(heap_bytes: usize) -> Self {
        let alloc = BlockAllocator::new(heap_bytes);
        let total = alloc.total_bytes();
        Self {
            alloc,
            bytes: vec![0u8; total],
            records: FxHashMap::default(),
        }
    }

    /// Allocates and copies `s`. Returns the null handle on exhaustion.
    pub fn alloc(&mut self, s: &str) -> Mad<HeapString> {
        let Some((start, len_blocks)) = self.alloc.alloc(s.len()) else {
            return Mad::null();
        };
        let block_size = self.alloc.block_size();
        let byte_off = start as usize * block_size;
        self.bytes[byte_off..byte_off + s.len()].copy_from_slice(s.as_bytes());
        self.records.insert(
            start,
            Record {
                start_block: start,
                len_blocks,
                len_bytes: s.len() as u32,
                marked: false,
            },
        );
        Mad::from_raw(start)
    }

    pub fn get(&self, handle: Mad<HeapString>) -> Option<&str> {
        let rec = self.records.get(&handle.raw())?;
        let block_size = self.alloc.block_size();
        let off = rec.start_block as usize * block_size;
        core::str::from_utf8(&self.bytes[off..off + rec.len_bytes as usize]).ok()
    }

    pub fn clear_marks(&mut self) {
        for rec in self.records.values_mut() {
            rec.marked = false;
        }
    }

    pub fn mark(&mut self, handle: Mad<HeapString>) {
        if let Some(rec) = self.records.get_mut(&handle.raw()) {
            rec.marked = true;
        }
    }

    pub fn sweep(&mut self) {
        let dead: Vec<(u16, u16)> = self
            .records
            .values()
            .filter(|r| !r.marked)
            .map(|r| (r.start_block, r.len_blocks))
            .collect();
        for (start, len) in dead {
            self.records.remove(&start);
            self.alloc.free(start, len);
        }
    }

    pub fn live_count(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_read_back() {
        let mut heap = StringHeap::new(4096);
        let h = heap.alloc("hello");
        assert_eq!(heap.get(h), Some("hello"));
    }

    #[test]
    fn unmarked_strings_are_swept() {
        let mut heap = StringHeap::new(4096);
        let keep = heap.alloc("keep");
        let drop_me = heap.alloc("drop");
        heap.clear_marks();
        heap.mark(keep);
        heap.sweep();
        assert_eq!(heap.get(keep), Some("keep"));
        assert_eq!(heap.get(drop_me), None);
    }
}
