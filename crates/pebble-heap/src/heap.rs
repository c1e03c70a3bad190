//! `Heap` — owns every GC-managed allocation: the object arena and the
//! runtime string heap, plus the collector's phase state (spec §3, §4.1).

use crate::arena::Arena;
use crate::gc::{GcPhase, GcState};
use crate::object::HeapObject;
use crate::strings::{HeapString, StringHeap};
use pebble_common_core::mad::Mad;

/// Collection is triggered lazily: after `alloc_threshold_objects` new
/// objects or `alloc_threshold_bytes` new string bytes have been allocated
/// since the last cycle finished (spec §3 "trigger a collection when
/// allocation since the last cycle exceeds a configurable threshold, not on
/// every allocation").
pub struct GcThresholds {
    pub objects: u32,
    pub string_bytes: u32,
}

impl Default for GcThresholds {
    fn default() -> Self {
        Self {
            objects: 256,
            string_bytes: 16 * 1024,
        }
    }
}

pub struct Heap {
    pub(crate) objects: Arena<HeapObject>,
    pub(crate) strings: StringHeap,
    pub(crate) gc: GcState,
    thresholds: GcThresholds,
    objects_since_gc: u32,
    string_bytes_since_gc: u32,
}

impl Heap {
    pub fn new(heap_bytes: usize) -> Self {
        Self {
            objects: Arena::new(),
            strings: StringHeap::new(heap_bytes),
            gc: GcState::default(),
            thresholds: GcThresholds::default(),
            objects_since_gc: 0,
            string_bytes_since_gc: 0,
        }
    }

    pub fn with_thresholds(heap_bytes: usize, thresholds: GcThresholds) -> Self {
        let mut heap = Self::new(heap_bytes);
        heap.thresholds = thresholds;
        heap
    }

    pub fn alloc_object(&mut self, obj: HeapObject) -> Mad<HeapObject> {
        self.objects_since_gc += 1;
        self.objects.alloc(obj)
    }

    pub fn alloc_string(&mut self, s: &str) -> Mad<HeapString> {
        self.string_bytes_since_gc += s.len() as u32;
        self.strings.alloc(s)
    }

    pub fn objects(&self) -> &Arena<HeapObject> {
        &self.objects
    }

    pub fn object(&self, handle: Mad<HeapObject>) -> Option<&HeapObject> {
        self.objects.get(handle)
    }

    pub fn object_mut(&mut self, handle: Mad<HeapObject>) -> Option<&mut HeapObject> {
        self.objects.get_mut(handle)
    }

    pub fn string(&self, handle: Mad<HeapString>) -> Option<&str> {
        self.strings.get(handle)
    }

    pub fn gc_phase(&self) -> GcPhase {
        self.gc.phase()
    }

    /// Whether accumulated allocation since the last completed cycle
    /// crosses either threshold; the caller (execution unit) decides when
    /// to actually act on this, since only it knows whether a cycle is
    /// already running.
    pub fn should_collect(&self) -> bool {
        self.gc.is_idle()
            && (self.objects_since_gc >= self.thresholds.objects
                || self.string_bytes_since_gc >= self.thresholds.string_bytes)
    }

    pub fn note_cycle_complete(&mut self) {
        self.objects_since_gc = 0;
        self.string_bytes_since_gc = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_collect_trips_after_threshold() {
        let mut heap = Heap::with_thresholds(
            4096,
            GcThresholds {
                objects: 2,
                string_bytes: u32::MAX,
            },
        );
        assert!(!heap.should_collect());
        heap.alloc_object(HeapObject::Mater(crate::object::MaterObject::new_plain()));
        heap.alloc_object(HeapObject::Mater(crate::object::MaterObject::new_plain()));
        assert!(heap.should_collect());
    }
}
