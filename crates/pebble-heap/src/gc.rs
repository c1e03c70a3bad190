//! Mark-sweep collector, modeled as an explicit resumable state machine
//! rather than a single stop-the-world call (spec §3 GC, §9 "drive the
//! collector from an explicit phase enum the scheduler can step between
//! instructions, not a recursive mark that blocks the event loop").
//!
//! A full cycle visits phases in this order:
//! `ClearMarkedObj -> ClearMarkedStr -> MarkActive -> MarkStatic ->
//! SweepObj -> SweepStr -> Idle`. [`Heap::step`] advances exactly one unit of
//! work and returns whether the cycle is still running, so a caller (the
//! execution unit, between bytecode instructions) can interleave collection
//! with script execution instead of pausing it for a whole cycle.

use crate::heap::Heap;
use crate::object::HeapObject;
use crate::value::Value;
use pebble_common_core::mad::Mad;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcPhase {
    Idle,
    ClearMarkedObj,
    ClearMarkedStr,
    MarkActive,
    MarkStatic,
    SweepObj,
    SweepStr,
}

/// Collector state carried on [`Heap`]: the current phase, the mark
/// worklist ("grey set"), and the two root snapshots taken when a cycle
/// begins.
#[derive(Default)]
pub struct GcState {
    pub phase: Phase,
    grey: Vec<Mad<HeapObject>>,
    active_roots: Vec<Value>,
    static_roots: Vec<Value>,
}

/// Wrapper so `GcPhase` can have a `Default` without implying a meaningful
/// "default phase" anywhere else in the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase(pub GcPhase);

impl Default for Phase {
    fn default() -> Self {
        Phase(GcPhase::Idle)
    }
}

impl GcState {
    pub fn phase(&self) -> GcPhase {
        self.phase.0
    }

    pub fn is_idle(&self) -> bool {
        self.phase.0 == GcPhase::Idle
    }
}

impl Heap {
    /// Begins a collection cycle. `active_roots` are values reachable from
    /// the currently-running call stack and open upvalues (everything that
    /// can change between GC steps); `static_roots` are values that never
    /// change mid-cycle (the program's globals object, registered
    /// long-lived native roots). Calling this while a cycle is already
    /// running is a caller bug (spec: "the scheduler drives at most one
    /// collection at a time").
    pub fn begin_collect(&mut self, active_roots: Vec<Value>, static_roots: Vec<Value>) {
        assert!(self.gc.is_idle(), "GC cycle already in progress");
        self.gc.grey.clear();
        self.gc.active_roots = active_roots;
        self.gc.static_roots = static_roots;
        self.gc.phase.0 = GcPhase::ClearMarkedObj;
    }

    /// Advances the collector by one unit of work. Returns `true` if the
    /// cycle is still running (call again), `false` once it has returned to
    /// `Idle`.
    pub fn step(&mut self) -> bool {
        match self.gc.phase.0 {
            GcPhase::Idle => false,
            GcPhase::ClearMarkedObj => {
                self.objects.clear_marks();
                self.gc.phase.0 = GcPhase::ClearMarkedStr;
                true
            }
            GcPhase::ClearMarkedStr => {
                self.strings.clear_marks();
                let roots = core::mem::take(&mut self.gc.active_roots);
                for root in &roots {
                    self.mark_value(root);
                }
                self.gc.phase.0 = GcPhase::MarkActive;
                true
            }
            GcPhase::MarkActive => {
                if let Some(handle) = self.gc.grey.pop() {
                    self.mark_children(handle);
                } else {
                    let roots = core::mem::take(&mut self.gc.static_roots);
                    for root in &roots {
                        self.mark_value(root);
                    }
                    self.gc.phase.0 = GcPhase::MarkStatic;
                }
                true
            }
            GcPhase::MarkStatic => {
                if let Some(handle) = self.gc.grey.pop() {
                    self.mark_children(handle);
                } else {
                    self.gc.phase.0 = GcPhase::SweepObj;
                }
                true
            }
            GcPhase::SweepObj => {
                self.objects.sweep(|_obj| {});
                self.gc.phase.0 = GcPhase::SweepStr;
                true
            }
            GcPhase::SweepStr => {
                self.strings.sweep();
                self.gc.phase.0 = GcPhase::Idle;
                false
            }
        }
    }

    /// Runs a full cycle to completion. Convenience for callers (tests,
    /// `check`/`disasm` tooling) that don't need the incremental behavior.
    pub fn collect_now(&mut self, active_roots: Vec<Value>, static_roots: Vec<Value>) {
        self.begin_collect(active_roots, static_roots);
        while self.step() {}
    }

    fn mark_value(&mut self, value: &Value) {
        match value {
            Value::Object(handle) => {
                if self.objects.mark(*handle) {
                    self.gc.grey.push(*handle);
                }
            }
            Value::String(handle) => self.strings.mark(*handle),
            _ => {}
        }
    }

    fn mark_children(&mut self, handle: Mad<HeapObject>) {
        // Collect everything this object holds into an owned buffer first:
        // `mark_value` needs `&mut self`, so the borrow of `self.objects`
        // below must end before we call it.
        let Some(obj) = self.objects.get(handle) else {
            return;
        };
        let to_mark: Vec<Value> = match obj {
            HeapObject::Mater(mater) => {
                let mut vals: Vec<Value> = mater.properties.values().cloned().collect();
                if let Some(elements) = &mater.elements {
                    vals.extend(elements.iter().cloned());
                }
                if let Some(proto) = mater.proto {
                    vals.push(Value::Object(proto));
                }
                vals
            }
            HeapObject::Function(func) => func.constants.clone(),
            HeapObject::Closure(closure) => {
                let mut vals = vec![Value::Object(closure.function), closure.this.clone()];
                for uv in &closure.upvalues {
                    if let crate::upvalue::UpValueState::Closed(v) = &*uv.0.borrow() {
                        vals.push(v.clone());
                    }
                }
                vals
            }
        };
        for v in &to_mark {
            self.mark_value(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::MaterObject;

    #[test]
    fn unreferenced_object_is_collected() {
        let mut heap = Heap::new(4096);
        let garbage = heap.alloc_object(HeapObject::Mater(MaterObject::new_plain()));
        heap.collect_now(vec![], vec![]);
        assert!(heap.objects().get(garbage).is_none());
    }

    #[test]
    fn rooted_object_survives() {
        let mut heap = Heap::new(4096);
        let kept = heap.alloc_object(HeapObject::Mater(MaterObject::new_plain()));
        heap.collect_now(vec![Value::Object(kept)], vec![]);
        assert!(heap.objects().get(kept).is_some());
    }

    #[test]
    fn step_reaches_idle_and_reports_progress() {
        let mut heap = Heap::new(4096);
        heap.begin_collect(vec![], vec![]);
        let mut steps = 0;
        while heap.step() {
            steps += 1;
            assert!(steps < 10_000, "GC cycle did not terminate");
        }
        assert_eq!(heap.gc_phase(), GcPhase::Idle);
    }
}
