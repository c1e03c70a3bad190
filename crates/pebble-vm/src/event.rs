//! Event queue (spec §3 "Event entry", §4.7 "Event entry").
//!
//! A `{func, this, args}` tuple flat-appended by native code (e.g. a timer
//! callback registration) and drained one per VM tick, between bytecode
//! instructions, so a long-running event handler can't starve the next
//! dispatch-boundary termination check.

use pebble_heap::value::Value;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct EventEntry {
    pub func: Value,
    pub this: Value,
    pub args: Vec<Value>,
}

#[derive(Debug, Default)]
pub struct EventQueue {
    entries: VecDeque<EventEntry>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: EventEntry) {
        self.entries.push_back(entry);
    }

    pub fn pop(&mut self) -> Option<EventEntry> {
        self.entries.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Every value reachable from queued events; a GC root (spec §3
    /// "live if reachable from ... the event queue").
    pub fn iter_values(&self) -> impl Iterator<Item = &Value> {
        self.entries
            .iter()
            .flat_map(|e| std::iter::once(&e.func).chain(std::iter::once(&e.this)).chain(e.args.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_fifo_order() {
        let mut q = EventQueue::new();
        q.push(EventEntry { func: Value::Integer(1), this: Value::None, args: vec![] });
        q.push(EventEntry { func: Value::Integer(2), this: Value::None, args: vec![] });
        assert!(matches!(q.pop().unwrap().func, Value::Integer(1)));
        assert!(matches!(q.pop().unwrap().func, Value::Integer(2)));
        assert!(q.pop().is_none());
    }
}
