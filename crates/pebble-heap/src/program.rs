//! `Program` — the host-owned compilation unit (spec §3: "a Function that
//! is also the root of the atom and literal tables").
//!
//! Unlike `MaterObject`/`Closure`, a program is never itself garbage; it
//! owns the roots the collector starts from, so it lives outside the object
//! arena, directly on whatever owns the `Heap`.

use crate::atoms::AtomTable;
use crate::literals::LiteralTable;
use crate::object::{FunctionObj, HeapObject};
use pebble_common_core::mad::Mad;

pub struct ProgramData {
    pub atoms: AtomTable,
    pub literals: LiteralTable,
    /// The top-level function body, run first with an empty call stack.
    pub root: FunctionObj,
    /// The global object; every top-level `var`/function declaration is a
    /// property of it.
    pub globals: Mad<HeapObject>,
}

impl ProgramData {
    pub fn new(atoms: AtomTable, literals: LiteralTable, root: FunctionObj, globals: Mad<HeapObject>) -> Self {
        Self {
            atoms,
            literals,
            root,
            globals,
        }
    }
}
