//! Heap-resident objects (spec §3): plain objects/arrays, function
//! templates, and closures. Modeled as one closed enum in one arena rather
//! than trait objects, matching spec §9's "the object kinds are fixed and
//! small; prefer a closed enum dispatched with `match` over a trait object
//! with dynamic dispatch".

use crate::upvalue::UpValueRef;
use crate::value::Value;
use indexmap::IndexMap;
use pebble_common_core::atom::AtomId;
use pebble_common_core::instruction::Instruction;
use pebble_common_core::mad::Mad;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpValueSource {
    /// Captures a local register of the immediately enclosing function.
    ParentLocal(u8),
    /// Captures an upvalue already held by the immediately enclosing
    /// closure, forwarding it rather than re-resolving the stack.
    ParentUpValue(u8),
}

#[derive(Debug, Clone, Copy)]
pub struct UpValueDesc {
    pub name: AtomId,
    pub source: UpValueSource,
}

/// A plain object or a dense array, distinguished by `elements`.
///
/// Properties keep insertion order (`for..in` and `Object.keys` both rely on
/// this per spec §3), so an [`IndexMap`] stands in for the source's
/// insertion-ordered hash table.
#[derive(Debug, Default)]
pub struct MaterObject {
    pub proto: Option<Mad<HeapObject>>,
    pub properties: IndexMap<AtomId, Value>,
    /// `Some` for array objects; dense, zero-based, grows by append.
    pub elements: Option<Vec<Value>>,
}

impl MaterObject {
    pub fn new_plain() -> Self {
        Self::default()
    }

    pub fn new_array() -> Self {
        MaterObject {
            proto: None,
            properties: IndexMap::new(),
            elements: Some(Vec::new()),
        }
    }

    pub fn is_array(&self) -> bool {
        self.elements.is_some()
    }

    pub fn get_prop(&self, atom: AtomId) -> Option<&Value> {
        self.properties.get(&atom)
    }

    pub fn set_prop(&mut self, atom: AtomId, value: Value) {
        self.properties.insert(atom, value);
    }

    pub fn append_prop(&mut self, atom: AtomId, value: Value) {
        self.properties.insert(atom, value);
    }

    pub fn get_elt(&self, index: usize) -> Option<&Value> {
        self.elements.as_ref().and_then(|e| e.get(index))
    }

    pub fn set_elt(&mut self, index: usize, value: Value) {
        if let Some(elements) = self.elements.as_mut() {
            if index >= elements.len() {
                elements.resize_with(index + 1, || Value::None);
            }
            elements[index] = value;
        }
    }

    pub fn append_elt(&mut self, value: Value) {
        if let Some(elements) = self.elements.as_mut() {
            elements.push(value);
        }
    }

    pub fn len(&self) -> usize {
        self.elements.as_ref().map_or(0, Vec::len)
    }

    /// Resizes the backing array to `new_len`, padding with `Value::None`
    /// (spec §8: "assigning `a.length = n` resizes"). A no-op on a plain
    /// (non-array) object.
    pub fn set_length(&mut self, new_len: usize) {
        if let Some(elements) = self.elements.as_mut() {
            elements.resize_with(new_len, || Value::None);
        }
    }
}

/// A compiled function template: code, constants, and capture
/// descriptors. Immutable once emitted by codegen; shared by every
/// `Closure` created from it.
#[derive(Debug)]
pub struct FunctionObj {
    pub name: AtomId,
    pub nparams: u8,
    pub nlocals: u8,
    pub max_registers: u8,
    pub code: Vec<Instruction>,
    pub constants: Vec<Value>,
    pub upvalue_descs: Vec<UpValueDesc>,
    /// Source line for each instruction, parallel to `code`, for
    /// `LineNo`-free backtraces and disassembly (spec §4.4 diagnostics).
    pub lines: Vec<u32>,
}

impl FunctionObj {
    /// Resolves a register-or-constant operand (spec §4.6: slots `>= 256`
    /// index the constants table) to the constant it names.
    pub fn constant(&self, slot: u16) -> Option<&Value> {
        let idx = slot.checked_sub(pebble_common_core::instruction::FIRST_CONSTANT_SLOT)?;
        self.constants.get(idx as usize)
    }

    pub fn line_for(&self, pc: usize) -> u32 {
        self.lines.get(pc).copied().unwrap_or(0)
    }
}

/// A function template bound to a set of captured upvalues. What
/// `Value::Object` actually points to when the codegen-emitted `CLOSURE`
/// instruction runs (spec §3: "a Function plus a vector of upvalue cells
/// and a captured `this` value").
#[derive(Debug)]
pub struct ClosureObj {
    pub function: Mad<HeapObject>,
    pub upvalues: Vec<UpValueRef>,
    /// `this` at the point the closure was created (spec §4.6 "`CLOSURE`
    /// ... binds `this` to the current `this`"). Call dispatch itself
    /// always uses the call site's `this` (§4.6 `CALL`/`CALLPROP`); this
    /// field exists for data-model fidelity and is traced by the GC.
    pub this: Value,
}

#[derive(Debug)]
pub enum HeapObject {
    Mater(MaterObject),
    Function(FunctionObj),
    Closure(ClosureObj),
}

impl HeapObject {
    pub fn as_mater(&self) -> Option<&MaterObject> {
        match self {
            HeapObject::Mater(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mater_mut(&mut self) -> Option<&mut MaterObject> {
        match self {
            HeapObject::Mater(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionObj> {
        match self {
            HeapObject::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_closure(&self) -> Option<&ClosureObj> {
        match self {
            HeapObject::Closure(c) => Some(c),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            HeapObject::Mater(m) if m.is_array() => "Array",
            HeapObject::Mater(_) => "Object",
            HeapObject::Function(_) => "Function",
            HeapObject::Closure(_) => "Function",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_append_and_index() {
        let mut arr = MaterObject::new_array();
        arr.append_elt(Value::Integer(1));
        arr.append_elt(Value::Integer(2));
        assert_eq!(arr.len(), 2);
        assert!(matches!(arr.get_elt(0), Some(Value::Integer(1))));
    }

    #[test]
    fn plain_object_properties_preserve_insertion_order() {
        let mut obj = MaterObject::new_plain();
        obj.set_prop(AtomId::new(300), Value::Integer(1));
        obj.set_prop(AtomId::new(301), Value::Integer(2));
        let keys: Vec<_> = obj.properties.keys().copied().collect();
        assert_eq!(keys, vec![AtomId::new(300), AtomId::new(301)]);
    }
}
