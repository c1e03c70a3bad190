//! Turns codegen's plain data tree into live heap objects (spec §3:
//! "`Function` and `Closure` are heap objects reachable from the
//! `Program`'s constants table ... during parsing, the Program is
//! registered as a GC root so partial compilation output is not
//! reclaimed"). Loading happens after parsing completes, so there is no
//! partial-output root to protect here — the whole `CompiledProgram` is
//! either fully loaded or not touched at all.

use pebble_codegen::{CompiledFunction, CompiledProgram, ConstantValue};
use pebble_heap::object::{FunctionObj, HeapObject, MaterObject};
use pebble_heap::value::Value;
use pebble_heap::{Heap, ProgramData};

/// Loads a compiled program's root function (and, transitively, every
/// nested function literal reachable from its constants table) into
/// `heap`, and allocates a fresh empty globals object.
pub fn load_program(compiled: CompiledProgram, heap: &mut Heap) -> ProgramData {
    let globals = heap.alloc_object(HeapObject::Mater(MaterObject::new_plain()));
    let root = load_function(compiled.root, heap);
    ProgramData::new(compiled.atoms, compiled.literals, root, globals)
}

fn load_function(compiled: CompiledFunction, heap: &mut Heap) -> FunctionObj {
    let constants = compiled
        .constants
        .into_iter()
        .map(|c| load_constant(c, heap))
        .collect();
    FunctionObj {
        name: compiled.name,
        nparams: compiled.nparams,
        nlocals: compiled.nlocals,
        max_registers: compiled.max_registers,
        code: compiled.code,
        constants,
        upvalue_descs: compiled.upvalue_descs,
        lines: compiled.lines,
    }
}

fn load_constant(value: ConstantValue, heap: &mut Heap) -> Value {
    match value {
        ConstantValue::Sentinel => Value::None,
        ConstantValue::Int(i) => Value::Integer(i),
        ConstantValue::Float(f) => Value::Float(f),
        ConstantValue::Str(lit) => Value::StringLiteral(lit),
        ConstantValue::Id(id) => Value::Id(id),
        ConstantValue::Function(boxed) => {
            let func = load_function(*boxed, heap);
            Value::Object(heap.alloc_object(HeapObject::Function(func)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_nested_function_constants() {
        let compiled = pebble_codegen::compile(
            "function f(x) { return x + 1; } var g = f;",
            pebble_common::FileId::DUMMY,
        )
        .unwrap();
        let mut heap = Heap::new(64 * 1024);
        let program = load_program(compiled, &mut heap);
        assert!(program
            .root
            .constants
            .iter()
            .any(|c| matches!(c, Value::Object(_))));
    }
}
