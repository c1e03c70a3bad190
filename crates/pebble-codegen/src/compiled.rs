//! Output of codegen: a plain data tree with no heap dependency. Turning a
//! [`CompiledFunction`] into a live `FunctionObj`/`Closure` pair is a
//! concern of the crate that owns a `Heap` (`pebble-vm`), not of codegen
//! itself — a clean boundary between "what codegen produces" and "what the
//! runtime loads".

use pebble_common_core::atom::AtomId;
use pebble_common_core::instruction::Instruction;
use pebble_heap::literals::StringLiteral;
use pebble_heap::object::UpValueDesc;
use pebble_heap::{AtomTable, LiteralTable};

#[derive(Debug, Clone)]
pub enum ConstantValue {
    /// Reserved slot 0 in every function's constants table (spec §8: "each
    /// emitted Function's constants vector begins with an inert error
    /// sentinel, so index 0 is reserved and safe to reference"). Also
    /// doubles as the `rthis` sentinel meaning "use the current `this`"
    /// for plain (non-method) calls.
    Sentinel,
    Int(i32),
    Float(f32),
    Str(StringLiteral),
    Id(AtomId),
    /// A nested function literal, compiled but not yet materialized into
    /// the heap.
    Function(Box<CompiledFunction>),
}

#[derive(Debug)]
pub struct CompiledFunction {
    pub name: AtomId,
    pub nparams: u8,
    pub nlocals: u8,
    pub max_registers: u8,
    pub code: Vec<Instruction>,
    pub lines: Vec<u32>,
    pub constants: Vec<ConstantValue>,
    pub upvalue_descs: Vec<UpValueDesc>,
}

pub struct CompiledProgram {
    pub root: CompiledFunction,
    pub atoms: AtomTable,
    pub literals: LiteralTable,
}
