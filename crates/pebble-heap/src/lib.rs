//! Allocator, garbage collector, and object model for the scripting engine
//! (spec §3, §4.1, §9).

pub mod allocator;
pub mod arena;
pub mod atoms;
pub mod gc;
pub mod heap;
pub mod literals;
pub mod native;
pub mod object;
pub mod program;
pub mod strings;
pub mod upvalue;
pub mod value;

pub use atoms::{AtomError, AtomTable};
pub use gc::GcPhase;
pub use heap::{GcThresholds, Heap};
pub use literals::{LiteralTable, StringLiteral};
pub use native::{NativeContext, NativeFn, NativeObject};
pub use object::{
    ClosureObj, FunctionObj, HeapObject, MaterObject, UpValueDesc, UpValueSource,
};
pub use program::ProgramData;
pub use strings::HeapString;
pub use upvalue::{UpValueCell, UpValueRef, UpValueState};
pub use value::{StaticObject, Value};
