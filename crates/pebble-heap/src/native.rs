//! Native function / native object contracts (spec §6.2).
//!
//! Defined in this crate (rather than `pebble-vm`) because [`Value`] needs
//! to name the `NativeFn` and `NativeObject` types directly. `pebble-vm`'s
//! execution unit implements [`NativeContext`]; native functions never see
//! the execution unit's concrete type, only this trait, which is how a
//! native crate like `pebble-stdlib` stays decoupled from the VM.

use crate::value::Value;
use pebble_common_core::call_return::CallReturnValue;
use std::fmt;

/// What a native function is handed: access to its arguments, to `this`,
/// and to the heap, plus a place to push return values.
///
/// Spec: "Arguments are read from `eu.stack.top(1 - nparams)` ...
/// `eu.stack.top(0)`." `arg(0)` here is the first argument (bottom of the
/// pushed range), matching that ordering.
pub trait NativeContext {
    fn nparams(&self) -> u8;
    fn arg(&self, index: u8) -> Value;
    fn this_value(&self) -> Value;
    fn push_return(&mut self, value: Value);
    fn heap_mut(&mut self) -> &mut crate::heap::Heap;

    /// Forward to the host's `SystemInterface::printf` (spec §6.1/§6.2).
    /// Named here rather than exposing the execution unit's system handle
    /// directly, so a native crate depends only on this trait.
    fn print(&mut self, s: &str);

    /// A value's display form, resolving string literals/heap strings
    /// through the execution unit's tables. Exposed as one call so native
    /// code never needs simultaneous heap + literal-table borrows.
    fn stringify(&self, v: &Value) -> String;
}

/// `(eu, thisValue, nparams) -> CallReturnValue` (spec §6.2).
pub type NativeFn = fn(&mut dyn NativeContext) -> CallReturnValue;

/// A host-implemented opaque object (Base64 codec state, a TCP socket,
/// ...). Only the contract is specified here; concrete implementations are
/// out of scope for the core engine (spec §1).
pub trait NativeObject: fmt::Debug {
    fn type_name(&self) -> &'static str;

    /// Mark any `Value`s this native object holds, so the GC can trace
    /// through it (most native objects hold none).
    fn gc_mark(&self, _heap: &mut crate::heap::Heap) {}
}
