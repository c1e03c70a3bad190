//! Reference native set (spec §6, "Reference native set"): just enough
//! host functionality to run the end-to-end scenarios, not the full host
//! object catalogue. Registers a fixed table of name -> native fn pairs
//! against the execution unit.

use pebble_common_core::call_return::CallReturnValue;
use pebble_heap::native::NativeContext;
use pebble_heap::value::Value;
use pebble_heap::AtomError;
use pebble_vm::system::SystemInterface;
use pebble_vm::Vm;

/// Registers every native this crate provides as a global on `vm`.
///
/// Safe to call right after [`Vm::new`]: `set_global` atomizes through the
/// same `AtomTable` the program was compiled against, so the identifiers
/// the bytecode already references resolve to these natives.
pub fn register<S: SystemInterface>(vm: &mut Vm<S>) -> Result<(), AtomError> {
    vm.set_global("println", Value::NativeFunction(println))?;
    vm.set_global("print", Value::NativeFunction(print))?;
    vm.set_global("delay", Value::NativeFunction(delay))?;
    Ok(())
}

fn println(ctx: &mut dyn NativeContext) -> CallReturnValue {
    print_value(ctx);
    ctx.print("\n");
    CallReturnValue::ReturnCount(0)
}

fn print(ctx: &mut dyn NativeContext) -> CallReturnValue {
    print_value(ctx);
    CallReturnValue::ReturnCount(0)
}

fn print_value(ctx: &mut dyn NativeContext) {
    if ctx.nparams() == 0 {
        return;
    }
    let v = ctx.arg(0);
    let s = ctx.stringify(&v);
    ctx.print(&s);
}

/// `delay(ms)` — yields the calling task for `ms` milliseconds (spec §4.8).
fn delay(ctx: &mut dyn NativeContext) -> CallReturnValue {
    let ms = match ctx.arg(0) {
        Value::Integer(n) if n >= 0 => n as u32,
        Value::Float(n) if n >= 0.0 => n as u32,
        _ => 0,
    };
    CallReturnValue::MsDelay(ms)
}
