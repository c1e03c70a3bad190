//! End-to-end scenarios (spec §8 "End-to-end scenarios"): each compiles a
//! small script, runs it on a [`TestSystemInterface`], and checks the
//! console output byte for byte.

use pebble_common::FileId;
use pebble_common_core::call_return::CallReturnValue;
use pebble_heap::native::NativeContext;
use pebble_heap::value::Value;
use pebble_heap::Heap;
use pebble_vm::system::TestSystemInterface;
use pebble_vm::{RunOutcome, Vm};
use std::cell::RefCell;

const HEAP_BYTES: usize = 256 * 1024;

fn native_println(ctx: &mut dyn NativeContext) -> CallReturnValue {
    if ctx.nparams() >= 1 {
        let s = ctx.stringify(&ctx.arg(0));
        ctx.print(&s);
    }
    ctx.print("\n");
    CallReturnValue::ReturnCount(0)
}

fn native_delay(ctx: &mut dyn NativeContext) -> CallReturnValue {
    let ms = match ctx.arg(0) {
        Value::Integer(n) if n >= 0 => n as u32,
        _ => 0,
    };
    CallReturnValue::MsDelay(ms)
}

thread_local! {
    /// Stand-in for a host-side event source (e.g. a GPIO interrupt) that
    /// remembers which scripted callback to fire later, since a bare
    /// `NativeFn` has no captured environment of its own.
    static REGISTERED_CALLBACK: RefCell<Option<(Value, Value)>> = const { RefCell::new(None) };
}

fn native_on_tick(ctx: &mut dyn NativeContext) -> CallReturnValue {
    let cb = ctx.arg(0);
    let this = ctx.this_value();
    REGISTERED_CALLBACK.with(|slot| *slot.borrow_mut() = Some((cb, this)));
    CallReturnValue::ReturnCount(0)
}

fn build_vm(source: &str) -> Vm<TestSystemInterface> {
    let compiled = pebble_codegen::compile(source, FileId::DUMMY).expect("compiles");
    let mut heap = Heap::new(HEAP_BYTES);
    let program = pebble_vm::load_program(compiled, &mut heap);
    let mut vm = Vm::new(heap, program, TestSystemInterface::new());
    vm.set_global("println", Value::NativeFunction(native_println)).unwrap();
    vm.set_global("delay", Value::NativeFunction(native_delay)).unwrap();
    vm.set_global("on_tick", Value::NativeFunction(native_on_tick)).unwrap();
    vm
}

fn run_to_completion(vm: &mut Vm<TestSystemInterface>) {
    loop {
        match vm.run() {
            RunOutcome::Finished => return,
            RunOutcome::Terminated => panic!("VM terminated unexpectedly"),
            RunOutcome::Yielded(CallReturnValue::MsDelay(_)) => continue,
            RunOutcome::Yielded(other) => panic!("unexpected yield: {other:?}"),
        }
    }
}

#[test]
fn hello() {
    let mut vm = build_vm(r#"println("hello");"#);
    run_to_completion(&mut vm);
    assert_eq!(vm.system.output, "hello\n");
}

#[test]
fn closure_counter() {
    let source = r#"
        function mk() {
            var n = 0;
            return function() { return ++n; };
        }
        var c = mk();
        println(c());
        println(c());
        println(c());
    "#;
    let mut vm = build_vm(source);
    run_to_completion(&mut vm);
    assert_eq!(vm.system.output, "1\n2\n3\n");
}

#[test]
fn recursion() {
    let source = r#"
        function f(n) { if (n < 2) return n; return f(n - 1) + f(n - 2); }
        println(f(10));
    "#;
    let mut vm = build_vm(source);
    run_to_completion(&mut vm);
    assert_eq!(vm.system.output, "55\n");
}

#[test]
fn array_operations() {
    let source = r#"
        var a = [1, 2, 3];
        a.push_back(4);
        println(a.join(","));
    "#;
    let mut vm = build_vm(source);
    run_to_completion(&mut vm);
    assert_eq!(vm.system.output, "1,2,3,4\n");
}

#[test]
fn event_callback() {
    let source = r#"
        function cb() { println("tick"); }
        on_tick(cb);
        delay(50);
    "#;
    let mut vm = build_vm(source);

    // Drive the script to its delay yield, same as the scheduler would.
    loop {
        match vm.run() {
            RunOutcome::Yielded(CallReturnValue::MsDelay(_)) => break,
            RunOutcome::Finished => panic!("script finished before yielding on delay"),
            other => panic!("unexpected outcome before delay: {other:?}"),
        }
    }

    let (cb, this) = REGISTERED_CALLBACK.with(|slot| slot.borrow_mut().take()).expect("callback registered");
    for _ in 0..3 {
        vm.push_event(cb.clone(), this.clone(), Vec::new());
    }
    run_to_completion(&mut vm);
    assert_eq!(vm.system.output, "tick\ntick\ntick\n");
}

#[test]
fn class_and_new() {
    let source = r#"
        class P {
            constructor(x) { this.x = x; }
            get() { return this.x; }
        }
        var p = new P(7);
        println(p.get());
    "#;
    let mut vm = build_vm(source);
    run_to_completion(&mut vm);
    assert_eq!(vm.system.output, "7\n");
}
