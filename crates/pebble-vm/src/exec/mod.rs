//! The execution unit: register file, dispatch loop, and GC pacing (spec
//! §4.6 "Execution unit", §4.7 "Main loop").

mod call;
pub mod ops;

use crate::error::VmError;
use crate::event::{EventEntry, EventQueue};
use crate::frame::Frame;
use crate::system::SystemInterface;
use call::CallOutcome;
use pebble_common_core::atom::{well_known, AtomId};
use pebble_common_core::call_return::{CallReturnValue, ErrorCode};
use pebble_common_core::instruction::{Instruction, Opcode};
use pebble_common_core::mad::Mad;
use pebble_heap::object::{HeapObject, MaterObject};
use pebble_heap::upvalue::UpValueRef;
use pebble_heap::value::Value;
use pebble_heap::{AtomTable, Heap, LiteralTable, ProgramData};

/// Runtime errors exceeding this count abort the program (spec §7 "after 30
/// runtime errors the VM stops the task").
const MAX_RUNTIME_ERRORS: u32 = 30;

/// How many dispatched instructions between cooperative yield checks (spec
/// §4.7 step 2, "periodically ... yield back to the scheduler").
const YIELD_CHECK_INTERVAL: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Finished,
    Terminated,
    Yielded(CallReturnValue),
}

/// One script's register file, call stack, heap, and event queue (spec §3
/// "Execution unit"). Generic over the host callback surface so tests can
/// swap in [`crate::system::TestSystemInterface`].
pub struct Vm<S: SystemInterface> {
    pub(crate) heap: Heap,
    pub(crate) atoms: AtomTable,
    pub(crate) literals: LiteralTable,
    pub(crate) globals: Mad<HeapObject>,
    pub(crate) stack: Vec<Value>,
    pub(crate) frames: Vec<Frame>,
    pub(crate) open_upvalues: Vec<UpValueRef>,
    pub(crate) events: EventQueue,
    executing_event: bool,
    terminate_requested: bool,
    runtime_error_count: u32,
    dispatch_count: u32,
    pub system: S,
}

impl<S: SystemInterface> Vm<S> {
    /// Builds a fresh execution unit from a loaded program (spec §4.3
    /// "Loading"). The program's root function, which `ProgramData` keeps
    /// outside the object arena during compilation, is heap-allocated here
    /// like any other `Function` — by this point the arena-exemption that
    /// matters only to the parser's own GC rooting is moot.
    pub fn new(mut heap: Heap, program: ProgramData, system: S) -> Self {
        let max_registers = program.root.max_registers;
        let root_handle = heap.alloc_object(HeapObject::Function(program.root));
        let globals = program.globals;
        let frame = Frame::new(root_handle, None, Value::None, 0, Vec::new());
        Self {
            heap,
            atoms: program.atoms,
            literals: program.literals,
            globals,
            stack: vec![Value::None; max_registers as usize],
            frames: vec![frame],
            open_upvalues: Vec::new(),
            events: EventQueue::new(),
            executing_event: false,
            terminate_requested: false,
            runtime_error_count: 0,
            dispatch_count: 0,
            system,
        }
    }

    pub fn push_event(&mut self, func: Value, this: Value, args: Vec<Value>) {
        self.events.push(EventEntry { func, this, args });
    }

    pub fn request_terminate(&mut self) {
        self.terminate_requested = true;
    }

    /// Installs (or overwrites) a global binding — how `pebble-stdlib`
    /// registers its native functions (spec §6.2) before the first `run`.
    /// `name` is atomized through the same table the program was compiled
    /// against, so it resolves to whatever `AtomId` the script's own
    /// references to that identifier already use.
    pub fn set_global(&mut self, name: &str, value: Value) -> Result<(), pebble_heap::AtomError> {
        let atom = self.atoms.atomize(name)?;
        self.store_global(atom, value);
        Ok(())
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Runs until the script finishes, is terminated, or a native call
    /// yields control back to the scheduler (spec §4.7 "Main loop").
    pub fn run(&mut self) -> RunOutcome {
        loop {
            if self.terminate_requested {
                return RunOutcome::Terminated;
            }
            if self.frames.is_empty() {
                if self.executing_event {
                    self.stack.pop();
                    self.executing_event = false;
                }
                if self.events.is_empty() {
                    return RunOutcome::Finished;
                }
                if let Some(outcome) = self.drain_event() {
                    return outcome;
                }
                continue;
            }
            self.maybe_step_gc();
            if let Some(outcome) = self.dispatch_one() {
                return outcome;
            }
        }
    }

    fn drain_event(&mut self) -> Option<RunOutcome> {
        let entry = self.events.pop()?;
        self.executing_event = true;
        let nargs = entry.args.len() as u8;
        for arg in entry.args {
            self.stack.push(arg);
        }
        match self.do_call(entry.func, entry.this, nargs) {
            CallOutcome::Entered => None,
            CallOutcome::Done => {
                self.stack.pop();
                self.executing_event = false;
                None
            }
            CallOutcome::Yield(cr) => {
                self.stack.pop();
                self.executing_event = false;
                Some(RunOutcome::Yielded(cr))
            }
        }
    }

    fn dispatch_one(&mut self) -> Option<RunOutcome> {
        self.dispatch_count = self.dispatch_count.wrapping_add(1);
        if self.dispatch_count % YIELD_CHECK_INTERVAL == 0 && !self.events.is_empty() && !self.executing_event {
            return Some(RunOutcome::Yielded(CallReturnValue::Yield));
        }

        let frame_idx = self.frames.len() - 1;
        let pc = self.frames[frame_idx].pc;
        let instr = match self.heap.object(self.frames[frame_idx].function).and_then(|o| o.as_function()) {
            Some(func) => match func.code.get(pc) {
                Some(i) => *i,
                None => Instruction::rn(Opcode::Ret, 0, 0),
            },
            None => {
                self.runtime_error(ErrorCode::InternalError);
                return Some(RunOutcome::Terminated);
            }
        };
        self.frames[frame_idx].pc += 1;
        self.execute(instr)
    }

    fn execute(&mut self, instr: Instruction) -> Option<RunOutcome> {
        use Opcode::*;
        match instr.opcode() {
            Move => {
                let v = self.decode_operand(instr.b());
                self.set_register(instr.a(), v);
            }
            LoadRefK => {
                let atom = self.atom_constant(instr.b());
                let v = self.load_ref(atom);
                self.set_register(instr.a(), v);
            }
            StoreFK => {
                let atom = self.atom_constant(instr.b());
                let v = self.register(instr.a());
                self.store_global(atom, v);
            }
            LoadLitA => {
                let handle = self.heap.alloc_object(HeapObject::Mater(MaterObject::new_array()));
                self.set_register(instr.n() as u8, Value::Object(handle));
            }
            LoadLitO => {
                let handle = self.heap.alloc_object(HeapObject::Mater(MaterObject::new_plain()));
                self.set_register(instr.n() as u8, Value::Object(handle));
            }
            LoadProp => {
                let obj = self.decode_operand(instr.b());
                let atom = self.atom_constant(instr.c());
                let v = self.read_prop(&obj, atom);
                self.set_register(instr.a(), v);
            }
            LoadElt => {
                let obj = self.decode_operand(instr.b());
                let idx = self.decode_operand(instr.c());
                let v = self.read_elt(&obj, &idx);
                self.set_register(instr.a(), v);
            }
            StoProp => {
                let obj = self.register(instr.a());
                let atom = self.atom_constant(instr.b());
                let value = self.decode_operand(instr.c());
                self.write_prop(&obj, atom, value);
            }
            StoElt => {
                let obj = self.register(instr.a());
                let idx = self.decode_operand(instr.b());
                let value = self.decode_operand(instr.c());
                self.write_elt(&obj, &idx, value);
            }
            AppendElt => {
                let arr = self.register(instr.a());
                let elem = self.decode_operand(instr.c());
                if let Value::Object(handle) = arr {
                    if let Some(m) = self.heap.object_mut(handle).and_then(|o| o.as_mater_mut()) {
                        m.append_elt(elem);
                    }
                }
            }
            AppendProp => {
                let obj = self.register(instr.a());
                let atom = self.atom_constant(instr.b());
                let value = self.decode_operand(instr.c());
                if let Value::Object(handle) = obj {
                    if let Some(m) = self.heap.object_mut(handle).and_then(|o| o.as_mater_mut()) {
                        m.append_prop(atom, value);
                    }
                }
            }
            LoadTrue => self.set_register(instr.a(), Value::Bool(true)),
            LoadFalse => self.set_register(instr.a(), Value::Bool(false)),
            LoadNull => self.set_register(instr.a(), Value::Null),
            LoadThis => {
                let this = self.frames.last().unwrap().this_value.clone();
                self.set_register(instr.n() as u8, this);
            }
            LoadUp => {
                let v = self.read_upvalue(instr.imm17_unsigned() as usize);
                self.set_register(instr.n() as u8, v);
            }
            StoreUp => {
                let value = self.register(instr.imm17_unsigned() as u8);
                self.write_upvalue(instr.n() as usize, value);
            }
            Push => {
                let v = self.register(instr.n() as u8);
                self.stack.push(v);
            }
            Pop => {
                let v = self.stack.pop().unwrap_or(Value::None);
                self.set_register(instr.n() as u8, v);
            }

            Lor => self.binary(instr, ops::lor),
            Land => self.binary(instr, ops::land),
            Or => self.binary(instr, ops::bitor),
            And => self.binary(instr, ops::bitand),
            Xor => self.binary(instr, ops::bitxor),
            Shl => self.binary(instr, ops::shl),
            Shr => self.binary(instr, ops::shr),
            Sar => self.binary(instr, ops::sar),
            Sub => self.binary(instr, ops::sub),
            Mul => self.binary(instr, ops::mul),
            Div => self.binary(instr, ops::div),
            Mod => self.binary(instr, ops::modulo),
            Add => {
                let l = self.register(instr.b() as u8);
                let r = self.register(instr.c() as u8);
                let v = ops::add(&l, &r, &mut self.heap, &mut self.literals);
                self.set_register(instr.a(), v);
            }
            Eq => self.equality(instr, true),
            Ne => self.equality(instr, false),
            Lt => self.ordering(instr, |o| o == std::cmp::Ordering::Less),
            Le => self.ordering(instr, |o| o != std::cmp::Ordering::Greater),
            Gt => self.ordering(instr, |o| o == std::cmp::Ordering::Greater),
            Ge => self.ordering(instr, |o| o != std::cmp::Ordering::Less),

            UMinus => {
                let v = self.register(instr.b() as u8);
                let r = ops::negate(&v);
                self.set_register(instr.a(), r);
            }
            UNot => {
                let v = self.register(instr.b() as u8);
                let r = ops::not(&v);
                self.set_register(instr.a(), r);
            }
            UNeg => {
                let v = self.register(instr.b() as u8);
                let r = ops::bitnot(&v);
                self.set_register(instr.a(), r);
            }
            PreInc => self.incdec(instr, ops::increment, true),
            PreDec => self.incdec(instr, ops::decrement, true),
            PostInc => self.incdec(instr, ops::increment, false),
            PostDec => self.incdec(instr, ops::decrement, false),

            Jmp => {
                let off = instr.imm17_signed();
                self.jump(off);
            }
            Jt => {
                let cond = self.register(instr.n() as u8);
                if cond.is_truthy() {
                    self.jump(instr.imm17_signed());
                }
            }
            Jf => {
                let cond = self.register(instr.n() as u8);
                if !cond.is_truthy() {
                    self.jump(instr.imm17_signed());
                }
            }
            Call => {
                let callee = self.decode_operand(instr.rcall());
                let this = self.resolve_call_this(instr.rthis());
                if let Some(outcome) = self.finish_call(self.do_call(callee, this, instr.nparams())) {
                    return Some(outcome);
                }
            }
            CallProp => {
                let outcome = self.exec_callprop(instr.rcall(), instr.rthis(), instr.nparams());
                if let Some(outcome) = self.finish_call(outcome) {
                    return Some(outcome);
                }
            }
            New => {
                let outcome = self.exec_new(instr.rcall(), instr.nparams());
                if let Some(outcome) = self.finish_call(outcome) {
                    return Some(outcome);
                }
            }
            Closure => {
                self.exec_closure(instr.n() as u8, instr.imm17_unsigned() as u16);
            }
            Ret => {
                self.exec_ret(instr.n());
            }
            End => {
                self.exec_ret(0);
            }
            LineNo => {}
        }
        None
    }

    /// `CALL`/`CALLPROP`/`NEW` share this: entering a scripted frame means
    /// "keep dispatching, now inside the callee"; anything else means "the
    /// call already resolved, move on" (or "yield to the scheduler").
    fn finish_call(&mut self, outcome: CallOutcome) -> Option<RunOutcome> {
        match outcome {
            CallOutcome::Entered | CallOutcome::Done => None,
            CallOutcome::Yield(cr) => Some(RunOutcome::Yielded(cr)),
        }
    }

    fn binary(&mut self, instr: Instruction, f: impl Fn(&Value, &Value) -> Value) {
        let l = self.register(instr.b() as u8);
        let r = self.register(instr.c() as u8);
        let v = f(&l, &r);
        self.set_register(instr.a(), v);
    }

    fn equality(&mut self, instr: Instruction, want_equal: bool) {
        let l = self.register(instr.b() as u8);
        let r = self.register(instr.c() as u8);
        let eq = ops::values_equal(&l, &r, &self.heap, &self.literals);
        self.set_register(instr.a(), Value::Bool(eq == want_equal));
    }

    fn ordering(&mut self, instr: Instruction, f: impl Fn(std::cmp::Ordering) -> bool) {
        let l = self.register(instr.b() as u8);
        let r = self.register(instr.c() as u8);
        let v = f(ops::compare(&l, &r, &self.heap, &self.literals));
        self.set_register(instr.a(), Value::Bool(v));
    }

    /// `PREINC`/`PREDEC`/`POSTINC`/`POSTDEC` (spec §4.6): the l-value has
    /// already been baked into register `b` by codegen; the opcode reads
    /// it, computes the new value, writes the new value back into `b` (so
    /// a subsequent `STOREFK`/`STOPROP`/`STOELT`/`STOREUP` persists it),
    /// and writes either the new (`pre_`) or old (`post_`) value into `a`.
    fn incdec(&mut self, instr: Instruction, f: impl Fn(&Value) -> Value, pre: bool) {
        let old = self.register(instr.b() as u8);
        let new = f(&old);
        self.set_register(instr.b() as u8, new.clone());
        self.set_register(instr.a(), if pre { new } else { old });
    }

    fn jump(&mut self, offset: i32) {
        let frame = self.frames.last_mut().unwrap();
        frame.pc = (frame.pc as i64 + offset as i64) as usize;
    }

    pub(crate) fn decode_operand(&self, slot: u16) -> Value {
        if slot < pebble_common_core::instruction::FIRST_CONSTANT_SLOT {
            self.register(slot as u8)
        } else {
            self.current_function_constant(slot).cloned().unwrap_or(Value::None)
        }
    }

    pub(crate) fn current_function_constant(&self, slot: u16) -> Option<&Value> {
        let func = self.frames.last()?.function;
        self.heap.object(func)?.as_function()?.constant(slot)
    }

    fn atom_constant(&self, slot: u16) -> AtomId {
        match self.current_function_constant(slot) {
            Some(Value::Id(a)) => *a,
            _ => well_known::EMPTY,
        }
    }

    fn register(&self, reg: u8) -> Value {
        let bp = self.frames.last().unwrap().bp;
        self.stack[bp + reg as usize].clone()
    }

    fn set_register(&mut self, reg: u8, value: Value) {
        let bp = self.frames.last().unwrap().bp;
        self.stack[bp + reg as usize] = value;
    }

    fn current_line(&self) -> u32 {
        let frame = self.frames.last().unwrap();
        self.heap
            .object(frame.function)
            .and_then(|o| o.as_function())
            .map(|f| f.line_for(frame.pc.saturating_sub(1)))
            .unwrap_or(0)
    }

    /// Resolves a global-variable read (spec §4.6 `LOADREFK`). Misses
    /// synthesize the `arguments` built-in from the current frame's actual
    /// arguments (spec §8 boundary behavior); any other miss is
    /// `undefined`, not an error, matching loose-language lookup semantics.
    fn load_ref(&mut self, atom: AtomId) -> Value {
        if let Some(v) = self.lookup_prop(self.globals, atom) {
            return v;
        }
        if atom == well_known::ARGUMENTS {
            let args = self.frames.last().unwrap().args.clone();
            let handle = self.heap.alloc_object(HeapObject::Mater(MaterObject {
                proto: None,
                properties: Default::default(),
                elements: Some(args),
            }));
            return Value::Object(handle);
        }
        Value::None
    }

    fn store_global(&mut self, atom: AtomId, value: Value) {
        if let Some(m) = self.heap.object_mut(self.globals).and_then(|o| o.as_mater_mut()) {
            m.set_prop(atom, value);
        }
    }

    /// Walks the proto chain (spec §3 "property lookup climbs `proto`").
    pub(crate) fn lookup_prop(&self, start: Mad<HeapObject>, atom: AtomId) -> Option<Value> {
        let mut cur = Some(start);
        while let Some(handle) = cur {
            let obj = self.heap.object(handle)?.as_mater()?;
            if let Some(v) = obj.get_prop(atom) {
                return Some(v.clone());
            }
            cur = obj.proto;
        }
        None
    }

    fn read_prop(&mut self, obj: &Value, atom: AtomId) -> Value {
        match obj {
            Value::Object(handle) => {
                if atom == well_known::LENGTH {
                    if let Some(m) = self.heap.object(*handle).and_then(|o| o.as_mater()) {
                        if m.is_array() {
                            return Value::Integer(m.len() as i32);
                        }
                    }
                }
                self.lookup_prop(*handle, atom).unwrap_or(Value::None)
            }
            _ => Value::None,
        }
    }

    fn read_elt(&mut self, obj: &Value, idx: &Value) -> Value {
        let i = match idx {
            Value::Integer(i) if *i >= 0 => *i as usize,
            _ => return Value::None,
        };
        match obj {
            Value::Object(handle) => self
                .heap
                .object(*handle)
                .and_then(|o| o.as_mater())
                .and_then(|m| m.get_elt(i))
                .cloned()
                .unwrap_or(Value::None),
            // Indexing a string yields the char code at that byte offset
            // (spec §8: `"abc"[1]` -> the code of `'b'`, out-of-range -> undefined).
            Value::String(_) | Value::StringLiteral(_) => {
                ops::string_form(obj, &self.heap, &self.literals)
                    .and_then(|s| s.as_bytes().get(i).copied())
                    .map(|b| Value::Integer(b as i32))
                    .unwrap_or(Value::None)
            }
            _ => Value::None,
        }
    }

    fn write_prop(&mut self, obj: &Value, atom: AtomId, value: Value) {
        if let Value::Object(handle) = obj {
            if let Some(m) = self.heap.object_mut(*handle).and_then(|o| o.as_mater_mut()) {
                if atom == well_known::LENGTH && m.is_array() {
                    if let Value::Integer(n) = value {
                        if n >= 0 {
                            m.set_length(n as usize);
                        }
                    }
                    return;
                }
                m.set_prop(atom, value);
            }
        }
    }

    fn write_elt(&mut self, obj: &Value, idx: &Value, value: Value) {
        let Value::Object(handle) = obj else { return };
        let i = match idx {
            Value::Integer(i) if *i >= 0 => *i as usize,
            _ => return,
        };
        if let Some(m) = self.heap.object_mut(*handle).and_then(|o| o.as_mater_mut()) {
            m.set_elt(i, value);
        }
    }

    fn read_upvalue(&self, idx: usize) -> Value {
        let closure = match self.frames.last().unwrap().closure {
            Some(h) => h,
            None => return Value::None,
        };
        let Some(uv) = self
            .heap
            .object(closure)
            .and_then(|o| o.as_closure())
            .and_then(|c| c.upvalues.get(idx))
        else {
            return Value::None;
        };
        match &*uv.0.borrow() {
            pebble_heap::upvalue::UpValueState::Open { stack_index } => self.stack[*stack_index].clone(),
            pebble_heap::upvalue::UpValueState::Closed(v) => v.clone(),
        }
    }

    fn write_upvalue(&mut self, idx: usize, value: Value) {
        let closure = match self.frames.last().unwrap().closure {
            Some(h) => h,
            None => return,
        };
        let uv = self
            .heap
            .object(closure)
            .and_then(|o| o.as_closure())
            .and_then(|c| c.upvalues.get(idx))
            .cloned();
        let Some(uv) = uv else { return };
        let mut state = uv.0.borrow_mut();
        match &mut *state {
            pebble_heap::upvalue::UpValueState::Open { stack_index } => {
                let idx = *stack_index;
                drop(state);
                self.stack[idx] = value;
            }
            pebble_heap::upvalue::UpValueState::Closed(v) => *v = value,
        }
    }

    pub(crate) fn runtime_error(&mut self, code: ErrorCode) {
        self.runtime_error_count += 1;
        let line = self.current_line();
        self.system.printf(&format!("runtime error at line {line}: {code:?}\n"));
        if self.runtime_error_count > MAX_RUNTIME_ERRORS {
            self.terminate_requested = true;
        }
    }

    /// Steps the collector a bounded amount of work per call (spec §4.1
    /// "incremental, resumable mark-sweep ... never a stop-the-world
    /// pause"), or starts a new cycle once the heap crosses its threshold.
    fn maybe_step_gc(&mut self) {
        if self.heap.gc_phase() != pebble_heap::GcPhase::Idle {
            if !self.heap.step() {
                self.heap.note_cycle_complete();
            }
            return;
        }
        if self.heap.should_collect() {
            let mut active_roots: Vec<Value> = self.stack.clone();
            for frame in &self.frames {
                active_roots.push(Value::Object(frame.function));
                if let Some(closure) = frame.closure {
                    active_roots.push(Value::Object(closure));
                }
                active_roots.push(frame.this_value.clone());
                if let Some(instance) = &frame.new_instance {
                    active_roots.push(instance.clone());
                }
            }
            active_roots.extend(self.events.iter_values().cloned());
            let static_roots = vec![Value::Object(self.globals)];
            self.heap.begin_collect(active_roots, static_roots);
        }
    }
}

impl<S: SystemInterface> Vm<S> {
    /// Loads and runs a fresh program end to end; a convenience used by
    /// tests and `pebble-cli`'s `run` subcommand.
    pub fn load_and_run(source: &str, file: pebble_common::FileId, heap: Heap, system: S) -> Result<RunOutcome, VmError> {
        let compiled = pebble_codegen::compile(source, file)?;
        let mut heap = heap;
        let program = crate::loader::load_program(compiled, &mut heap);
        let mut vm = Vm::new(heap, program, system);
        Ok(vm.run())
    }
}

/// Lets a host multiplex several execution units on one
/// [`crate::scheduler::Scheduler`] (spec §4.8): each `run()` call advances
/// this script to its next yield point, and the returned `RunOutcome`
/// tells the scheduler when to come back.
impl<S: SystemInterface> crate::scheduler::Task for Vm<S> {
    fn execute(&mut self) -> crate::scheduler::TaskOutcome {
        match self.run() {
            RunOutcome::Finished => crate::scheduler::TaskOutcome::Finished,
            RunOutcome::Terminated => crate::scheduler::TaskOutcome::Terminated,
            RunOutcome::Yielded(CallReturnValue::MsDelay(ms)) => crate::scheduler::TaskOutcome::MsDelay(ms),
            RunOutcome::Yielded(CallReturnValue::WaitForEvent) => crate::scheduler::TaskOutcome::WaitForEvent,
            RunOutcome::Yielded(_) => crate::scheduler::TaskOutcome::Yield,
        }
    }
}
