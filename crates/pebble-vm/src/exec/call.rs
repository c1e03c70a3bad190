//! `CALL`/`CALLPROP`/`NEW`, `CLOSURE`, and `RET` (spec §4.6/§4.7).

use crate::frame::Frame;
use crate::system::SystemInterface;
use crate::Vm;
use pebble_common_core::atom::{well_known, AtomId};
use pebble_common_core::call_return::{CallReturnValue, ErrorCode};
use pebble_common_core::mad::Mad;
use pebble_heap::native::NativeContext;
use pebble_heap::object::{ClosureObj, HeapObject, MaterObject, UpValueSource};
use pebble_heap::upvalue::UpValueCell;
use pebble_heap::value::Value;
use pebble_heap::Heap;

/// What handling a call/new did to the frame stack.
pub(crate) enum CallOutcome {
    /// A scripted frame was pushed; the dispatch loop resumes inside it
    /// instead of advancing the caller's PC.
    Entered,
    /// Handled entirely in-line (native call, or a call that could not be
    /// made); the caller keeps executing with one value already on the
    /// stack.
    Done,
    /// A native function returned a scheduler-level outcome (spec §6.4);
    /// propagate it up as this task's own suspension.
    Yield(CallReturnValue),
}

impl<S: SystemInterface> Vm<S> {
    /// Resolves `rthis`'s raw slot per the `CALL`/`NEW` convention: the
    /// sentinel constant slot (256) means "use the current `this`"
    /// (spec §4.6 "if `rthis` is not bound the VM uses the current
    /// `this`"); anything else is a register-or-constant operand.
    pub(crate) fn resolve_call_this(&self, rthis_raw: u16) -> Value {
        if rthis_raw == pebble_codegen::SENTINEL_SLOT {
            self.frames.last().map(|f| f.this_value.clone()).unwrap_or(Value::None)
        } else {
            self.decode_operand(rthis_raw)
        }
    }

    /// `n` arguments already sit on top of the stack (pushed by `PUSH`);
    /// `callee` is the already-resolved function/closure/native value.
    pub(crate) fn do_call(&mut self, callee: Value, this: Value, nargs: u8) -> CallOutcome {
        match callee {
            Value::Object(handle) => {
                // Read what kind of callable this is first, so the
                // borrow of `self.heap` ends before `enter_frame` needs
                // `&mut self`.
                let target = match self.heap.object(handle) {
                    Some(HeapObject::Function(_)) => Some((handle, None)),
                    Some(HeapObject::Closure(closure)) => Some((closure.function, Some(handle))),
                    _ => None,
                };
                match target {
                    Some((function, closure)) => {
                        self.enter_frame(function, closure, this, nargs);
                        CallOutcome::Entered
                    }
                    None => {
                        self.runtime_error(ErrorCode::CannotCall);
                        self.pop_args_push_undefined(nargs);
                        CallOutcome::Done
                    }
                }
            }
            Value::NativeFunction(f) => match self.call_native(f, this, nargs) {
                CallReturnValue::MsDelay(ms) => CallOutcome::Yield(CallReturnValue::MsDelay(ms)),
                CallReturnValue::WaitForEvent => CallOutcome::Yield(CallReturnValue::WaitForEvent),
                CallReturnValue::Yield => CallOutcome::Yield(CallReturnValue::Yield),
                _ => CallOutcome::Done,
            },
            _ => {
                self.runtime_error(ErrorCode::CannotCall);
                self.pop_args_push_undefined(nargs);
                CallOutcome::Done
            }
        }
    }

    /// `NEW rcall, n`: creates a fresh instance, wires its proto to the
    /// callee's `prototype` property (or, when absent, the callee object
    /// itself — our codegen's `class` bodies are a single `MaterObject`
    /// holding `constructor`/methods directly, so the class *is* the
    /// proto), runs the constructor against it, and always leaves the new
    /// instance on the stack (spec §9: "the newly-created object is
    /// always the result").
    pub(crate) fn exec_new(&mut self, callee_slot: u16, nargs: u8) -> CallOutcome {
        let callee = self.decode_operand(callee_slot);
        let Value::Object(handle) = callee else {
            self.runtime_error(ErrorCode::CannotCall);
            self.pop_args_push_undefined(nargs);
            return CallOutcome::Done;
        };
        let (proto, ctor) = match self.heap.object(handle).and_then(|o| o.as_mater()) {
            Some(mater) => {
                let proto = match mater.get_prop(well_known::PROTOTYPE) {
                    Some(Value::Object(p)) => *p,
                    _ => handle,
                };
                (proto, mater.get_prop(well_known::CONSTRUCTOR).cloned())
            }
            None => (handle, None),
        };
        let instance = self.heap.alloc_object(HeapObject::Mater(MaterObject {
            proto: Some(proto),
            properties: Default::default(),
            elements: None,
        }));
        let this = Value::Object(instance);
        match ctor {
            Some(Value::Object(ctor_handle))
                if matches!(
                    self.heap.object(ctor_handle),
                    Some(HeapObject::Function(_)) | Some(HeapObject::Closure(_))
                ) =>
            {
                match self.do_call(Value::Object(ctor_handle), this.clone(), nargs) {
                    CallOutcome::Entered => {
                        self.frames.last_mut().unwrap().new_instance = Some(this);
                        CallOutcome::Entered
                    }
                    outcome => {
                        self.stack.pop();
                        self.stack.push(this);
                        outcome
                    }
                }
            }
            Some(Value::NativeFunction(f)) => {
                self.call_native(f, this.clone(), nargs);
                self.stack.pop();
                self.stack.push(this);
                CallOutcome::Done
            }
            _ => {
                let new_len = self.stack.len() - nargs as usize;
                self.stack.truncate(new_len);
                self.stack.push(this);
                CallOutcome::Done
            }
        }
    }

    /// `CALLPROP rcall, rthis, n`: `rcall` names the property (a constant
    /// atom id), `rthis` is the object register to call it on; resolved
    /// through the proto chain like `LOADPROP`, then dispatched exactly
    /// like `CALL` with `this` bound to the object.
    pub(crate) fn exec_callprop(&mut self, prop_slot: u16, obj_slot: u16, nargs: u8) -> CallOutcome {
        let obj = self.decode_operand(obj_slot);
        let atom = match self.current_function_constant(prop_slot) {
            Some(Value::Id(a)) => a,
            _ => {
                self.runtime_error(ErrorCode::InternalError);
                self.pop_args_push_undefined(nargs);
                return CallOutcome::Done;
            }
        };
        if let Some(outcome) = self.try_array_intrinsic_call(&obj, atom, nargs) {
            return outcome;
        }
        let callee = match &obj {
            Value::Object(handle) => self.lookup_prop(*handle, atom).unwrap_or(Value::None),
            _ => Value::None,
        };
        self.do_call(callee, obj, nargs)
    }

    fn enter_frame(&mut self, function: Mad<HeapObject>, closure: Option<Mad<HeapObject>>, this: Value, nargs: u8) {
        let (nparams, max_registers) = {
            let func = self
                .heap
                .object(function)
                .and_then(|o| o.as_function())
                .expect("CALL target is not a Function");
            (func.nparams, func.max_registers)
        };
        let new_bp = self.stack.len() - nargs as usize;
        let args: Vec<Value> = self.stack[new_bp..].to_vec();
        if (nargs as usize) > nparams as usize {
            self.stack.truncate(new_bp + nparams as usize);
        }
        self.stack.resize(new_bp + max_registers as usize, Value::None);
        self.frames.push(Frame::new(function, closure, this, new_bp, args));
    }

    /// `RET n` (spec §4.6): `n` is the return count, 0 or 1. The value (if
    /// any) sits `PUSH`ed just above the frame's register window.
    pub(crate) fn exec_ret(&mut self, n: u16) {
        let frame = self.frames.pop().expect("RET with no active frame");
        let mut ret_val = if n >= 1 {
            self.stack.pop().unwrap_or(Value::None)
        } else {
            Value::None
        };
        self.close_upvalues_from(frame.bp);
        self.stack.truncate(frame.bp);
        if let Some(instance) = frame.new_instance {
            ret_val = instance;
        }
        self.stack.push(ret_val);
    }

    fn close_upvalues_from(&mut self, base: usize) {
        let stack = &self.stack;
        self.open_upvalues.retain(|uv| match uv.stack_index() {
            Some(idx) if idx >= base => {
                uv.close(stack[idx].clone());
                false
            }
            _ => true,
        });
    }

    pub(crate) fn find_or_open_upvalue(&mut self, stack_index: usize) -> pebble_heap::UpValueRef {
        if let Some(existing) = self
            .open_upvalues
            .iter()
            .find(|uv| uv.stack_index() == Some(stack_index))
        {
            return existing.clone();
        }
        let uv = UpValueCell::new_open(stack_index);
        self.open_upvalues.push(uv.clone());
        uv
    }

    /// `CLOSURE dst, K[slot]` (spec §4.6): captures every upvalue the
    /// nested function's descriptor table names, deduplicating against
    /// already-open cells, and binds `this` to the creating frame's
    /// current `this`.
    pub(crate) fn exec_closure(&mut self, dst: u8, const_slot: u16) {
        let frame_idx = self.frames.len() - 1;
        let bp = self.frames[frame_idx].bp;
        let this_value = self.frames[frame_idx].this_value.clone();
        let caller_closure = self.frames[frame_idx].closure;

        let nested_fn_handle = match self.current_function_constant(const_slot) {
            Some(Value::Object(h)) => h,
            _ => {
                self.runtime_error(ErrorCode::InternalError);
                return;
            }
        };
        let descs = self
            .heap
            .object(nested_fn_handle)
            .and_then(|o| o.as_function())
            .map(|f| f.upvalue_descs.clone())
            .unwrap_or_default();

        let mut upvalues = Vec::with_capacity(descs.len());
        for desc in &descs {
            let uv = match desc.source {
                UpValueSource::ParentLocal(reg) => self.find_or_open_upvalue(bp + reg as usize),
                UpValueSource::ParentUpValue(idx) => {
                    let closure_handle = caller_closure.expect("forwarded upvalue without an enclosing closure");
                    self.heap
                        .object(closure_handle)
                        .and_then(|o| o.as_closure())
                        .expect("enclosing closure vanished")
                        .upvalues[idx as usize]
                        .clone()
                }
            };
            upvalues.push(uv);
        }

        let closure_handle = self.heap.alloc_object(HeapObject::Closure(ClosureObj {
            function: nested_fn_handle,
            upvalues,
            this: this_value,
        }));
        self.set_register(dst, Value::Object(closure_handle));
    }

    fn call_native(&mut self, f: pebble_heap::NativeFn, this: Value, nargs: u8) -> CallReturnValue {
        let args_start = self.stack.len() - nargs as usize;
        let result = {
            let mut ctx = NativeContextImpl {
                vm: self,
                args_start,
                nargs,
                this,
            };
            f(&mut ctx)
        };
        let ret_base = args_start + nargs as usize;
        match result {
            CallReturnValue::ReturnCount(n) if n >= 1 => {
                let ret_val = self.stack.get(ret_base).cloned().unwrap_or(Value::None);
                self.stack.truncate(args_start);
                self.stack.push(ret_val);
            }
            CallReturnValue::Error(code) => {
                self.runtime_error(code);
                self.stack.truncate(args_start);
                self.stack.push(Value::None);
            }
            _ => {
                self.stack.truncate(args_start);
                self.stack.push(Value::None);
            }
        }
        result
    }

    fn pop_args_push_undefined(&mut self, nargs: u8) {
        let new_len = self.stack.len() - nargs as usize;
        self.stack.truncate(new_len);
        self.stack.push(Value::None);
    }

    /// Array intrinsics (`push_back`/`pop_back`/`join`) are special-cased
    /// at the opcode level rather than installed as per-instance native
    /// properties, to avoid paying a property-bag entry per array on a
    /// memory-constrained target.
    fn try_array_intrinsic_call(&mut self, obj: &Value, atom: AtomId, nargs: u8) -> Option<CallOutcome> {
        let Value::Object(handle) = obj else { return None };
        let is_array = self
            .heap
            .object(*handle)
            .and_then(|o| o.as_mater())
            .map(|m| m.is_array())
            .unwrap_or(false);
        if !is_array {
            return None;
        }
        if atom == well_known::PUSH_BACK {
            let mut arg = Value::None;
            if nargs >= 1 {
                arg = self.stack.last().cloned().unwrap_or(Value::None);
            }
            let new_len = self.stack.len() - nargs as usize;
            self.stack.truncate(new_len);
            if let Some(obj) = self.heap.object_mut(*handle).and_then(|o| o.as_mater_mut()) {
                obj.append_elt(arg);
            }
            self.stack.push(Value::None);
            Some(CallOutcome::Done)
        } else if atom == well_known::POP_BACK {
            let new_len = self.stack.len() - nargs as usize;
            self.stack.truncate(new_len);
            let popped = self
                .heap
                .object_mut(*handle)
                .and_then(|o| o.as_mater_mut())
                .and_then(|m| m.elements.as_mut())
                .and_then(|e| e.pop())
                .unwrap_or(Value::None);
            self.stack.push(popped);
            Some(CallOutcome::Done)
        } else if atom == well_known::JOIN {
            let sep = if nargs >= 1 {
                crate::exec::ops::stringify(&self.stack[self.stack.len() - 1], &self.heap, &self.literals)
            } else {
                ",".to_string()
            };
            let new_len = self.stack.len() - nargs as usize;
            self.stack.truncate(new_len);
            let joined = match self.heap.object(*handle).and_then(|o| o.as_mater()) {
                Some(m) => m
                    .elements
                    .as_ref()
                    .unwrap()
                    .iter()
                    .map(|v| crate::exec::ops::stringify(v, &self.heap, &self.literals))
                    .collect::<Vec<_>>()
                    .join(&sep),
                None => String::new(),
            };
            let lit = self.literals.add(&joined);
            self.stack.push(Value::StringLiteral(lit));
            Some(CallOutcome::Done)
        } else {
            None
        }
    }
}

struct NativeContextImpl<'a, S: SystemInterface> {
    vm: &'a mut Vm<S>,
    args_start: usize,
    nargs: u8,
    this: Value,
}

impl<'a, S: SystemInterface> NativeContext for NativeContextImpl<'a, S> {
    fn nparams(&self) -> u8 {
        self.nargs
    }

    fn arg(&self, index: u8) -> Value {
        self.vm
            .stack
            .get(self.args_start + index as usize)
            .cloned()
            .unwrap_or(Value::None)
    }

    fn this_value(&self) -> Value {
        self.this.clone()
    }

    fn push_return(&mut self, value: Value) {
        self.vm.stack.push(value);
    }

    fn heap_mut(&mut self) -> &mut Heap {
        &mut self.vm.heap
    }

    fn print(&mut self, s: &str) {
        self.vm.system.printf(s);
    }

    fn stringify(&self, v: &Value) -> String {
        crate::exec::ops::stringify(v, &self.vm.heap, &self.vm.literals)
    }
}
