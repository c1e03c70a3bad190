//! Per-function code generation state (spec §4.5 "Registers and locals",
//! "End-of-function pass").

use crate::compiled::{CompiledFunction, ConstantValue};
use crate::error::CodegenError;
use pebble_common_core::atom::AtomId;
use pebble_common_core::instruction::{Instruction, Opcode, FIRST_CONSTANT_SLOT, MAX_CONSTANT_SLOT};
use pebble_heap::object::UpValueDesc;
use std::collections::BTreeSet;

/// A register-or-constant operand, still unresolved to its final register
/// number (temporaries are renumbered only once the function is done).
#[derive(Debug, Clone, Copy)]
pub enum RegOrConst {
    Reg(u8),
    Const(u16),
}

impl RegOrConst {
    fn raw(self) -> u16 {
        match self {
            RegOrConst::Reg(r) => r as u16,
            RegOrConst::Const(c) => c,
        }
    }
}

/// Instruction shape before temp-register renumbering; mirrors exactly one
/// of the three packed encodings (spec §4.6) but keeps its register fields
/// as plain integers so the end-of-function pass can rewrite them.
enum RawInstr {
    Rrr {
        op: Opcode,
        a: u8,
        b: RegOrConst,
        c: RegOrConst,
    },
    Rn {
        op: Opcode,
        n: u8,
        imm: u32,
    },
    Rsn {
        op: Opcode,
        n: u8,
        imm: i32,
    },
    Call {
        op: Opcode,
        rcall: RegOrConst,
        rthis: RegOrConst,
        nparams: u8,
    },
}

pub struct FuncBuilder {
    name: AtomId,
    nparams: u8,
    locals: Vec<(AtomId, u8)>,
    next_temp: i16,
    code: Vec<RawInstr>,
    lines: Vec<u32>,
    constants: Vec<ConstantValue>,
    upvalues: Vec<UpValueDesc>,
    break_targets: Vec<Vec<usize>>,
    continue_targets: Vec<Vec<usize>>,
}

/// Highest raw temporary register value; temps are handed out counting
/// down from here (spec §4.5: "Temporaries ... numbered from 255
/// downward during generation").
const MAX_TEMP: i16 = 255;

/// Constant slot of every function's reserved sentinel (constants[0]); also
/// used as the `rthis` operand of a plain (non-method) `CALL` to mean "use
/// the current `this`".
pub const SENTINEL_SLOT: u16 = FIRST_CONSTANT_SLOT;

impl FuncBuilder {
    pub fn new(name: AtomId) -> Self {
        Self {
            name,
            nparams: 0,
            locals: Vec::new(),
            next_temp: MAX_TEMP,
            code: Vec::new(),
            lines: Vec::new(),
            constants: vec![ConstantValue::Sentinel],
            upvalues: Vec::new(),
            break_targets: Vec::new(),
            continue_targets: Vec::new(),
        }
    }

    pub fn declare_param(&mut self, name: AtomId) -> u8 {
        let slot = self.locals.len() as u8;
        self.locals.push((name, slot));
        self.nparams += 1;
        slot
    }

    /// Declares (or re-resolves, for repeated `var`) a local in this
    /// function's flat, function-wide scope — `var` is function-scoped,
    /// not block-scoped, so nested blocks never pop locals back out.
    pub fn declare_local(&mut self, name: AtomId) -> u8 {
        if let Some(&(_, slot)) = self.locals.iter().find(|(n, _)| *n == name) {
            return slot;
        }
        let slot = self.locals.len() as u8;
        self.locals.push((name, slot));
        slot
    }

    pub fn resolve_local(&self, name: AtomId) -> Option<u8> {
        self.locals.iter().find(|(n, _)| *n == name).map(|(_, s)| *s)
    }

    pub fn nlocals(&self) -> u8 {
        self.locals.len() as u8
    }

    pub fn name(&self) -> AtomId {
        self.name
    }

    /// High-water mark for the current temp register allocator; save
    /// before compiling a subexpression and pass to [`Self::reset_temp`]
    /// once its result has been consumed, so the same scratch registers
    /// are reused by sibling subexpressions.
    pub fn mark_temp(&self) -> i16 {
        self.next_temp
    }

    pub fn reset_temp(&mut self, mark: i16) {
        self.next_temp = mark;
    }

    pub fn alloc_temp(&mut self) -> Result<u8, CodegenError> {
        if self.next_temp <= self.locals.len() as i16 {
            return Err(CodegenError::RegisterOverflow);
        }
        let reg = self.next_temp;
        self.next_temp -= 1;
        Ok(reg as u8)
    }

    pub fn add_constant(&mut self, value: ConstantValue) -> Result<u16, CodegenError> {
        if let Some(idx) = self.constants.iter().position(|c| const_eq(c, &value)) {
            return slot_for(idx);
        }
        let idx = self.constants.len();
        self.constants.push(value);
        slot_for(idx)
    }

    pub fn upvalue_index(&mut self, desc: UpValueDesc) -> u8 {
        if let Some(idx) = self
            .upvalues
            .iter()
            .position(|d| d.name == desc.name && d.source == desc.source)
        {
            return idx as u8;
        }
        let idx = self.upvalues.len();
        self.upvalues.push(desc);
        idx as u8
    }

    pub fn current_pc(&self) -> usize {
        self.code.len()
    }

    pub fn emit_rrr(&mut self, op: Opcode, a: u8, b: RegOrConst, c: RegOrConst, line: u32) -> usize {
        self.code.push(RawInstr::Rrr { op, a, b, c });
        self.lines.push(line);
        self.code.len() - 1
    }

    pub fn emit_rn(&mut self, op: Opcode, n: u8, imm: u32, line: u32) -> usize {
        self.code.push(RawInstr::Rn { op, n, imm });
        self.lines.push(line);
        self.code.len() - 1
    }

    pub fn emit_rsn(&mut self, op: Opcode, n: u8, imm: i32, line: u32) -> usize {
        self.code.push(RawInstr::Rsn { op, n, imm });
        self.lines.push(line);
        self.code.len() - 1
    }

    pub fn emit_call(
        &mut self,
        op: Opcode,
        rcall: RegOrConst,
        rthis: RegOrConst,
        nparams: u8,
        line: u32,
    ) -> usize {
        self.code.push(RawInstr::Call {
            op,
            rcall,
            rthis,
            nparams,
        });
        self.lines.push(line);
        self.code.len() - 1
    }

    /// Patches a previously emitted jump (`Rsn`) at `pc` so its relative
    /// offset targets `target` (spec §4.5 "Signed jump range fits in 17
    /// bits").
    pub fn patch_jump(&mut self, pc: usize, target: usize) -> Result<(), CodegenError> {
        let offset = target as i64 - (pc as i64 + 1);
        if !(-65536..=65535).contains(&offset) {
            return Err(CodegenError::JumpOutOfRange);
        }
        match &mut self.code[pc] {
            RawInstr::Rsn { imm, .. } => {
                *imm = offset as i32;
                Ok(())
            }
            _ => Err(CodegenError::Internal("patch_jump on non-jump instruction".into())),
        }
    }

    pub fn begin_loop(&mut self) {
        self.break_targets.push(Vec::new());
        self.continue_targets.push(Vec::new());
    }

    /// Like [`Self::begin_loop`] but for `switch`, which accepts `break`
    /// but must let `continue` bubble to an enclosing loop untouched.
    pub fn begin_break_scope(&mut self) {
        self.break_targets.push(Vec::new());
    }

    pub fn end_break_scope(&mut self, target: usize) -> Result<(), CodegenError> {
        for pc in self.break_targets.pop().unwrap_or_default() {
            self.patch_jump(pc, target)?;
        }
        Ok(())
    }

    pub fn add_break(&mut self, pc: usize) -> Result<(), CodegenError> {
        self.break_targets
            .last_mut()
            .ok_or(CodegenError::BreakOutsideLoop)?
            .push(pc);
        Ok(())
    }

    pub fn add_continue(&mut self, pc: usize) -> Result<(), CodegenError> {
        self.continue_targets
            .last_mut()
            .ok_or(CodegenError::ContinueOutsideLoop)?
            .push(pc);
        Ok(())
    }

    /// Ends the innermost loop, patching every pending `break` to
    /// `break_target` and every pending `continue` to `continue_target`.
    pub fn end_loop(&mut self, continue_target: usize, break_target: usize) -> Result<(), CodegenError> {
        for pc in self.continue_targets.pop().unwrap_or_default() {
            self.patch_jump(pc, continue_target)?;
        }
        for pc in self.break_targets.pop().unwrap_or_default() {
            self.patch_jump(pc, break_target)?;
        }
        Ok(())
    }

    /// Runs the end-of-function renumbering pass and packs every
    /// instruction into its final 32-bit form.
    pub fn finish(self) -> Result<CompiledFunction, CodegenError> {
        let nlocals = self.locals.len() as u8;

        let mut used: BTreeSet<u8> = BTreeSet::new();
        for instr in &self.code {
            collect_temp_regs(instr, nlocals, &mut used);
        }
        // Temps were handed out counting down from 255; the first one
        // allocated (highest raw value) becomes the first slot above
        // locals, preserving generation order without tracking it
        // separately.
        let mapping: std::collections::HashMap<u8, u8> = used
            .iter()
            .rev()
            .enumerate()
            .map(|(i, &raw)| (raw, nlocals + i as u8))
            .collect();

        let max_registers = nlocals + mapping.len() as u8;
        let code = self
            .code
            .into_iter()
            .map(|instr| pack(instr, nlocals, &mapping))
            .collect();

        Ok(CompiledFunction {
            name: self.name,
            nparams: self.nparams,
            nlocals,
            max_registers,
            code,
            lines: self.lines,
            constants: self.constants,
            upvalue_descs: self.upvalues,
        })
    }
}

fn slot_for(idx: usize) -> Result<u16, CodegenError> {
    let slot = FIRST_CONSTANT_SLOT as usize + idx;
    if slot > MAX_CONSTANT_SLOT as usize {
        return Err(CodegenError::ConstantOverflow(
            MAX_CONSTANT_SLOT - FIRST_CONSTANT_SLOT + 1,
        ));
    }
    Ok(slot as u16)
}

fn const_eq(a: &ConstantValue, b: &ConstantValue) -> bool {
    match (a, b) {
        (ConstantValue::Int(x), ConstantValue::Int(y)) => x == y,
        (ConstantValue::Float(x), ConstantValue::Float(y)) => x == y,
        (ConstantValue::Str(x), ConstantValue::Str(y)) => x == y,
        (ConstantValue::Id(x), ConstantValue::Id(y)) => x == y,
        // Function constants are never deduplicated; each literal is distinct.
        _ => false,
    }
}

fn collect_temp_regs(instr: &RawInstr, nlocals: u8, used: &mut BTreeSet<u8>) {
    let mut note = |roc: RegOrConst| {
        if let RegOrConst::Reg(r) = roc {
            if r >= nlocals {
                used.insert(r);
            }
        }
    };
    match instr {
        RawInstr::Rrr { a, b, c, .. } => {
            if *a >= nlocals {
                used.insert(*a);
            }
            note(*b);
            note(*c);
        }
        RawInstr::Rn { n, .. } | RawInstr::Rsn { n, .. } => {
            if *n >= nlocals {
                used.insert(*n);
            }
        }
        RawInstr::Call { rcall, rthis, .. } => {
            note(*rcall);
            note(*rthis);
        }
    }
}

fn remap(roc: RegOrConst, nlocals: u8, mapping: &std::collections::HashMap<u8, u8>) -> u16 {
    match roc {
        RegOrConst::Reg(r) if r >= nlocals => *mapping.get(&r).unwrap_or(&r) as u16,
        other => other.raw(),
    }
}

fn pack(instr: RawInstr, nlocals: u8, mapping: &std::collections::HashMap<u8, u8>) -> Instruction {
    match instr {
        RawInstr::Rrr { op, a, b, c } => {
            let a = if a >= nlocals { *mapping.get(&a).unwrap_or(&a) } else { a };
            Instruction::rrr(op, a, remap(b, nlocals, mapping), remap(c, nlocals, mapping))
        }
        RawInstr::Rn { op, n, imm } => {
            let n = if n >= nlocals { *mapping.get(&n).unwrap_or(&n) } else { n };
            Instruction::rn(op, n as u16, imm)
        }
        RawInstr::Rsn { op, n, imm } => {
            let n = if n >= nlocals { *mapping.get(&n).unwrap_or(&n) } else { n };
            Instruction::rsn(op, n as u16, imm)
        }
        RawInstr::Call { op, rcall, rthis, nparams } => Instruction::call(
            op,
            remap(rcall, nlocals, mapping),
            remap(rthis, nlocals, mapping),
            nparams,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temps_renumber_above_locals() {
        let mut b = FuncBuilder::new(AtomId::new(300));
        b.declare_param(AtomId::new(301));
        let t1 = b.alloc_temp().unwrap();
        let t2 = b.alloc_temp().unwrap();
        b.emit_rrr(Opcode::Add, t1, RegOrConst::Reg(t1), RegOrConst::Reg(t2), 1);
        let compiled = b.finish().unwrap();
        assert_eq!(compiled.nlocals, 1);
        // two temps used -> max_registers = nlocals + 2
        assert_eq!(compiled.max_registers, 3);
        let instr = compiled.code[0];
        assert_eq!(instr.a(), 1);
        assert_eq!(instr.b(), 1);
        assert_eq!(instr.c(), 2);
    }

    #[test]
    fn constants_are_deduplicated() {
        let mut b = FuncBuilder::new(AtomId::new(300));
        let s1 = b.add_constant(ConstantValue::Int(42)).unwrap();
        let s2 = b.add_constant(ConstantValue::Int(42)).unwrap();
        assert_eq!(s1, s2);
    }
}
