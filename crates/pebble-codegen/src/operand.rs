//! The expression parse-stack "kind" (spec §4.5 "Parse stack"): what an
//! already-parsed subexpression resolves to, before it is either read from
//! (`bake`) or assigned into (`store`).

use crate::error::CodegenError;
use crate::func_builder::{FuncBuilder, RegOrConst};
use pebble_common_core::atom::AtomId;
use pebble_common_core::instruction::Opcode;

#[derive(Debug, Clone, Copy)]
pub enum Operand {
    /// A function-scoped local, referenced directly by slot — no load
    /// needed to read it.
    Local(u8),
    /// An already-materialized temporary register.
    Register(u8),
    /// A compile-time constant, not yet loaded into a register.
    Constant(u16),
    /// An unresolved global name, read/written through `LOADREFK`/`STOREFK`.
    RefK(u16),
    /// `obj.prop`, where `obj` is already baked.
    PropRef { obj: u8, prop: AtomId },
    /// `obj[idx]`, where both are already baked.
    EltRef { obj: u8, idx: RegOrConst },
    This,
    UpValue(u8),
}

impl Operand {
    /// Realizes this operand as a plain register, emitting whatever load
    /// instruction is necessary. Locals and already-baked registers are
    /// free.
    pub fn bake(self, fb: &mut FuncBuilder, line: u32) -> Result<u8, CodegenError> {
        match self {
            Operand::Local(slot) => Ok(slot),
            Operand::Register(reg) => Ok(reg),
            Operand::Constant(slot) => {
                let dst = fb.alloc_temp()?;
                fb.emit_rrr(
                    Opcode::Move,
                    dst,
                    RegOrConst::Const(slot),
                    RegOrConst::Reg(0),
                    line,
                );
                Ok(dst)
            }
            Operand::RefK(name_slot) => {
                let dst = fb.alloc_temp()?;
                fb.emit_rrr(
                    Opcode::LoadRefK,
                    dst,
                    RegOrConst::Const(name_slot),
                    RegOrConst::Reg(0),
                    line,
                );
                Ok(dst)
            }
            Operand::PropRef { obj, prop } => {
                let dst = fb.alloc_temp()?;
                let prop_slot = fb.add_constant(crate::compiled::ConstantValue::Id(prop))?;
                fb.emit_rrr(
                    Opcode::LoadProp,
                    dst,
                    RegOrConst::Reg(obj),
                    RegOrConst::Const(prop_slot),
                    line,
                );
                Ok(dst)
            }
            Operand::EltRef { obj, idx } => {
                let dst = fb.alloc_temp()?;
                fb.emit_rrr(Opcode::LoadElt, dst, RegOrConst::Reg(obj), idx, line);
                Ok(dst)
            }
            Operand::This => {
                let dst = fb.alloc_temp()?;
                fb.emit_rn(Opcode::LoadThis, dst, 0, line);
                Ok(dst)
            }
            Operand::UpValue(idx) => {
                let dst = fb.alloc_temp()?;
                fb.emit_rn(Opcode::LoadUp, dst, idx as u32, line);
                Ok(dst)
            }
        }
    }

    /// Stores `value_reg` into this operand as an assignment target.
    /// Invalid for operands that aren't l-values.
    pub fn store(self, fb: &mut FuncBuilder, value_reg: u8, line: u32) -> Result<(), CodegenError> {
        match self {
            Operand::Local(slot) => {
                fb.emit_rrr(
                    Opcode::Move,
                    slot,
                    RegOrConst::Reg(value_reg),
                    RegOrConst::Reg(0),
                    line,
                );
                Ok(())
            }
            Operand::RefK(name_slot) => {
                fb.emit_rrr(
                    Opcode::StoreFK,
                    value_reg,
                    RegOrConst::Const(name_slot),
                    RegOrConst::Reg(0),
                    line,
                );
                Ok(())
            }
            Operand::PropRef { obj, prop } => {
                let prop_slot = fb.add_constant(crate::compiled::ConstantValue::Id(prop))?;
                fb.emit_rrr(
                    Opcode::StoProp,
                    obj,
                    RegOrConst::Const(prop_slot),
                    RegOrConst::Reg(value_reg),
                    line,
                );
                Ok(())
            }
            Operand::EltRef { obj, idx } => {
                fb.emit_rrr(Opcode::StoElt, obj, idx, RegOrConst::Reg(value_reg), line);
                Ok(())
            }
            Operand::UpValue(idx) => {
                fb.emit_rn(Opcode::StoreUp, idx, value_reg as u32, line);
                Ok(())
            }
            Operand::Register(_) | Operand::Constant(_) | Operand::This => {
                Err(CodegenError::InvalidLhs)
            }
        }
    }
}
