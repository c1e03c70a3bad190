//! Expression parsing: primary, postfix, unary, binary (precedence
//! climbing), ternary, and assignment (spec §4.5 "Pratt/precedence-climbing
//! over a table of operator infos").

use crate::compiled::ConstantValue;
use crate::error::CodegenError;
use crate::func_builder::{RegOrConst, SENTINEL_SLOT};
use crate::operand::Operand;
use crate::parser::Parser;
use crate::precedence;
use pebble_common_core::atom::well_known;
use pebble_common_core::instruction::Opcode;
use pebble_syntax::token::TokenKind;

impl<'a> Parser<'a> {
    pub(crate) fn parse_expression(&mut self) -> Result<Operand, CodegenError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Operand, CodegenError> {
        let lhs = self.parse_ternary()?;

        if self.eat(&TokenKind::Assign) {
            let rhs = self.parse_assignment()?;
            let line = self.line();
            let reg = rhs.bake(self.fb(), line)?;
            lhs.store(self.fb(), reg, line)?;
            return Ok(Operand::Register(reg));
        }

        if let Some(op) = precedence::compound_assign_op(self.peek()) {
            self.advance();
            let rhs = self.parse_assignment()?;
            let line = self.line();
            let l = lhs.bake(self.fb(), line)?;
            let r = rhs.bake(self.fb(), line)?;
            let dst = self.fb().alloc_temp()?;
            self.fb()
                .emit_rrr(op, dst, RegOrConst::Reg(l), RegOrConst::Reg(r), line);
            lhs.store(self.fb(), dst, line)?;
            return Ok(Operand::Register(dst));
        }

        Ok(lhs)
    }

    /// `cond ? then : else`, lowered to a diamond of jumps writing into one
    /// result register.
    fn parse_ternary(&mut self) -> Result<Operand, CodegenError> {
        let cond = self.parse_binary(1)?;
        if !self.eat(&TokenKind::Question) {
            return Ok(cond);
        }
        let line = self.line();
        let cond_reg = cond.bake(self.fb(), line)?;
        let dst = self.fb().alloc_temp()?;
        let jf_pc = self.fb().emit_rsn(Opcode::Jf, cond_reg, 0, line);

        let then_val = self.parse_assignment()?;
        let then_line = self.line();
        let tr = then_val.bake(self.fb(), then_line)?;
        self.fb()
            .emit_rrr(Opcode::Move, dst, RegOrConst::Reg(tr), RegOrConst::Reg(0), then_line);
        let jmp_pc = self.fb().emit_rsn(Opcode::Jmp, 0, 0, then_line);

        let else_pc = self.fb().current_pc();
        self.fb().patch_jump(jf_pc, else_pc)?;
        self.expect(TokenKind::Colon)?;
        let else_val = self.parse_assignment()?;
        let else_line = self.line();
        let er = else_val.bake(self.fb(), else_line)?;
        self.fb().emit_rrr(
            Opcode::Move,
            dst,
            RegOrConst::Reg(er),
            RegOrConst::Reg(0),
            else_line,
        );

        let end_pc = self.fb().current_pc();
        self.fb().patch_jump(jmp_pc, end_pc)?;
        Ok(Operand::Register(dst))
    }

    /// Precedence-climbing binary expression parser; `min_prec` is the
    /// lowest-precedence operator this call is allowed to consume.
    fn parse_binary(&mut self, min_prec: u8) -> Result<Operand, CodegenError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let info = match precedence::binary_op(self.peek()) {
                Some(info) if info.precedence.0 >= min_prec => info,
                _ => break,
            };
            self.advance();
            let line = self.line();
            let l = lhs.bake(self.fb(), line)?;
            let rhs = self.parse_binary(info.precedence.0 + 1)?;
            let r = rhs.bake(self.fb(), line)?;
            let dst = self.fb().alloc_temp()?;
            self.fb()
                .emit_rrr(info.op, dst, RegOrConst::Reg(l), RegOrConst::Reg(r), line);
            lhs = Operand::Register(dst);
        }
        Ok(lhs)
    }

    /// Prefix `! - ++ --`; unary `+` is a no-op at the bytecode level.
    fn parse_unary(&mut self) -> Result<Operand, CodegenError> {
        let line = self.line();
        match self.peek().clone() {
            TokenKind::Not => {
                self.advance();
                let operand = self.parse_unary()?;
                self.emit_unary(Opcode::UNot, operand, line)
            }
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                self.emit_unary(Opcode::UMinus, operand, line)
            }
            TokenKind::Tilde => {
                self.advance();
                let operand = self.parse_unary()?;
                self.emit_unary(Opcode::UNeg, operand, line)
            }
            TokenKind::Plus => {
                self.advance();
                self.parse_unary()
            }
            TokenKind::Inc => {
                self.advance();
                let operand = self.parse_unary()?;
                self.emit_incdec(Opcode::PreInc, operand, line)
            }
            TokenKind::Dec => {
                self.advance();
                let operand = self.parse_unary()?;
                self.emit_incdec(Opcode::PreDec, operand, line)
            }
            _ => self.parse_postfix(),
        }
    }

    fn emit_unary(&mut self, op: Opcode, operand: Operand, line: u32) -> Result<Operand, CodegenError> {
        let src = operand.bake(self.fb(), line)?;
        let dst = self.fb().alloc_temp()?;
        self.fb()
            .emit_rrr(op, dst, RegOrConst::Reg(src), RegOrConst::Reg(0), line);
        Ok(Operand::Register(dst))
    }

    /// `++x` / `--x` / `x++` / `x--`: the underlying slot is read, bumped in
    /// place, and the pre- or post- value is left in a fresh register.
    fn emit_incdec(&mut self, op: Opcode, operand: Operand, line: u32) -> Result<Operand, CodegenError> {
        let src = operand.bake(self.fb(), line)?;
        let dst = self.fb().alloc_temp()?;
        self.fb()
            .emit_rrr(op, dst, RegOrConst::Reg(src), RegOrConst::Reg(0), line);
        operand.store(self.fb(), src, line)?;
        Ok(Operand::Register(dst))
    }

    /// Postfix `()`, `.prop`, `[idx]`, trailing `++`/`--`, rooted at a
    /// primary expression.
    fn parse_postfix(&mut self) -> Result<Operand, CodegenError> {
        let mut operand = self.parse_primary()?;
        loop {
            match self.peek().clone() {
                TokenKind::LParen => {
                    operand = self.parse_call(operand)?;
                }
                TokenKind::Dot => {
                    self.advance();
                    let (name, _) = self.expect_ident()?;
                    let line = self.line();
                    let obj = operand.bake(self.fb(), line)?;
                    operand = Operand::PropRef { obj, prop: name };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let line = self.line();
                    let obj = operand.bake(self.fb(), line)?;
                    let idx_operand = self.parse_expression()?;
                    self.expect(TokenKind::RBracket)?;
                    let idx = self.operand_to_regorconst(idx_operand)?;
                    operand = Operand::EltRef { obj, idx };
                }
                TokenKind::Inc => {
                    let line = self.line();
                    self.advance();
                    operand = self.emit_incdec(Opcode::PostInc, operand, line)?;
                }
                TokenKind::Dec => {
                    let line = self.line();
                    self.advance();
                    operand = self.emit_incdec(Opcode::PostDec, operand, line)?;
                }
                _ => break,
            }
        }
        Ok(operand)
    }

    fn operand_to_regorconst(&mut self, operand: Operand) -> Result<RegOrConst, CodegenError> {
        let line = self.line();
        match operand {
            Operand::Constant(slot) => Ok(RegOrConst::Const(slot)),
            other => Ok(RegOrConst::Reg(other.bake(self.fb(), line)?)),
        }
    }

    /// `callee(args...)`. Method calls (`obj.method(args)`) are recognized
    /// one layer up via `Operand::PropRef` and lowered to `CALLPROP`
    /// instead, preserving `this` (spec §4.6).
    fn parse_call(&mut self, callee: Operand) -> Result<Operand, CodegenError> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                args.push(self.parse_assignment()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        let line = self.line();

        let (rcall, rthis) = match callee {
            Operand::PropRef { obj, prop } => {
                let prop_slot = self.fb().add_constant(ConstantValue::Id(prop))?;
                (RegOrConst::Const(prop_slot), RegOrConst::Reg(obj))
            }
            other => {
                let callee_reg = other.bake(self.fb(), line)?;
                (RegOrConst::Reg(callee_reg), RegOrConst::Const(SENTINEL_SLOT))
            }
        };

        for arg in &args {
            let reg = arg.bake(self.fb(), line)?;
            self.fb().emit_rn(Opcode::Push, reg, 0, line);
        }

        let op = if matches!(rthis, RegOrConst::Const(SENTINEL_SLOT)) {
            Opcode::Call
        } else {
            Opcode::CallProp
        };
        self.fb().emit_call(op, rcall, rthis, args.len() as u8, line);

        // The callee's single return value lands on the VM stack (spec
        // §4.6 RET); POP brings it into a register we own.
        let dst = self.fb().alloc_temp()?;
        self.fb().emit_rn(Opcode::Pop, dst, 0, line);
        Ok(Operand::Register(dst))
    }

    /// Primary expressions: literals, identifiers, `this`, parenthesized,
    /// `new`, array/object literals, function expressions.
    fn parse_primary(&mut self) -> Result<Operand, CodegenError> {
        let line = self.line();
        match self.peek().clone() {
            TokenKind::Int(v) => {
                self.advance();
                let slot = self.fb().add_constant(ConstantValue::Int(v as i32))?;
                Ok(Operand::Constant(slot))
            }
            TokenKind::Float(v) => {
                self.advance();
                let slot = self.fb().add_constant(ConstantValue::Float(v as f32))?;
                Ok(Operand::Constant(slot))
            }
            TokenKind::String(s) => {
                self.advance();
                let lit = self.literals.add(&s);
                let slot = self.fb().add_constant(ConstantValue::Str(lit))?;
                Ok(Operand::Constant(slot))
            }
            TokenKind::True => {
                self.advance();
                let dst = self.fb().alloc_temp()?;
                self.fb().emit_rn(Opcode::LoadTrue, dst, 0, line);
                Ok(Operand::Register(dst))
            }
            TokenKind::False => {
                self.advance();
                let dst = self.fb().alloc_temp()?;
                self.fb().emit_rn(Opcode::LoadFalse, dst, 0, line);
                Ok(Operand::Register(dst))
            }
            TokenKind::Null | TokenKind::Undefined => {
                self.advance();
                let dst = self.fb().alloc_temp()?;
                self.fb().emit_rn(Opcode::LoadNull, dst, 0, line);
                Ok(Operand::Register(dst))
            }
            TokenKind::This => {
                self.advance();
                Ok(Operand::This)
            }
            TokenKind::Ident(name) => {
                self.advance();
                let atom = self.atoms.atomize(&name)?;
                self.resolve_identifier(atom)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_object_literal(),
            TokenKind::Function => self.parse_function_literal(),
            TokenKind::New => self.parse_new_expr(),
            other => {
                self.error(format!("unexpected token in expression: {other}"));
                Err(CodegenError::UnexpectedToken {
                    expected: "expression".to_string(),
                    found: other.to_string(),
                })
            }
        }
    }

    fn parse_array_literal(&mut self) -> Result<Operand, CodegenError> {
        self.expect(TokenKind::LBracket)?;
        let line = self.line();
        let dst = self.fb().alloc_temp()?;
        self.fb().emit_rn(Opcode::LoadLitA, dst, 0, line);
        if !self.at(&TokenKind::RBracket) {
            loop {
                let elem = self.parse_assignment()?;
                let elem_line = self.line();
                let reg = elem.bake(self.fb(), elem_line)?;
                self.fb()
                    .emit_rrr(Opcode::AppendElt, dst, RegOrConst::Reg(0), RegOrConst::Reg(reg), elem_line);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBracket)?;
        Ok(Operand::Register(dst))
    }

    fn parse_object_literal(&mut self) -> Result<Operand, CodegenError> {
        self.expect(TokenKind::LBrace)?;
        let line = self.line();
        let dst = self.fb().alloc_temp()?;
        self.fb().emit_rn(Opcode::LoadLitO, dst, 0, line);
        if !self.at(&TokenKind::RBrace) {
            loop {
                let (key, _) = self.parse_property_key()?;
                self.expect(TokenKind::Colon)?;
                let value = self.parse_assignment()?;
                let value_line = self.line();
                let key_slot = self.fb().add_constant(ConstantValue::Id(key))?;
                let reg = value.bake(self.fb(), value_line)?;
                self.fb().emit_rrr(
                    Opcode::AppendProp,
                    dst,
                    RegOrConst::Const(key_slot),
                    RegOrConst::Reg(reg),
                    value_line,
                );
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Operand::Register(dst))
    }

    /// Object-literal keys: identifiers or string literals.
    fn parse_property_key(&mut self) -> Result<(pebble_common_core::atom::AtomId, u32), CodegenError> {
        let line = self.line();
        match self.advance().kind {
            TokenKind::Ident(name) => Ok((self.atoms.atomize(&name)?, line)),
            TokenKind::String(name) => Ok((self.atoms.atomize(&name)?, line)),
            other => {
                self.error(format!("expected property key, found {other}"));
                Err(CodegenError::UnexpectedToken {
                    expected: "property key".to_string(),
                    found: other.to_string(),
                })
            }
        }
    }

    /// `new Callee(args...)` (spec §4.6 `NEW rcall, n`).
    fn parse_new_expr(&mut self) -> Result<Operand, CodegenError> {
        self.expect(TokenKind::New)?;
        let callee = self.parse_postfix_no_call()?;
        let line = self.line();
        let callee_reg = callee.bake(self.fb(), line)?;

        let mut args = Vec::new();
        if self.eat(&TokenKind::LParen) {
            if !self.at(&TokenKind::RParen) {
                loop {
                    args.push(self.parse_assignment()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RParen)?;
        }
        let line = self.line();
        for arg in &args {
            let reg = arg.bake(self.fb(), line)?;
            self.fb().emit_rn(Opcode::Push, reg, 0, line);
        }
        self.fb().emit_call(
            Opcode::New,
            RegOrConst::Reg(callee_reg),
            RegOrConst::Const(SENTINEL_SLOT),
            args.len() as u8,
            line,
        );
        let dst = self.fb().alloc_temp()?;
        self.fb().emit_rn(Opcode::Pop, dst, 0, line);
        Ok(Operand::Register(dst))
    }

    /// Parses the callee expression of a `new` without consuming a trailing
    /// `(`, since that belongs to the constructor argument list.
    fn parse_postfix_no_call(&mut self) -> Result<Operand, CodegenError> {
        let mut operand = self.parse_primary()?;
        loop {
            match self.peek().clone() {
                TokenKind::Dot => {
                    self.advance();
                    let (name, _) = self.expect_ident()?;
                    let line = self.line();
                    let obj = operand.bake(self.fb(), line)?;
                    operand = Operand::PropRef { obj, prop: name };
                }
                _ => break,
            }
        }
        Ok(operand)
    }

    /// Function expression: `function (params) { body }`, possibly named.
    pub(crate) fn parse_function_literal(&mut self) -> Result<Operand, CodegenError> {
        self.expect(TokenKind::Function)?;
        let name = if matches!(self.peek(), TokenKind::Ident(_)) {
            self.expect_ident()?.0
        } else {
            well_known::EMPTY
        };
        let compiled = self.parse_function_body(name)?;
        let line = self.line();
        let has_upvalues = !compiled.upvalue_descs.is_empty();
        let slot = self
            .fb()
            .add_constant(ConstantValue::Function(Box::new(compiled)))?;
        let dst = self.fb().alloc_temp()?;
        if has_upvalues {
            self.fb().emit_rn(Opcode::Closure, dst, slot as u32, line);
        } else {
            self.fb().emit_rrr(
                Opcode::Move,
                dst,
                RegOrConst::Const(slot),
                RegOrConst::Reg(0),
                line,
            );
        }
        Ok(Operand::Register(dst))
    }
}
