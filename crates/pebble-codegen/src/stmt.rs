//! Statement parsing (spec §4.5: "Statements are `{, if, while, do, for,
//! for-in, switch, break, continue, return, var, function, class,
//! expression-statement}`").

use crate::compiled::ConstantValue;
use crate::error::CodegenError;
use crate::func_builder::RegOrConst;
use crate::parser::Parser;
use pebble_common_core::atom::{well_known, AtomId};
use pebble_common_core::instruction::Opcode;
use pebble_syntax::token::TokenKind;

impl<'a> Parser<'a> {
    pub(crate) fn parse_statement(&mut self) -> Result<(), CodegenError> {
        match self.peek() {
            TokenKind::LBrace => self.parse_block(),
            TokenKind::Var => self.parse_var_decl(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Do => self.parse_do_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Break => self.parse_break(),
            TokenKind::Continue => self.parse_continue(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Function => self.parse_function_decl(),
            TokenKind::Class => self.parse_class_decl(),
            TokenKind::Semi => {
                self.advance();
                Ok(())
            }
            _ => self.parse_expr_statement(),
        }
    }

    fn parse_block(&mut self) -> Result<(), CodegenError> {
        self.expect(TokenKind::LBrace)?;
        while !self.at(&TokenKind::RBrace) {
            self.parse_statement()?;
        }
        self.expect(TokenKind::RBrace)?;
        Ok(())
    }

    fn parse_expr_statement(&mut self) -> Result<(), CodegenError> {
        self.parse_expression()?;
        self.expect(TokenKind::Semi)?;
        Ok(())
    }

    /// `var` is function-scoped (spec §6.5: "no `let`/`const`"), so
    /// `declare_local` is shared across every nested block in the
    /// function — there is no scope stack to pop here.
    fn parse_var_decl(&mut self) -> Result<(), CodegenError> {
        self.expect(TokenKind::Var)?;
        let (name, _) = self.expect_ident()?;
        self.parse_var_declarator_tail(name)?;
        while self.eat(&TokenKind::Comma) {
            let (name, _) = self.expect_ident()?;
            self.parse_var_declarator_tail(name)?;
        }
        self.expect(TokenKind::Semi)?;
        Ok(())
    }

    fn parse_var_declarator_tail(&mut self, name: AtomId) -> Result<(), CodegenError> {
        let slot = self.fb().declare_local(name);
        if self.eat(&TokenKind::Assign) {
            let value = self.parse_assignment()?;
            let line = self.line();
            let reg = value.bake(self.fb(), line)?;
            self.fb()
                .emit_rrr(Opcode::Move, slot, RegOrConst::Reg(reg), RegOrConst::Reg(0), line);
        }
        Ok(())
    }

    fn parse_if(&mut self) -> Result<(), CodegenError> {
        self.expect(TokenKind::If)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;
        let line = self.line();
        let cond_reg = cond.bake(self.fb(), line)?;
        let jf_pc = self.fb().emit_rsn(Opcode::Jf, cond_reg, 0, line);

        self.parse_statement()?;

        if self.eat(&TokenKind::Else) {
            let jmp_line = self.line();
            let jmp_pc = self.fb().emit_rsn(Opcode::Jmp, 0, 0, jmp_line);
            let else_pc = self.fb().current_pc();
            self.fb().patch_jump(jf_pc, else_pc)?;
            self.parse_statement()?;
            let end_pc = self.fb().current_pc();
            self.fb().patch_jump(jmp_pc, end_pc)?;
        } else {
            let end_pc = self.fb().current_pc();
            self.fb().patch_jump(jf_pc, end_pc)?;
        }
        Ok(())
    }

    fn parse_while(&mut self) -> Result<(), CodegenError> {
        self.expect(TokenKind::While)?;
        self.fb().begin_loop();
        let cond_pc = self.fb().current_pc();
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;
        let line = self.line();
        let cond_reg = cond.bake(self.fb(), line)?;
        let jf_pc = self.fb().emit_rsn(Opcode::Jf, cond_reg, 0, line);

        self.parse_statement()?;

        let back_line = self.line();
        let back_pc = self.fb().emit_rsn(Opcode::Jmp, 0, 0, back_line);
        self.fb().patch_jump(back_pc, cond_pc)?;

        let end_pc = self.fb().current_pc();
        self.fb().patch_jump(jf_pc, end_pc)?;
        self.fb().end_loop(cond_pc, end_pc)?;
        Ok(())
    }

    fn parse_do_while(&mut self) -> Result<(), CodegenError> {
        self.expect(TokenKind::Do)?;
        self.fb().begin_loop();
        let body_pc = self.fb().current_pc();
        self.parse_statement()?;
        self.expect(TokenKind::While)?;
        self.expect(TokenKind::LParen)?;
        let cond_start_pc = self.fb().current_pc();
        let cond = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Semi)?;
        let line = self.line();
        let cond_reg = cond.bake(self.fb(), line)?;
        let jt_pc = self.fb().emit_rsn(Opcode::Jt, cond_reg, 0, line);
        self.fb().patch_jump(jt_pc, body_pc)?;
        let end_pc = self.fb().current_pc();
        self.fb().end_loop(cond_start_pc, end_pc)?;
        Ok(())
    }

    /// Three-clause `for`, desugared with the standard single-pass trick
    /// (jump over the increment on entry, loop body jumps to the
    /// increment, increment jumps back to the condition) since the
    /// increment clause is parsed textually before the body it must run
    /// after.
    fn parse_for(&mut self) -> Result<(), CodegenError> {
        self.expect(TokenKind::For)?;
        self.expect(TokenKind::LParen)?;

        if self.eat(&TokenKind::Var) {
            let (first_name, _) = self.expect_ident()?;
            if self.eat(&TokenKind::In) {
                return self.parse_for_in(first_name);
            }
            self.parse_var_declarator_tail(first_name)?;
            while self.eat(&TokenKind::Comma) {
                let (name, _) = self.expect_ident()?;
                self.parse_var_declarator_tail(name)?;
            }
        } else if !self.at(&TokenKind::Semi) {
            self.parse_expression()?;
        }
        self.expect(TokenKind::Semi)?;

        self.fb().begin_loop();
        let loop_start = self.fb().current_pc();
        let mut exit_jump = None;
        if !self.at(&TokenKind::Semi) {
            let cond = self.parse_expression()?;
            let line = self.line();
            let cond_reg = cond.bake(self.fb(), line)?;
            exit_jump = Some(self.fb().emit_rsn(Opcode::Jf, cond_reg, 0, line));
        }
        self.expect(TokenKind::Semi)?;

        let line = self.line();
        let body_jump = self.fb().emit_rsn(Opcode::Jmp, 0, 0, line);
        let increment_start = self.fb().current_pc();
        if !self.at(&TokenKind::RParen) {
            self.parse_expression()?;
        }
        self.expect(TokenKind::RParen)?;
        let back_line = self.line();
        let back_pc = self.fb().emit_rsn(Opcode::Jmp, 0, 0, back_line);
        self.fb().patch_jump(back_pc, loop_start)?;

        let body_pc = self.fb().current_pc();
        self.fb().patch_jump(body_jump, body_pc)?;
        self.parse_statement()?;
        let cont_line = self.line();
        let cont_pc = self.fb().emit_rsn(Opcode::Jmp, 0, 0, cont_line);
        self.fb().patch_jump(cont_pc, increment_start)?;

        let end_pc = self.fb().current_pc();
        if let Some(ej) = exit_jump {
            self.fb().patch_jump(ej, end_pc)?;
        }
        self.fb().end_loop(increment_start, end_pc)?;
        Ok(())
    }

    /// Simplified `for (var x in arr)`: iterates array indices `0..length`
    /// rather than implementing a general iterator protocol (no
    /// `Symbol.iterator`-equivalent exists in this language surface).
    fn parse_for_in(&mut self, var_name: AtomId) -> Result<(), CodegenError> {
        let iterable = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;
        let line = self.line();
        let arr_reg = iterable.bake(self.fb(), line)?;

        let var_slot = self.fb().declare_local(var_name);
        let idx_name = self.synthetic_name("forin_idx");
        let idx_slot = self.fb().declare_local(idx_name);
        let zero_slot = self.fb().add_constant(ConstantValue::Int(0))?;
        self.fb().emit_rrr(
            Opcode::Move,
            idx_slot,
            RegOrConst::Const(zero_slot),
            RegOrConst::Reg(0),
            line,
        );

        let length_const = self.fb().add_constant(ConstantValue::Id(well_known::LENGTH))?;

        self.fb().begin_loop();
        let loop_start = self.fb().current_pc();
        let len_reg = self.fb().alloc_temp()?;
        self.fb().emit_rrr(
            Opcode::LoadProp,
            len_reg,
            RegOrConst::Reg(arr_reg),
            RegOrConst::Const(length_const),
            line,
        );
        let cmp_reg = self.fb().alloc_temp()?;
        self.fb().emit_rrr(
            Opcode::Lt,
            cmp_reg,
            RegOrConst::Reg(idx_slot),
            RegOrConst::Reg(len_reg),
            line,
        );
        let exit_jump = self.fb().emit_rsn(Opcode::Jf, cmp_reg, 0, line);

        self.fb().emit_rrr(
            Opcode::LoadElt,
            var_slot,
            RegOrConst::Reg(arr_reg),
            RegOrConst::Reg(idx_slot),
            line,
        );

        self.parse_statement()?;

        let cont_line = self.line();
        let cont_pc = self.fb().current_pc();
        let one_slot = self.fb().add_constant(ConstantValue::Int(1))?;
        let sum_reg = self.fb().alloc_temp()?;
        self.fb().emit_rrr(
            Opcode::Add,
            sum_reg,
            RegOrConst::Reg(idx_slot),
            RegOrConst::Const(one_slot),
            cont_line,
        );
        self.fb().emit_rrr(
            Opcode::Move,
            idx_slot,
            RegOrConst::Reg(sum_reg),
            RegOrConst::Reg(0),
            cont_line,
        );
        let back_pc = self.fb().emit_rsn(Opcode::Jmp, 0, 0, cont_line);
        self.fb().patch_jump(back_pc, loop_start)?;

        let end_pc = self.fb().current_pc();
        self.fb().patch_jump(exit_jump, end_pc)?;
        self.fb().end_loop(cont_pc, end_pc)?;
        Ok(())
    }

    fn parse_break(&mut self) -> Result<(), CodegenError> {
        self.expect(TokenKind::Break)?;
        self.expect(TokenKind::Semi)?;
        let line = self.line();
        let pc = self.fb().emit_rsn(Opcode::Jmp, 0, 0, line);
        self.fb().add_break(pc)?;
        Ok(())
    }

    fn parse_continue(&mut self) -> Result<(), CodegenError> {
        self.expect(TokenKind::Continue)?;
        self.expect(TokenKind::Semi)?;
        let line = self.line();
        let pc = self.fb().emit_rsn(Opcode::Jmp, 0, 0, line);
        self.fb().add_continue(pc)?;
        Ok(())
    }

    fn parse_return(&mut self) -> Result<(), CodegenError> {
        self.expect(TokenKind::Return)?;
        if self.eat(&TokenKind::Semi) {
            let line = self.line();
            self.fb().emit_rn(Opcode::Ret, 0, 0, line);
            return Ok(());
        }
        let value = self.parse_expression()?;
        self.expect(TokenKind::Semi)?;
        let line = self.line();
        let reg = value.bake(self.fb(), line)?;
        self.fb().emit_rn(Opcode::Push, reg, 0, line);
        self.fb().emit_rn(Opcode::Ret, 1, 0, line);
        Ok(())
    }

    fn parse_function_decl(&mut self) -> Result<(), CodegenError> {
        self.expect(TokenKind::Function)?;
        let (name, _) = self.expect_ident()?;
        let compiled = self.parse_function_body(name)?;
        let line = self.line();
        let dst = self.emit_function_value(compiled, line)?;
        self.declare_and_store(name, dst, line)
    }

    /// `class Name { constructor(...){...} method(...){...} ... }` (spec
    /// §4.5: "`class` pushes a fresh `MaterObject` as the current class;
    /// every method ... becomes a property on it ...; `constructor` is
    /// special-cased and tagged as the call target for `new`").
    fn parse_class_decl(&mut self) -> Result<(), CodegenError> {
        self.expect(TokenKind::Class)?;
        let (name, _) = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;
        let line = self.line();
        let dst = self.fb().alloc_temp()?;
        self.fb().emit_rn(Opcode::LoadLitO, dst, 0, line);

        while !self.at(&TokenKind::RBrace) {
            let method_name = if self.eat(&TokenKind::Constructor) {
                well_known::CONSTRUCTOR
            } else {
                self.expect_ident()?.0
            };
            let compiled = self.parse_function_body(method_name)?;
            let mline = self.line();
            let freg = self.emit_function_value(compiled, mline)?;
            let key_slot = self.fb().add_constant(ConstantValue::Id(method_name))?;
            self.fb().emit_rrr(
                Opcode::AppendProp,
                dst,
                RegOrConst::Const(key_slot),
                RegOrConst::Reg(freg),
                mline,
            );
        }
        self.expect(TokenKind::RBrace)?;
        let line = self.line();
        self.declare_and_store(name, dst, line)
    }

    /// Materializes a compiled function as either a bare constant load (no
    /// captured environment) or a `CLOSURE` (spec §4.5 "Closures").
    fn emit_function_value(
        &mut self,
        compiled: crate::compiled::CompiledFunction,
        line: u32,
    ) -> Result<u8, CodegenError> {
        let has_upvalues = !compiled.upvalue_descs.is_empty();
        let slot = self
            .fb()
            .add_constant(ConstantValue::Function(Box::new(compiled)))?;
        let dst = self.fb().alloc_temp()?;
        if has_upvalues {
            self.fb().emit_rn(Opcode::Closure, dst, slot as u32, line);
        } else {
            self.fb()
                .emit_rrr(Opcode::Move, dst, RegOrConst::Const(slot), RegOrConst::Reg(0), line);
        }
        Ok(dst)
    }

    fn declare_and_store(&mut self, name: AtomId, reg: u8, line: u32) -> Result<(), CodegenError> {
        let slot = self.fb().declare_local(name);
        self.fb()
            .emit_rrr(Opcode::Move, slot, RegOrConst::Reg(reg), RegOrConst::Reg(0), line);
        Ok(())
    }

    /// Simplified `switch`: each `case` acts as an isolated comparison
    /// branch (no implicit fallthrough into the next case without an
    /// explicit `break`), which covers the overwhelming majority of
    /// real-world switch usage without a general jump-table.
    fn parse_switch(&mut self) -> Result<(), CodegenError> {
        self.expect(TokenKind::Switch)?;
        self.expect(TokenKind::LParen)?;
        let subject = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;
        let line = self.line();
        let subj_reg = subject.bake(self.fb(), line)?;
        self.expect(TokenKind::LBrace)?;

        self.fb().begin_break_scope();
        let mut pending_skips: Vec<usize> = Vec::new();

        while !self.at(&TokenKind::RBrace) {
            for pc in pending_skips.drain(..) {
                let here = self.fb().current_pc();
                self.fb().patch_jump(pc, here)?;
            }

            if self.eat(&TokenKind::Case) {
                let case_val = self.parse_expression()?;
                self.expect(TokenKind::Colon)?;
                let cline = self.line();
                let case_reg = case_val.bake(self.fb(), cline)?;
                let cmp_reg = self.fb().alloc_temp()?;
                self.fb().emit_rrr(
                    Opcode::Eq,
                    cmp_reg,
                    RegOrConst::Reg(subj_reg),
                    RegOrConst::Reg(case_reg),
                    cline,
                );
                let skip_pc = self.fb().emit_rsn(Opcode::Jf, cmp_reg, 0, cline);
                pending_skips.push(skip_pc);
                while !self.at(&TokenKind::Case)
                    && !self.at(&TokenKind::Default)
                    && !self.at(&TokenKind::RBrace)
                {
                    self.parse_statement()?;
                }
            } else if self.eat(&TokenKind::Default) {
                self.expect(TokenKind::Colon)?;
                while !self.at(&TokenKind::Case)
                    && !self.at(&TokenKind::Default)
                    && !self.at(&TokenKind::RBrace)
                {
                    self.parse_statement()?;
                }
            } else {
                let found = self.peek().to_string();
                self.error(format!("expected 'case' or 'default', found {found}"));
                return Err(CodegenError::UnexpectedToken {
                    expected: "case or default".to_string(),
                    found,
                });
            }
        }
        self.expect(TokenKind::RBrace)?;

        let end_pc = self.fb().current_pc();
        for pc in pending_skips.drain(..) {
            self.fb().patch_jump(pc, end_pc)?;
        }
        self.fb().end_break_scope(end_pc)?;
        Ok(())
    }
}
