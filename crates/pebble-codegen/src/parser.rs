//! Recursive-descent parser that emits bytecode directly as it parses
//! (spec §4.5: "A single-pass, recursive-descent parser directly emits
//! bytecode into the current `Function`"). Splits "what's being built"
//! (`FuncBuilder`) from "where we are in the source" (this module).

use crate::compiled::{CompiledFunction, ConstantValue};
use crate::error::CodegenError;
use crate::func_builder::FuncBuilder;
use pebble_common::{DiagnosticBag, FileId, ParseDiagnostic, Span};
use pebble_common_core::atom::AtomId;
use pebble_heap::object::{UpValueDesc, UpValueSource};
use pebble_heap::{AtomTable, LiteralTable};
use pebble_syntax::token::{Token, TokenKind};
use pebble_syntax::Scanner;

pub struct Parser<'a> {
    pub(crate) scanner: Scanner<'a>,
    pub(crate) functions: Vec<FuncBuilder>,
    pub(crate) atoms: AtomTable,
    pub(crate) literals: LiteralTable,
    pub(crate) diagnostics: DiagnosticBag,
    pub(crate) file: FileId,
    synthetic_counter: u32,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, file: FileId) -> Self {
        Self {
            scanner: Scanner::new(source),
            functions: Vec::new(),
            atoms: AtomTable::new(),
            literals: LiteralTable::new(),
            diagnostics: DiagnosticBag::new(),
            file,
            synthetic_counter: 0,
        }
    }

    /// A fresh local name no source identifier can collide with (`%` isn't
    /// a valid identifier start character), for loop desugaring state like
    /// the `for-in` index.
    pub(crate) fn synthetic_name(&mut self, base: &str) -> AtomId {
        self.synthetic_counter += 1;
        let name = format!("%{base}{}", self.synthetic_counter);
        self.atoms
            .atomize(&name)
            .unwrap_or(pebble_common_core::atom::well_known::EMPTY)
    }

    /// Parses a function's parameter list and body, given its already-
    /// consumed name, starting just before `(`. Shared by function
    /// declarations, function expressions, and class methods.
    pub(crate) fn parse_function_body(
        &mut self,
        name: AtomId,
    ) -> Result<CompiledFunction, CodegenError> {
        self.functions.push(FuncBuilder::new(name));
        self.expect(TokenKind::LParen)?;
        if !self.at(&TokenKind::RParen) {
            loop {
                let (pname, _) = self.expect_ident()?;
                self.fb().declare_param(pname);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::LBrace)?;
        while !self.at(&TokenKind::RBrace) {
            self.parse_statement()?;
        }
        self.expect(TokenKind::RBrace)?;
        let line = self.line();
        self.fb().emit_rn(pebble_common_core::instruction::Opcode::Ret, 0, 0, line);
        let fb = self.functions.pop().expect("function stack underflow");
        fb.finish()
    }

    pub fn into_diagnostics(self) -> DiagnosticBag {
        self.diagnostics
    }

    pub(crate) fn fb(&mut self) -> &mut FuncBuilder {
        self.functions.last_mut().expect("no active function")
    }

    pub(crate) fn line(&mut self) -> u32 {
        self.scanner.get_token().span.line
    }

    pub(crate) fn peek(&mut self) -> &TokenKind {
        &self.scanner.get_token().kind
    }

    pub(crate) fn advance(&mut self) -> Token {
        self.scanner.retire_token()
    }

    pub(crate) fn at(&mut self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(kind)
    }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> Result<Token, CodegenError> {
        if self.at(&kind) {
            Ok(self.advance())
        } else {
            let found = self.peek().to_string();
            self.error(format!("expected {kind}, found {found}"));
            Err(CodegenError::UnexpectedToken {
                expected: kind.to_string(),
                found,
            })
        }
    }

    pub(crate) fn expect_ident(&mut self) -> Result<(AtomId, Span), CodegenError> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::Ident(name) => {
                let atom = self.atoms.atomize(&name)?;
                Ok((atom, tok.span))
            }
            other => {
                self.error(format!("expected identifier, found {other}"));
                Err(CodegenError::UnexpectedToken {
                    expected: "identifier".to_string(),
                    found: other.to_string(),
                })
            }
        }
    }

    pub(crate) fn error(&mut self, message: impl Into<String>) {
        let span = self.scanner.get_token().span;
        self.diagnostics
            .push(ParseDiagnostic::new(self.file, span, message));
    }

    /// Resolves an identifier per spec §4.5 "Identifier resolution": local
    /// in the current function, else an upvalue chain through enclosing
    /// functions, else a global name lookup.
    pub(crate) fn resolve_identifier(
        &mut self,
        atom: AtomId,
    ) -> Result<crate::operand::Operand, CodegenError> {
        use crate::operand::Operand;

        let depth = self.functions.len();
        if let Some(slot) = self.functions[depth - 1].resolve_local(atom) {
            return Ok(Operand::Local(slot));
        }

        for frame in 1..depth {
            let owner_idx = depth - 1 - frame;
            if self.functions[owner_idx].resolve_local(atom).is_some() {
                let idx = self.register_upvalue_chain(owner_idx, atom);
                return Ok(Operand::UpValue(idx));
            }
        }

        let slot = self.fb().add_constant(ConstantValue::Id(atom))?;
        Ok(Operand::RefK(slot))
    }

    /// Registers an upvalue descriptor in every function strictly between
    /// `owner_idx` (which owns the local) and the current function,
    /// chaining `ParentLocal` then `ParentUpValue` links. Returns the
    /// upvalue index in the *current* function.
    fn register_upvalue_chain(&mut self, owner_idx: usize, atom: AtomId) -> u8 {
        let local_slot = self.functions[owner_idx].resolve_local(atom).unwrap();
        let mut idx = self.functions[owner_idx + 1].upvalue_index(UpValueDesc {
            name: atom,
            source: UpValueSource::ParentLocal(local_slot),
        });
        for i in (owner_idx + 2)..self.functions.len() {
            idx = self.functions[i].upvalue_index(UpValueDesc {
                name: atom,
                source: UpValueSource::ParentUpValue(idx),
            });
        }
        idx
    }

    /// Parses an entire source file into the root function.
    pub fn parse_program(mut self) -> Result<(CompiledFunction, AtomTable, LiteralTable), CodegenError> {
        let root_name = self.atoms.atomize("")?;
        self.functions.push(FuncBuilder::new(root_name));

        while !self.at(&TokenKind::Eof) {
            match self.parse_statement() {
                Ok(()) => {}
                Err(err) => {
                    self.error(err.to_string());
                    self.synchronize();
                }
            }
        }

        let line = self.line();
        self.fb().emit_rn(
            pebble_common_core::instruction::Opcode::Ret,
            0,
            0,
            line,
        );

        if !self.diagnostics.is_empty() {
            return Err(CodegenError::Internal(
                "parse completed with collected diagnostics".to_string(),
            ));
        }

        let root = self.functions.pop().unwrap().finish()?;
        Ok((root, self.atoms, self.literals))
    }

    /// Error recovery: skip to the next statement boundary.
    fn synchronize(&mut self) {
        loop {
            match self.peek() {
                TokenKind::Semi => {
                    self.advance();
                    return;
                }
                TokenKind::Eof | TokenKind::RBrace => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}
