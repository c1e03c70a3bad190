//! Binary operator precedence table (spec §4.5: "a table of operator infos
//! `{token, precedence, associativity, storeFlag, op}`").

use pebble_common_core::instruction::Opcode;
use pebble_syntax::token::TokenKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Precedence(pub u8);

#[derive(Debug, Clone, Copy)]
pub struct OperatorInfo {
    pub precedence: Precedence,
    pub right_assoc: bool,
    pub op: Opcode,
}

/// Looks up a binary operator's precedence/associativity/opcode, or
/// `None` if `kind` isn't a binary operator token.
pub fn binary_op(kind: &TokenKind) -> Option<OperatorInfo> {
    use TokenKind::*;
    let (prec, op) = match kind {
        OrOr => (1, Opcode::Lor),
        AndAnd => (2, Opcode::Land),
        Pipe => (3, Opcode::Or),
        Caret => (4, Opcode::Xor),
        Amp => (5, Opcode::And),
        Eq => (6, Opcode::Eq),
        NotEq => (6, Opcode::Ne),
        Lt => (7, Opcode::Lt),
        LtEq => (7, Opcode::Le),
        Gt => (7, Opcode::Gt),
        GtEq => (7, Opcode::Ge),
        Shl => (8, Opcode::Shl),
        Shr => (8, Opcode::Shr),
        Sar => (8, Opcode::Sar),
        Plus => (9, Opcode::Add),
        Minus => (9, Opcode::Sub),
        Star => (10, Opcode::Mul),
        Slash => (10, Opcode::Div),
        Percent => (10, Opcode::Mod),
        _ => return None,
    };
    Some(OperatorInfo {
        precedence: Precedence(prec),
        right_assoc: false,
        op,
    })
}

/// Compound-assignment token -> the arithmetic/logic opcode it implies
/// (`a += b` lowers to `a = a + b` at the bytecode level).
pub fn compound_assign_op(kind: &TokenKind) -> Option<Opcode> {
    use TokenKind::*;
    Some(match kind {
        PlusAssign => Opcode::Add,
        MinusAssign => Opcode::Sub,
        StarAssign => Opcode::Mul,
        SlashAssign => Opcode::Div,
        PercentAssign => Opcode::Mod,
        AmpAssign => Opcode::And,
        PipeAssign => Opcode::Or,
        CaretAssign => Opcode::Xor,
        ShlAssign => Opcode::Shl,
        ShrAssign => Opcode::Shr,
        SarAssign => Opcode::Sar,
        _ => return None,
    })
}
