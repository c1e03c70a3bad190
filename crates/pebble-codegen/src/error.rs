//! Codegen errors.

#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    #[error("unexpected token: expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },
    #[error("variable not found: {0}")]
    VariableNotFound(String),
    #[error("invalid left-hand side in assignment")]
    InvalidLhs,
    #[error("'break' outside of a loop or switch")]
    BreakOutsideLoop,
    #[error("'continue' outside of a loop")]
    ContinueOutsideLoop,
    #[error("too many registers required by a single function (limit 256)")]
    RegisterOverflow,
    #[error("too many constants in a single function (limit {0})")]
    ConstantOverflow(u16),
    #[error("jump target too far (limit fits 17 signed bits)")]
    JumpOutOfRange,
    #[error("atom error: {0}")]
    Atom(#[from] pebble_heap::AtomError),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("internal codegen error: {0}")]
    Internal(String),
}
