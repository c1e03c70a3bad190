//! Errors surfaced at the boundaries of the execution unit (spec §7).
//!
//! Ordinary runtime errors (bad property access, division by zero, ...)
//! are *not* represented here: per spec §7 they're reported through
//! [`crate::system::SystemInterface::printf`]-style diagnostics and leave a
//! safe default on the stack, they don't unwind. This enum is for the
//! harder failures: a host program asking to load bytecode that doesn't
//! parse, or a VM that has exceeded its error budget and must stop.

#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error("atom error: {0}")]
    Atom(#[from] pebble_heap::AtomError),
    #[error("codegen error: {0}")]
    Codegen(#[from] pebble_codegen::CodegenError),
    #[error("terminated after exceeding the runtime error limit (30)")]
    TooManyErrors,
    #[error("requested termination")]
    Terminated,
}
