//! Register-based bytecode virtual machine (spec §3, §4.6, §4.7).
//!
//! Turns a [`pebble_codegen::CompiledProgram`] into live heap objects
//! ([`loader`]), then runs it on an [`exec::Vm`] — the execution unit that
//! owns the register stack, call frames, event queue, and GC pacing.

pub mod error;
pub mod event;
pub mod exec;
pub mod frame;
pub mod loader;
pub mod scheduler;
pub mod system;

pub use error::VmError;
pub use event::{EventEntry, EventQueue};
pub use exec::{RunOutcome, Vm};
pub use frame::Frame;
pub use loader::load_program;
pub use scheduler::{Scheduler, Task, TaskOutcome};
pub use system::SystemInterface;
