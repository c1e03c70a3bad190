//! # pebble-common-core
//!
//! Core types for the Pebble embedded scripting engine that are `no_std`
//! compatible. This crate provides the foundational types shared by the
//! compiler front end and the execution unit:
//!
//! - [`atom`] — interned identifier ids and the shared atom table.
//! - [`mad`] — `Mad<T>`, the 16-bit block-scaled heap handle.
//! - [`value_kind`] — the `Value` type tag.
//! - [`instruction`] — the packed 32-bit instruction format and opcodes.
//! - [`call_return`] — the VM <-> native `CallReturnValue` ABI.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod atom;
pub mod call_return;
pub mod instruction;
pub mod mad;
pub mod value_kind;

pub use atom::{AtomId, SHARED_ATOMS, SHARED_ATOM_COUNT};
pub use call_return::{CallReturnValue, ErrorCode};
pub use instruction::{Instruction, Opcode};
pub use mad::Mad;
pub use value_kind::ValueKind;
