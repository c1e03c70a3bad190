//! `ValueKind` — the discriminant carried by every [`crate::mad::Mad`]-free
//! tag of a `Value`, used by the GC and by the VM's type-dispatching
//! opcodes without needing the full `Value` representation (which lives in
//! `pebble-heap`, since it references heap object layouts).

use num_enum::{IntoPrimitive, TryFromPrimitive};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum ValueKind {
    None = 0,
    Null,
    Bool,
    Integer,
    Float,
    String,
    StringLiteral,
    Id,
    Object,
    NativeObject,
    NativeFunction,
    StaticObject,
}

impl ValueKind {
    /// Whether a `Value` of this kind can hold a GC-managed heap reference.
    pub const fn is_heap_managed(self) -> bool {
        matches!(self, ValueKind::String | ValueKind::Object)
    }
}
