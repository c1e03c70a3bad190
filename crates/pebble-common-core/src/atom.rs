//! Atom ids and the shared (ROM-resident) atom table.
//!
//! An [`AtomId`] is a 16-bit id. Ids below [`SHARED_ATOM_COUNT`] name entries
//! in [`SHARED_ATOMS`], a table embedded in every build of the engine so
//! bytecode produced by one instance stays interpretable by another that
//! shares the same shared-atom prefix (see spec §6.6). Ids at or above
//! [`SHARED_ATOM_COUNT`] index a per-program table of user identifiers.

/// Maximum length, in bytes, of a user-defined atom.
pub const MAX_USER_ATOM_LEN: usize = 127;

/// 16-bit interned identifier id. Equality is id equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AtomId(pub u16);

impl AtomId {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    pub const fn is_shared(self) -> bool {
        (self.0 as usize) < SHARED_ATOM_COUNT
    }
}

/// The shared atom table. Order is load-bearing: ids are the index into
/// this array. Extending this table is a breaking change (spec §6.6) — new
/// well-known names must be appended, never inserted.
pub static SHARED_ATOMS: &[&str] = &[
    "",
    "length",
    "constructor",
    "__typeName",
    "__nativeObject",
    "push_back",
    "pop_back",
    "join",
    "this",
    "arguments",
    "prototype",
    "get",
    "set",
    "done",
    "next",
    "getValue",
    "setValue",
    "__object",
    "__index",
    "toString",
    "name",
];

pub const SHARED_ATOM_COUNT: usize = SHARED_ATOMS.len();

/// Well-known atom ids, usable without a table lookup at parse or codegen
/// time.
pub mod well_known {
    use super::AtomId;

    pub const EMPTY: AtomId = AtomId(0);
    pub const LENGTH: AtomId = AtomId(1);
    pub const CONSTRUCTOR: AtomId = AtomId(2);
    pub const TYPE_NAME: AtomId = AtomId(3);
    pub const NATIVE_OBJECT: AtomId = AtomId(4);
    pub const PUSH_BACK: AtomId = AtomId(5);
    pub const POP_BACK: AtomId = AtomId(6);
    pub const JOIN: AtomId = AtomId(7);
    pub const THIS: AtomId = AtomId(8);
    pub const ARGUMENTS: AtomId = AtomId(9);
    pub const PROTOTYPE: AtomId = AtomId(10);
    pub const GET: AtomId = AtomId(11);
    pub const SET: AtomId = AtomId(12);
    pub const DONE: AtomId = AtomId(13);
    pub const NEXT: AtomId = AtomId(14);
    pub const GET_VALUE: AtomId = AtomId(15);
    pub const SET_VALUE: AtomId = AtomId(16);
    pub const OBJECT: AtomId = AtomId(17);
    pub const INDEX: AtomId = AtomId(18);
    pub const TO_STRING: AtomId = AtomId(19);
    pub const NAME: AtomId = AtomId(20);
}

/// Look up a shared atom id by name, if it names one of the well-known
/// entries. Falls back to the per-program table otherwise.
pub fn lookup_shared(name: &str) -> Option<AtomId> {
    SHARED_ATOMS
        .iter()
        .position(|&s| s == name)
        .map(|idx| AtomId(idx as u16))
}
