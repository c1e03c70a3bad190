//! Per-program atom table (spec §4.3), layered on the shared (ROM) table in
//! `pebble-common-core`.

use pebble_common_core::atom::{self, AtomId, MAX_USER_ATOM_LEN, SHARED_ATOM_COUNT};
use rustc_hash::FxHashMap;

#[derive(Debug, thiserror::Error)]
pub enum AtomError {
    #[error("atom exceeds maximum length of {MAX_USER_ATOM_LEN} bytes")]
    TooLong,
}

/// Grows for the lifetime of one `Program`. Ids below `SHARED_ATOM_COUNT`
/// are never stored here; they resolve directly against
/// `pebble_common_core::atom::SHARED_ATOMS`.
#[derive(Debug, Default)]
pub struct AtomTable {
    names: Vec<String>,
    by_name: FxHashMap<String, AtomId>,
}

impl AtomTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `name`, returning its (stable, dense) id. Equal strings
    /// always return the same id (spec §8 round-trip law).
    pub fn atomize(&mut self, name: &str) -> Result<AtomId, AtomError> {
        if let Some(id) = atom::lookup_shared(name) {
            return Ok(id);
        }
        if let Some(&id) = self.by_name.get(name) {
            return Ok(id);
        }
        if name.len() > MAX_USER_ATOM_LEN {
            return Err(AtomError::TooLong);
        }
        let id = AtomId::new((SHARED_ATOM_COUNT + self.names.len()) as u16);
        self.names.push(name.to_string());
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn resolve(&self, id: AtomId) -> Option<&str> {
        if id.is_shared() {
            return pebble_common_core::atom::SHARED_ATOMS.get(id.0 as usize).copied();
        }
        self.names.get(id.0 as usize - SHARED_ATOM_COUNT).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        SHARED_ATOM_COUNT + self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        false // the shared table is never empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomize_is_stable_and_deduplicates() {
        let mut table = AtomTable::new();
        let a = table.atomize("frobnicate").unwrap();
        let b = table.atomize("frobnicate").unwrap();
        let c = table.atomize("other").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.resolve(a), Some("frobnicate"));
    }

    #[test]
    fn shared_atoms_never_get_stored_twice() {
        let mut table = AtomTable::new();
        let id = table.atomize("length").unwrap();
        assert!(id.is_shared());
        assert_eq!(table.resolve(id), Some("length"));
    }

    #[test]
    fn overlong_atom_is_rejected() {
        let mut table = AtomTable::new();
        let long = "x".repeat(MAX_USER_ATOM_LEN + 1);
        assert!(table.atomize(&long).is_err());
    }
}
