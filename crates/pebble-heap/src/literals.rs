//! Per-program string literal table (spec §4.3).
//!
//! A [`StringLiteral`] is a 32-bit offset into a byte table of
//! null-terminated strings; insertion deduplicates on exact string match.

use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StringLiteral(pub u32);

#[derive(Debug, Default)]
pub struct LiteralTable {
    bytes: Vec<u8>,
    offsets: Vec<u32>, // offset -> implicit id by position in this vec
    by_string: FxHashMap<String, StringLiteral>,
}

impl LiteralTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `s`; returns its existing literal id if already present.
    pub fn add(&mut self, s: &str) -> StringLiteral {
        if let Some(&lit) = self.by_string.get(s) {
            return lit;
        }
        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        let lit = StringLiteral(offset);
        self.offsets.push(offset);
        self.by_string.insert(s.to_string(), lit);
        lit
    }

    pub fn get(&self, lit: StringLiteral) -> Option<&str> {
        let start = lit.0 as usize;
        if start > self.bytes.len() {
            return None;
        }
        let end = self.bytes[start..].iter().position(|&b| b == 0)? + start;
        core::str::from_utf8(&self.bytes[start..end]).ok()
    }

    /// `stringLiteralFromString` — idempotent: interning an already-known
    /// string returns the same id every time.
    pub fn literal_from_string(&self, s: &str) -> Option<StringLiteral> {
        self.by_string.get(s).copied()
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_and_dedup() {
        let mut table = LiteralTable::new();
        let a = table.add("hello");
        let b = table.add("hello");
        let c = table.add("world");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.get(a), Some("hello"));
        assert_eq!(table.get(c), Some("world"));
    }

    #[test]
    fn literal_from_string_is_idempotent() {
        let mut table = LiteralTable::new();
        let lit = table.add("x");
        assert_eq!(table.literal_from_string("x"), Some(lit));
        assert_eq!(table.literal_from_string("x"), Some(lit));
    }
}
