//! Engine configuration: heap size, GC thresholds, and the event poll rate
//! (spec §4.1/§4.2/§4.8 defaults), loadable from a `pebble.toml`-style file
//! or constructed in memory with [`Config::default`].

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default heap size handed to a freshly constructed `Heap` absent any
/// config file: 4 MiB, comfortable for the scripts this engine targets.
pub const DEFAULT_HEAP_BYTES: usize = 4 * 1024 * 1024;

/// Matches `pebble_heap::GcThresholds::default()`'s object count.
pub const DEFAULT_GC_OBJECT_THRESHOLD: u32 = 256;

/// Matches `pebble_heap::GcThresholds::default()`'s string byte count.
pub const DEFAULT_GC_STRING_BYTE_THRESHOLD: u32 = 16 * 1024;

/// Matches `pebble_vm::scheduler::POLL_RATE_MS`.
pub const DEFAULT_EVENT_POLL_RATE_MS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub heap_bytes: usize,
    pub gc_object_threshold: u32,
    pub gc_string_byte_threshold: u32,
    pub event_poll_rate_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            heap_bytes: DEFAULT_HEAP_BYTES,
            gc_object_threshold: DEFAULT_GC_OBJECT_THRESHOLD,
            gc_string_byte_threshold: DEFAULT_GC_STRING_BYTE_THRESHOLD,
            event_poll_rate_ms: DEFAULT_EVENT_POLL_RATE_MS,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{path}': {source}")]
    Io { path: String, source: std::io::Error },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Loads `path` if it exists, else returns the defaults. A missing file
    /// is not an error: most invocations run with no config file at all.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::Io { path: path.display().to_string(), source: e }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = Config::default();
        assert_eq!(c.heap_bytes, DEFAULT_HEAP_BYTES);
        assert_eq!(c.gc_object_threshold, DEFAULT_GC_OBJECT_THRESHOLD);
        assert_eq!(c.event_poll_rate_ms, DEFAULT_EVENT_POLL_RATE_MS);
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let c = Config::from_toml_str("heap_bytes = 65536\n").unwrap();
        assert_eq!(c.heap_bytes, 65536);
        assert_eq!(c.gc_object_threshold, DEFAULT_GC_OBJECT_THRESHOLD);
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let c = Config::load_or_default(Path::new("/nonexistent/pebble.toml")).unwrap();
        assert_eq!(c, Config::default());
    }
}
