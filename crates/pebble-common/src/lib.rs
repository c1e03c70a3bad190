//! # pebble-common
//!
//! Shared infrastructure for the Pebble engine: source file management and
//! diagnostic rendering.

pub mod config;
pub mod diagnostics;
pub mod source;
pub mod span;

pub use config::{Config, ConfigError};
pub use diagnostics::{DiagnosticBag, ParseDiagnostic};
pub use source::{FileId, SourceFile, SourceMap};
pub use span::{BytePos, Span};
