//! Source file management: a `SourceFile`/`FileId` model trimmed to what a
//! single-translation-unit embedded engine needs — one file per compile,
//! loaded from disk or an in-memory string (a REPL line, an imported
//! fragment).

use std::path::PathBuf;
use std::sync::Arc;

/// A unique identifier for a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub u32);

impl FileId {
    pub const DUMMY: FileId = FileId(u32::MAX);
}

/// A loaded source file.
#[derive(Clone)]
pub struct SourceFile {
    pub id: FileId,
    pub name: Arc<str>,
    pub path: Option<PathBuf>,
    pub text: Arc<str>,
}

impl SourceFile {
    pub fn new(id: FileId, name: impl Into<Arc<str>>, text: impl Into<Arc<str>>) -> Self {
        Self {
            id,
            name: name.into(),
            path: None,
            text: text.into(),
        }
    }

    pub fn from_path(id: FileId, path: PathBuf, text: String) -> Self {
        let name: Arc<str> = Arc::from(path.to_string_lossy().into_owned());
        Self {
            id,
            name,
            path: Some(path),
            text: Arc::from(text),
        }
    }
}

/// Holds every source file registered in a compilation (usually one).
#[derive(Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    pub fn add(&mut self, name: impl Into<Arc<str>>, text: impl Into<Arc<str>>) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push(SourceFile::new(id, name, text));
        id
    }

    pub fn get(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(id.0 as usize)
    }
}
