//! Parse-error collection and rendering (spec §7: "Parse errors... Collected
//! into a list carried on the Parser, each with line/column/length/
//! description. Reported to the host; no bytecode is executed for that
//! translation unit.").

use crate::source::{FileId, SourceMap};
use crate::span::Span;
use codespan_reporting::diagnostic::{Diagnostic as CrDiagnostic, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term::{self, termcolor::Buffer};

/// A single parse error with enough information to render a caret
/// diagnostic against the offending source line.
#[derive(Debug, Clone)]
pub struct ParseDiagnostic {
    pub file: FileId,
    pub span: Span,
    pub message: String,
}

impl ParseDiagnostic {
    pub fn new(file: FileId, span: Span, message: impl Into<String>) -> Self {
        Self {
            file,
            span,
            message: message.into(),
        }
    }
}

/// A list of parse errors carried on the parser. No bytecode is executed
/// for a translation unit that produced any of these.
#[derive(Debug, Default)]
pub struct DiagnosticBag {
    diagnostics: Vec<ParseDiagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: ParseDiagnostic) {
        self.diagnostics.push(diag);
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParseDiagnostic> {
        self.diagnostics.iter()
    }

    /// Render every collected diagnostic as `file:line:col: message` plus a
    /// source snippet, using `codespan-reporting`'s plain renderer.
    pub fn render(&self, sources: &SourceMap) -> String {
        let mut files = SimpleFiles::new();
        let mut ids = Vec::new();
        for diag in &self.diagnostics {
            let src = sources.get(diag.file);
            let (name, text) = match src {
                Some(f) => (f.name.to_string(), f.text.to_string()),
                None => ("<unknown>".to_string(), String::new()),
            };
            ids.push(files.add(name, text));
        }

        let config = codespan_reporting::term::Config::default();
        let mut buffer = Buffer::no_color();
        for (diag, file_id) in self.diagnostics.iter().zip(ids) {
            let range = diag.span.range();
            let report = CrDiagnostic::error()
                .with_message(&diag.message)
                .with_labels(vec![Label::primary(file_id, range)]);
            let _ = term::emit(&mut buffer, &config, &files, &report);
        }
        String::from_utf8_lossy(buffer.as_slice()).into_owned()
    }
}
