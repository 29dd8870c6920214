//! Receivers for XML parse and validity diagnostics

use crate::core::outcome::Problem;
use crate::diagnostics::offset_to_line_col;

/// A diagnostic located at a byte offset of the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDiagnostic {
    pub offset: usize,
    pub message: String,
}

impl XmlDiagnostic {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// Receives diagnostics at three severities. All three are treated as
/// correctness failures by the XML engine.
pub trait DiagnosticSink {
    fn warning(&mut self, diagnostic: XmlDiagnostic);
    fn error(&mut self, diagnostic: XmlDiagnostic);
    fn fatal_error(&mut self, diagnostic: XmlDiagnostic);
}

/// Sink that renders diagnostics as problems with file:line:column
pub struct CollectingSink<'a> {
    file: &'a str,
    source: &'a str,
    problems: Vec<Problem>,
}

impl<'a> CollectingSink<'a> {
    pub fn new(file: &'a str, source: &'a str) -> Self {
        Self {
            file,
            source,
            problems: Vec::new(),
        }
    }

    fn push(&mut self, label: &str, diagnostic: XmlDiagnostic) {
        let (line, column) = offset_to_line_col(self.source, diagnostic.offset);
        self.problems.push(Problem::new(format!(
            "{}: {}:{}:{}: {}",
            label, self.file, line, column, diagnostic.message
        )));
    }

    pub fn into_problems(self) -> Vec<Problem> {
        self.problems
    }
}

impl DiagnosticSink for CollectingSink<'_> {
    fn warning(&mut self, diagnostic: XmlDiagnostic) {
        self.push("Warning", diagnostic);
    }

    fn error(&mut self, diagnostic: XmlDiagnostic) {
        self.push("Error", diagnostic);
    }

    fn fatal_error(&mut self, diagnostic: XmlDiagnostic) {
        self.push("Fatal error", diagnostic);
    }
}
