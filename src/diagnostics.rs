//! Source-located diagnostics for grammar files and XML positions

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// DTD syntax error with source location
#[derive(Debug, Error, Diagnostic)]
#[error("DTD syntax error: {message}")]
#[diagnostic(code(docval::dtd::syntax))]
pub struct DtdSyntaxError {
    #[source_code]
    src: NamedSource<String>,

    #[label("error here")]
    span: SourceSpan,

    #[help]
    help: Option<String>,

    /// The underlying error message
    message: String,
}

impl DtdSyntaxError {
    /// Create a syntax error at a byte offset in the DTD text
    pub fn at_offset(
        message: impl Into<String>,
        source: &str,
        filename: &str,
        offset: usize,
    ) -> Self {
        let message = message.into();
        let offset = offset.min(source.len());
        let help = generate_help(&message);

        Self {
            src: NamedSource::new(filename, source.to_string()),
            span: SourceSpan::from(offset..offset.saturating_add(1).min(source.len().max(1))),
            help,
            message,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Convert a byte offset to a 1-based (line, column) pair
pub fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut column = 1;

    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }

    (line, column)
}

/// Generate helpful suggestions based on error message
fn generate_help(message: &str) -> Option<String> {
    let msg_lower = message.to_lowercase();

    if msg_lower.contains("unterminated") {
        return Some("Every declaration must be closed with '>'".to_string());
    }

    if msg_lower.contains("content model") {
        return Some(
            "Content models are EMPTY, ANY, (#PCDATA|a|b)* or groups like (a, (b | c)*, d?)"
                .to_string(),
        );
    }

    if msg_lower.contains("default declaration") {
        return Some(
            "Attribute defaults are #REQUIRED, #IMPLIED, #FIXED \"value\" or \"value\"".to_string(),
        );
    }

    if msg_lower.contains("unknown declaration") {
        return Some("Supported declarations: ELEMENT, ATTLIST, ENTITY, NOTATION".to_string());
    }

    None
}
