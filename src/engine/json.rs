//! Whole-document JSON parsing with type-specific constructors

use serde_json::{Map, Value};

/// What the first non-whitespace character says about a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentShape {
    Array,
    Object,
    /// Whitespace only
    Empty,
}

pub fn sniff(text: &str) -> DocumentShape {
    match text.trim_start().chars().next() {
        Some('[') => DocumentShape::Array,
        Some(_) => DocumentShape::Object,
        None => DocumentShape::Empty,
    }
}

/// Parse as an array when the document starts with `[`, otherwise as an
/// object. Scalars at the top level are rejected.
pub fn parse_document(text: &str) -> Result<Value, serde_json::Error> {
    match sniff(text) {
        DocumentShape::Array => serde_json::from_str::<Vec<Value>>(text).map(Value::Array),
        DocumentShape::Object | DocumentShape::Empty => {
            serde_json::from_str::<Map<String, Value>>(text).map(Value::Object)
        }
    }
}
