//! docval: batch validator for JSON and XML documents
//!
//! JSON files are checked against a JSON Schema by a streaming or a
//! whole-document engine; XML files are checked for well-formedness and,
//! when their DOCTYPE references the configured DTD, for validity. One exit
//! code summarizes the batch.

pub mod cli;
pub mod core;
pub mod diagnostics;
pub mod dtd;
pub mod engine;
pub mod schema;
pub mod version;
