//! JSON Schema system - loading, compilation and violation reporting

pub mod report;
pub mod validator;

pub use report::ViolationReport;
pub use validator::{compile, compile_with_formats, format_schema_error, load_schema};
