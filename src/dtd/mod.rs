//! DTD support - declarations, content models, resolution and validity

pub mod content;
pub mod doctype;
pub mod parser;
pub mod resolver;
pub mod sink;
pub mod validator;

pub use doctype::DocType;
pub use parser::Dtd;
pub use resolver::{BaseNamePolicy, DtdResolver, Resolution};
pub use sink::{CollectingSink, DiagnosticSink, XmlDiagnostic};
pub use validator::DtdValidator;
