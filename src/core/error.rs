//! Errors raised before or while engines are set up

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

use crate::diagnostics::DtdSyntaxError;

/// Invalid invocation, detected before any input file is touched
#[derive(Debug, Error, Diagnostic)]
pub enum UsageError {
    #[error("At least one of -vj, -ve, -vx, -pj, -pe must be specified")]
    #[diagnostic(
        code(docval::usage::no_engine),
        help("Pick a schema engine (-vj, -ve), the XML engine (-vx) or a passthrough (-pj, -pe)")
    )]
    NoEngine,

    #[error("With -vj, -ve, a readable schema file must be specified with -s")]
    #[diagnostic(code(docval::usage::missing_schema))]
    MissingSchema,

    #[error("Schema file is not readable: {path}")]
    #[diagnostic(code(docval::usage::unreadable_schema))]
    UnreadableSchema {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("DTD file is not readable: {path}")]
    #[diagnostic(code(docval::usage::unreadable_dtd))]
    UnreadableDtd {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("At least one file to validate must be specified")]
    #[diagnostic(code(docval::usage::no_files))]
    NoFiles,
}

/// Failure to build an engine's validator instance from its schema or DTD
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("Failed to read schema {path}")]
    #[diagnostic(code(docval::engine::schema_read))]
    SchemaRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema {path} is not valid JSON")]
    #[diagnostic(code(docval::engine::schema_parse))]
    SchemaParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Schema {path} is not a usable JSON Schema: {message}")]
    #[diagnostic(
        code(docval::engine::schema_compile),
        help("Check the schema against the JSON Schema meta-schema")
    )]
    SchemaCompile { path: PathBuf, message: String },

    #[error("Failed to read DTD {path}")]
    #[diagnostic(code(docval::engine::dtd_read))]
    DtdRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    DtdSyntax(#[from] DtdSyntaxError),
}

impl EngineError {
    /// Whether the schema or DTD could not be read at all, as opposed to
    /// read but rejected
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            EngineError::SchemaRead { .. } | EngineError::DtdRead { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_io() {
        let err = EngineError::SchemaRead {
            path: PathBuf::from("s.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.is_io());

        let err = EngineError::SchemaCompile {
            path: PathBuf::from("s.json"),
            message: "bad type".into(),
        };
        assert!(!err.is_io());
    }

    #[test]
    fn test_usage_messages() {
        assert!(UsageError::NoEngine.to_string().contains("-vj"));
        assert!(UsageError::MissingSchema.to_string().contains("-s"));
    }
}
