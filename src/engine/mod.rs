//! Validation engines behind one capability
//!
//! Each engine turns a file into a [`Verdict`]; everything an underlying
//! parser or validator can throw is converted at this boundary.

pub mod document;
pub mod json;
pub mod passthrough;
pub mod stream;
pub mod unavailable;
pub mod xml;

use std::fmt;
use std::path::Path;

use crate::cli::output::Reporter;
use crate::core::config::Config;
use crate::core::error::EngineError;
use crate::core::outcome::Verdict;

pub use document::DocumentSchemaEngine;
pub use passthrough::{DocumentPassthroughEngine, StreamPassthroughEngine};
pub use stream::{ProblemHandler, StreamSchemaEngine};
pub use unavailable::UnavailableEngine;
pub use xml::XmlDtdEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    StreamSchema,
    DocumentSchema,
    XmlDtd,
    StreamPassthrough,
    DocumentPassthrough,
}

impl EngineKind {
    /// Order in which engines run on each file
    pub const PRIORITY: [EngineKind; 5] = [
        EngineKind::StreamSchema,
        EngineKind::DocumentSchema,
        EngineKind::XmlDtd,
        EngineKind::StreamPassthrough,
        EngineKind::DocumentPassthrough,
    ];

    pub fn is_schema(self) -> bool {
        matches!(self, EngineKind::StreamSchema | EngineKind::DocumentSchema)
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineKind::StreamSchema => "stream",
            EngineKind::DocumentSchema => "document",
            EngineKind::XmlDtd => "xml",
            EngineKind::StreamPassthrough => "stream parser",
            EngineKind::DocumentPassthrough => "document parser",
        };
        f.write_str(name)
    }
}

/// A validation or passthrough back-end
pub trait Engine {
    fn kind(&self) -> EngineKind;

    /// Progress line printed before this engine runs on `file`
    fn announce(&self, file: &Path) -> Option<String>;

    /// Check one file. Never panics on bad input; every failure becomes part
    /// of the returned verdict. `reporter` receives engine-specific notes.
    fn validate(&self, file: &Path, reporter: &mut Reporter) -> Verdict;
}

/// Engines for one run, in priority order
pub struct EngineSet {
    pub engines: Vec<Box<dyn Engine>>,

    /// Construction failures; each failed engine is replaced by an
    /// [`UnavailableEngine`]
    pub failures: Vec<EngineError>,
}

impl EngineSet {
    /// Build every enabled engine once. Schemas and the DTD are read,
    /// parsed and compiled here and reused for every file.
    pub fn build(config: &Config) -> Self {
        let mut engines: Vec<Box<dyn Engine>> = Vec::new();
        let mut failures = Vec::new();

        for kind in config.selection.enabled() {
            let built: Result<Box<dyn Engine>, EngineError> = match kind {
                EngineKind::StreamSchema => schema_path(config)
                    .and_then(StreamSchemaEngine::new)
                    .map(|e| Box::new(e) as Box<dyn Engine>),
                EngineKind::DocumentSchema => schema_path(config)
                    .and_then(DocumentSchemaEngine::new)
                    .map(|e| Box::new(e) as Box<dyn Engine>),
                EngineKind::XmlDtd => XmlDtdEngine::new(config.dtd.as_deref())
                    .map(|e| Box::new(e) as Box<dyn Engine>),
                EngineKind::StreamPassthrough => Ok(Box::new(StreamPassthroughEngine)),
                EngineKind::DocumentPassthrough => Ok(Box::new(DocumentPassthroughEngine)),
            };

            match built {
                Ok(engine) => engines.push(engine),
                Err(err) => {
                    engines.push(Box::new(UnavailableEngine::new(kind, err.to_string())));
                    failures.push(err);
                }
            }
        }

        Self { engines, failures }
    }

    pub fn construction_io_failed(&self) -> bool {
        self.failures.iter().any(EngineError::is_io)
    }
}

fn schema_path(config: &Config) -> Result<&Path, EngineError> {
    config
        .schema
        .as_deref()
        .ok_or_else(|| EngineError::SchemaRead {
            path: Default::default(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no schema configured"),
        })
}
