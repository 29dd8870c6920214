//! Run configuration and its preconditions

use std::fs::File;
use std::path::PathBuf;

use crate::core::error::UsageError;
use crate::engine::EngineKind;

/// Which engines run in this invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineSelection {
    pub stream_schema: bool,
    pub document_schema: bool,
    pub xml_dtd: bool,
    pub stream_passthrough: bool,
    pub document_passthrough: bool,
}

impl EngineSelection {
    pub fn is_enabled(&self, kind: EngineKind) -> bool {
        match kind {
            EngineKind::StreamSchema => self.stream_schema,
            EngineKind::DocumentSchema => self.document_schema,
            EngineKind::XmlDtd => self.xml_dtd,
            EngineKind::StreamPassthrough => self.stream_passthrough,
            EngineKind::DocumentPassthrough => self.document_passthrough,
        }
    }

    /// Enabled engines in execution priority order
    pub fn enabled(&self) -> Vec<EngineKind> {
        EngineKind::PRIORITY
            .iter()
            .copied()
            .filter(|kind| self.is_enabled(*kind))
            .collect()
    }

    pub fn any(&self) -> bool {
        !self.enabled().is_empty()
    }

    pub fn needs_schema(&self) -> bool {
        self.stream_schema || self.document_schema
    }
}

/// Everything one invocation needs
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub selection: EngineSelection,

    /// JSON schema, required by the schema engines
    pub schema: Option<PathBuf>,

    /// DTD, only consulted by the XML engine
    pub dtd: Option<PathBuf>,

    /// Suppress per-problem detail and progress lines
    pub quiet: bool,

    /// Print the version banner before running
    pub show_version: bool,

    /// Input files, in processing order
    pub files: Vec<PathBuf>,
}

impl Config {
    /// Check preconditions. Nothing here reads an input file.
    pub fn check(&self) -> Result<(), UsageError> {
        if !self.selection.any() {
            return Err(UsageError::NoEngine);
        }

        if self.selection.needs_schema() {
            let path = self.schema.as_ref().ok_or(UsageError::MissingSchema)?;
            File::open(path).map_err(|source| UsageError::UnreadableSchema {
                path: path.clone(),
                source,
            })?;
        }

        if self.selection.xml_dtd {
            if let Some(path) = self.dtd.as_ref().filter(|p| !p.as_os_str().is_empty()) {
                File::open(path).map_err(|source| UsageError::UnreadableDtd {
                    path: path.clone(),
                    source,
                })?;
            }
        }

        if self.files.is_empty() {
            return Err(UsageError::NoFiles);
        }

        Ok(())
    }
}
