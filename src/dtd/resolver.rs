//! Decides whether a configured DTD is applied to a document reference

use std::path::{Path, PathBuf};

/// How a document's external DTD reference was resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The configured DTD replaces the reference and validation proceeds
    Applied(PathBuf),

    /// No DTD is configured; the document is only parsed
    Passthrough,

    /// A DTD is configured but the document asks for a different one, or
    /// names none; the document is only parsed
    Mismatched {
        expected: Option<String>,
        provided: String,
    },
}

/// Resolves the external identifier of a document type declaration.
///
/// Implementations must be stateless: every reference is resolved on its own,
/// so a batch can mix matching and non-matching documents.
pub trait DtdResolver {
    fn resolve(&self, public_id: Option<&str>, system_id: Option<&str>) -> Resolution;
}

/// Matches references against one configured DTD by base file name
#[derive(Debug, Clone, Default)]
pub struct BaseNamePolicy {
    configured: Option<PathBuf>,
}

impl BaseNamePolicy {
    pub fn new(configured: Option<PathBuf>) -> Self {
        Self {
            configured: configured.filter(|p| !p.as_os_str().is_empty()),
        }
    }

    pub fn configured(&self) -> Option<&Path> {
        self.configured.as_deref()
    }
}

impl DtdResolver for BaseNamePolicy {
    fn resolve(&self, _public_id: Option<&str>, system_id: Option<&str>) -> Resolution {
        let Some(configured) = &self.configured else {
            return Resolution::Passthrough;
        };
        let provided = base_name(&configured.to_string_lossy()).to_string();

        match system_id {
            Some(system_id) if base_name(system_id) == provided => {
                Resolution::Applied(configured.clone())
            }
            Some(system_id) => Resolution::Mismatched {
                expected: Some(base_name(system_id).to_string()),
                provided,
            },
            None => Resolution::Mismatched {
                expected: None,
                provided,
            },
        }
    }
}

/// Last path segment of a system identifier, which may be a URI
fn base_name(system_id: &str) -> &str {
    let trimmed = system_id.trim_end_matches(['/', '\\']);
    trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed)
}
