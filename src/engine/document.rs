//! Whole-document schema engine
//!
//! Buffers the file, builds an array or object document depending on its
//! first character, and reports all violations as one structured report.

use jsonschema::Validator as JsonValidator;
use std::path::Path;

use crate::cli::output::Reporter;
use crate::core::error::EngineError;
use crate::core::outcome::{Outcome, Problem, Verdict};
use crate::engine::json::parse_document;
use crate::engine::{Engine, EngineKind};
use crate::schema::{compile_with_formats, load_schema, ViolationReport};

pub struct DocumentSchemaEngine {
    validator: JsonValidator,
}

impl DocumentSchemaEngine {
    pub fn new(schema: &Path) -> Result<Self, EngineError> {
        let document = load_schema(schema)?;
        let validator = compile_with_formats(schema, &document)?;
        Ok(Self { validator })
    }

    fn check(&self, file: &Path) -> Outcome {
        let text = match std::fs::read_to_string(file) {
            Ok(t) => t,
            Err(e) => return Outcome::Io(format!("{}: {}", file.display(), e)),
        };

        let instance = match parse_document(&text) {
            Ok(v) => v,
            Err(e) => {
                return Outcome::Invalid(vec![Problem::new(format!(
                    "{}: invalid JSON: {}",
                    file.display(),
                    e
                ))])
            }
        };

        if self.validator.is_valid(&instance) {
            return Outcome::Valid;
        }
        match ViolationReport::from_errors(self.validator.iter_errors(&instance)) {
            Some(report) => Outcome::Invalid(vec![Problem::new(report.to_pretty_json())]),
            None => Outcome::Valid,
        }
    }
}

impl Engine for DocumentSchemaEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::DocumentSchema
    }

    fn announce(&self, file: &Path) -> Option<String> {
        Some(format!("Validating '{}' with {}...", file.display(), self.kind()))
    }

    fn validate(&self, file: &Path, _reporter: &mut Reporter) -> Verdict {
        Verdict::graded(self.check(file))
    }
}
