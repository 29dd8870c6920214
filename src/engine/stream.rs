//! Streaming schema engine
//!
//! Reads the document incrementally and delivers schema problems one at a
//! time to a [`ProblemHandler`]; invalidity is only ever reported that way.

use jsonschema::Validator as JsonValidator;
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::cli::output::Reporter;
use crate::core::error::EngineError;
use crate::core::outcome::{Outcome, Problem, Verdict};
use crate::engine::{Engine, EngineKind};
use crate::schema::{compile, format_schema_error, load_schema};

/// Receives problems as the validator finds them
pub trait ProblemHandler {
    fn handle_problem(&mut self, problem: Problem);
}

/// Collects delivered problems into one outcome
#[derive(Debug, Default)]
pub struct Accumulator {
    problems: Vec<Problem>,
}

impl ProblemHandler for Accumulator {
    fn handle_problem(&mut self, problem: Problem) {
        self.problems.push(problem);
    }
}

impl Accumulator {
    pub fn into_outcome(self) -> Outcome {
        Outcome::from_problems(self.problems)
    }
}

pub struct StreamSchemaEngine {
    validator: JsonValidator,
}

impl StreamSchemaEngine {
    pub fn new(schema: &Path) -> Result<Self, EngineError> {
        let document = load_schema(schema)?;
        let validator = compile(schema, &document)?;
        Ok(Self { validator })
    }

    /// Run the file through the validator, delivering problems to `handler`.
    /// Returns an I/O diagnostic if the file could not be read.
    pub fn stream(&self, file: &Path, handler: &mut dyn ProblemHandler) -> Result<(), String> {
        let name = file.display();
        let reader = File::open(file)
            .map(BufReader::new)
            .map_err(|e| format!("{}: {}", name, e))?;

        let instance: Value = match serde_json::from_reader(reader) {
            Ok(v) => v,
            Err(e) if e.is_io() => return Err(format!("{}: {}", name, e)),
            Err(e) => {
                handler.handle_problem(Problem::new(format!("{}: invalid JSON: {}", name, e)));
                return Ok(());
            }
        };

        for error in self.validator.iter_errors(&instance) {
            handler.handle_problem(Problem::new(format!(
                "{}: {}",
                name,
                format_schema_error(&error)
            )));
        }
        Ok(())
    }
}

impl Engine for StreamSchemaEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::StreamSchema
    }

    fn announce(&self, file: &Path) -> Option<String> {
        Some(format!("Validating '{}' with {}...", file.display(), self.kind()))
    }

    fn validate(&self, file: &Path, _reporter: &mut Reporter) -> Verdict {
        let mut handler = Accumulator::default();
        match self.stream(file, &mut handler) {
            Ok(()) => Verdict::graded(handler.into_outcome()),
            Err(diagnostic) => Verdict::graded(Outcome::Io(diagnostic)),
        }
    }
}
