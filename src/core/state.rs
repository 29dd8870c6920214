//! Accumulated state for one invocation

use crate::core::outcome::{Outcome, Verdict};

/// Correctness and failure flags gathered while a batch runs
///
/// Owned by the orchestrator for the duration of a run and handed to the
/// exit-code mapper afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    /// False once any file failed any engine
    pub all_correct: bool,

    /// Some passthrough engine hit malformed input
    pub syntax_error: bool,

    /// Some input file could not be read
    pub file_io_error: bool,

    /// An engine could not read its schema or DTD at construction time
    pub construction_io_error: bool,

    /// Some engine had no usable validator instance
    pub internal_error: bool,

    /// At least one verdict came from real schema or grammar checking
    pub graded: bool,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            all_correct: true,
            syntax_error: false,
            file_io_error: false,
            construction_io_error: false,
            internal_error: false,
            graded: false,
        }
    }
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one engine's verdict into the state
    pub fn record(&mut self, verdict: &Verdict) {
        if verdict.graded {
            self.graded = true;
        }
        if verdict.outcome.affects_correctness() {
            self.all_correct = false;
        }
        match verdict.outcome {
            Outcome::Syntax(_) => self.syntax_error = true,
            Outcome::Io(_) => self.file_io_error = true,
            Outcome::Internal(_) => self.internal_error = true,
            Outcome::Valid | Outcome::Invalid(_) => {}
        }
    }
}
