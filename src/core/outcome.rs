//! Per-file, per-engine results

use std::fmt;

/// A single human-readable diagnostic produced by an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    text: String,
}

impl Problem {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Result of running one engine over one file
///
/// Every engine failure mode is folded into one of these variants at the
/// adapter boundary; nothing an engine does can abort the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Document satisfied the engine
    Valid,

    /// Document was checked and violated the schema or grammar
    Invalid(Vec<Problem>),

    /// Document could not be parsed by a syntax-only engine
    Syntax(String),

    /// Document could not be read
    Io(String),

    /// Engine had no usable validator instance for this run
    Internal(String),
}

impl Outcome {
    /// Build an outcome from accumulated problems
    pub fn from_problems(problems: Vec<Problem>) -> Self {
        if problems.is_empty() {
            Outcome::Valid
        } else {
            Outcome::Invalid(problems)
        }
    }

    /// Whether this outcome flips the aggregate correctness flag
    pub fn affects_correctness(&self) -> bool {
        matches!(self, Outcome::Invalid(_) | Outcome::Syntax(_))
    }
}

/// An outcome plus whether it takes part in the aggregate summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub outcome: Outcome,

    /// True when this result was produced by actual schema or grammar
    /// checking, as opposed to a parse-only pass
    pub graded: bool,
}

impl Verdict {
    pub fn graded(outcome: Outcome) -> Self {
        Self {
            outcome,
            graded: true,
        }
    }

    pub fn ungraded(outcome: Outcome) -> Self {
        Self {
            outcome,
            graded: false,
        }
    }
}
