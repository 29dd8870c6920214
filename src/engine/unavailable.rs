//! Stand-in for an engine whose validator could not be built

use std::path::Path;

use crate::cli::output::Reporter;
use crate::core::outcome::{Outcome, Verdict};
use crate::engine::{Engine, EngineKind};

pub struct UnavailableEngine {
    kind: EngineKind,
    reason: String,
}

impl UnavailableEngine {
    pub fn new(kind: EngineKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

impl Engine for UnavailableEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    fn announce(&self, _file: &Path) -> Option<String> {
        None
    }

    fn validate(&self, file: &Path, _reporter: &mut Reporter) -> Verdict {
        let outcome = Outcome::Internal(format!(
            "{}: no {} validator available ({})",
            file.display(),
            self.kind,
            self.reason
        ));
        if self.kind.is_schema() {
            Verdict::graded(outcome)
        } else {
            Verdict::ungraded(outcome)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_always_internal() {
        let engine = UnavailableEngine::new(EngineKind::DocumentSchema, "bad schema");
        let (mut reporter, _) = Reporter::capture(false);
        let verdict = engine.validate(Path::new("a.json"), &mut reporter);
        assert!(matches!(verdict.outcome, Outcome::Internal(ref m) if m.contains("bad schema")));
        assert!(verdict.graded);

        let engine = UnavailableEngine::new(EngineKind::XmlDtd, "bad dtd");
        assert!(!engine.validate(Path::new("a.xml"), &mut reporter).graded);
    }
}
