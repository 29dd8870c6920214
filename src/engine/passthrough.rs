//! Parse-only engines, no schema semantics

use serde::de::IgnoredAny;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::cli::output::Reporter;
use crate::core::outcome::{Outcome, Verdict};
use crate::engine::json::{parse_document, sniff, DocumentShape};
use crate::engine::{Engine, EngineKind};

/// Drains the streaming parser over a buffered reader
pub struct StreamPassthroughEngine;

impl Engine for StreamPassthroughEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::StreamPassthrough
    }

    fn announce(&self, file: &Path) -> Option<String> {
        Some(format!(
            "NOT validating (passthrough) '{}' with {}...",
            file.display(),
            self.kind()
        ))
    }

    fn validate(&self, file: &Path, _reporter: &mut Reporter) -> Verdict {
        let reader = match File::open(file) {
            Ok(f) => BufReader::new(f),
            Err(e) => return Verdict::ungraded(Outcome::Io(format!("{}: {}", file.display(), e))),
        };

        let failed = |e: serde_json::Error| {
            let outcome = if e.is_io() {
                Outcome::Io(format!("{}: {}", file.display(), e))
            } else {
                Outcome::Syntax(format!("{}: {}", file.display(), e))
            };
            Verdict::ungraded(outcome)
        };

        // One document at most; whitespace-only input has no tokens
        let mut stream = serde_json::Deserializer::from_reader(reader).into_iter::<IgnoredAny>();
        match stream.next() {
            None => return Verdict::ungraded(Outcome::Valid),
            Some(Err(e)) => return failed(e),
            Some(Ok(_)) => {}
        }
        let end = stream.byte_offset();
        match stream.next() {
            None => {}
            Some(Err(e)) => return failed(e),
            Some(Ok(_)) => {
                return Verdict::ungraded(Outcome::Syntax(format!(
                    "{}: trailing characters after the document ending at byte {}",
                    file.display(),
                    end
                )))
            }
        }
        Verdict::ungraded(Outcome::Valid)
    }
}

/// Buffers the file and builds the document with the type-specific
/// constructors
pub struct DocumentPassthroughEngine;

impl Engine for DocumentPassthroughEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::DocumentPassthrough
    }

    fn announce(&self, file: &Path) -> Option<String> {
        Some(format!(
            "NOT validating (passthrough) '{}' with {}...",
            file.display(),
            self.kind()
        ))
    }

    fn validate(&self, file: &Path, _reporter: &mut Reporter) -> Verdict {
        let text = match std::fs::read_to_string(file) {
            Ok(t) => t,
            Err(e) => return Verdict::ungraded(Outcome::Io(format!("{}: {}", file.display(), e))),
        };

        // No tokens, nothing to reject
        if sniff(&text) == DocumentShape::Empty {
            return Verdict::ungraded(Outcome::Valid);
        }

        match parse_document(&text) {
            Ok(_) => Verdict::ungraded(Outcome::Valid),
            Err(e) => Verdict::ungraded(Outcome::Syntax(format!("{}: {}", file.display(), e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn run(engine: &dyn Engine, content: &str) -> Verdict {
        let dir = tempdir().unwrap();
        let file = dir.path().join("doc.json");
        fs::write(&file, content).unwrap();
        let (mut reporter, _) = Reporter::capture(false);
        engine.validate(&file, &mut reporter)
    }

    #[test]
    fn test_stream_passthrough() {
        assert_eq!(run(&StreamPassthroughEngine, r#"{"a": [1, 2]}"#).outcome, Outcome::Valid);
        assert_eq!(run(&StreamPassthroughEngine, "").outcome, Outcome::Valid);
        assert!(matches!(
            run(&StreamPassthroughEngine, r#"{"a": [1, 2}"#).outcome,
            Outcome::Syntax(_)
        ));
        assert!(!run(&StreamPassthroughEngine, "{}").graded);
    }

    #[test]
    fn test_stream_passthrough_rejects_concatenated_documents() {
        match run(&StreamPassthroughEngine, r#"{"a": 1} {"b": 2} [3]"#).outcome {
            Outcome::Syntax(detail) => assert!(detail.contains("trailing characters"), "{}", detail),
            other => panic!("expected syntax error, got {:?}", other),
        }
        assert!(matches!(
            run(&StreamPassthroughEngine, "[1] garbage").outcome,
            Outcome::Syntax(_)
        ));
        assert_eq!(run(&StreamPassthroughEngine, "[1]\n\n").outcome, Outcome::Valid);
    }

    #[test]
    fn test_document_passthrough() {
        assert_eq!(run(&DocumentPassthroughEngine, "[true, null]").outcome, Outcome::Valid);
        assert_eq!(run(&DocumentPassthroughEngine, "  \n ").outcome, Outcome::Valid);
        assert!(matches!(
            run(&DocumentPassthroughEngine, "{\"a\" 1}").outcome,
            Outcome::Syntax(_)
        ));
    }

    #[test]
    fn test_missing_file_is_io() {
        let dir = tempdir().unwrap();
        let (mut reporter, _) = Reporter::capture(false);
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            StreamPassthroughEngine.validate(&missing, &mut reporter).outcome,
            Outcome::Io(_)
        ));
        assert!(matches!(
            DocumentPassthroughEngine.validate(&missing, &mut reporter).outcome,
            Outcome::Io(_)
        ));
    }
}
