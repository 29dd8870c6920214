//! XML well-formedness and DTD validity engine
//!
//! Every file is parsed. The configured DTD is only applied when a
//! document's external reference resolves to it; everything else is a
//! passthrough parse whose fatal errors still count.

use quick_xml::escape::{resolve_predefined_entity, unescape_with, EscapeError};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;
use std::fs;
use std::path::Path;

use crate::cli::output::Reporter;
use crate::core::error::EngineError;
use crate::core::outcome::{Outcome, Problem, Verdict};
use crate::dtd::{
    BaseNamePolicy, CollectingSink, DiagnosticSink, DocType, Dtd, DtdResolver, DtdValidator,
    Resolution, XmlDiagnostic,
};
use crate::engine::{Engine, EngineKind};

pub struct XmlDtdEngine {
    policy: BaseNamePolicy,
    dtd: Option<Dtd>,
}

impl XmlDtdEngine {
    /// Load the DTD once, if one is configured
    pub fn new(dtd: Option<&Path>) -> Result<Self, EngineError> {
        let dtd = dtd.filter(|p| !p.as_os_str().is_empty());
        let grammar = dtd.map(load_dtd).transpose()?;
        Ok(Self {
            policy: BaseNamePolicy::new(dtd.map(Path::to_path_buf)),
            dtd: grammar,
        })
    }

    /// Parse `text` and report diagnostics to `sink`. Returns whether a DTD
    /// was applied to the document.
    pub fn check(
        &self,
        file: &str,
        text: &str,
        resolver: &dyn DtdResolver,
        sink: &mut dyn DiagnosticSink,
        reporter: &mut Reporter,
    ) -> bool {
        let mut walk = Walk::default();
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(false);

        loop {
            let offset = reader.buffer_position() as usize;
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(e) => {
                    sink.fatal_error(XmlDiagnostic::new(offset, e.to_string()));
                    break;
                }
            };

            match event {
                Event::DocType(content) => {
                    let content = String::from_utf8_lossy(&content).into_owned();
                    let misplaced = walk.seen_doctype || walk.seen_root;
                    walk.local = internal_entities(content.trim_start(), file);
                    walk.validator =
                        self.doctype(file, content.trim_start(), offset, misplaced, resolver, sink, reporter);
                    walk.applied |= walk.validator.is_some();
                    walk.seen_doctype = true;
                }
                Event::Start(e) => walk.start(&e, offset, false, sink),
                Event::Empty(e) => walk.start(&e, offset, true, sink),
                Event::End(_) => walk.end(offset, sink),
                Event::Text(t) => {
                    let raw = String::from_utf8_lossy(&t);
                    if let Err(e) = expand_references(&raw, walk.entities()) {
                        sink.fatal_error(XmlDiagnostic::new(
                            offset,
                            format!("Invalid reference in character data: {}", e),
                        ));
                    }
                    let significant = raw.bytes().any(|b| !b.is_ascii_whitespace());
                    walk.text(significant, offset, sink);
                }
                Event::CData(_) => walk.text(true, offset, sink),
                Event::Eof => {
                    walk.eof(offset, sink);
                    break;
                }
                _ => {}
            }
        }

        walk.applied
    }

    /// Resolve the document type and build the validator when it applies
    #[allow(clippy::too_many_arguments)]
    fn doctype<'e>(
        &'e self,
        file: &str,
        content: &str,
        offset: usize,
        misplaced: bool,
        resolver: &dyn DtdResolver,
        sink: &mut dyn DiagnosticSink,
        reporter: &mut Reporter,
    ) -> Option<DtdValidator<'e>> {
        if misplaced {
            sink.fatal_error(XmlDiagnostic::new(
                offset,
                "The document type declaration must appear once, before the root element.",
            ));
            return None;
        }

        let doctype = match DocType::parse(content) {
            Ok(d) => d,
            Err(message) => {
                sink.fatal_error(XmlDiagnostic::new(offset, message));
                return None;
            }
        };

        let path = match resolver.resolve(doctype.public_id.as_deref(), doctype.system_id.as_deref()) {
            Resolution::Applied(path) => path,
            Resolution::Mismatched {
                expected: Some(expected),
                provided,
            } => {
                reporter.progress(&format!(
                    "NOT Validating (passthrough) '{}' (expected dtd='{}' but provided dtd='{}')...",
                    file, expected, provided
                ));
                return None;
            }
            Resolution::Mismatched {
                expected: None,
                provided,
            } => {
                reporter.progress(&format!(
                    "NOT Validating (passthrough) '{}' (no external dtd reference, provided dtd='{}')...",
                    file, provided
                ));
                return None;
            }
            Resolution::Passthrough => {
                reporter.progress(&format!("NOT Validating (passthrough) '{}'...", file));
                return None;
            }
        };

        reporter.progress(&format!(
            "Validating '{}' with dtd '{}'...",
            file,
            path.display()
        ));

        let external: Cow<'e, Dtd> = match &self.dtd {
            Some(grammar) if self.policy.configured() == Some(path.as_path()) => {
                Cow::Borrowed(grammar)
            }
            _ => match load_dtd(&path) {
                Ok(grammar) => Cow::Owned(grammar),
                Err(e) => {
                    sink.fatal_error(XmlDiagnostic::new(offset, e.to_string()));
                    return None;
                }
            },
        };

        let grammar = match &doctype.internal_subset {
            Some(subset) => match Dtd::parse_declarations(subset, file, Path::new(file).parent()) {
                Ok(internal) => Cow::Owned(external.with_internal_subset(internal)),
                Err(e) => {
                    sink.fatal_error(XmlDiagnostic::new(offset, e.message()));
                    external
                }
            },
            None => external,
        };

        let validator = DtdValidator::new(grammar, doctype.root);
        validator.report_grammar(offset, sink);
        Some(validator)
    }
}

impl Engine for XmlDtdEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::XmlDtd
    }

    // Whether a DTD applies is only known once the DOCTYPE is read
    fn announce(&self, _file: &Path) -> Option<String> {
        None
    }

    fn validate(&self, file: &Path, reporter: &mut Reporter) -> Verdict {
        let name = file.display().to_string();
        let bytes = match fs::read(file) {
            Ok(b) => b,
            Err(e) => return Verdict::ungraded(Outcome::Io(format!("{}: {}", name, e))),
        };

        let text = match String::from_utf8(bytes) {
            Ok(t) => t,
            Err(e) => {
                return Verdict::ungraded(Outcome::Invalid(vec![Problem::new(format!(
                    "Fatal error: {}: invalid UTF-8 at byte {}",
                    name,
                    e.utf8_error().valid_up_to()
                ))]))
            }
        };

        let mut sink = CollectingSink::new(&name, &text);
        let applied = self.check(&name, &text, &self.policy, &mut sink, reporter);
        let outcome = Outcome::from_problems(sink.into_problems());

        if applied {
            Verdict::graded(outcome)
        } else {
            Verdict::ungraded(outcome)
        }
    }
}

fn load_dtd(path: &Path) -> Result<Dtd, EngineError> {
    let text = fs::read_to_string(path).map_err(|source| EngineError::DtdRead {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path.display().to_string();
    Ok(Dtd::parse(&text, &name, path.parent())?)
}

/// Entities declared by a document's internal subset, for documents the
/// configured DTD is not applied to
fn internal_entities(content: &str, file: &str) -> Option<Dtd> {
    let subset = DocType::parse(content).ok()?.internal_subset?;
    Dtd::parse_declarations(&subset, file, Path::new(file).parent()).ok()
}

/// Expand character and entity references against the predefined entities
/// and those `grammar` declares
fn expand_references<'t>(raw: &'t str, grammar: Option<&Dtd>) -> Result<Cow<'t, str>, EscapeError> {
    unescape_with(raw, |name| {
        resolve_predefined_entity(name).or_else(|| grammar.and_then(|g| g.entity(name)))
    })
}

/// Document-level parse state
#[derive(Default)]
struct Walk<'e> {
    open: Vec<String>,
    scopes: Vec<Vec<String>>,
    seen_doctype: bool,
    seen_root: bool,
    root_closed: bool,
    validator: Option<DtdValidator<'e>>,
    local: Option<Dtd>,
    applied: bool,
}

impl<'e> Walk<'e> {
    /// Grammar whose general entities are in scope
    fn entities(&self) -> Option<&Dtd> {
        self.validator
            .as_ref()
            .map(DtdValidator::dtd)
            .or(self.local.as_ref())
    }

    fn start(&mut self, e: &BytesStart<'_>, offset: usize, empty: bool, sink: &mut dyn DiagnosticSink) {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();

        if self.root_closed {
            sink.fatal_error(XmlDiagnostic::new(
                offset,
                "The markup in the document following the root element must be well-formed.",
            ));
        }
        self.seen_root = true;

        let attributes = self.attributes(e, offset, sink);

        let declared: Vec<String> = attributes
            .iter()
            .filter_map(|(k, _)| k.strip_prefix("xmlns:"))
            .map(str::to_string)
            .collect();
        self.scopes.push(declared);

        if let Some(prefix) = unbound_prefix(&name, &self.scopes) {
            sink.fatal_error(XmlDiagnostic::new(
                offset,
                format!("The prefix \"{}\" for element \"{}\" is not bound.", prefix, name),
            ));
        }
        for (key, _) in &attributes {
            if key == "xmlns" || key.starts_with("xmlns:") {
                continue;
            }
            if let Some(prefix) = unbound_prefix(key, &self.scopes) {
                sink.fatal_error(XmlDiagnostic::new(
                    offset,
                    format!(
                        "The prefix \"{}\" for attribute \"{}\" associated with an element type \"{}\" is not bound.",
                        prefix, key, name
                    ),
                ));
            }
        }

        if let Some(validator) = self.validator.as_mut() {
            validator.start_element(&name, &attributes, offset, sink);
        }
        self.open.push(name);

        if empty {
            self.end(offset, sink);
        }
    }

    fn attributes(
        &self,
        e: &BytesStart<'_>,
        offset: usize,
        sink: &mut dyn DiagnosticSink,
    ) -> Vec<(String, String)> {
        let grammar = self.entities();
        let mut attributes = Vec::new();

        for attr in e.attributes() {
            let attr = match attr {
                Ok(a) => a,
                Err(err) => {
                    sink.fatal_error(XmlDiagnostic::new(offset, err.to_string()));
                    break;
                }
            };
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let raw = String::from_utf8_lossy(&attr.value);
            let value = match expand_references(&raw, grammar) {
                Ok(v) => v.into_owned(),
                Err(err) => {
                    sink.fatal_error(XmlDiagnostic::new(
                        offset,
                        format!("Invalid reference in the value of attribute \"{}\": {}", key, err),
                    ));
                    raw.to_string()
                }
            };
            attributes.push((key, value));
        }
        attributes
    }

    fn end(&mut self, offset: usize, sink: &mut dyn DiagnosticSink) {
        self.open.pop();
        self.scopes.pop();
        if let Some(validator) = self.validator.as_mut() {
            validator.end_element(offset, sink);
        }
        if self.open.is_empty() {
            self.root_closed = true;
        }
    }

    fn text(&mut self, significant: bool, offset: usize, sink: &mut dyn DiagnosticSink) {
        if !self.open.is_empty() {
            if let Some(validator) = self.validator.as_mut() {
                validator.text(significant);
            }
        } else if significant {
            let message = if self.seen_root {
                "Content is not allowed in trailing section."
            } else {
                "Content is not allowed in prolog."
            };
            sink.fatal_error(XmlDiagnostic::new(offset, message));
        }
    }

    fn eof(&mut self, offset: usize, sink: &mut dyn DiagnosticSink) {
        if !self.seen_root {
            sink.fatal_error(XmlDiagnostic::new(offset, "Premature end of file."));
            return;
        }
        if !self.open.is_empty() {
            sink.fatal_error(XmlDiagnostic::new(
                offset,
                format!(
                    "The element type \"{}\" must be terminated by the matching end-tag.",
                    self.open.last().map(String::as_str).unwrap_or_default()
                ),
            ));
            return;
        }
        if let Some(validator) = self.validator.as_mut() {
            validator.finish(sink);
        }
    }
}

/// The prefix of a qualified name when no enclosing scope binds it
fn unbound_prefix<'n>(qname: &'n str, scopes: &[Vec<String>]) -> Option<&'n str> {
    let (prefix, _) = qname.split_once(':')?;
    if prefix == "xml" || prefix == "xmlns" {
        return None;
    }
    let bound = scopes.iter().flatten().any(|p| p == prefix);
    (!bound).then_some(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    const LIBRARY_DTD: &str = r#"
<!ELEMENT library (book*)>
<!ELEMENT book (title)>
<!ATTLIST book id ID #REQUIRED>
<!ELEMENT title (#PCDATA)>
<!ENTITY publisher "ACME Press">
"#;

    fn setup() -> (TempDir, XmlDtdEngine) {
        let dir = tempdir().unwrap();
        let dtd = dir.path().join("library.dtd");
        fs::write(&dtd, LIBRARY_DTD).unwrap();
        let engine = XmlDtdEngine::new(Some(&dtd)).unwrap();
        (dir, engine)
    }

    fn run(engine: &XmlDtdEngine, dir: &TempDir, content: &str) -> (Verdict, String) {
        let file = dir.path().join("doc.xml");
        fs::write(&file, content).unwrap();
        let (mut reporter, captured) = Reporter::capture(false);
        let verdict = engine.validate(&file, &mut reporter);
        (verdict, captured.stderr())
    }

    #[test]
    fn test_matching_reference_is_validated() {
        let (dir, engine) = setup();
        let (verdict, notes) = run(
            &engine,
            &dir,
            r#"<?xml version="1.0"?>
<!DOCTYPE library SYSTEM "http://example.com/dtds/library.dtd">
<library><book id="b1"><title>Rust</title></book></library>"#,
        );
        assert_eq!(verdict.outcome, Outcome::Valid);
        assert!(verdict.graded);
        assert!(notes.contains("with dtd"));
    }

    #[test]
    fn test_validity_errors_are_reported() {
        let (dir, engine) = setup();
        let (verdict, _) = run(
            &engine,
            &dir,
            r#"<!DOCTYPE library SYSTEM "library.dtd">
<library><book><title>Rust</title><title>Again</title></book></library>"#,
        );
        match verdict.outcome {
            Outcome::Invalid(problems) => {
                assert!(problems.iter().all(|p| p.text().starts_with("Error: ")));
                assert!(problems.iter().any(|p| p.text().contains("\"id\" is required")));
            }
            other => panic!("expected invalid, got {:?}", other),
        }
        assert!(verdict.graded);
    }

    #[test]
    fn test_mismatched_reference_is_passthrough() {
        let (dir, engine) = setup();
        let (verdict, notes) = run(
            &engine,
            &dir,
            r#"<!DOCTYPE shelf SYSTEM "shelf.dtd"><shelf><anything/></shelf>"#,
        );
        assert_eq!(verdict.outcome, Outcome::Valid);
        assert!(!verdict.graded);
        assert!(notes.contains("expected dtd='shelf.dtd' but provided dtd='library.dtd'"));
    }

    #[test]
    fn test_no_doctype_is_passthrough() {
        let (dir, engine) = setup();
        let (verdict, _) = run(&engine, &dir, "<free><form/></free>");
        assert_eq!(verdict.outcome, Outcome::Valid);
        assert!(!verdict.graded);
    }

    #[test]
    fn test_malformed_passthrough_still_fails() {
        let (dir, engine) = setup();
        let (verdict, _) = run(&engine, &dir, "<a><b></a>");
        match verdict.outcome {
            Outcome::Invalid(problems) => assert!(problems[0].text().starts_with("Fatal error: ")),
            other => panic!("expected invalid, got {:?}", other),
        }
        assert!(!verdict.graded);
    }

    #[test]
    fn test_structural_fatal_errors() {
        let (dir, engine) = setup();
        for content in ["", "<a/><b/>", "<a/>trailing", "<a>"] {
            let (verdict, _) = run(&engine, &dir, content);
            assert!(
                matches!(verdict.outcome, Outcome::Invalid(_)),
                "{:?} should be rejected",
                content
            );
        }
    }

    #[test]
    fn test_unbound_prefix() {
        let (dir, engine) = setup();
        let (verdict, _) = run(&engine, &dir, "<x:a/>");
        assert!(matches!(verdict.outcome, Outcome::Invalid(_)));

        let (verdict, _) = run(&engine, &dir, r#"<x:a xmlns:x="urn:x"><x:b xml:lang="en"/></x:a>"#);
        assert_eq!(verdict.outcome, Outcome::Valid);
    }

    #[test]
    fn test_internal_subset_extends_grammar() {
        let (dir, engine) = setup();
        let (verdict, _) = run(
            &engine,
            &dir,
            r#"<!DOCTYPE library SYSTEM "library.dtd" [
<!ATTLIST library owner CDATA #IMPLIED>
]>
<library owner="&publisher;"/>"#,
        );
        assert_eq!(verdict.outcome, Outcome::Valid);
    }

    #[test]
    fn test_references_in_text_are_checked() {
        let (dir, engine) = setup();
        let (verdict, _) = run(
            &engine,
            &dir,
            r#"<!DOCTYPE library SYSTEM "library.dtd">
<library><book id="b1"><title>&undeclared;</title></book></library>"#,
        );
        match verdict.outcome {
            Outcome::Invalid(problems) => {
                assert!(problems.iter().any(|p| p.text().starts_with("Fatal error: ")))
            }
            other => panic!("expected invalid, got {:?}", other),
        }
        assert!(verdict.graded);

        let (verdict, _) = run(
            &engine,
            &dir,
            r#"<!DOCTYPE library SYSTEM "library.dtd">
<library><book id="b1"><title>&publisher; &amp; &#65;&#x42;</title></book></library>"#,
        );
        assert_eq!(verdict.outcome, Outcome::Valid);
    }

    #[test]
    fn test_references_without_dtd() {
        let dir = tempdir().unwrap();
        let engine = XmlDtdEngine::new(None).unwrap();
        for content in ["<a>AT&T</a>", "<a>&nope;</a>", r#"<a b="&nope;"/>"#] {
            let (verdict, _) = run(&engine, &dir, content);
            match verdict.outcome {
                Outcome::Invalid(problems) => {
                    assert!(problems[0].text().starts_with("Fatal error: "), "{:?}", content)
                }
                other => panic!("{:?} should be rejected, got {:?}", content, other),
            }
        }

        for content in [
            "<a>AT&amp;T &lt;&gt; &quot;&apos; &#169;</a>",
            r#"<a b="x &amp; y &#65;"/>"#,
            r#"<!DOCTYPE a [<!ENTITY corp "ACME">]><a>&corp;</a>"#,
        ] {
            let (verdict, _) = run(&engine, &dir, content);
            assert_eq!(verdict.outcome, Outcome::Valid, "{:?}", content);
        }
    }

    #[test]
    fn test_without_dtd_everything_is_passthrough() {
        let dir = tempdir().unwrap();
        let engine = XmlDtdEngine::new(None).unwrap();
        let (verdict, notes) = run(
            &engine,
            &dir,
            r#"<!DOCTYPE library SYSTEM "library.dtd"><library/>"#,
        );
        assert_eq!(verdict.outcome, Outcome::Valid);
        assert!(!verdict.graded);
        assert!(notes.contains("NOT Validating (passthrough)"));
    }

    #[test]
    fn test_modular_dtd_applies_cleanly() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("blocks.ent"), "<!ELEMENT para (#PCDATA)>").unwrap();
        let dtd = dir.path().join("doc.dtd");
        fs::write(
            &dtd,
            r#"<!ENTITY % blocks SYSTEM "blocks.ent">
%blocks;
<!ENTITY % strict "IGNORE">
<![%strict;[ <!ELEMENT doc (para+)> ]]>
<![INCLUDE[ <!ELEMENT doc (para*)> ]]>
"#,
        )
        .unwrap();
        let engine = XmlDtdEngine::new(Some(&dtd)).unwrap();

        let (verdict, _) = run(
            &engine,
            &dir,
            r#"<!DOCTYPE doc SYSTEM "doc.dtd"><doc><para>one</para></doc>"#,
        );
        assert_eq!(verdict.outcome, Outcome::Valid);
        assert!(verdict.graded);

        let (verdict, _) = run(&engine, &dir, r#"<!DOCTYPE doc SYSTEM "doc.dtd"><doc/>"#);
        assert_eq!(verdict.outcome, Outcome::Valid);
    }

    #[test]
    fn test_unreadable_external_parameter_entity_fails_construction() {
        let dir = tempdir().unwrap();
        let dtd = dir.path().join("doc.dtd");
        fs::write(&dtd, "<!ENTITY % gone SYSTEM \"gone.ent\">\n%gone;").unwrap();
        let err = XmlDtdEngine::new(Some(&dtd)).err().unwrap();
        assert!(!err.is_io());
    }

    #[test]
    fn test_missing_file_is_io() {
        let (dir, engine) = setup();
        let (mut reporter, _) = Reporter::capture(false);
        let verdict = engine.validate(&dir.path().join("gone.xml"), &mut reporter);
        assert!(matches!(verdict.outcome, Outcome::Io(_)));
    }

    #[test]
    fn test_unreadable_dtd_fails_construction() {
        let dir = tempdir().unwrap();
        let err = XmlDtdEngine::new(Some(&dir.path().join("missing.dtd"))).err().unwrap();
        assert!(err.is_io());
    }
}
