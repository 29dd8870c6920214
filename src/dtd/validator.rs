//! Structural validity of an element stream against a DTD

use std::borrow::Cow;
use std::collections::HashSet;

use crate::dtd::content::is_name_char;
use crate::dtd::parser::{AttrType, DefaultDecl, Dtd, Severity};
use crate::dtd::sink::{DiagnosticSink, XmlDiagnostic};

struct Frame {
    name: String,
    children: Vec<String>,
    has_text: bool,
    has_any: bool,
    declared: bool,
}

/// Checks elements as the parser reports them, emitting validity errors to a
/// sink. One instance per document.
pub struct DtdValidator<'d> {
    dtd: Cow<'d, Dtd>,
    root: String,
    seen_root: bool,
    stack: Vec<Frame>,
    ids: HashSet<String>,
    idrefs: Vec<(String, usize)>,
}

impl<'d> DtdValidator<'d> {
    /// `root` is the name given in the document type declaration
    pub fn new(dtd: Cow<'d, Dtd>, root: impl Into<String>) -> Self {
        Self {
            dtd,
            root: root.into(),
            seen_root: false,
            stack: Vec::new(),
            ids: HashSet::new(),
            idrefs: Vec::new(),
        }
    }

    pub fn dtd(&self) -> &Dtd {
        &self.dtd
    }

    /// Emit the grammar's own notices against the document
    pub fn report_grammar(&self, offset: usize, sink: &mut dyn DiagnosticSink) {
        for notice in self.dtd.notices() {
            let diagnostic = XmlDiagnostic::new(offset, notice.message.clone());
            match notice.severity {
                Severity::Warning => sink.warning(diagnostic),
                Severity::Error => sink.error(diagnostic),
            }
        }
    }

    pub fn start_element(
        &mut self,
        name: &str,
        attributes: &[(String, String)],
        offset: usize,
        sink: &mut dyn DiagnosticSink,
    ) {
        if !self.seen_root {
            self.seen_root = true;
            if name != self.root {
                sink.error(XmlDiagnostic::new(
                    offset,
                    format!(
                        "Document root element \"{}\", must match DOCTYPE root \"{}\".",
                        name, self.root
                    ),
                ));
            }
        }

        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(name.to_string());
            parent.has_any = true;
        }

        let declared = self.dtd.element(name).is_some();
        if !declared {
            sink.error(XmlDiagnostic::new(
                offset,
                format!("Element type \"{}\" must be declared.", name),
            ));
        }

        self.check_attributes(name, attributes, offset, sink);

        self.stack.push(Frame {
            name: name.to_string(),
            children: Vec::new(),
            has_text: false,
            has_any: false,
            declared,
        });
    }

    /// Character data inside the current element; `significant` is false for
    /// whitespace-only text
    pub fn text(&mut self, significant: bool) {
        if let Some(frame) = self.stack.last_mut() {
            frame.has_any = true;
            if significant {
                frame.has_text = true;
            }
        }
    }

    pub fn end_element(&mut self, offset: usize, sink: &mut dyn DiagnosticSink) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        if !frame.declared {
            return;
        }
        if let Some(spec) = self.dtd.element(&frame.name) {
            if !spec.accepts(&frame.children, frame.has_text, frame.has_any) {
                sink.error(XmlDiagnostic::new(
                    offset,
                    format!(
                        "The content of element type \"{}\" must match \"{}\".",
                        frame.name, spec
                    ),
                ));
            }
        }
    }

    /// Cross-element checks once the document is complete
    pub fn finish(&mut self, sink: &mut dyn DiagnosticSink) {
        for (id, offset) in std::mem::take(&mut self.idrefs) {
            if !self.ids.contains(&id) {
                sink.error(XmlDiagnostic::new(
                    offset,
                    format!("An element with the identifier \"{}\" must appear in the document.", id),
                ));
            }
        }
    }

    fn check_attributes(
        &mut self,
        element: &str,
        attributes: &[(String, String)],
        offset: usize,
        sink: &mut dyn DiagnosticSink,
    ) {
        let Self {
            dtd, ids, idrefs, ..
        } = self;
        let defs = dtd.attributes(element);

        for (name, value) in attributes {
            let Some(def) = defs.iter().find(|d| &d.name == name) else {
                sink.error(XmlDiagnostic::new(
                    offset,
                    format!(
                        "Attribute \"{}\" must be declared for element type \"{}\".",
                        name, element
                    ),
                ));
                continue;
            };

            let normalized;
            let value = if def.kind == AttrType::CData {
                value.as_str()
            } else {
                normalized = normalize_tokens(value);
                normalized.as_str()
            };

            if let DefaultDecl::Fixed(fixed) = &def.default {
                if value != fixed.as_str() {
                    sink.error(XmlDiagnostic::new(
                        offset,
                        format!(
                            "Attribute \"{}\" with value \"{}\" must have a value of \"{}\".",
                            name, value, fixed
                        ),
                    ));
                }
            }

            let target = AttributeRef {
                element,
                name,
                value,
                offset,
            };
            check_attribute_value(dtd, ids, idrefs, &target, &def.kind, sink);
        }

        for def in defs {
            if def.default == DefaultDecl::Required && !attributes.iter().any(|(n, _)| n == &def.name) {
                sink.error(XmlDiagnostic::new(
                    offset,
                    format!(
                        "Attribute \"{}\" is required and must be specified for element type \"{}\".",
                        def.name, element
                    ),
                ));
            }
        }
    }
}

struct AttributeRef<'a> {
    element: &'a str,
    name: &'a str,
    value: &'a str,
    offset: usize,
}

fn check_attribute_value(
    dtd: &Dtd,
    ids: &mut HashSet<String>,
    idrefs: &mut Vec<(String, usize)>,
    attr: &AttributeRef<'_>,
    kind: &AttrType,
    sink: &mut dyn DiagnosticSink,
) {
    let AttributeRef {
        element,
        name,
        value,
        offset,
    } = *attr;
    let invalid = |sink: &mut dyn DiagnosticSink, what: &str| {
        sink.error(XmlDiagnostic::new(
            offset,
            format!(
                "Attribute \"{}\" of element type \"{}\" with value \"{}\" must be {}.",
                name, element, value, what
            ),
        ));
    };
    let tokens: Vec<&str> = value.split_whitespace().collect();

    match kind {
        AttrType::CData => {}
        AttrType::Id => {
            if !is_name(value) {
                invalid(sink, "a valid name");
            } else if !ids.insert(value.to_string()) {
                sink.error(XmlDiagnostic::new(
                    offset,
                    format!("Attribute value \"{}\" of type ID must be unique within the document.", value),
                ));
            }
        }
        AttrType::IdRef => {
            if is_name(value) {
                idrefs.push((value.to_string(), offset));
            } else {
                invalid(sink, "a valid name");
            }
        }
        AttrType::IdRefs => {
            if tokens.is_empty() || !tokens.iter().all(|t| is_name(t)) {
                invalid(sink, "a list of names");
            } else {
                idrefs.extend(tokens.iter().map(|t| (t.to_string(), offset)));
            }
        }
        AttrType::NmToken => {
            if !is_nmtoken(value) {
                invalid(sink, "a name token");
            }
        }
        AttrType::NmTokens => {
            if tokens.is_empty() || !tokens.iter().all(|t| is_nmtoken(t)) {
                invalid(sink, "a list of name tokens");
            }
        }
        AttrType::Entity => {
            if !dtd.is_unparsed_entity(value) {
                invalid(sink, "the name of an unparsed entity");
            }
        }
        AttrType::Entities => {
            if tokens.is_empty() || !tokens.iter().all(|t| dtd.is_unparsed_entity(t)) {
                invalid(sink, "a list of unparsed entity names");
            }
        }
        AttrType::Notation(allowed) => {
            if !allowed.iter().any(|a| a == value) || !dtd.has_notation(value) {
                invalid(sink, &format!("one of the declared notations {:?}", allowed));
            }
        }
        AttrType::Enumeration(allowed) => {
            if !allowed.iter().any(|a| a == value) {
                invalid(sink, &format!("one of \"({})\"", allowed.join("|")));
            }
        }
    }
}

fn is_name(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == ':' || !c.is_ascii() => {
            chars.all(is_name_char)
        }
        _ => false,
    }
}

/// Attribute-value normalization for tokenized types: surrounding spaces
/// dropped, inner runs collapsed to one space
fn normalize_tokens(value: &str) -> String {
    value.split_ascii_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_nmtoken(value: &str) -> bool {
    !value.is_empty() && value.chars().all(is_name_char)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtd::sink::CollectingSink;

    const DTD: &str = r#"
<!ELEMENT library (book+)>
<!ELEMENT book (title, author*)>
<!ELEMENT title (#PCDATA)>
<!ELEMENT author (#PCDATA)>
<!ATTLIST library version CDATA #FIXED "2">
<!ATTLIST book
    id     ID             #REQUIRED
    sequel IDREF          #IMPLIED
    format (paper|ebook)  "paper">
"#;

    fn attrs(list: &[(&str, &str)]) -> Vec<(String, String)> {
        list.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn run(events: impl FnOnce(&mut DtdValidator<'_>, &mut CollectingSink<'_>)) -> Vec<String> {
        let dtd = Dtd::parse(DTD, "library.dtd", None).unwrap();
        let mut sink = CollectingSink::new("doc.xml", "");
        let mut validator = DtdValidator::new(Cow::Borrowed(&dtd), "library");
        events(&mut validator, &mut sink);
        validator.finish(&mut sink);
        sink.into_problems()
            .into_iter()
            .map(|p| p.text().to_string())
            .collect()
    }

    #[test]
    fn test_valid_tree() {
        let problems = run(|v, sink| {
            v.start_element("library", &[], 0, sink);
            v.text(false);
            v.start_element("book", &attrs(&[("id", "b1")]), 0, sink);
            v.start_element("title", &[], 0, sink);
            v.text(true);
            v.end_element(0, sink);
            v.end_element(0, sink);
            v.start_element("book", &attrs(&[("id", "b2"), ("sequel", "b1")]), 0, sink);
            v.start_element("title", &[], 0, sink);
            v.end_element(0, sink);
            v.start_element("author", &[], 0, sink);
            v.end_element(0, sink);
            v.end_element(0, sink);
            v.end_element(0, sink);
        });
        assert!(problems.is_empty(), "{:?}", problems);
    }

    #[test]
    fn test_wrong_root_and_undeclared() {
        let problems = run(|v, sink| {
            v.start_element("shelf", &[], 0, sink);
            v.end_element(0, sink);
        });
        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("must match DOCTYPE root \"library\""));
        assert!(problems[1].contains("Element type \"shelf\" must be declared."));
    }

    #[test]
    fn test_content_model_violation() {
        let problems = run(|v, sink| {
            v.start_element("library", &[], 0, sink);
            v.start_element("book", &attrs(&[("id", "b1")]), 0, sink);
            v.start_element("author", &[], 0, sink);
            v.end_element(0, sink);
            v.end_element(0, sink);
            v.end_element(0, sink);
        });
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("The content of element type \"book\" must match \"(title,author*)\"."));
    }

    #[test]
    fn test_empty_library_violates_plus() {
        let problems = run(|v, sink| {
            v.start_element("library", &[], 0, sink);
            v.end_element(0, sink);
        });
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("\"library\" must match \"(book+)\""));
    }

    #[test]
    fn test_attribute_rules() {
        let problems = run(|v, sink| {
            v.start_element("library", &attrs(&[("version", "3")]), 0, sink);
            v.start_element("book", &attrs(&[("format", "scroll"), ("color", "red")]), 0, sink);
            v.start_element("title", &[], 0, sink);
            v.end_element(0, sink);
            v.end_element(0, sink);
            v.end_element(0, sink);
        });
        let joined = problems.join("\n");
        assert!(joined.contains("must have a value of \"2\""));
        assert!(joined.contains("must be one of \"(paper|ebook)\""));
        assert!(joined.contains("Attribute \"color\" must be declared"));
        assert!(joined.contains("Attribute \"id\" is required"));
        assert_eq!(problems.len(), 4);
    }

    #[test]
    fn test_tokenized_values_are_normalized() {
        let problems = run(|v, sink| {
            v.start_element("library", &[], 0, sink);
            for attributes in [
                attrs(&[("id", " b1 "), ("format", "  ebook")]),
                attrs(&[("id", "b2"), ("sequel", "b1  ")]),
            ] {
                v.start_element("book", &attributes, 0, sink);
                v.start_element("title", &[], 0, sink);
                v.end_element(0, sink);
                v.end_element(0, sink);
            }
            v.end_element(0, sink);
        });
        assert!(problems.is_empty(), "{:?}", problems);

        let problems = run(|v, sink| {
            v.start_element("library", &attrs(&[("version", " 2 ")]), 0, sink);
            v.start_element("book", &attrs(&[("id", "b1")]), 0, sink);
            v.start_element("title", &[], 0, sink);
            v.end_element(0, sink);
            v.end_element(0, sink);
            v.end_element(0, sink);
        });
        assert_eq!(problems.len(), 1, "{:?}", problems);
        assert!(problems[0].contains("must have a value of \"2\""));
    }

    #[test]
    fn test_ids_unique_and_refs_resolved() {
        let problems = run(|v, sink| {
            v.start_element("library", &[], 0, sink);
            for attributes in [
                attrs(&[("id", "b1")]),
                attrs(&[("id", "b1")]),
                attrs(&[("id", "b3"), ("sequel", "nope")]),
            ] {
                v.start_element("book", &attributes, 0, sink);
                v.start_element("title", &[], 0, sink);
                v.end_element(0, sink);
                v.end_element(0, sink);
            }
            v.end_element(0, sink);
        });
        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("must be unique"));
        assert!(problems[1].contains("identifier \"nope\" must appear"));
    }

    #[test]
    fn test_grammar_notices_reported() {
        let dtd = Dtd::parse("<!ELEMENT a EMPTY>\n<!ELEMENT a ANY>\n<!ELEMENT b (c)>", "g.dtd", None).unwrap();
        let mut sink = CollectingSink::new("doc.xml", "");
        DtdValidator::new(Cow::Borrowed(&dtd), "a").report_grammar(0, &mut sink);
        let problems = sink.into_problems();
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().any(|p| p.text().starts_with("Error:")));
        assert!(problems.iter().any(|p| p.text().starts_with("Warning:")));
    }

    #[test]
    fn test_name_rules() {
        assert!(is_name("b1"));
        assert!(is_name("_x:y"));
        assert!(!is_name("1b"));
        assert!(is_nmtoken("1b"));
        assert!(!is_nmtoken(""));
    }
}
