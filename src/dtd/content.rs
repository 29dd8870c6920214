//! Element content models
//!
//! Children-only models are compiled to an anchored regex over the sequence
//! of child element names, each name followed by a single space.

use regex::Regex;
use std::fmt;

/// Declared content of an element type
#[derive(Debug, Clone)]
pub enum ContentSpec {
    Empty,
    Any,
    /// `(#PCDATA)` or `(#PCDATA | a | b)*`
    Mixed(Vec<String>),
    Children(ChildrenModel),
}

impl ContentSpec {
    /// Element names referenced by the model
    pub fn referenced_names(&self) -> Vec<&str> {
        match self {
            ContentSpec::Empty | ContentSpec::Any => Vec::new(),
            ContentSpec::Mixed(names) => names.iter().map(String::as_str).collect(),
            ContentSpec::Children(model) => model.names.iter().map(String::as_str).collect(),
        }
    }

    /// Check a child sequence; `has_text` is true for non-whitespace
    /// character data and `has_any` for any content at all
    pub fn accepts(&self, children: &[String], has_text: bool, has_any: bool) -> bool {
        match self {
            ContentSpec::Empty => children.is_empty() && !has_any,
            ContentSpec::Any => true,
            ContentSpec::Mixed(names) => children.iter().all(|c| names.contains(c)),
            ContentSpec::Children(model) => !has_text && model.matches(children),
        }
    }
}

impl fmt::Display for ContentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentSpec::Empty => f.write_str("EMPTY"),
            ContentSpec::Any => f.write_str("ANY"),
            ContentSpec::Mixed(names) if names.is_empty() => f.write_str("(#PCDATA)"),
            ContentSpec::Mixed(names) => write!(f, "(#PCDATA|{})*", names.join("|")),
            ContentSpec::Children(model) => f.write_str(&model.source),
        }
    }
}

/// A compiled children content model
#[derive(Debug, Clone)]
pub struct ChildrenModel {
    source: String,
    names: Vec<String>,
    regex: Regex,
}

impl ChildrenModel {
    pub fn matches(&self, children: &[String]) -> bool {
        let mut joined = String::new();
        for child in children {
            joined.push_str(child);
            joined.push(' ');
        }
        self.regex.is_match(&joined)
    }
}

/// Content model parse failure, offset relative to the model text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentError {
    pub offset: usize,
    pub message: String,
}

impl ContentError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Repeat {
    Once,
    Optional,
    ZeroOrMore,
    OneOrMore,
}

impl Repeat {
    fn suffix(self) -> &'static str {
        match self {
            Repeat::Once => "",
            Repeat::Optional => "?",
            Repeat::ZeroOrMore => "*",
            Repeat::OneOrMore => "+",
        }
    }
}

#[derive(Debug, Clone)]
enum Particle {
    Name(String, Repeat),
    Seq(Vec<Particle>, Repeat),
    Choice(Vec<Particle>, Repeat),
}

impl Particle {
    fn to_regex(&self, out: &mut String) {
        match self {
            Particle::Name(name, repeat) => {
                out.push_str("(?:");
                out.push_str(&regex::escape(name));
                out.push_str(" )");
                out.push_str(repeat.suffix());
            }
            Particle::Seq(items, repeat) => {
                out.push_str("(?:");
                for item in items {
                    item.to_regex(out);
                }
                out.push(')');
                out.push_str(repeat.suffix());
            }
            Particle::Choice(items, repeat) => {
                out.push_str("(?:");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push('|');
                    }
                    item.to_regex(out);
                }
                out.push(')');
                out.push_str(repeat.suffix());
            }
        }
    }

    fn collect_names(&self, out: &mut Vec<String>) {
        match self {
            Particle::Name(name, _) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Particle::Seq(items, _) | Particle::Choice(items, _) => {
                for item in items {
                    item.collect_names(out);
                }
            }
        }
    }
}

/// Parse the content specification part of an `<!ELEMENT>` declaration
pub fn parse_content_spec(text: &str) -> Result<ContentSpec, ContentError> {
    let trimmed = text.trim();
    let lead = text.len() - text.trim_start().len();

    match trimmed {
        "EMPTY" => return Ok(ContentSpec::Empty),
        "ANY" => return Ok(ContentSpec::Any),
        "" => return Err(ContentError::new(lead, "missing content model")),
        _ => {}
    }

    let mut parser = ModelParser {
        src: trimmed,
        pos: 0,
    };
    parser.skip_ws();
    if !parser.eat('(') {
        return Err(ContentError::new(
            lead,
            "content model must be EMPTY, ANY or a parenthesized group",
        ));
    }
    parser.skip_ws();

    let result = if parser.src[parser.pos..].starts_with("#PCDATA") {
        parser.pos += "#PCDATA".len();
        parser.mixed()
    } else {
        parser.group_body().and_then(|particle| {
            parser.skip_ws();
            if parser.pos != parser.src.len() {
                return Err(ContentError::new(
                    parser.pos,
                    "unexpected text after content model",
                ));
            }
            let mut pattern = String::from("^");
            particle.to_regex(&mut pattern);
            pattern.push('$');
            let regex = Regex::new(&pattern)
                .map_err(|e| ContentError::new(0, format!("content model too complex: {}", e)))?;
            let mut names = Vec::new();
            particle.collect_names(&mut names);
            Ok(ContentSpec::Children(ChildrenModel {
                source: compact(trimmed),
                names,
                regex,
            }))
        })
    };

    result.map_err(|e| ContentError::new(e.offset + lead, e.message))
}

/// Strip whitespace from a model for display, e.g. `(a, b)` -> `(a,b)`
fn compact(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

pub(crate) fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.') || !c.is_ascii()
}

struct ModelParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> ModelParser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn name(&mut self) -> Result<String, ContentError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_name_char(c) {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        if start == self.pos {
            return Err(ContentError::new(start, "expected element name in content model"));
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn repeat(&mut self) -> Repeat {
        if self.eat('?') {
            Repeat::Optional
        } else if self.eat('*') {
            Repeat::ZeroOrMore
        } else if self.eat('+') {
            Repeat::OneOrMore
        } else {
            Repeat::Once
        }
    }

    /// Rest of `(#PCDATA ...` after the keyword
    fn mixed(&mut self) -> Result<ContentSpec, ContentError> {
        let mut names = Vec::new();
        loop {
            self.skip_ws();
            if self.eat(')') {
                break;
            }
            if !self.eat('|') {
                return Err(ContentError::new(self.pos, "expected '|' or ')' in mixed content model"));
            }
            self.skip_ws();
            let name = self.name()?;
            if !names.contains(&name) {
                names.push(name);
            }
        }
        let star = self.eat('*');
        if !names.is_empty() && !star {
            return Err(ContentError::new(
                self.pos,
                "mixed content model with element names must end with ')*'",
            ));
        }
        self.skip_ws();
        if self.pos != self.src.len() {
            return Err(ContentError::new(self.pos, "unexpected text after content model"));
        }
        Ok(ContentSpec::Mixed(names))
    }

    fn particle(&mut self) -> Result<Particle, ContentError> {
        self.skip_ws();
        if self.eat('(') {
            self.group_body()
        } else {
            let name = self.name()?;
            Ok(Particle::Name(name, self.repeat()))
        }
    }

    /// Parse a group after its opening parenthesis, including the closing
    /// parenthesis and any repeat suffix
    fn group_body(&mut self) -> Result<Particle, ContentError> {
        let mut items = vec![self.particle()?];
        let mut separator: Option<char> = None;

        loop {
            self.skip_ws();
            match self.peek() {
                Some(')') => {
                    self.pos += 1;
                    break;
                }
                Some(c @ ('|' | ',')) => {
                    if let Some(prev) = separator {
                        if prev != c {
                            return Err(ContentError::new(
                                self.pos,
                                "cannot mix ',' and '|' in one content model group",
                            ));
                        }
                    }
                    separator = Some(c);
                    self.pos += 1;
                    items.push(self.particle()?);
                }
                Some(_) => {
                    return Err(ContentError::new(self.pos, "expected ',', '|' or ')' in content model"));
                }
                None => {
                    return Err(ContentError::new(self.pos, "unterminated content model group"));
                }
            }
        }

        let repeat = self.repeat();
        Ok(match separator {
            Some('|') => Particle::Choice(items, repeat),
            _ => Particle::Seq(items, repeat),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_and_any() {
        let empty = parse_content_spec("EMPTY").unwrap();
        assert!(empty.accepts(&[], false, false));
        assert!(!empty.accepts(&[], false, true));
        assert!(!empty.accepts(&names(&["a"]), false, true));

        let any = parse_content_spec(" ANY ").unwrap();
        assert!(any.accepts(&names(&["x", "y"]), true, true));
    }

    #[test]
    fn test_sequence() {
        let spec = parse_content_spec("(to, from, heading, body)").unwrap();
        assert!(spec.accepts(&names(&["to", "from", "heading", "body"]), false, true));
        assert!(!spec.accepts(&names(&["to", "heading", "body"]), false, true));
        assert!(!spec.accepts(&names(&["to", "from", "heading", "body"]), true, true));
        assert_eq!(spec.to_string(), "(to,from,heading,body)");
    }

    #[test]
    fn test_choice_and_repeats() {
        let spec = parse_content_spec("(head, (p | list)*, foot?)").unwrap();
        assert!(spec.accepts(&names(&["head"]), false, true));
        assert!(spec.accepts(&names(&["head", "p", "list", "p", "foot"]), false, true));
        assert!(!spec.accepts(&names(&["head", "foot", "p"]), false, true));

        let plus = parse_content_spec("(item)+").unwrap();
        assert!(!plus.accepts(&[], false, false));
        assert!(plus.accepts(&names(&["item", "item"]), false, true));
    }

    #[test]
    fn test_names_with_punctuation() {
        let spec = parse_content_spec("(x.y, a-b, ns:c)").unwrap();
        assert!(spec.accepts(&names(&["x.y", "a-b", "ns:c"]), false, true));
        assert!(!spec.accepts(&names(&["xzy", "a-b", "ns:c"]), false, true));
    }

    #[test]
    fn test_mixed() {
        let pcdata = parse_content_spec("(#PCDATA)").unwrap();
        assert!(pcdata.accepts(&[], true, true));
        assert!(!pcdata.accepts(&names(&["b"]), true, true));

        let mixed = parse_content_spec("(#PCDATA | b | i)*").unwrap();
        assert!(mixed.accepts(&names(&["b", "i", "b"]), true, true));
        assert!(!mixed.accepts(&names(&["u"]), true, true));
        assert_eq!(mixed.to_string(), "(#PCDATA|b|i)*");
    }

    #[test]
    fn test_errors() {
        assert!(parse_content_spec("").is_err());
        assert!(parse_content_spec("(a, b | c)").is_err());
        assert!(parse_content_spec("(a, b").is_err());
        assert!(parse_content_spec("(#PCDATA | a)").is_err());
        assert!(parse_content_spec("a, b").is_err());
    }

    #[test]
    fn test_referenced_names() {
        let spec = parse_content_spec("(a, (b | a)*)").unwrap();
        assert_eq!(spec.referenced_names(), vec!["a", "b"]);
    }
}
