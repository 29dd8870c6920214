//! DTD declaration parsing

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::diagnostics::{offset_to_line_col, DtdSyntaxError};
use crate::dtd::content::{is_name_char, parse_content_spec, ContentSpec};

/// Maximum nesting of parameter entity references
const MAX_PE_DEPTH: usize = 16;

/// Declared type of an attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrType {
    CData,
    Id,
    IdRef,
    IdRefs,
    Entity,
    Entities,
    NmToken,
    NmTokens,
    Notation(Vec<String>),
    Enumeration(Vec<String>),
}

/// Attribute default declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultDecl {
    Required,
    Implied,
    Fixed(String),
    Value(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDef {
    pub name: String,
    pub kind: AttrType,
    pub default: DefaultDecl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A problem found in the grammar itself, reported against every document
/// the grammar is applied to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtdNotice {
    pub severity: Severity,
    pub message: String,
}

/// A parsed document type definition
#[derive(Debug, Clone, Default)]
pub struct Dtd {
    elements: HashMap<String, ContentSpec>,
    attributes: HashMap<String, Vec<AttributeDef>>,
    entities: HashMap<String, String>,
    unparsed_entities: HashSet<String>,
    notations: HashSet<String>,
    notices: Vec<DtdNotice>,
}

impl Dtd {
    /// Parse an external DTD; `name` is used in diagnostics. External
    /// parameter entities are loaded relative to `base`, or to the working
    /// directory when there is none.
    pub fn parse(text: &str, name: &str, base: Option<&Path>) -> Result<Self, DtdSyntaxError> {
        let mut dtd = Self::parse_declarations(text, name, base)?;
        dtd.check_references(name);
        Ok(dtd)
    }

    /// Parse declarations without cross-checking references, as needed for
    /// a document's internal subset
    pub fn parse_declarations(
        text: &str,
        name: &str,
        base: Option<&Path>,
    ) -> Result<Self, DtdSyntaxError> {
        let mut dtd = Dtd::default();
        let mut parameter_entities = HashMap::new();
        let mut parser = DeclParser {
            src: text,
            name,
            base,
            dtd: &mut dtd,
            parameter_entities: &mut parameter_entities,
        };
        parser.parse_subset(text, Some(0), 0)?;
        Ok(dtd)
    }

    pub fn element(&self, name: &str) -> Option<&ContentSpec> {
        self.elements.get(name)
    }

    pub fn attributes(&self, element: &str) -> &[AttributeDef] {
        self.attributes
            .get(element)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn entity(&self, name: &str) -> Option<&str> {
        self.entities.get(name).map(String::as_str)
    }

    pub fn is_unparsed_entity(&self, name: &str) -> bool {
        self.unparsed_entities.contains(name)
    }

    pub fn has_notation(&self, name: &str) -> bool {
        self.notations.contains(name)
    }

    pub fn notices(&self) -> &[DtdNotice] {
        &self.notices
    }

    /// Layer a document's internal subset over this grammar; declarations
    /// from `internal` win
    pub fn with_internal_subset(&self, internal: Dtd) -> Dtd {
        let mut merged = self.clone();
        merged.elements.extend(internal.elements);
        for (element, defs) in internal.attributes {
            let slot = merged.attributes.entry(element).or_default();
            for def in defs.into_iter().rev() {
                slot.retain(|d| d.name != def.name);
                slot.insert(0, def);
            }
        }
        merged.entities.extend(internal.entities);
        merged.unparsed_entities.extend(internal.unparsed_entities);
        merged.notations.extend(internal.notations);
        merged.notices.extend(internal.notices);
        merged
    }

    fn check_references(&mut self, name: &str) {
        let mut notices = Vec::new();
        let mut undeclared_attlists: Vec<&String> = self
            .attributes
            .keys()
            .filter(|e| !self.elements.contains_key(*e))
            .collect();
        undeclared_attlists.sort();
        for element in undeclared_attlists {
            notices.push(DtdNotice {
                severity: Severity::Warning,
                message: format!(
                    "{}: attribute list declared for element type \"{}\", which is not declared",
                    name, element
                ),
            });
        }

        let mut declared: Vec<(&String, &ContentSpec)> = self.elements.iter().collect();
        declared.sort_by(|a, b| a.0.cmp(b.0));
        for (element, spec) in declared {
            for child in spec.referenced_names() {
                if !self.elements.contains_key(child) {
                    notices.push(DtdNotice {
                        severity: Severity::Warning,
                        message: format!(
                            "{}: content model of element type \"{}\" refers to undeclared element \"{}\"",
                            name, element, child
                        ),
                    });
                }
            }
        }
        self.notices.extend(notices);
    }
}

/// Parameter entity binding; external ones are read on first reference
enum ParameterEntity {
    Internal(String),
    External(String),
}

struct DeclParser<'a> {
    /// Top-level text, used for diagnostics
    src: &'a str,
    name: &'a str,
    base: Option<&'a Path>,
    dtd: &'a mut Dtd,
    parameter_entities: &'a mut HashMap<String, ParameterEntity>,
}

impl<'a> DeclParser<'a> {
    fn syntax(&self, message: impl Into<String>, offset: usize) -> DtdSyntaxError {
        DtdSyntaxError::at_offset(message, self.src, self.name, offset)
    }

    fn notice(&mut self, severity: Severity, offset: usize, message: String) {
        let (line, column) = offset_to_line_col(self.src, offset);
        self.dtd.notices.push(DtdNotice {
            severity,
            message: format!("{}:{}:{}: {}", self.name, line, column, message),
        });
    }

    /// Replacement text of a parameter entity, reading external ones from
    /// disk. `None` when the entity is not declared.
    fn parameter_entity(&mut self, name: &str, offset: usize) -> Result<Option<String>, DtdSyntaxError> {
        let system = match self.parameter_entities.get(name) {
            None => return Ok(None),
            Some(ParameterEntity::Internal(text)) => return Ok(Some(text.clone())),
            Some(ParameterEntity::External(system)) => system.clone(),
        };

        let path = external_path(&system, self.base);
        let text = fs::read_to_string(&path).map_err(|e| {
            self.syntax(
                format!(
                    "cannot read external parameter entity \"{}\" from '{}': {}",
                    name,
                    path.display(),
                    e
                ),
                offset,
            )
        })?;
        let text = strip_text_declaration(&text).to_string();
        self.parameter_entities
            .insert(name.to_string(), ParameterEntity::Internal(text.clone()));
        Ok(Some(text))
    }

    /// Parse a run of markup declarations. `origin` is the position of
    /// `text` within the top-level source; text from parameter entity
    /// replacement has none and reports offset 0.
    fn parse_subset(&mut self, text: &str, origin: Option<usize>, depth: usize) -> Result<(), DtdSyntaxError> {
        let base = |pos: usize| -> usize { origin.map_or(0, |o| o + pos) };
        let mut pos = 0;

        while pos < text.len() {
            let rest = &text[pos..];
            let trimmed = rest.trim_start();
            pos += rest.len() - trimmed.len();
            if trimmed.is_empty() {
                break;
            }

            if trimmed.starts_with("<!--") {
                let end = trimmed
                    .find("-->")
                    .ok_or_else(|| self.syntax("unterminated comment", base(pos)))?;
                pos += end + 3;
            } else if trimmed.starts_with("<?") {
                let end = trimmed
                    .find("?>")
                    .ok_or_else(|| self.syntax("unterminated processing instruction", base(pos)))?;
                pos += end + 2;
            } else if let Some(section) = trimmed.strip_prefix("<![") {
                let open = section
                    .find('[')
                    .ok_or_else(|| self.syntax("expected '[' in conditional section", base(pos)))?;
                let keyword = self.section_keyword(section[..open].trim(), base(pos))?;
                let body_start = 3 + open + 1;
                let body = &trimmed[body_start..];
                let end = conditional_section_end(body)
                    .ok_or_else(|| self.syntax("unterminated conditional section", base(pos)))?;
                match keyword.as_str() {
                    "INCLUDE" => {
                        self.parse_subset(&body[..end], origin.map(|o| o + pos + body_start), depth)?
                    }
                    "IGNORE" => {}
                    other => {
                        return Err(self.syntax(
                            format!("expected INCLUDE or IGNORE in conditional section, found \"{}\"", other),
                            base(pos),
                        ))
                    }
                }
                pos += body_start + end + 3;
            } else if trimmed.starts_with("<!") {
                let end = declaration_end(trimmed)
                    .ok_or_else(|| self.syntax("unterminated declaration", base(pos)))?;
                let decl = &trimmed[2..end];
                self.declaration(decl, base(pos), depth)?;
                pos += end + 1;
            } else if trimmed.starts_with('%') {
                let semi = trimmed
                    .find(';')
                    .ok_or_else(|| self.syntax("unterminated parameter entity reference", base(pos)))?;
                let pe_name = &trimmed[1..semi];
                if depth >= MAX_PE_DEPTH {
                    return Err(self.syntax("parameter entities nested too deeply", base(pos)));
                }
                match self.parameter_entity(pe_name, base(pos))? {
                    Some(replacement) => self.parse_subset(&replacement, None, depth + 1)?,
                    None => self.notice(
                        Severity::Error,
                        base(pos),
                        format!("parameter entity \"{}\" is not declared", pe_name),
                    ),
                }
                pos += semi + 1;
            } else {
                return Err(self.syntax("unknown declaration: expected '<!' markup", base(pos)));
            }
        }

        Ok(())
    }

    /// `INCLUDE`, `IGNORE` or a parameter entity reference to one of them
    fn section_keyword(&mut self, raw: &str, offset: usize) -> Result<String, DtdSyntaxError> {
        let pe_name = match raw.strip_prefix('%').and_then(|r| r.strip_suffix(';')) {
            Some(name) => name,
            None => return Ok(raw.to_string()),
        };
        match self.parameter_entity(pe_name, offset)? {
            Some(replacement) => Ok(replacement.trim().to_string()),
            None => Err(self.syntax(
                format!("parameter entity \"{}\" is not declared", pe_name),
                offset,
            )),
        }
    }

    fn declaration(&mut self, decl: &str, offset: usize, depth: usize) -> Result<(), DtdSyntaxError> {
        let body = self.expand_parameter_refs(decl, offset, depth)?;
        let mut scanner = Scanner::new(&body);
        let keyword = scanner.name();

        match keyword.as_deref() {
            Some("ELEMENT") => self.element_decl(&mut scanner, offset),
            Some("ATTLIST") => self.attlist_decl(&mut scanner, offset),
            Some("ENTITY") => self.entity_decl(&mut scanner, offset),
            Some("NOTATION") => self.notation_decl(&mut scanner, offset),
            _ => Err(self.syntax("unknown declaration", offset)),
        }
    }

    /// Replace `%name;` references inside a declaration body
    fn expand_parameter_refs(
        &mut self,
        decl: &str,
        offset: usize,
        depth: usize,
    ) -> Result<String, DtdSyntaxError> {
        if !decl.contains('%') || depth >= MAX_PE_DEPTH {
            return Ok(decl.to_string());
        }

        let mut out = String::with_capacity(decl.len());
        let mut quote: Option<char> = None;
        let mut chars = decl.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            match (quote, c) {
                (Some(q), c) if c == q => {
                    quote = None;
                    out.push(c);
                }
                (None, '"' | '\'') => {
                    quote = Some(c);
                    out.push(c);
                }
                (None, '%') => {
                    let starts_name = chars
                        .peek()
                        .map(|(_, n)| is_name_char(*n))
                        .unwrap_or(false);
                    if !starts_name {
                        out.push(c);
                        continue;
                    }
                    let rest = &decl[i + 1..];
                    let semi = rest
                        .find(';')
                        .ok_or_else(|| self.syntax("unterminated parameter entity reference", offset))?;
                    let pe_name = &rest[..semi];
                    let replacement = match self.parameter_entity(pe_name, offset)? {
                        Some(replacement) => replacement,
                        None => {
                            return Err(self.syntax(
                                format!("parameter entity \"{}\" is not declared", pe_name),
                                offset,
                            ))
                        }
                    };
                    out.push(' ');
                    out.push_str(&self.expand_parameter_refs(&replacement, offset, depth + 1)?);
                    out.push(' ');
                    for _ in 0..pe_name.chars().count() + 1 {
                        chars.next();
                    }
                }
                _ => out.push(c),
            }
        }

        Ok(out)
    }

    fn element_decl(&mut self, scanner: &mut Scanner<'_>, offset: usize) -> Result<(), DtdSyntaxError> {
        let name = scanner
            .name()
            .ok_or_else(|| self.syntax("expected element name in ELEMENT declaration", offset))?;
        let spec = parse_content_spec(scanner.rest())
            .map_err(|e| self.syntax(format!("bad content model for \"{}\": {}", name, e.message), offset))?;

        if self.dtd.elements.contains_key(&name) {
            self.notice(
                Severity::Error,
                offset,
                format!("element type \"{}\" must not be declared more than once", name),
            );
        } else {
            self.dtd.elements.insert(name, spec);
        }
        Ok(())
    }

    fn attlist_decl(&mut self, scanner: &mut Scanner<'_>, offset: usize) -> Result<(), DtdSyntaxError> {
        let element = scanner
            .name()
            .ok_or_else(|| self.syntax("expected element name in ATTLIST declaration", offset))?;

        loop {
            scanner.skip_ws();
            if scanner.at_end() {
                break;
            }
            let attr = scanner
                .name()
                .ok_or_else(|| self.syntax("expected attribute name in ATTLIST declaration", offset))?;
            let kind = self.attr_type(scanner, &attr, offset)?;
            let default = self.default_decl(scanner, &attr, offset)?;

            let duplicate = self
                .dtd
                .attributes
                .get(&element)
                .map_or(false, |defs| defs.iter().any(|d| d.name == attr));
            if duplicate {
                let message = format!(
                    "attribute \"{}\" for element type \"{}\" is declared more than once",
                    attr, element
                );
                self.notice(Severity::Warning, offset, message);
            } else {
                self.dtd
                    .attributes
                    .entry(element.clone())
                    .or_default()
                    .push(AttributeDef {
                        name: attr,
                        kind,
                        default,
                    });
            }
        }

        self.dtd.attributes.entry(element).or_default();
        Ok(())
    }

    fn attr_type(
        &self,
        scanner: &mut Scanner<'_>,
        attr: &str,
        offset: usize,
    ) -> Result<AttrType, DtdSyntaxError> {
        scanner.skip_ws();
        if scanner.peek() == Some('(') {
            let values = scanner
                .enumeration()
                .ok_or_else(|| self.syntax(format!("bad enumeration for attribute \"{}\"", attr), offset))?;
            return Ok(AttrType::Enumeration(values));
        }

        let keyword = scanner
            .name()
            .ok_or_else(|| self.syntax(format!("expected type for attribute \"{}\"", attr), offset))?;
        Ok(match keyword.as_str() {
            "CDATA" => AttrType::CData,
            "ID" => AttrType::Id,
            "IDREF" => AttrType::IdRef,
            "IDREFS" => AttrType::IdRefs,
            "ENTITY" => AttrType::Entity,
            "ENTITIES" => AttrType::Entities,
            "NMTOKEN" => AttrType::NmToken,
            "NMTOKENS" => AttrType::NmTokens,
            "NOTATION" => {
                scanner.skip_ws();
                let values = scanner.enumeration().ok_or_else(|| {
                    self.syntax(format!("bad NOTATION list for attribute \"{}\"", attr), offset)
                })?;
                AttrType::Notation(values)
            }
            other => {
                return Err(self.syntax(
                    format!("unknown attribute type \"{}\" for attribute \"{}\"", other, attr),
                    offset,
                ))
            }
        })
    }

    fn default_decl(
        &self,
        scanner: &mut Scanner<'_>,
        attr: &str,
        offset: usize,
    ) -> Result<DefaultDecl, DtdSyntaxError> {
        scanner.skip_ws();
        let bad = || self.syntax(format!("bad default declaration for attribute \"{}\"", attr), offset);

        if scanner.eat('#') {
            let keyword = scanner.name().ok_or_else(bad)?;
            match keyword.as_str() {
                "REQUIRED" => Ok(DefaultDecl::Required),
                "IMPLIED" => Ok(DefaultDecl::Implied),
                "FIXED" => {
                    scanner.skip_ws();
                    let value = scanner.literal().ok_or_else(bad)?;
                    Ok(DefaultDecl::Fixed(value))
                }
                _ => Err(bad()),
            }
        } else {
            let value = scanner.literal().ok_or_else(bad)?;
            Ok(DefaultDecl::Value(value))
        }
    }

    fn entity_decl(&mut self, scanner: &mut Scanner<'_>, offset: usize) -> Result<(), DtdSyntaxError> {
        scanner.skip_ws();
        let parameter = scanner.eat('%');
        let name = scanner
            .name()
            .ok_or_else(|| self.syntax("expected entity name in ENTITY declaration", offset))?;
        scanner.skip_ws();

        let (value, system) = if scanner.peek().map_or(false, |c| c == '"' || c == '\'') {
            let value = scanner
                .literal()
                .ok_or_else(|| self.syntax("unterminated entity value", offset))?;
            (Some(value), None)
        } else {
            (None, Some(self.external_id(scanner, "ENTITY", offset)?))
        };

        scanner.skip_ws();
        let ndata = match scanner.name().as_deref() {
            Some("NDATA") => Some(
                scanner
                    .name()
                    .ok_or_else(|| self.syntax("expected notation name after NDATA", offset))?,
            ),
            Some(other) => {
                return Err(self.syntax(format!("unexpected \"{}\" in ENTITY declaration", other), offset))
            }
            None => None,
        };

        let already = if parameter {
            self.parameter_entities.contains_key(&name)
        } else {
            self.dtd.entities.contains_key(&name) || self.dtd.unparsed_entities.contains(&name)
        };
        if already {
            // First binding wins
            self.notice(
                Severity::Warning,
                offset,
                format!("entity \"{}\" is declared more than once", name),
            );
            return Ok(());
        }

        match (parameter, value, ndata) {
            (true, Some(value), _) => {
                self.parameter_entities
                    .insert(name, ParameterEntity::Internal(value));
            }
            (true, None, _) => {
                if let Some(system) = system {
                    self.parameter_entities
                        .insert(name, ParameterEntity::External(system));
                }
            }
            (false, Some(value), _) => {
                self.dtd.entities.insert(name, value);
            }
            (false, None, Some(_)) => {
                self.dtd.unparsed_entities.insert(name);
            }
            (false, None, None) => {}
        }
        Ok(())
    }

    fn notation_decl(&mut self, scanner: &mut Scanner<'_>, offset: usize) -> Result<(), DtdSyntaxError> {
        let name = scanner
            .name()
            .ok_or_else(|| self.syntax("expected notation name in NOTATION declaration", offset))?;
        scanner.skip_ws();
        match scanner.name().as_deref() {
            Some("SYSTEM") => {
                scanner.skip_ws();
                scanner
                    .literal()
                    .ok_or_else(|| self.syntax("expected system literal in NOTATION declaration", offset))?;
            }
            Some("PUBLIC") => {
                scanner.skip_ws();
                scanner
                    .literal()
                    .ok_or_else(|| self.syntax("expected public id in NOTATION declaration", offset))?;
                scanner.skip_ws();
                let _ = scanner.literal();
            }
            _ => return Err(self.syntax("expected SYSTEM or PUBLIC in NOTATION declaration", offset)),
        }
        self.dtd.notations.insert(name);
        Ok(())
    }

    /// `SYSTEM "sys"` or `PUBLIC "pub" "sys"`, returning the system literal
    fn external_id(
        &self,
        scanner: &mut Scanner<'_>,
        what: &str,
        offset: usize,
    ) -> Result<String, DtdSyntaxError> {
        let missing = || self.syntax(format!("expected literal or external id in {} declaration", what), offset);
        match scanner.name().as_deref() {
            Some("SYSTEM") => {
                scanner.skip_ws();
                scanner.literal().ok_or_else(missing)
            }
            Some("PUBLIC") => {
                scanner.skip_ws();
                scanner.literal().ok_or_else(missing)?;
                scanner.skip_ws();
                scanner.literal().ok_or_else(missing)
            }
            _ => Err(missing()),
        }
    }
}

/// Local file for an external system id. URLs are looked up by base name
/// next to the referencing DTD.
fn external_path(system: &str, base: Option<&Path>) -> PathBuf {
    let relative = if system.contains("://") {
        system.rsplit('/').next().unwrap_or(system)
    } else {
        system
    };
    match base {
        Some(dir) => dir.join(relative),
        None => PathBuf::from(relative),
    }
}

/// Drop a leading `<?xml ...?>` text declaration
fn strip_text_declaration(text: &str) -> &str {
    let trimmed = text.trim_start_matches('\u{feff}');
    if trimmed.starts_with("<?xml") {
        if let Some(end) = trimmed.find("?>") {
            return &trimmed[end + 2..];
        }
    }
    trimmed
}

/// Position of the `]]>` closing a conditional section whose body starts
/// `text`, skipping nested sections
fn conditional_section_end(text: &str) -> Option<usize> {
    let mut nesting = 0usize;
    let mut i = 0;
    while i < text.len() {
        let rest = &text[i..];
        if rest.starts_with("<![") {
            nesting += 1;
            i += 3;
        } else if rest.starts_with("]]>") {
            if nesting == 0 {
                return Some(i);
            }
            nesting -= 1;
            i += 3;
        } else {
            i += rest.chars().next().map_or(1, char::len_utf8);
        }
    }
    None
}

/// Position of the `>` closing a declaration, honoring quoted literals
fn declaration_end(text: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in text.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '>' => return Some(i),
            None => {}
        }
    }
    None
}

/// Token scanner over a single declaration body
pub(crate) struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    pub(crate) fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    pub(crate) fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    /// Remaining text, consuming it
    pub(crate) fn rest(&mut self) -> &'a str {
        let rest = &self.src[self.pos..];
        self.pos = self.src.len();
        rest
    }

    pub(crate) fn name(&mut self) -> Option<String> {
        self.skip_ws();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_name_char(c) {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        if start == self.pos {
            None
        } else {
            Some(self.src[start..self.pos].to_string())
        }
    }

    pub(crate) fn literal(&mut self) -> Option<String> {
        let quote = self.peek().filter(|c| *c == '"' || *c == '\'')?;
        self.pos += 1;
        let start = self.pos;
        let end = self.src[start..].find(quote)?;
        self.pos = start + end + 1;
        Some(self.src[start..start + end].to_string())
    }

    /// `( a | b | c )`
    fn enumeration(&mut self) -> Option<Vec<String>> {
        if !self.eat('(') {
            return None;
        }
        let mut values = Vec::new();
        loop {
            values.push(self.name()?);
            self.skip_ws();
            if self.eat(')') {
                return Some(values);
            }
            if !self.eat('|') {
                return None;
            }
        }
    }
}
