//! Document type declaration of an XML document

use crate::dtd::parser::Scanner;

/// Parsed `<!DOCTYPE root PUBLIC "pub" "sys" [ ... ]>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocType {
    pub root: String,
    pub public_id: Option<String>,
    pub system_id: Option<String>,
    pub internal_subset: Option<String>,
}

impl DocType {
    /// Parse the text following the `DOCTYPE` keyword
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut scanner = Scanner::new(text);
        let root = scanner
            .name()
            .ok_or_else(|| "document type declaration must name the root element".to_string())?;

        let mut public_id = None;
        let mut system_id = None;
        scanner.skip_ws();
        if scanner.peek() != Some('[') && !scanner.at_end() {
            match scanner.name().as_deref() {
                Some("SYSTEM") => {
                    scanner.skip_ws();
                    system_id = Some(
                        scanner
                            .literal()
                            .ok_or_else(|| "expected system literal after SYSTEM".to_string())?,
                    );
                }
                Some("PUBLIC") => {
                    scanner.skip_ws();
                    public_id = Some(
                        scanner
                            .literal()
                            .ok_or_else(|| "expected public identifier after PUBLIC".to_string())?,
                    );
                    scanner.skip_ws();
                    system_id = Some(
                        scanner
                            .literal()
                            .ok_or_else(|| "expected system literal after public identifier".to_string())?,
                    );
                }
                _ => return Err("expected SYSTEM, PUBLIC or '[' in document type declaration".to_string()),
            }
        }

        scanner.skip_ws();
        let internal_subset = if scanner.eat('[') {
            let rest = scanner.rest();
            let end = rest
                .rfind(']')
                .ok_or_else(|| "unterminated internal subset".to_string())?;
            if !rest[end + 1..].trim().is_empty() {
                return Err("unexpected text after internal subset".to_string());
            }
            Some(rest[..end].to_string())
        } else if !scanner.at_end() {
            return Err("unexpected text in document type declaration".to_string());
        } else {
            None
        };

        Ok(Self {
            root,
            public_id,
            system_id,
            internal_subset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system() {
        let doctype = DocType::parse(" note SYSTEM \"note.dtd\"").unwrap();
        assert_eq!(doctype.root, "note");
        assert_eq!(doctype.system_id.as_deref(), Some("note.dtd"));
        assert!(doctype.public_id.is_none());
        assert!(doctype.internal_subset.is_none());
    }

    #[test]
    fn test_public() {
        let doctype =
            DocType::parse("html PUBLIC \"-//W3C//DTD XHTML 1.0 Strict//EN\" 'xhtml1-strict.dtd'")
                .unwrap();
        assert_eq!(doctype.public_id.as_deref(), Some("-//W3C//DTD XHTML 1.0 Strict//EN"));
        assert_eq!(doctype.system_id.as_deref(), Some("xhtml1-strict.dtd"));
    }

    #[test]
    fn test_internal_subset_only() {
        let doctype = DocType::parse("note [ <!ELEMENT note (#PCDATA)> ]").unwrap();
        assert!(doctype.system_id.is_none());
        assert_eq!(
            doctype.internal_subset.as_deref().map(str::trim),
            Some("<!ELEMENT note (#PCDATA)>")
        );
    }

    #[test]
    fn test_system_and_internal_subset() {
        let doctype = DocType::parse("note SYSTEM \"note.dtd\" [<!ENTITY me \"x\">]").unwrap();
        assert_eq!(doctype.system_id.as_deref(), Some("note.dtd"));
        assert!(doctype.internal_subset.is_some());
    }

    #[test]
    fn test_errors() {
        assert!(DocType::parse("").is_err());
        assert!(DocType::parse("note SYSTEM").is_err());
        assert!(DocType::parse("note BOGUS \"x\"").is_err());
        assert!(DocType::parse("note [ <!ELEMENT note ANY>").is_err());
    }
}
