//! Structured violation report for whole-document validation

use jsonschema::ValidationError as JsonSchemaError;
use serde::Serialize;

use crate::schema::validator::{keyword, pointer, schema_location};

/// One violation, or a set of violations under a summary node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationReport {
    pub schema_location: String,
    pub pointer_to_violation: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub causing_exceptions: Vec<ViolationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    pub message: String,
}

impl ViolationReport {
    fn from_error(error: &JsonSchemaError) -> Self {
        let pointer = pointer(error);
        Self {
            schema_location: schema_location(error),
            message: format!("{}: {}", pointer, error),
            pointer_to_violation: pointer,
            causing_exceptions: Vec::new(),
            keyword: keyword(error),
        }
    }

    /// Build a report from every error found in one validation pass.
    /// Returns `None` when there are no errors.
    pub fn from_errors<'a>(errors: impl IntoIterator<Item = JsonSchemaError<'a>>) -> Option<Self> {
        let mut reports: Vec<ViolationReport> =
            errors.into_iter().map(|e| Self::from_error(&e)).collect();

        match reports.len() {
            0 => None,
            1 => reports.pop(),
            count => Some(Self {
                schema_location: "#".to_string(),
                pointer_to_violation: "#".to_string(),
                causing_exceptions: reports,
                keyword: None,
                message: format!("#: {} schema violations found", count),
            }),
        }
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.message.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_violation_report() {
        let schema = json!({"type": "object", "required": ["id"]});
        let validator = jsonschema::validator_for(&schema).unwrap();
        let instance = json!({});
        let report = ViolationReport::from_errors(validator.iter_errors(&instance)).unwrap();

        assert!(report.causing_exceptions.is_empty());
        assert_eq!(report.pointer_to_violation, "#");
        assert_eq!(report.keyword.as_deref(), Some("required"));
        insta::assert_snapshot!(report.to_pretty_json(), @r###"
        {
          "schemaLocation": "#",
          "pointerToViolation": "#",
          "keyword": "required",
          "message": "#: \"id\" is a required property"
        }
        "###);
    }

    #[test]
    fn test_multiple_violations_nest() {
        let schema = json!({
            "type": "object",
            "required": ["id", "name"],
            "properties": {"count": {"type": "integer"}}
        });
        let validator = jsonschema::validator_for(&schema).unwrap();
        let instance = json!({"count": "three"});
        let report = ViolationReport::from_errors(validator.iter_errors(&instance)).unwrap();

        assert_eq!(report.causing_exceptions.len(), 3);
        assert_eq!(report.message, "#: 3 schema violations found");
        assert!(report.keyword.is_none());
        assert!(report
            .causing_exceptions
            .iter()
            .any(|r| r.pointer_to_violation == "#/count"));
    }

    #[test]
    fn test_no_errors() {
        let schema = json!({"type": "array"});
        let validator = jsonschema::validator_for(&schema).unwrap();
        let instance = json!([1, 2]);
        assert!(ViolationReport::from_errors(validator.iter_errors(&instance)).is_none());
    }
}
