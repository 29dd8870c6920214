//! JSON Schema loading and violation formatting

use jsonschema::{ValidationError as JsonSchemaError, Validator as JsonValidator};
use serde_json::Value as JsonValue;
use std::path::Path;

use crate::core::error::EngineError;

/// Read and parse a schema document
pub fn load_schema(path: &Path) -> Result<JsonValue, EngineError> {
    let content = std::fs::read_to_string(path).map_err(|source| EngineError::SchemaRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| EngineError::SchemaParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Compile with the default draft detection
pub fn compile(path: &Path, schema: &JsonValue) -> Result<JsonValidator, EngineError> {
    jsonschema::validator_for(schema).map_err(|e| EngineError::SchemaCompile {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Compile through the options builder, checking string formats
pub fn compile_with_formats(path: &Path, schema: &JsonValue) -> Result<JsonValidator, EngineError> {
    jsonschema::options()
        .should_validate_formats(true)
        .build(schema)
        .map_err(|e| EngineError::SchemaCompile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Instance location of an error as a JSON pointer fragment, e.g. `#/a/0`
pub fn pointer(error: &JsonSchemaError) -> String {
    format!("#{}", error.instance_path.as_str())
}

/// Schema location of an error as a JSON pointer fragment
pub fn schema_location(error: &JsonSchemaError) -> String {
    let path = error.schema_path.as_str();
    // The last segment is the failing keyword itself
    match path.rfind('/') {
        Some(idx) if idx > 0 => format!("#{}", &path[..idx]),
        _ => "#".to_string(),
    }
}

/// Keyword that failed, taken from the end of the schema path
pub fn keyword(error: &JsonSchemaError) -> Option<String> {
    error
        .schema_path
        .as_str()
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Format a JSON Schema error into a user-friendly message
pub fn format_schema_error(error: &JsonSchemaError) -> String {
    let path = if error.instance_path.as_str().is_empty() {
        "document root".to_string()
    } else {
        format!("'{}'", error.instance_path)
    };

    match &error.kind {
        jsonschema::error::ValidationErrorKind::Required { property } => {
            let prop_str = property
                .as_str()
                .map(|s| s.to_string())
                .unwrap_or_else(|| property.to_string());
            format!("Missing required field: {} at {}", prop_str, path)
        }
        jsonschema::error::ValidationErrorKind::Type { kind } => {
            format!("Wrong type at {}: expected {:?}", path, kind)
        }
        jsonschema::error::ValidationErrorKind::Enum { options } => {
            let opts = format_enum_options(options);
            format!("Invalid value at {}: must be one of: {}", path, opts)
        }
        jsonschema::error::ValidationErrorKind::Pattern { pattern } => {
            format!("Value at {} doesn't match pattern: {}", path, pattern)
        }
        jsonschema::error::ValidationErrorKind::MinLength { limit } => {
            format!("Value at {} is too short: minimum {} characters", path, limit)
        }
        jsonschema::error::ValidationErrorKind::MaxLength { limit } => {
            format!("Value at {} is too long: maximum {} characters", path, limit)
        }
        jsonschema::error::ValidationErrorKind::Minimum { limit } => {
            format!("Value at {} is too small: minimum {}", path, limit)
        }
        jsonschema::error::ValidationErrorKind::Maximum { limit } => {
            format!("Value at {} is too large: maximum {}", path, limit)
        }
        jsonschema::error::ValidationErrorKind::AdditionalProperties { unexpected } => {
            format!("Unknown field(s) at {}: {}", path, unexpected.join(", "))
        }
        _ => {
            format!("Validation error at {}: {}", path, error)
        }
    }
}

/// Format enum options as a string
fn format_enum_options(options: &JsonValue) -> String {
    if let Some(arr) = options.as_array() {
        arr.iter()
            .map(|v| v.as_str().map(|s| s.to_string()).unwrap_or_else(|| v.to_string()))
            .collect::<Vec<_>>()
            .join(", ")
    } else {
        options.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn person_schema() -> JsonValue {
        json!({
            "type": "object",
            "required": ["name", "age"],
            "properties": {
                "name": {"type": "string", "minLength": 2},
                "age": {"type": "integer", "minimum": 0},
                "role": {"enum": ["admin", "user"]}
            },
            "additionalProperties": false
        })
    }

    fn first_error(instance: JsonValue) -> String {
        let validator = jsonschema::validator_for(&person_schema()).unwrap();
        let error = validator.iter_errors(&instance).next().expect("an error");
        format_schema_error(&error)
    }

    #[test]
    fn test_missing_required() {
        let msg = first_error(json!({"name": "Ada"}));
        assert_eq!(msg, "Missing required field: age at document root");
    }

    #[test]
    fn test_enum_and_minimum() {
        let msg = first_error(json!({"name": "Ada", "age": 3, "role": "root"}));
        assert!(msg.contains("must be one of: admin, user"), "{}", msg);

        let msg = first_error(json!({"name": "Ada", "age": -1}));
        assert!(msg.contains("too small"), "{}", msg);
    }

    #[test]
    fn test_wrong_type() {
        let msg = first_error(json!({"name": "Ada", "age": "three"}));
        assert!(msg.starts_with("Wrong type at '/age': expected"), "{}", msg);
    }

    #[test]
    fn test_unknown_field() {
        let msg = first_error(json!({"name": "Ada", "age": 3, "extra": true}));
        assert!(msg.contains("Unknown field(s) at document root: extra"), "{}", msg);
    }

    #[test]
    fn test_locations() {
        let validator = jsonschema::validator_for(&person_schema()).unwrap();
        let instance = json!({"name": "A", "age": 3});
        let error = validator.iter_errors(&instance).next().unwrap();
        assert_eq!(pointer(&error), "#/name");
        assert_eq!(schema_location(&error), "#/properties/name");
        assert_eq!(keyword(&error).as_deref(), Some("minLength"));
    }

    #[test]
    fn test_load_schema_errors() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(load_schema(&missing).unwrap_err().is_io());

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(load_schema(&broken), Err(EngineError::SchemaParse { .. })));
    }

    #[test]
    fn test_compile_rejects_bad_schema() {
        let schema = json!({"type": "no-such-type"});
        let result = compile(std::path::Path::new("bad.json"), &schema);
        assert!(matches!(result, Err(EngineError::SchemaCompile { .. })));
    }
}
