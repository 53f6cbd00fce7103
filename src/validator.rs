//! Payload validation against JSON Schema contracts.

use jsonschema::Validator;
use serde_json::Value;

use crate::error::{SchemaError, ValidateError};

/// A compiled JSON Schema, reusable across payloads.
pub struct CompiledSchema {
    validator: Validator,
}

impl std::fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledSchema").finish_non_exhaustive()
    }
}

impl CompiledSchema {
    /// Compile `schema`.
    ///
    /// # Errors
    ///
    /// Returns `ValidateError::InvalidSchema` if the schema itself is invalid.
    pub fn new(schema: &Value) -> Result<Self, ValidateError> {
        let validator =
            jsonschema::validator_for(schema).map_err(|e| ValidateError::InvalidSchema {
                message: e.to_string(),
            })?;
        Ok(Self { validator })
    }

    /// Validate `payload`, collecting every error with its JSON pointer.
    pub fn validate(&self, payload: &Value) -> Result<(), ValidateError> {
        let errors = collect_errors(&self.validator, payload);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidateError::Invalid { errors })
        }
    }
}

fn collect_errors(validator: &Validator, payload: &Value) -> Vec<SchemaError> {
    validator
        .iter_errors(payload)
        .map(|e| SchemaError {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect()
}

/// Validate a payload against a schema compiled on the fly.
///
/// Use [`CompiledSchema`] when validating many payloads against one schema.
pub fn validate_against_schema(schema: &Value, payload: &Value) -> Result<(), ValidateError> {
    CompiledSchema::new(schema)?.validate(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validate_valid_payload() {
        let schema = json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" }
            },
            "required": ["title"]
        });
        assert!(validate_against_schema(&schema, &json!({ "title": "milk" })).is_ok());
    }

    #[test]
    fn validate_missing_required_field() {
        let schema = json!({
            "type": "object",
            "properties": { "title": { "type": "string" } },
            "required": ["title"]
        });
        let result = validate_against_schema(&schema, &json!({}));
        assert!(matches!(result, Err(ValidateError::Invalid { .. })));
    }

    #[test]
    fn validate_closed_object_rejects_unknown() {
        let schema = json!({
            "type": "object",
            "additionalProperties": false,
            "properties": { "title": { "type": "string" } }
        });
        let result = validate_against_schema(&schema, &json!({ "title": "a", "id": 1 }));
        assert!(matches!(result, Err(ValidateError::Invalid { .. })));
    }

    #[test]
    fn validate_collects_multiple_errors() {
        let schema = json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "priority": { "type": "integer", "maximum": 5 }
            },
            "required": ["title", "priority"]
        });
        let compiled = CompiledSchema::new(&schema).unwrap();
        match compiled.validate(&json!({ "title": 3 })) {
            Err(ValidateError::Invalid { errors }) => {
                assert_eq!(errors.len(), 2);
                assert!(errors.iter().any(|e| e.path == "/title"));
            }
            other => panic!("expected validation error with 2 errors, got {other:?}"),
        }
    }

    #[test]
    fn invalid_schema_is_reported() {
        let schema = json!({ "type": 12 });
        assert!(matches!(
            CompiledSchema::new(&schema),
            Err(ValidateError::InvalidSchema { .. })
        ));
    }
}
