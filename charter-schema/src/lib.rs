//! JSON-Schema (draft 2020-12) validation, shared by state updates
//! (`charter-state`), tool/command input validation (`charter-tool`),
//! and the durable serializer (`charter-wire`).

use jsonschema::JSONSchema;
use serde_json::Value;
use thiserror::Error;

/// Compiling or applying a schema failed.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema document itself is not a valid JSON Schema.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// The value failed validation; carries the joined error messages.
    #[error("validation failed: {0}")]
    ValidationFailed(String),
}

/// Validates values against a compiled JSON Schema.
///
/// Kept as a narrow trait (rather than exposing `jsonschema`'s own
/// types at the API boundary) so callers can swap validators — e.g. a
/// no-op validator in tests — without pulling in the schema crate's
/// own type surface.
pub trait SchemaValidator: Send + Sync {
    /// Validate `value`, returning the joined set of errors on
    /// failure.
    fn validate(&self, value: &Value) -> Result<(), SchemaError>;
}

/// A [`SchemaValidator`] backed by a compiled draft 2020-12 schema.
pub struct JsonSchemaValidator {
    compiled: JSONSchema,
}

impl JsonSchemaValidator {
    /// Compile `schema` as a draft 2020-12 document.
    pub fn compile(schema: &Value) -> Result<Self, SchemaError> {
        let compiled = JSONSchema::options()
            .with_draft(jsonschema::Draft::Draft202012)
            .compile(schema)
            .map_err(|e| SchemaError::InvalidSchema(e.to_string()))?;
        Ok(Self { compiled })
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, value: &Value) -> Result<(), SchemaError> {
        self.compiled.validate(value).map_err(|errors| {
            let joined = errors.map(|e| e.to_string()).collect::<Vec<_>>().join("; ");
            SchemaError::ValidationFailed(joined)
        })
    }
}

/// A validator that accepts everything. Useful for nodes/packs that
/// declare an empty/unconstrained state schema, and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullValidator;

impl SchemaValidator for NullValidator {
    fn validate(&self, _value: &Value) -> Result<(), SchemaError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_and_validates() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": { "x": { "type": "integer" } },
            "required": ["x"],
        });
        let validator = JsonSchemaValidator::compile(&schema).unwrap();
        assert!(validator.validate(&serde_json::json!({ "x": 1 })).is_ok());
        assert!(validator.validate(&serde_json::json!({ "x": "nope" })).is_err());
    }

    #[test]
    fn null_validator_accepts_anything() {
        assert!(NullValidator.validate(&serde_json::json!(null)).is_ok());
    }
}
