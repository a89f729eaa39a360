//! Tree validation against a JSON Schema.

use serde::Serialize;
use serde_json::Value;

use crate::error::ValidateError;
use crate::loader::pointer_segments;
use crate::types::Node;

/// One failed constraint, as reported by the schema evaluator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbstractError {
    /// Unescaped segments from the tree root to the failing value.
    pub instance_path: Vec<String>,
    /// The same path as a JSON Pointer (RFC 6901).
    pub pointer: String,
    /// JSON Pointer into the schema to the failing keyword.
    pub schema_path: String,
    /// The failing keyword, e.g. `const` or `required`.
    pub keyword: String,
    /// The instance value that failed.
    pub instance: Value,
    /// Human-readable error message.
    pub message: String,
}

/// Validate a tree against a schema.
///
/// Errors come back in the order the evaluator reports them, which
/// follows the schema's keyword layout rather than document order. They are
/// neither sorted nor deduplicated.
///
/// # Errors
///
/// Returns `ValidateError::InvalidSchema` if the schema does not compile.
pub fn validate(tree: &Node, schema: &Value) -> Result<Vec<AbstractError>, ValidateError> {
    validate_instance(&tree.to_instance(), schema)
}

/// Validate an already-built instance against a schema.
pub fn validate_instance(instance: &Value, schema: &Value) -> Result<Vec<AbstractError>, ValidateError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| ValidateError::InvalidSchema {
        path: None,
        message: e.to_string(),
    })?;

    let errors = validator
        .iter_errors(instance)
        .map(|e| {
            let pointer = e.instance_path.to_string();
            let schema_path = e.schema_path.to_string();
            AbstractError {
                instance_path: pointer_segments(&pointer),
                keyword: pointer_segments(&schema_path).pop().unwrap_or_default(),
                instance: e.instance.clone().into_owned(),
                message: e.to_string(),
                pointer,
                schema_path,
            }
        })
        .collect();

    Ok(errors)
}
