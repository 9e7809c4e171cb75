//! JSON Schema check for parsed evaluations.
//!
//! The schema in `schema/evaluation.schema.json` describes what the prompt
//! asks the model for. Violations are reported, not enforced: the
//! normaliser in [`crate::types`] tolerates every one of them.

use std::sync::OnceLock;
use thiserror::Error;

/// Embedded evaluation schema (loaded at compile time).
const EVALUATION_SCHEMA_JSON: &str = include_str!("../schema/evaluation.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Errors from schema validation.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to load schema: {0}")]
    LoadError(String),
}

fn get_validator() -> Result<&'static jsonschema::Validator, SchemaError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = match serde_json::from_str(EVALUATION_SCHEMA_JSON) {
            Ok(v) => v,
            Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
        };

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result
        .as_ref()
        .map_err(|e| SchemaError::LoadError(e.clone()))
}

/// Check a parsed evaluation against the schema.
///
/// Returns the list of violations, each with its instance path
/// (e.g. `"11 is greater than the maximum of 10 at /score"`).
pub fn check_evaluation_shape(value: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
