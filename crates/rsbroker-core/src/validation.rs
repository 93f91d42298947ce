//! JSON payload validation
//!
//! Extracts typed fields from request bodies. Every accessor takes the field
//! name and a `required` flag; a missing optional field yields `Ok(None)`.
//! JSON `null` counts as missing.

use serde_json::{Map, Value};

/// A malformed or missing field in a JSON payload.
///
/// The message is user-facing and ends up in the `description` of a 400.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{description}")]
pub struct ValidationError {
    pub description: String,
}

impl ValidationError {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }

    fn not_found(name: &str) -> Self {
        Self::new(format!("{} not found in JSON payload", name))
    }
}

pub type ValidationResult<T> = Result<T, ValidationError>;

fn lookup<'a>(json: &'a Value, name: &str, required: bool) -> ValidationResult<Option<&'a Value>> {
    match json.get(name) {
        None | Some(Value::Null) if required => Err(ValidationError::not_found(name)),
        None | Some(Value::Null) => Ok(None),
        Some(value) => Ok(Some(value)),
    }
}

/// Get a boolean field
pub fn get_bool(json: &Value, name: &str, required: bool) -> ValidationResult<Option<bool>> {
    match lookup(json, name, required)? {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(ValidationError::new(format!("{} must be Boolean", name))),
    }
}

/// Get a JSON object field
pub fn get_object<'a>(
    json: &'a Value,
    name: &str,
    required: bool,
) -> ValidationResult<Option<&'a Map<String, Value>>> {
    match lookup(json, name, required)? {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(ValidationError::new(format!(
            "{} must be a JSON object",
            name
        ))),
    }
}

/// Get a string field.
///
/// A blank string is rejected when the field is required and treated as
/// absent otherwise.
pub fn get_string<'a>(
    json: &'a Value,
    name: &str,
    required: bool,
) -> ValidationResult<Option<&'a str>> {
    match lookup(json, name, required)? {
        None => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => {
            if required {
                Err(ValidationError::new(format!("{} cannot be empty", name)))
            } else {
                Ok(None)
            }
        }
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(ValidationError::new(format!("{} must be string", name))),
    }
}

/// Get the object at `index` of an array field
pub fn get_array_entry<'a>(
    json: &'a Value,
    name: &str,
    index: usize,
    required: bool,
) -> ValidationResult<Option<&'a Map<String, Value>>> {
    let Some(value) = lookup(json, name, required)? else {
        return Ok(None);
    };

    let Value::Array(items) = value else {
        return Err(ValidationError::new(format!("{} must be an Array", name)));
    };

    match items.get(index) {
        None => Err(ValidationError::new(format!(
            "{} must be an Array of at least length {}",
            name,
            index + 1
        ))),
        Some(Value::Object(entry)) => Ok(Some(entry)),
        Some(_) => Err(ValidationError::new(format!(
            "{} must be an Array of JSON object",
            name
        ))),
    }
}

/// Required string, unwrapped
pub fn require_string(json: &Value, name: &str) -> ValidationResult<String> {
    get_string(json, name, true)?
        .map(str::to_string)
        .ok_or_else(|| ValidationError::not_found(name))
}
