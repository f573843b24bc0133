//! Field bag validation.
//!
//! Request bodies are decoded into a schema-less `serde_json::Value` rather than a typed
//! struct so that missing or mistyped fields surface as a [`ValidationError`] instead of a
//! decode rejection. Rules are applied in a fixed order (name, email, age) and the first
//! failure wins.

use serde_json::{Map, Value};
use thiserror::Error;

use super::Student;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Name must not be empty.")]
    EmptyName,
    #[error("Email must not be empty.")]
    EmptyEmail,
    #[error("Age must be a valid integer.")]
    InvalidAgeFormat,
    #[error("Age must be greater than 0.")]
    AgeNotPositive,
}

/// Builds a `Student` draft from an untrusted field bag.
///
/// Any `id` key in `fields` is ignored; the draft carries `id` as given by the caller
/// (`None` for create, the existing id for update).
///
/// # Errors
/// Returns the first [`ValidationError`] hit while extracting name, email and age.
pub fn validate(fields: &Value, id: Option<i32>) -> Result<Student, ValidationError> {
    let empty = Map::new();
    let fields = fields.as_object().unwrap_or(&empty);

    let name = text_field(fields, "name").ok_or(ValidationError::EmptyName)?;
    let email = text_field(fields, "email").ok_or(ValidationError::EmptyEmail)?;
    let age = age_field(fields)?;

    if age <= 0 {
        return Err(ValidationError::AgeNotPositive);
    }

    Ok(Student {
        id,
        name,
        email,
        age,
    })
}

/// Present, non-null, and non-empty once trimmed.
fn text_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    let text = match fields.get(key)? {
        Value::Null => return None,
        Value::String(value) => value.trim().to_string(),
        other => other.to_string().trim().to_string(),
    };

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn age_field(fields: &Map<String, Value>) -> Result<i32, ValidationError> {
    match fields.get("age") {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(number)) => {
            let whole = match number.as_i64() {
                Some(value) => value,
                // floats (and integers too large for i64) keep their integer part
                None => number
                    .as_f64()
                    .map(f64::trunc)
                    .filter(|value| value.abs() < 9.0e18)
                    .map(|value| value as i64)
                    .ok_or(ValidationError::InvalidAgeFormat)?,
            };
            i32::try_from(whole).map_err(|_| ValidationError::InvalidAgeFormat)
        }
        Some(Value::String(text)) => text
            .parse::<i32>()
            .map_err(|_| ValidationError::InvalidAgeFormat),
        Some(_) => Err(ValidationError::InvalidAgeFormat),
    }
}
