use serde_json::Value;
use thiserror::Error;

use crate::entry::{NewEntry, Status, REQUIRED_FIELDS};

/// Reasons a submitted entry is rejected. The messages are returned to the
/// client verbatim.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("Request body must be a JSON object")]
    NotAnObject,
    #[error("Missing or empty required field: {0}")]
    MissingField(&'static str),
    #[error("Invalid value for field: {0}")]
    InvalidValue(&'static str),
    #[error("Invalid email format")]
    InvalidEmail,
}

/// Extract a required field as text.
///
/// Falsy JSON values count as missing: absent, `null`, `false`, `""`, zero
/// and empty arrays or objects. Other numbers are stringified so that
/// `"week": 3` is accepted.
fn required_text(body: &serde_json::Map<String, Value>, field: &'static str) -> Result<String, ValidationError> {
    let value = match body.get(field) {
        Some(value) if !is_falsy(value) => value,
        _ => return Err(ValidationError::MissingField(field)),
    };
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(ValidationError::InvalidValue(field)),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Validate a raw `POST /log` body.
///
/// Required fields are checked in declaration order so the first missing
/// one is reported. Unknown fields are ignored.
pub fn validate_entry(body: &Value) -> Result<NewEntry, ValidationError> {
    let obj = body.as_object().ok_or(ValidationError::NotAnObject)?;

    let [email, student_id, week, exercise, status, feedback] = REQUIRED_FIELDS;
    let email = required_text(obj, email)?;
    let student_id = required_text(obj, student_id)?;
    let week = required_text(obj, week)?;
    let exercise = required_text(obj, exercise)?;
    let status = required_text(obj, status)?;
    let feedback = required_text(obj, feedback)?;

    if !email.contains('@') {
        return Err(ValidationError::InvalidEmail);
    }

    Ok(NewEntry {
        email,
        student_id,
        week,
        exercise,
        status,
        feedback,
    })
}

/// Whether `status` is one of the recognized values. Unrecognized statuses
/// are still stored; callers only log them.
pub fn is_known_status(status: &str) -> bool {
    Status::parse(status).is_some()
}
