//! Field-presence checks for request bodies. Each failing field contributes one
//! message; the handler returns them together as a 400.

use axum::extract::rejection::JsonRejection;

use crate::error::AppError;

/// A value counts as present when it is not null and not only whitespace.
pub fn is_present(value: &Option<String>) -> bool {
    value.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
}

pub fn require(value: &Option<String>, message: &str, errors: &mut Vec<String>) {
    if !is_present(value) { errors.push(message.to_string()); }
}

pub fn finish(errors: Vec<String>) -> Result<(), AppError> {
    if errors.is_empty() { Ok(()) } else { Err(AppError::validation(errors)) }
}

/// Malformed JSON is reported in the same shape as a missing field.
pub fn from_rejection(rejection: JsonRejection) -> AppError {
    AppError::validation(vec![rejection.body_text()])
}
