//! Unified application error model and mapping helpers.
//! Every handler and the authentication middleware return `AppResult`, and the
//! `IntoResponse` impl below is the only place an error becomes an HTTP response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::{Display, Formatter};

use crate::storage::StoreError;

/// Body returned for every authentication failure, whatever the internal reason.
pub const ACCESS_DENIED: &str = "Access Denied";
pub const NOT_OWNER: &str = "Current User doesn't own the requested course";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    Validation { code: String, errors: Vec<String> },
    NotFound { code: String, message: String },
    Conflict { code: String, message: String },
    Auth { code: String, message: String },
    Forbidden { code: String, message: String },
    Unavailable { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Validation { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::Unavailable { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            AppError::Validation { errors, .. } => errors.join("; "),
            AppError::NotFound { message, .. }
            | AppError::Conflict { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::Unavailable { message, .. }
            | AppError::Internal { message, .. } => message.clone(),
        }
    }

    pub fn validation(errors: Vec<String>) -> Self { AppError::Validation { code: "validation".into(), errors } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn conflict<S: Into<String>>(code: S, msg: S) -> Self { AppError::Conflict { code: code.into(), message: msg.into() } }
    pub fn auth<S: Into<String>>(code: S, msg: S) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn forbidden<S: Into<String>>(code: S, msg: S) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn unavailable<S: Into<String>>(code: S, msg: S) -> Self { AppError::Unavailable { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// The single 401 used for every authentication failure.
    pub fn access_denied() -> Self { Self::auth("access_denied", ACCESS_DENIED) }

    pub fn not_owner() -> Self { Self::forbidden("not_owner", NOT_OWNER) }

    pub fn course_not_found() -> Self { Self::not_found("course_not_found", "Course not found") }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Validation { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 409,
            AppError::Auth { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::Unavailable { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }

    /// JSON body sent to the client.
    pub fn body(&self) -> serde_json::Value {
        match self {
            AppError::Validation { errors, .. } => json!({ "errors": errors }),
            other => json!({ "message": other.message() }),
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.body())).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateLogin(_) => AppError::conflict("duplicate_login", "Email address is already in use"),
            StoreError::MissingCourse(_) => AppError::course_not_found(),
            StoreError::UnknownOwner(id) => {
                tracing::error!(target: "coursegate::storage", owner_id = id, "course owner does not exist");
                AppError::internal("unknown_owner", "Internal server error")
            }
            other => {
                tracing::error!(target: "coursegate::storage", "store unavailable: {}", other);
                AppError::unavailable("store_unavailable", "Service unavailable")
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("unhandled error: {:#}", err);
        AppError::internal("internal", "Internal server error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::validation(vec!["x".into()]).http_status(), 400);
        assert_eq!(AppError::course_not_found().http_status(), 404);
        assert_eq!(AppError::conflict("conflict", "dup").http_status(), 409);
        assert_eq!(AppError::access_denied().http_status(), 401);
        assert_eq!(AppError::not_owner().http_status(), 403);
        assert_eq!(AppError::unavailable("store", "down").http_status(), 503);
        assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
    }

    #[test]
    fn bodies_carry_message_or_error_list() {
        assert_eq!(AppError::access_denied().body(), json!({"message": "Access Denied"}));
        assert_eq!(
            AppError::validation(vec!["a".into(), "b".into()]).body(),
            json!({"errors": ["a", "b"]})
        );
    }

    #[test]
    fn store_errors_map_without_leaking_details() {
        let e: AppError = StoreError::Unavailable("disk on fire".into()).into();
        assert_eq!(e.http_status(), 503);
        assert!(!e.message().contains("disk"));

        let e: AppError = StoreError::DuplicateLogin("a@b.c".into()).into();
        assert_eq!(e.http_status(), 409);

        let e: AppError = StoreError::MissingCourse(7).into();
        assert_eq!(e, AppError::course_not_found());
    }
}
