use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::LOCATION;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::validation;
use super::AppState;
use crate::error::{AppError, AppResult};
use crate::identity::{Principal, RequestContext};
use crate::storage::NewPrincipal;

/// Public view of an account; never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email_address: String,
}

impl From<&Principal> for AccountView {
    fn from(p: &Principal) -> Self {
        Self {
            id: p.id,
            first_name: p.first_name.clone(),
            last_name: p.last_name.clone(),
            email_address: p.email_address.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountPayload {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email_address: Option<String>,
    pub password: Option<String>,
}

impl AccountPayload {
    fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        validation::require(&self.first_name, "Please provide a value for first name", &mut errors);
        validation::require(&self.last_name, "Please provide a value for last name", &mut errors);
        validation::require(&self.email_address, "Please provide a value for email address", &mut errors);
        // Basic credentials split at the first ':', so such a login could never sign in.
        if self.email_address.as_deref().is_some_and(|e| e.contains(':')) {
            errors.push("Email address must not contain ':'".to_string());
        }
        validation::require(&self.password, "Please provide a value for password", &mut errors);
        validation::finish(errors)
    }
}

/// GET /api/users
pub async fn current_account(Extension(ctx): Extension<RequestContext>) -> AppResult<Json<AccountView>> {
    let principal = ctx.principal().ok_or_else(AppError::access_denied)?;
    Ok(Json(AccountView::from(principal)))
}

/// POST /api/users
pub async fn create_account(
    State(state): State<AppState>,
    payload: Result<Json<AccountPayload>, JsonRejection>,
) -> AppResult<Response> {
    let Json(payload) = payload.map_err(validation::from_rejection)?;
    payload.validate()?;
    let AccountPayload { first_name, last_name, email_address, password } = payload;

    let hasher = state.hasher.clone();
    let password = password.unwrap_or_default();
    let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| {
            error!("password hashing task failed: {}", e);
            AppError::internal("hash_failed", "Internal server error")
        })??;

    let principal = state.store.create_principal(NewPrincipal {
        first_name: first_name.unwrap_or_default().trim().to_string(),
        last_name: last_name.unwrap_or_default().trim().to_string(),
        email_address: email_address.unwrap_or_default().trim().to_string(),
        password_hash,
    }).await?;
    info!(target: "coursegate::accounts", id = principal.id, "account created");
    Ok((StatusCode::CREATED, [(LOCATION, "/")]).into_response())
}
