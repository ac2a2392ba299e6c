use std::collections::HashMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header::LOCATION;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tracing::info;

use super::accounts::AccountView;
use super::validation;
use super::AppState;
use crate::error::{AppError, AppResult};
use crate::identity::{authorize_course_mutation, parse_course_id, RequestContext};
use crate::storage::{Course, CourseFields, CourseUpdate, Store};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CourseView {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub estimated_time: Option<String>,
    pub materials_needed: Option<String>,
    pub user_id: i64,
    pub owner: Option<AccountView>,
}

impl CourseView {
    fn new(course: Course, owner: Option<AccountView>) -> Self {
        Self {
            id: course.id,
            title: course.title,
            description: course.description,
            estimated_time: course.estimated_time,
            materials_needed: course.materials_needed,
            user_id: course.user_id,
            owner,
        }
    }
}

/// Request body for create and update. Ownership fields in the body are ignored.
///
/// The optional fields keep absent apart from `null`: a key left out of an update
/// is `None` and keeps the stored value, while `null` is `Some(None)` and clears it.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoursePayload {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub estimated_time: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub materials_needed: Option<Option<String>>,
}

fn present<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Option<String>>, D::Error> {
    Option::<String>::deserialize(de).map(Some)
}

impl CoursePayload {
    fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        validation::require(&self.title, "Please provide a value for title", &mut errors);
        validation::require(&self.description, "Please provide a value for description", &mut errors);
        validation::finish(errors)
    }

    fn into_fields(self) -> Result<CourseFields, AppError> {
        self.validate()?;
        Ok(CourseFields {
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            estimated_time: self.estimated_time.flatten(),
            materials_needed: self.materials_needed.flatten(),
        })
    }

    fn into_update(self) -> Result<CourseUpdate, AppError> {
        self.validate()?;
        Ok(CourseUpdate {
            title: self.title,
            description: self.description,
            estimated_time: self.estimated_time,
            materials_needed: self.materials_needed,
        })
    }
}

async fn owner_view(store: &dyn Store, owner_id: i64) -> AppResult<Option<AccountView>> {
    Ok(store.find_principal_by_id(owner_id).await?.as_ref().map(AccountView::from))
}

/// GET /api/courses
pub async fn list_courses(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let courses = state.store.list_courses().await?;
    let mut owners: HashMap<i64, Option<AccountView>> = HashMap::new();
    let mut views = Vec::with_capacity(courses.len());
    for course in courses {
        let owner = match owners.get(&course.user_id) {
            Some(cached) => cached.clone(),
            None => {
                let found = owner_view(&*state.store, course.user_id).await?;
                owners.insert(course.user_id, found.clone());
                found
            }
        };
        views.push(CourseView::new(course, owner));
    }
    Ok(Json(json!({ "courses": views })))
}

/// GET /api/courses/{id}
pub async fn get_course(State(state): State<AppState>, Path(raw_id): Path<String>) -> AppResult<Json<serde_json::Value>> {
    let id = parse_course_id(&raw_id).ok_or_else(AppError::course_not_found)?;
    let course = state.store.find_course_by_id(id).await?.ok_or_else(AppError::course_not_found)?;
    let owner = owner_view(&*state.store, course.user_id).await?;
    Ok(Json(json!({ "course": CourseView::new(course, owner) })))
}

/// POST /api/courses
pub async fn create_course(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    payload: Result<Json<CoursePayload>, JsonRejection>,
) -> AppResult<Response> {
    let owner_id = ctx.principal_id().ok_or_else(AppError::access_denied)?;
    let Json(payload) = payload.map_err(validation::from_rejection)?;
    let fields = payload.into_fields()?;
    let course = state.store.create_course(fields, owner_id).await?;
    info!(target: "coursegate::courses", id = course.id, owner_id, "course created");
    let location = format!("/api/courses/{}", course.id);
    Ok((StatusCode::CREATED, [(LOCATION, location)]).into_response())
}

/// PUT /api/courses/{id}
pub async fn update_course(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(raw_id): Path<String>,
    payload: Result<Json<CoursePayload>, JsonRejection>,
) -> AppResult<StatusCode> {
    let principal = ctx.principal().ok_or_else(AppError::access_denied)?;
    let Json(payload) = payload.map_err(validation::from_rejection)?;
    let update = payload.into_update()?;
    let course = authorize_course_mutation(&*state.store, principal, &raw_id).await?;
    state.store.update_course(course.id, update).await?;
    info!(target: "coursegate::courses", id = course.id, owner_id = principal.id, "course updated");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/courses/{id}
pub async fn delete_course(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(raw_id): Path<String>,
) -> AppResult<StatusCode> {
    let principal = ctx.principal().ok_or_else(AppError::access_denied)?;
    let course = authorize_course_mutation(&*state.store, principal, &raw_id).await?;
    state.store.delete_course(course.id).await?;
    info!(target: "coursegate::courses", id = course.id, owner_id = principal.id, "course deleted");
    Ok(StatusCode::NO_CONTENT)
}
