//!
//! coursegate storage module
//! -------------------------
//! The store is the only shared state in the service. Handlers and the
//! authentication gate reach it through the async `Store` trait so that a
//! different backend can be dropped in without touching the request pipeline.
//!
//! Every method is a single-record operation and is expected to be atomic.
//! The store does not enforce ownership; that is the job of the ownership guard.
//! It does enforce login uniqueness and that a course owner exists when the course
//! is created.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::identity::Principal;

pub mod memory;

pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("login already registered: {0}")]
    DuplicateLogin(String),
    #[error("owner {0} does not exist")]
    UnknownOwner(i64),
    #[error("course {0} does not exist")]
    MissingCourse(i64),
    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Fields supplied when registering an account. The secret is already hashed.
#[derive(Debug, Clone)]
pub struct NewPrincipal {
    pub first_name: String,
    pub last_name: String,
    pub email_address: String,
    pub password_hash: String,
}

/// Mutable descriptive fields of a course. Ownership is deliberately absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseFields {
    pub title: String,
    pub description: String,
    pub estimated_time: Option<String>,
    pub materials_needed: Option<String>,
}

/// Changes applied by an update. `None` leaves a field as stored; for the optional
/// fields `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub estimated_time: Option<Option<String>>,
    pub materials_needed: Option<Option<String>>,
}

impl CourseUpdate {
    fn apply(self, course: &mut Course) {
        if let Some(title) = self.title { course.title = title; }
        if let Some(description) = self.description { course.description = description; }
        if let Some(estimated_time) = self.estimated_time { course.estimated_time = estimated_time; }
        if let Some(materials_needed) = self.materials_needed { course.materials_needed = materials_needed; }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub estimated_time: Option<String>,
    #[serde(default)]
    pub materials_needed: Option<String>,
    /// Owning principal; fixed at creation.
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_principal_by_login(&self, login: &str) -> StoreResult<Option<Principal>>;
    async fn find_principal_by_id(&self, id: i64) -> StoreResult<Option<Principal>>;
    async fn create_principal(&self, new: NewPrincipal) -> StoreResult<Principal>;
    async fn count_principals(&self) -> StoreResult<usize>;

    /// All courses ordered by id ascending.
    async fn list_courses(&self) -> StoreResult<Vec<Course>>;
    async fn find_course_by_id(&self, id: i64) -> StoreResult<Option<Course>>;
    async fn create_course(&self, fields: CourseFields, owner_id: i64) -> StoreResult<Course>;
    /// Apply only the keys present in `update`. The owner never changes.
    async fn update_course(&self, id: i64, update: CourseUpdate) -> StoreResult<()>;
    async fn delete_course(&self, id: i64) -> StoreResult<()>;
}

pub type SharedStore = Arc<dyn Store>;
