use tracing::{debug, warn};

use super::Principal;
use crate::error::{AppError, AppResult};
use crate::storage::{Course, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Allowed,
    Forbidden,
}

pub fn check_ownership(principal_id: i64, owner_id: i64) -> Ownership {
    if principal_id == owner_id { Ownership::Allowed } else { Ownership::Forbidden }
}

/// Course ids are positive integers; anything else cannot name an existing course.
pub fn parse_course_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|id| *id > 0)
}

/// Load the course named by `raw_id` and confirm `principal` owns it.
///
/// Existence is checked first (404), then ownership (403). The returned course is
/// the only licence to mutate; callers dispatch the write after this returns `Ok`.
pub async fn authorize_course_mutation(store: &dyn Store, principal: &Principal, raw_id: &str) -> AppResult<Course> {
    let Some(id) = parse_course_id(raw_id) else {
        debug!(target: "coursegate::auth", raw_id, "unparsable course id");
        return Err(AppError::course_not_found());
    };
    let Some(course) = store.find_course_by_id(id).await? else {
        return Err(AppError::course_not_found());
    };
    match check_ownership(principal.id, course.user_id) {
        Ownership::Allowed => Ok(course),
        Ownership::Forbidden => {
            warn!(target: "coursegate::auth", principal_id = principal.id, course_id = course.id, owner_id = course.user_id, "ownership violation");
            Err(AppError::not_owner())
        }
    }
}
