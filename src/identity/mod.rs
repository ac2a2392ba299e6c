//! Caller identity and resource ownership for the HTTP API.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod credentials;
mod gate;
mod ownership;
mod request_context;

pub use principal::Principal;
pub use credentials::{extract_credentials, Credentials};
pub use gate::{AuthOutcome, AuthenticationGate, Rejection};
pub use ownership::{authorize_course_mutation, check_ownership, parse_course_id, Ownership};
pub use request_context::RequestContext;
