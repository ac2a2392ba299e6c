use super::Principal;

/// Per-request identity binding. Built by the authentication middleware and handed
/// to handlers explicitly; it is never stored beyond the request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub principal: Option<Principal>,
    pub request_id: Option<String>,
}

impl RequestContext {
    pub fn authenticated(principal: Principal, request_id: String) -> Self {
        Self { principal: Some(principal), request_id: Some(request_id) }
    }

    pub fn principal(&self) -> Option<&Principal> { self.principal.as_ref() }

    pub fn principal_id(&self) -> Option<i64> { self.principal.as_ref().map(|p| p.id) }
}
