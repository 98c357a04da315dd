use super::{Identity, SessionToken};

/// Per-request authentication result, placed in request extensions by the auth gate.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub identity: Option<Identity>,
    pub token: Option<SessionToken>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn user_id(&self) -> Option<&str> { self.identity.as_ref().map(|i| i.user_id.as_str()) }
}
