use crate::directory::UserDirectory;
use crate::error::AuthzError;
use crate::identity::Principal;
use crate::policy::{decide, Decision};

/// The (action, resource) pair a protected operation requires.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Capability {
    pub action: String,
    pub resource: String,
}

impl Capability {
    pub fn new(action: impl Into<String>, resource: impl Into<String>) -> Self {
        Self { action: action.into(), resource: resource.into() }
    }

    pub async fn enforce(&self, directory: &dyn UserDirectory, user_id: Option<&str>) -> Result<Principal, AuthzError> {
        enforce(directory, user_id, self).await
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.action, self.resource)
    }
}

/// Resolve the caller and check their current policy against `capability`.
/// Reads the user record once per call and keeps no state; the resolved principal
/// is handed back on success.
pub async fn enforce(
    directory: &dyn UserDirectory,
    user_id: Option<&str>,
    capability: &Capability,
) -> Result<Principal, AuthzError> {
    let Some(user_id) = user_id.filter(|id| !id.is_empty()) else {
        return Err(AuthzError::Unauthenticated);
    };
    let Some(principal) = directory.principal(user_id).await? else {
        tracing::info!(user_id = %user_id, action = %capability.action, resource = %capability.resource, "policy denied: principal not found");
        return Err(AuthzError::PrincipalNotFound);
    };
    match decide(&principal.policy, &capability.action, &capability.resource) {
        Decision::Allow => {
            tracing::debug!(user_id = %user_id, action = %capability.action, resource = %capability.resource, "policy allowed");
            Ok(principal)
        }
        Decision::Deny(reason) => {
            tracing::info!(user_id = %user_id, action = %capability.action, resource = %capability.resource, reason = ?reason, "policy denied");
            Err(AuthzError::AccessDenied)
        }
    }
}
