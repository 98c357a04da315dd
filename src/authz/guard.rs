use serde::Serialize;

use crate::directory::UserDirectory;
use crate::error::AuthzError;
use crate::identity::{Principal, Role};
use crate::policy::{evaluate, Vocabulary};

use super::enforce::{enforce, Capability};

/// How a protected operation is authorized. Each route picks exactly one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Require the principal's role outright; the policy document is not consulted.
    RoleGate(Role),
    /// Require the principal's policy to allow the capability; role is not consulted.
    PolicyGate(Capability),
}

impl Strategy {
    pub fn admin_only() -> Self { Strategy::RoleGate(Role::Admin) }

    pub fn policy(action: impl Into<String>, resource: impl Into<String>) -> Self {
        Strategy::PolicyGate(Capability::new(action, resource))
    }

    pub async fn authorize(&self, directory: &dyn UserDirectory, user_id: Option<&str>) -> Result<Principal, AuthzError> {
        match self {
            Strategy::PolicyGate(cap) => enforce(directory, user_id, cap).await,
            Strategy::RoleGate(required) => {
                let Some(user_id) = user_id.filter(|id| !id.is_empty()) else {
                    return Err(AuthzError::Unauthenticated);
                };
                let principal = directory.principal(user_id).await?.ok_or(AuthzError::PrincipalNotFound)?;
                if principal.role != *required {
                    tracing::info!(user_id = %user_id, required = %required, actual = %principal.role, "role gate denied");
                    return Err(AuthzError::AccessDenied);
                }
                Ok(principal)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionCell {
    pub action: String,
    pub resource: String,
    pub allow: bool,
}

/// Effective permissions over the deployment vocabulary, as shown on permission
/// editing screens. ADMIN renders every cell allowed without reading the policy.
pub fn permission_matrix(principal: &Principal, vocabulary: &Vocabulary) -> Vec<PermissionCell> {
    let mut cells = Vec::with_capacity(vocabulary.actions.len() * vocabulary.resources.len());
    for action in &vocabulary.actions {
        for resource in &vocabulary.resources {
            let allow = principal.is_admin() || evaluate(&principal.policy, action, resource);
            cells.push(PermissionCell { action: action.clone(), resource: resource.clone(), allow });
        }
    }
    cells
}
