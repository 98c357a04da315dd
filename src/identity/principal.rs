use serde::{Deserialize, Serialize};

use crate::directory::UserRecord;
use crate::policy::PolicyDocument;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    /// Case-insensitive parse of `ADMIN` / `USER`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Some(Role::Admin),
            "USER" => Some(Role::User),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// Caller identity established by the authentication gate. Trusted as-is by
/// authorization; the role here is a login-time snapshot and is not used for gating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub role: Role,
}

/// A user as seen by authorization: id, role and a normalized policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub role: Role,
    pub policy: PolicyDocument,
}

impl Principal {
    pub fn is_admin(&self) -> bool { self.role == Role::Admin }
}

impl From<&UserRecord> for Principal {
    fn from(rec: &UserRecord) -> Self {
        Self {
            id: rec.id.clone(),
            role: rec.role,
            policy: PolicyDocument::from_stored(Some(&rec.policy)),
        }
    }
}
