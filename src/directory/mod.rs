//! User directory: the store of principals, their credentials and their policies.
//!
//! Handlers and the enforcement path receive the directory as an injected
//! `Arc<dyn UserDirectory>`; nothing reaches for a process-wide handle.

mod alerts;
mod memory;
mod templates;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::DirectoryError;
use crate::identity::{Principal, Role};
use crate::policy::PolicyDocument;

pub use alerts::{Alert, AlertStore, NewAlert};
pub use memory::{InMemoryDirectory, LOGIN_ACTIVITY_LIMIT};
pub use templates::TemplateStore;

/// Stored user. `policy` holds the document as persisted, which may be anything;
/// readers normalize it through `PolicyDocument`.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub password_hash: Option<String>,
    pub policy: Value,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// User as returned over the API. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyDocument>,
}

impl PublicUser {
    pub fn without_policy(mut self) -> Self {
        self.policy = None;
        self
    }
}

impl From<&UserRecord> for PublicUser {
    fn from(u: &UserRecord) -> Self {
        Self {
            id: u.id.clone(),
            name: u.name.clone(),
            email: u.email.clone(),
            role: u.role,
            created_at: u.created_at,
            last_login: u.last_login,
            policy: Some(PolicyDocument::from_stored(Some(&u.policy))),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub policy: Option<Value>,
}

/// Partial update; only the provided fields change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub policy: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginActivity {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub email: String,
    pub success: bool,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LoginActivity {
    pub fn new(user_id: Option<String>, email: &str, success: bool, user_agent: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            email: email.to_string(),
            success,
            ip: None,
            user_agent,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, DirectoryError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, DirectoryError>;
    /// Newest first.
    async fn list(&self) -> Result<Vec<UserRecord>, DirectoryError>;
    async fn create(&self, new: NewUser) -> Result<UserRecord, DirectoryError>;
    /// Rejects the designated system admin with `SystemAdminImmutable`.
    async fn update(&self, id: &str, update: UserUpdate) -> Result<UserRecord, DirectoryError>;
    /// Rejects the designated system admin with `SystemAdminImmutable`.
    async fn set_policy(&self, id: &str, policy: PolicyDocument) -> Result<(), DirectoryError>;
    /// Rejects the designated system admin with `SystemAdminImmutable`.
    async fn remove(&self, id: &str) -> Result<UserRecord, DirectoryError>;
    async fn touch_login(&self, id: &str, at: DateTime<Utc>) -> Result<(), DirectoryError>;
    async fn record_login(&self, activity: LoginActivity) -> Result<(), DirectoryError>;
    /// Newest first.
    async fn login_activity(&self) -> Result<Vec<LoginActivity>, DirectoryError>;

    async fn principal(&self, id: &str) -> Result<Option<Principal>, DirectoryError> {
        Ok(self.find_by_id(id).await?.as_ref().map(Principal::from))
    }
}

/// Case- and whitespace-insensitive match against the designated system admin.
pub fn is_system_admin_email(email: &str, admin_email: Option<&str>) -> bool {
    match admin_email {
        Some(admin) => email.trim().eq_ignore_ascii_case(admin.trim()),
        None => false,
    }
}

/// Create the system admin when the directory is empty. Returns whether a user was created.
pub async fn seed_system_admin(
    directory: &dyn UserDirectory,
    email: &str,
    password: &str,
    policy: &PolicyDocument,
) -> Result<bool, DirectoryError> {
    if !directory.list().await?.is_empty() { return Ok(false); }
    let admin = directory
        .create(NewUser {
            name: Some("System Admin".into()),
            email: Some(email.into()),
            password: Some(password.into()),
            role: Some(Role::Admin.as_str().into()),
            policy: Some(policy.to_value()),
        })
        .await?;
    tracing::info!(email = %admin.email, role = %admin.role, "seeded system admin");
    Ok(true)
}
