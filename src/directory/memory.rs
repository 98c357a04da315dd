use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::DirectoryError;
use crate::identity::Role;
use crate::policy::PolicyDocument;
use crate::security;

use super::{is_system_admin_email, LoginActivity, NewUser, UserDirectory, UserRecord, UserUpdate};

/// Login attempts kept for the activity log; older entries are dropped.
pub const LOGIN_ACTIVITY_LIMIT: usize = 50;

/// Process-local directory. Users are kept in insertion order; the system admin
/// email is fixed at construction.
pub struct InMemoryDirectory {
    users: RwLock<Vec<UserRecord>>,
    activity: RwLock<VecDeque<LoginActivity>>,
    system_admin_email: Option<String>,
}

impl InMemoryDirectory {
    pub fn new(system_admin_email: Option<String>) -> Self {
        Self {
            users: RwLock::new(Vec::new()),
            activity: RwLock::new(VecDeque::with_capacity(LOGIN_ACTIVITY_LIMIT)),
            system_admin_email: system_admin_email.map(|e| e.trim().to_lowercase()),
        }
    }

    /// Store a record exactly as given, bypassing validation. For loading
    /// pre-existing data whose policy may not be well-formed.
    pub fn insert_raw(&self, record: UserRecord) {
        self.users.write().push(record);
    }

    fn guard_mutable(&self, rec: &UserRecord) -> Result<(), DirectoryError> {
        if is_system_admin_email(&rec.email, self.system_admin_email.as_deref()) {
            tracing::warn!(user_id = %rec.id, "rejected mutation of system admin");
            return Err(DirectoryError::SystemAdminImmutable);
        }
        Ok(())
    }
}

/// Stored form of an email: trimmed and lowercased.
fn canonical_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn parse_role(raw: &str) -> Result<Role, DirectoryError> {
    Role::parse(raw).ok_or_else(|| DirectoryError::InvalidRole(raw.to_string()))
}

fn hash(password: &str) -> Result<String, DirectoryError> {
    security::hash_password(password).map_err(|e| DirectoryError::Hash(e.to_string()))
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, DirectoryError> {
        if id.is_empty() { return Ok(None); }
        Ok(self.users.read().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, DirectoryError> {
        let email = canonical_email(email);
        if email.is_empty() { return Ok(None); }
        Ok(self.users.read().iter().find(|u| u.email == email).cloned())
    }

    async fn list(&self) -> Result<Vec<UserRecord>, DirectoryError> {
        Ok(self.users.read().iter().rev().cloned().collect())
    }

    async fn create(&self, new: NewUser) -> Result<UserRecord, DirectoryError> {
        let email = new.email.map(|e| canonical_email(&e)).filter(|e| !e.is_empty());
        let (Some(email), Some(password)) = (email, new.password.filter(|p| !p.is_empty())) else {
            return Err(DirectoryError::MissingCredentials);
        };
        let role = parse_role(new.role.as_deref().unwrap_or("USER"))?;
        let policy = new
            .policy
            .map(|p| PolicyDocument::normalize(&p))
            .unwrap_or_default()
            .to_value();
        let password_hash = hash(&password)?;

        let mut users = self.users.write();
        if users.iter().any(|u| u.email == email) { return Err(DirectoryError::EmailExists); }
        let name = new.name.unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
        let rec = UserRecord {
            id: Uuid::new_v4().to_string(),
            name,
            email,
            role,
            password_hash: Some(password_hash),
            policy,
            created_at: Utc::now(),
            last_login: None,
        };
        users.push(rec.clone());
        tracing::debug!(user_id = %rec.id, role = %rec.role, "user created");
        Ok(rec)
    }

    async fn update(&self, id: &str, update: UserUpdate) -> Result<UserRecord, DirectoryError> {
        let role = update.role.as_deref().map(parse_role).transpose()?;
        let password_hash = match update.password.as_deref() {
            Some(p) if !p.is_empty() => Some(hash(p)?),
            _ => None,
        };
        let email = update.email.map(|e| canonical_email(&e)).filter(|e| !e.is_empty());

        let mut users = self.users.write();
        let idx = users.iter().position(|u| u.id == id).ok_or(DirectoryError::NotFound)?;
        self.guard_mutable(&users[idx])?;
        if let Some(e) = &email {
            if users.iter().any(|u| u.id != id && &u.email == e) { return Err(DirectoryError::EmailExists); }
        }
        let rec = &mut users[idx];
        if let Some(n) = update.name { rec.name = n; }
        if let Some(e) = email { rec.email = e; }
        if let Some(r) = role { rec.role = r; }
        if let Some(p) = update.policy { rec.policy = PolicyDocument::normalize(&p).to_value(); }
        if let Some(h) = password_hash { rec.password_hash = Some(h); }
        Ok(rec.clone())
    }

    async fn set_policy(&self, id: &str, policy: PolicyDocument) -> Result<(), DirectoryError> {
        let mut users = self.users.write();
        let rec = users.iter_mut().find(|u| u.id == id).ok_or(DirectoryError::NotFound)?;
        self.guard_mutable(rec)?;
        rec.policy = policy.normalized().to_value();
        tracing::info!(user_id = %id, statements = policy.statements.len(), "policy updated");
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<UserRecord, DirectoryError> {
        let mut users = self.users.write();
        let idx = users.iter().position(|u| u.id == id).ok_or(DirectoryError::NotFound)?;
        self.guard_mutable(&users[idx])?;
        Ok(users.remove(idx))
    }

    async fn touch_login(&self, id: &str, at: DateTime<Utc>) -> Result<(), DirectoryError> {
        let mut users = self.users.write();
        let rec = users.iter_mut().find(|u| u.id == id).ok_or(DirectoryError::NotFound)?;
        rec.last_login = Some(at);
        Ok(())
    }

    async fn record_login(&self, activity: LoginActivity) -> Result<(), DirectoryError> {
        let mut log = self.activity.write();
        while log.len() >= LOGIN_ACTIVITY_LIMIT {
            log.pop_front();
        }
        log.push_back(activity);
        Ok(())
    }

    async fn login_activity(&self) -> Result<Vec<LoginActivity>, DirectoryError> {
        Ok(self.activity.read().iter().rev().cloned().collect())
    }
}
