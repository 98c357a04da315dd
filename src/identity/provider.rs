use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::directory::{LoginActivity, PublicUser, UserDirectory};
use crate::error::{AppError, AppResult};
use crate::tprintln;

use super::principal::Identity;
use super::session::{Session, SessionManager};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(skip)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub session: Session,
    pub user: PublicUser,
}

/// Body returned to clients on successful login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginBody {
    pub token: String,
    pub user: LoginUser,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: super::Role,
}

impl From<&LoginResponse> for LoginBody {
    fn from(r: &LoginResponse) -> Self {
        Self {
            token: r.session.token.clone(),
            user: LoginUser {
                id: r.user.id.clone(),
                name: r.user.name.clone(),
                email: r.user.email.clone(),
                role: r.user.role,
            },
        }
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse>;
}

/// Email + password login against the user directory.
pub struct LocalAuthProvider {
    pub directory: Arc<dyn UserDirectory>,
    pub sm: SessionManager,
}

impl LocalAuthProvider {
    pub fn new(directory: Arc<dyn UserDirectory>, sm: SessionManager) -> Self { Self { directory, sm } }

    async fn record(&self, user_id: Option<String>, email: &str, success: bool, req: &LoginRequest) {
        let entry = LoginActivity::new(user_id, email, success, req.user_agent.clone());
        if let Err(e) = self.directory.record_login(entry).await {
            tracing::warn!("failed to record login activity: {e}");
        }
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse> {
        let (Some(email), Some(password)) = (
            req.email.as_deref().filter(|e| !e.is_empty()),
            req.password.as_deref().filter(|p| !p.is_empty()),
        ) else {
            return Err(AppError::user("missing_credentials", "Email and password are required"));
        };
        let invalid = || AppError::auth("invalid_credentials", "Invalid credentials");

        let Some(user) = self.directory.find_by_email(email).await? else {
            self.record(None, email, false, req).await;
            return Err(invalid());
        };
        let verified = user
            .password_hash
            .as_deref()
            .map(|h| crate::security::verify_password(h, password))
            .unwrap_or(false);
        if !verified {
            self.record(Some(user.id.clone()), email, false, req).await;
            return Err(invalid());
        }

        let now = Utc::now();
        self.directory.touch_login(&user.id, now).await?;
        let session = self
            .sm
            .issue(Identity { user_id: user.id.clone(), email: user.email.clone(), role: user.role })
            .map_err(|e| {
                tracing::error!(user_id = %user.id, "session issue failed: {e:#}");
                AppError::internal("session_unavailable", "could not start a session")
            })?;
        self.record(Some(user.id.clone()), email, true, req).await;
        tprintln!("auth.login user={} sid={}", user.id, session.session_id);
        tracing::info!(user_id = %user.id, "login succeeded");

        let mut public = PublicUser::from(&user);
        public.last_login = Some(now);
        Ok(LoginResponse { session, user: public.without_policy() })
    }
}
