//! Unified application error model and mapping helpers.
//! `AppError` is what leaves a handler; the module-level errors below convert into it
//! at the request boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    NotFound { code: String, message: String },
    Conflict { code: String, message: String },
    Auth { code: String, message: String },
    Forbidden { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Conflict { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn conflict<S: Into<String>>(code: S, msg: S) -> Self { AppError::Conflict { code: code.into(), message: msg.into() } }
    pub fn auth<S: Into<String>>(code: S, msg: S) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn forbidden<S: Into<String>>(code: S, msg: S) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::Auth { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 409,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = serde_json::json!({
            "status": "error",
            "code": self.code_str(),
            "message": self.message(),
        });
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal".into(), message: err.to_string() }
    }
}

/// Failures of the user directory (store of principals and their policies).
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("user not found")]
    NotFound,
    #[error("email already exists")]
    EmailExists,
    #[error("invalid role: {0}")]
    InvalidRole(String),
    #[error("email and password required")]
    MissingCredentials,
    #[error("system admin cannot be modified")]
    SystemAdminImmutable,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("directory unavailable: {0}")]
    Backend(String),
}

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        let msg = err.to_string();
        match err {
            DirectoryError::NotFound => AppError::not_found("not_found".to_string(), msg),
            DirectoryError::EmailExists => AppError::conflict("email_exists".to_string(), msg),
            DirectoryError::InvalidRole(_) => AppError::user("invalid_role".to_string(), msg),
            DirectoryError::MissingCredentials => AppError::user("missing_credentials".to_string(), msg),
            DirectoryError::SystemAdminImmutable => AppError::forbidden("system_admin_immutable".to_string(), msg),
            DirectoryError::Hash(_) | DirectoryError::Backend(_) => AppError::internal("failed".to_string(), msg),
        }
    }
}

/// Outcomes of an authorization check other than proceeding.
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("missing user")]
    Unauthenticated,
    #[error("user not found")]
    PrincipalNotFound,
    #[error("access denied")]
    AccessDenied,
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl From<AuthzError> for AppError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Unauthenticated => AppError::auth("unauthenticated", "missing user"),
            AuthzError::PrincipalNotFound => AppError::not_found("user_not_found", "user not found"),
            AuthzError::AccessDenied => AppError::forbidden("access_denied", "access denied"),
            AuthzError::Directory(e) => {
                tracing::error!("authorization lookup failed: {e}");
                AppError::internal("policy_evaluation_failed", "policy evaluation failed")
            }
        }
    }
}
