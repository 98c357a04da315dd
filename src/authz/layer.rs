//! axum wiring: the bearer-token auth gate and the per-route authorization guard.
//!
//! ```ignore
//! Router::new()
//!     .route("/reports", get(list).route_layer(from_fn_with_state(
//!         guard(directory.clone(), Strategy::policy("read", "service:reports")),
//!         authorize,
//!     )))
//!     .route_layer(from_fn_with_state(sessions, auth_gate));
//! ```

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;

use crate::directory::UserDirectory;
use crate::error::AppError;
use crate::identity::{RequestContext, SessionManager};

use super::guard::Strategy;

const BEARER_PREFIX: &str = "Bearer ";

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let v = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    v.strip_prefix(BEARER_PREFIX).map(str::trim).filter(|t| !t.is_empty())
}

/// Reject requests without a live bearer token; otherwise attach a `RequestContext`.
pub async fn auth_gate(State(sessions): State<SessionManager>, mut req: Request, next: Next) -> Result<Response, AppError> {
    let Some(token) = bearer_token(req.headers()).map(str::to_string) else {
        return Err(AppError::auth("missing_token", "missing token"));
    };
    let Some(identity) = sessions.validate(&token) else {
        return Err(AppError::auth("invalid_token", "invalid token"));
    };
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    req.extensions_mut().insert(RequestContext { identity: Some(identity), token: Some(token), user_agent });
    Ok(next.run(req).await)
}

/// State for one guarded route: the directory to resolve principals and the
/// strategy fixed for that route.
#[derive(Clone)]
pub struct GuardState {
    pub directory: Arc<dyn UserDirectory>,
    pub strategy: Strategy,
}

pub fn guard(directory: Arc<dyn UserDirectory>, strategy: Strategy) -> GuardState {
    GuardState { directory, strategy }
}

/// Run the route's strategy before the handler; a denial short-circuits the request.
pub async fn authorize(State(g): State<GuardState>, req: Request, next: Next) -> Result<Response, AppError> {
    let user_id = req
        .extensions()
        .get::<RequestContext>()
        .and_then(|ctx| ctx.user_id())
        .map(str::to_string);
    g.strategy.authorize(g.directory.as_ref(), user_id.as_deref()).await?;
    Ok(next.run(req).await)
}
