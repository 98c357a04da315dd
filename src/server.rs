//!
//! IDaaS HTTP server
//! -----------------
//! This module defines the Axum-based HTTP API shared by the admin console and the
//! main application.
//!
//! Responsibilities:
//! - Bearer-token login/logout backed by the `identity` module.
//! - Policy-gated main-app endpoints (`/main/*`): each declares the (action, resource)
//!   it requires and is checked against the caller's current policy document.
//! - Role-gated administration (`/admin/*`, `/policy/*`): ADMIN role only, policy not consulted.
//! - First-run seeding of the system admin.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::authz::{auth_gate, authorize, guard, permission_matrix, Strategy};
use crate::config::Config;
use crate::directory::{
    seed_system_admin, AlertStore, InMemoryDirectory, NewAlert, NewUser, PublicUser, TemplateStore, UserDirectory,
    UserUpdate,
};
use crate::error::{AppError, AppResult};
use crate::identity::{AuthProvider, LocalAuthProvider, LoginBody, LoginRequest, RequestContext, SessionManager};
use crate::policy::{bundled_admin_template, evaluate, load_template_file, PolicyDocument};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

fn sample_reports() -> Vec<Report> {
    vec![
        Report { id: "r1".into(), name: "Monthly Summary".into(), created_at: "2025-08-01".into() },
        Report { id: "r2".into(), name: "Usage Breakdown".into(), created_at: "2025-08-15".into() },
    ]
}

/// Shared server state injected into all handlers.
///
/// Every collaborator is passed in explicitly; handlers and guards never reach for
/// a global handle.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub directory: Arc<dyn UserDirectory>,
    pub sessions: SessionManager,
    pub auth: Arc<dyn AuthProvider>,
    pub alerts: AlertStore,
    pub templates: TemplateStore,
    pub reports: Arc<RwLock<Vec<Report>>>,
}

impl AppState {
    pub fn new(config: Config, directory: Arc<dyn UserDirectory>) -> Self {
        let sessions = SessionManager::new(config.session_ttl);
        let auth: Arc<dyn AuthProvider> = Arc::new(LocalAuthProvider::new(directory.clone(), sessions.clone()));
        Self {
            config: Arc::new(config),
            directory,
            sessions,
            auth,
            alerts: AlertStore::new(),
            templates: TemplateStore::new(),
            reports: Arc::new(RwLock::new(sample_reports())),
        }
    }
}

/// Admin policy template: the configured file if readable, otherwise the bundled one.
fn admin_template(config: &Config) -> PolicyDocument {
    match &config.policy_template {
        Some(path) => load_template_file(path).unwrap_or_else(|e| {
            warn!("{e:#}; falling back to bundled admin template");
            bundled_admin_template()
        }),
        None => bundled_admin_template(),
    }
}

/// Build state over a fresh in-memory directory and seed the system admin.
pub async fn build_state(config: Config) -> anyhow::Result<AppState> {
    let directory: Arc<dyn UserDirectory> = Arc::new(InMemoryDirectory::new(Some(config.admin_email.clone())));
    let template = admin_template(&config);
    let seeded = seed_system_admin(directory.as_ref(), &config.admin_email, &config.admin_password, &template)
        .await
        .with_context(|| format!("While seeding system admin {}", config.admin_email))?;
    if seeded {
        info!(target: "startup", "Seeded admin account: {}", config.admin_email);
    }
    Ok(AppState::new(config, directory))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()).collect();
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Mount every route. `/main/*` routes are policy-gated per endpoint; `/admin/*` and
/// `/policy/*` are role-gated as a whole. No route layers both.
pub fn router(state: AppState) -> Router {
    let dir = state.directory.clone();
    let gate = || from_fn_with_state(state.sessions.clone(), auth_gate);

    let auth_public = Router::new().route("/login", post(login));
    let auth_private = Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route_layer(gate());

    let main_public = Router::new().route("/health", get(|| async { Json(json!({"ok": true})) }));
    let main_private = Router::new()
        .route(
            "/dashboard",
            get(dashboard).route_layer(from_fn_with_state(
                guard(dir.clone(), Strategy::policy("read", "service:dashboard")),
                authorize,
            )),
        )
        .route(
            "/reports",
            get(list_reports)
                .route_layer(from_fn_with_state(guard(dir.clone(), Strategy::policy("read", "service:reports")), authorize))
                .merge(post(create_report).route_layer(from_fn_with_state(
                    guard(dir.clone(), Strategy::policy("write", "service:reports")),
                    authorize,
                ))),
        )
        .route("/profile", get(profile))
        .route("/alerts", get(my_alerts))
        .route("/permissions/check", post(check_permission))
        .route_layer(gate());

    let admin = Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", put(update_user).delete(delete_user))
        .route("/users/{id}/policy", get(get_user_policy).put(put_user_policy))
        .route("/users/{id}/permissions", get(user_permissions))
        .route("/admin-info", get(admin_info))
        .route("/login-activity", get(login_activity))
        .route("/alerts", get(list_alerts).post(create_alert))
        .route("/alerts/{id}", get(get_alert).delete(delete_alert))
        .route_layer(from_fn_with_state(guard(dir.clone(), Strategy::admin_only()), authorize))
        .route_layer(gate());

    let policy = Router::new()
        .route("/templates", get(list_templates).put(put_templates))
        .route_layer(from_fn_with_state(guard(dir, Strategy::admin_only()), authorize))
        .route_layer(gate());

    let cors = cors_layer(&state.config.cors_origins);
    Router::new()
        .route("/", get(|| async { Json(json!({"ok": true, "service": "IDaaS"})) }))
        .nest("/auth", auth_public.merge(auth_private))
        .nest("/main", main_public.merge(main_private))
        .nest("/admin", admin)
        .nest("/policy", policy)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server with the given configuration.
pub async fn run_with_config(config: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.bind, config.http_port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind, config.http_port))?;
    let state = build_state(config).await?;
    let app = router(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Convenience entry point reading configuration from the environment.
pub async fn run() -> anyhow::Result<()> {
    run_with_config(Config::from_env()).await
}

fn ctx_user_id(ctx: &RequestContext) -> AppResult<&str> {
    ctx.user_id().ok_or_else(|| AppError::auth("unauthenticated", "missing user"))
}

// --- auth ---

async fn login(State(state): State<AppState>, headers: HeaderMap, Json(mut payload): Json<LoginRequest>) -> AppResult<Json<LoginBody>> {
    payload.user_agent = headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok()).map(str::to_string);
    let resp = state.auth.login(&payload).await?;
    Ok(Json(LoginBody::from(&resp)))
}

async fn logout(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> impl IntoResponse {
    let removed = ctx.token.as_deref().map(|t| state.sessions.logout(t)).unwrap_or(false);
    Json(json!({"ok": removed}))
}

async fn me(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> AppResult<Json<PublicUser>> {
    let id = ctx_user_id(&ctx)?;
    let user = state
        .directory
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("user_not_found", "User not found"))?;
    Ok(Json(PublicUser::from(&user)))
}

// --- main app ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardStats {
    reports: usize,
    alerts: usize,
    last_login: Option<DateTime<Utc>>,
}

async fn dashboard(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> AppResult<impl IntoResponse> {
    let id = ctx_user_id(&ctx)?;
    let user = state.directory.find_by_id(id).await?;
    let stats = DashboardStats {
        reports: state.reports.read().len(),
        alerts: state.alerts.count(),
        last_login: user.map(|u| u.last_login.unwrap_or(u.created_at)),
    };
    Ok(Json(json!({ "stats": stats })))
}

async fn list_reports(State(state): State<AppState>) -> impl IntoResponse {
    let items = state.reports.read().clone();
    Json(json!({ "items": items }))
}

#[derive(Debug, Deserialize)]
struct NewReport {
    #[serde(default)]
    name: Option<String>,
}

async fn create_report(State(state): State<AppState>, Json(payload): Json<NewReport>) -> AppResult<impl IntoResponse> {
    let Some(name) = payload.name.filter(|n| !n.is_empty()) else {
        return Err(AppError::user("name_required", "name required"));
    };
    let now = Utc::now();
    let report = Report { id: format!("r{}", now.timestamp_millis()), name, created_at: now.to_rfc3339() };
    state.reports.write().push(report.clone());
    Ok((StatusCode::CREATED, Json(report)))
}

async fn profile(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> AppResult<Json<PublicUser>> {
    let id = ctx_user_id(&ctx)?;
    let user = state
        .directory
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("not_found", "not found"))?;
    Ok(Json(PublicUser::from(&user).without_policy()))
}

async fn my_alerts(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> AppResult<impl IntoResponse> {
    let id = ctx_user_id(&ctx)?;
    Ok(Json(state.alerts.list_for_user(id)))
}

#[derive(Debug, Deserialize)]
struct CheckPayload {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    resource: Option<String>,
}

/// Ask whether the caller's own policy allows (action, resource). Role is not consulted.
async fn check_permission(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<CheckPayload>,
) -> AppResult<impl IntoResponse> {
    let (Some(action), Some(resource)) = (
        payload.action.filter(|a| !a.is_empty()),
        payload.resource.filter(|r| !r.is_empty()),
    ) else {
        return Err(AppError::user("bad_request", "action/resource required"));
    };
    let id = ctx_user_id(&ctx)?;
    let principal = state
        .directory
        .principal(id)
        .await?
        .ok_or_else(|| AppError::not_found("not_found", "not found"))?;
    Ok(Json(json!({ "allow": evaluate(&principal.policy, &action, &resource) })))
}

// --- admin ---

async fn list_users(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let users: Vec<PublicUser> = state.directory.list().await?.iter().map(PublicUser::from).collect();
    Ok(Json(users))
}

async fn create_user(State(state): State<AppState>, Json(payload): Json<NewUser>) -> AppResult<impl IntoResponse> {
    let u = state.directory.create(payload).await?;
    Ok((StatusCode::CREATED, Json(PublicUser::from(&u))))
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UserUpdate>,
) -> AppResult<Json<PublicUser>> {
    let u = state.directory.update(&id, payload).await?;
    Ok(Json(PublicUser::from(&u)))
}

async fn delete_user(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<impl IntoResponse> {
    let removed = state.directory.remove(&id).await?;
    let revoked = state.sessions.revoke_user(&removed.id);
    info!(user_id = %removed.id, revoked_sessions = revoked, "user deleted");
    Ok(Json(json!({ "id": removed.id, "email": removed.email })))
}

async fn get_user_policy(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<PolicyDocument>> {
    let p = state
        .directory
        .principal(&id)
        .await?
        .ok_or_else(|| AppError::not_found("not_found", "not found"))?;
    Ok(Json(p.policy))
}

async fn put_user_policy(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> AppResult<impl IntoResponse> {
    state.directory.set_policy(&id, PolicyDocument::normalize(&body)).await?;
    Ok(Json(json!({ "ok": true })))
}

async fn user_permissions(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<impl IntoResponse> {
    let p = state
        .directory
        .principal(&id)
        .await?
        .ok_or_else(|| AppError::not_found("not_found", "not found"))?;
    let cells = permission_matrix(&p, &state.config.vocabulary);
    Ok(Json(json!({ "role": p.role, "permissions": cells })))
}

async fn admin_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "email": state.config.admin_email }))
}

async fn login_activity(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(state.directory.login_activity().await?))
}

async fn list_alerts(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.alerts.list())
}

async fn create_alert(State(state): State<AppState>, Json(payload): Json<NewAlert>) -> AppResult<impl IntoResponse> {
    let alert = state
        .alerts
        .create(payload)
        .ok_or_else(|| AppError::user("bad_request", "Type and message required"))?;
    Ok((StatusCode::CREATED, Json(alert)))
}

fn alert_id(raw: &str) -> AppResult<i64> {
    raw.parse().map_err(|_| AppError::user("bad_request", "alert id must be an integer"))
}

async fn get_alert(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<impl IntoResponse> {
    let alert = state.alerts.get(alert_id(&id)?).ok_or_else(|| AppError::not_found("not_found", "Alert not found"))?;
    Ok(Json(alert))
}

async fn delete_alert(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<impl IntoResponse> {
    state.alerts.remove(alert_id(&id)?).ok_or_else(|| AppError::not_found("not_found", "Alert not found"))?;
    Ok(Json(json!({ "message": "Alert deleted successfully" })))
}

// --- policy templates ---

async fn list_templates(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.templates.list())
}

async fn put_templates(State(state): State<AppState>, Json(body): Json<Value>) -> impl IntoResponse {
    let saved = state.templates.replace_all(&body);
    Json(json!({ "ok": true, "count": saved.len() }))
}
