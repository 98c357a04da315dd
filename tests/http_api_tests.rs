//! HTTP API integration tests: login, the policy-gated main routes, the role-gated
//! admin routes, and the system-admin mutation guard, driven through the Router.

use anyhow::Result;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use idaas::config::Config;
use idaas::identity::{Identity, Role};
use idaas::server::{build_state, router, AppState};

const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "Admin@123";

async fn app() -> Result<(Router, AppState)> {
    let config = Config {
        admin_email: ADMIN_EMAIL.into(),
        admin_password: ADMIN_PASSWORD.into(),
        ..Config::default()
    };
    let state = build_state(config).await?;
    Ok((router(state.clone()), state))
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        req = req.header("authorization", format!("Bearer {t}"));
    }
    let req = match body {
        Some(b) => req.header("content-type", "application/json").body(Body::from(serde_json::to_vec(&b)?))?,
        None => req.body(Body::empty())?,
    };
    let resp = app.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
    let v = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
    Ok((status, v))
}

async fn login(app: &Router, email: &str, password: &str) -> Result<String> {
    let (status, body) = send(app, Method::POST, "/auth/login", None, Some(json!({"email": email, "password": password}))).await?;
    assert_eq!(status, StatusCode::OK, "login failed for {email}: {body}");
    Ok(body["token"].as_str().unwrap_or_default().to_string())
}

async fn create_user(app: &Router, admin: &str, email: &str, policy: Value) -> Result<String> {
    let (status, body) = send(app, Method::POST, "/admin/users", Some(admin), Some(json!({
        "email": email, "password": "pw", "policy": policy
    }))).await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    Ok(body["id"].as_str().unwrap_or_default().to_string())
}

#[tokio::test]
async fn public_routes_and_login() -> Result<()> {
    let (app, _) = app().await?;
    let (s, b) = send(&app, Method::GET, "/", None, None).await?;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(b["ok"], true);
    assert_eq!(send(&app, Method::GET, "/main/health", None, None).await?.0, StatusCode::OK);

    let (s, _) = send(&app, Method::POST, "/auth/login", None, Some(json!({"email": ADMIN_EMAIL}))).await?;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    let (s, b) = send(&app, Method::POST, "/auth/login", None, Some(json!({"email": ADMIN_EMAIL, "password": "wrong"}))).await?;
    assert_eq!(s, StatusCode::UNAUTHORIZED);
    assert_eq!(b["code"], "invalid_credentials");

    let (s, b) = send(&app, Method::POST, "/auth/login", None, Some(json!({"email": "ADMIN@example.com", "password": ADMIN_PASSWORD}))).await?;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(b["user"]["role"], "ADMIN");
    let token = b["token"].as_str().unwrap_or_default().to_string();

    let (s, me) = send(&app, Method::GET, "/auth/me", Some(&token), None).await?;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(me["email"], ADMIN_EMAIL);
    assert!(me.get("passwordHash").is_none());

    let (s, log) = send(&app, Method::GET, "/admin/login-activity", Some(&token), None).await?;
    assert_eq!(s, StatusCode::OK);
    let entries = log.as_array().cloned().unwrap_or_default();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["success"], true);
    assert_eq!(entries[1]["success"], false);
    Ok(())
}

#[tokio::test]
async fn bearer_token_is_required_and_logout_revokes_it() -> Result<()> {
    let (app, _) = app().await?;
    assert_eq!(send(&app, Method::GET, "/auth/me", None, None).await?.0, StatusCode::UNAUTHORIZED);
    assert_eq!(send(&app, Method::GET, "/main/dashboard", Some("bogus"), None).await?.0, StatusCode::UNAUTHORIZED);

    let token = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await?;
    let (s, b) = send(&app, Method::POST, "/auth/logout", Some(&token), None).await?;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(b["ok"], true);
    assert_eq!(send(&app, Method::GET, "/auth/me", Some(&token), None).await?.0, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn main_routes_follow_the_callers_policy() -> Result<()> {
    let (app, _) = app().await?;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await?;
    let uid = create_user(&app, &admin, "reader@example.com", json!({
        "statements": [{"action": ["read"], "effect": "allow", "resource": ["service:dashboard"]}]
    })).await?;
    let user = login(&app, "reader@example.com", "pw").await?;

    let (s, dash) = send(&app, Method::GET, "/main/dashboard", Some(&user), None).await?;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(dash["stats"]["reports"], 2);

    let (s, b) = send(&app, Method::GET, "/main/reports", Some(&user), None).await?;
    assert_eq!(s, StatusCode::FORBIDDEN);
    assert_eq!(b["code"], "access_denied");
    assert_eq!(b["message"], "access denied");
    let (s, _) = send(&app, Method::POST, "/main/reports", Some(&user), Some(json!({"name": "Q3"}))).await?;
    assert_eq!(s, StatusCode::FORBIDDEN);

    // grant write only; read stays denied
    let (s, _) = send(&app, Method::PUT, &format!("/admin/users/{uid}/policy"), Some(&admin), Some(json!({
        "statements": [{"action": ["write"], "effect": "allow", "resource": ["service:reports"]}]
    }))).await?;
    assert_eq!(s, StatusCode::OK);
    let (s, created) = send(&app, Method::POST, "/main/reports", Some(&user), Some(json!({"name": "Q3"}))).await?;
    assert_eq!(s, StatusCode::CREATED);
    assert_eq!(created["name"], "Q3");
    let (s, _) = send(&app, Method::POST, "/main/reports", Some(&user), Some(json!({}))).await?;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    assert_eq!(send(&app, Method::GET, "/main/reports", Some(&user), None).await?.0, StatusCode::FORBIDDEN);
    assert_eq!(send(&app, Method::GET, "/main/dashboard", Some(&user), None).await?.0, StatusCode::FORBIDDEN);

    // wildcard allow with an explicit deny
    send(&app, Method::PUT, &format!("/admin/users/{uid}/policy"), Some(&admin), Some(json!({
        "statements": [
            {"action": ["*"], "effect": "allow", "resource": ["*"]},
            {"action": ["write"], "effect": "deny", "resource": ["service:reports"]}
        ]
    }))).await?;
    let (s, list) = send(&app, Method::GET, "/main/reports", Some(&user), None).await?;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(list["items"].as_array().map(|a| a.len()), Some(3));
    assert_eq!(send(&app, Method::POST, "/main/reports", Some(&user), Some(json!({"name": "x"}))).await?.0, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn admin_role_does_not_bypass_policy_gated_routes() -> Result<()> {
    let (app, state) = app().await?;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await?;
    let (s, b) = send(&app, Method::POST, "/admin/users", Some(&admin), Some(json!({
        "email": "boss@example.com", "password": "pw", "role": "admin"
    }))).await?;
    assert_eq!(s, StatusCode::CREATED);
    assert_eq!(b["role"], "ADMIN");
    let boss = login(&app, "boss@example.com", "pw").await?;

    // role gate passes, policy gate does not
    assert_eq!(send(&app, Method::GET, "/admin/users", Some(&boss), None).await?.0, StatusCode::OK);
    assert_eq!(send(&app, Method::GET, "/main/dashboard", Some(&boss), None).await?.0, StatusCode::FORBIDDEN);

    // the seeded system admin carries the allow-all template
    assert_eq!(send(&app, Method::GET, "/main/dashboard", Some(&admin), None).await?.0, StatusCode::OK);
    assert_eq!(state.config.admin_email, ADMIN_EMAIL);
    Ok(())
}

#[tokio::test]
async fn admin_routes_require_admin_role() -> Result<()> {
    let (app, _) = app().await?;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await?;
    create_user(&app, &admin, "u@example.com", json!({
        "statements": [{"action": ["*"], "effect": "allow", "resource": ["*"]}]
    })).await?;
    let user = login(&app, "u@example.com", "pw").await?;

    for uri in ["/admin/users", "/admin/admin-info", "/admin/alerts", "/policy/templates"] {
        let (s, b) = send(&app, Method::GET, uri, Some(&user), None).await?;
        assert_eq!(s, StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(b["code"], "access_denied");
        assert_eq!(send(&app, Method::GET, uri, Some(&admin), None).await?.0, StatusCode::OK, "{uri}");
    }
    let (_, info) = send(&app, Method::GET, "/admin/admin-info", Some(&admin), None).await?;
    assert_eq!(info["email"], ADMIN_EMAIL);
    Ok(())
}

#[tokio::test]
async fn system_admin_is_immutable_through_the_api() -> Result<()> {
    let (app, _) = app().await?;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await?;
    let (_, me) = send(&app, Method::GET, "/auth/me", Some(&admin), None).await?;
    let admin_id = me["id"].as_str().unwrap_or_default().to_string();

    let (s, b) = send(&app, Method::PUT, &format!("/admin/users/{admin_id}"), Some(&admin), Some(json!({"role": "USER"}))).await?;
    assert_eq!(s, StatusCode::FORBIDDEN);
    assert_eq!(b["code"], "system_admin_immutable");
    let (s, _) = send(&app, Method::PUT, &format!("/admin/users/{admin_id}/policy"), Some(&admin), Some(json!({}))).await?;
    assert_eq!(s, StatusCode::FORBIDDEN);
    let (s, _) = send(&app, Method::DELETE, &format!("/admin/users/{admin_id}"), Some(&admin), None).await?;
    assert_eq!(s, StatusCode::FORBIDDEN);

    // reading is unaffected
    let (s, policy) = send(&app, Method::GET, &format!("/admin/users/{admin_id}/policy"), Some(&admin), None).await?;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(policy["statements"][0]["action"], json!(["*"]));
    Ok(())
}

#[tokio::test]
async fn user_management_lifecycle() -> Result<()> {
    let (app, _) = app().await?;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await?;

    let (s, _) = send(&app, Method::POST, "/admin/users", Some(&admin), Some(json!({"email": "x@example.com"}))).await?;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    let (s, _) = send(&app, Method::POST, "/admin/users", Some(&admin), Some(json!({"email": "x@example.com", "password": "pw", "role": "owner"}))).await?;
    assert_eq!(s, StatusCode::BAD_REQUEST);

    let uid = create_user(&app, &admin, "x@example.com", json!(null)).await?;
    let (s, _) = send(&app, Method::POST, "/admin/users", Some(&admin), Some(json!({"email": "X@example.com", "password": "pw"}))).await?;
    assert_eq!(s, StatusCode::CONFLICT);
    // surrounding whitespace does not make a distinct account
    let (s, b) = send(&app, Method::POST, "/admin/users", Some(&admin), Some(json!({"email": " admin@example.com ", "password": "pw"}))).await?;
    assert_eq!(s, StatusCode::CONFLICT);
    assert_eq!(b["code"], "email_exists");
    assert!(!login(&app, "  x@example.com ", "pw").await?.is_empty());

    let (s, updated) = send(&app, Method::PUT, &format!("/admin/users/{uid}"), Some(&admin), Some(json!({"name": "Xavier"}))).await?;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(updated["name"], "Xavier");
    assert_eq!(updated["email"], "x@example.com");

    let user = login(&app, "x@example.com", "pw").await?;
    let (s, profile) = send(&app, Method::GET, "/main/profile", Some(&user), None).await?;
    assert_eq!(s, StatusCode::OK);
    assert!(profile.get("policy").is_none());

    let (s, _) = send(&app, Method::DELETE, &format!("/admin/users/{uid}"), Some(&admin), None).await?;
    assert_eq!(s, StatusCode::OK);
    // sessions of a deleted user are revoked
    assert_eq!(send(&app, Method::GET, "/main/profile", Some(&user), None).await?.0, StatusCode::UNAUTHORIZED);
    assert_eq!(send(&app, Method::DELETE, &format!("/admin/users/{uid}"), Some(&admin), None).await?.0, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn session_for_unknown_principal_is_rejected() -> Result<()> {
    let (app, state) = app().await?;
    let ghost = state.sessions.issue(Identity { user_id: "ghost".into(), email: "ghost@example.com".into(), role: Role::User })?;
    let (s, b) = send(&app, Method::GET, "/main/reports", Some(&ghost.token), None).await?;
    assert_eq!(s, StatusCode::NOT_FOUND);
    assert_eq!(b["code"], "user_not_found");
    Ok(())
}

#[tokio::test]
async fn permission_check_and_matrix() -> Result<()> {
    let (app, _) = app().await?;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await?;
    let uid = create_user(&app, &admin, "m@example.com", json!({
        "statements": [{"action": ["read"], "effect": "allow", "resource": ["service:reports"]}]
    })).await?;
    let user = login(&app, "m@example.com", "pw").await?;

    let (s, b) = send(&app, Method::POST, "/main/permissions/check", Some(&user), Some(json!({"action": "read", "resource": "service:reports"}))).await?;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(b["allow"], true);
    let (_, b) = send(&app, Method::POST, "/main/permissions/check", Some(&user), Some(json!({"action": "write", "resource": "service:reports"}))).await?;
    assert_eq!(b["allow"], false);
    let (s, _) = send(&app, Method::POST, "/main/permissions/check", Some(&user), Some(json!({"action": "read"}))).await?;
    assert_eq!(s, StatusCode::BAD_REQUEST);

    let (s, m) = send(&app, Method::GET, &format!("/admin/users/{uid}/permissions"), Some(&admin), None).await?;
    assert_eq!(s, StatusCode::OK);
    let cells = m["permissions"].as_array().cloned().unwrap_or_default();
    assert_eq!(cells.len(), 6);
    assert_eq!(cells.iter().filter(|c| c["allow"] == true).count(), 1);

    let (_, me) = send(&app, Method::GET, "/auth/me", Some(&admin), None).await?;
    let admin_id = me["id"].as_str().unwrap_or_default().to_string();
    let (_, m) = send(&app, Method::GET, &format!("/admin/users/{admin_id}/permissions"), Some(&admin), None).await?;
    assert!(m["permissions"].as_array().map(|a| a.iter().all(|c| c["allow"] == true)).unwrap_or(false));
    Ok(())
}

#[tokio::test]
async fn alerts_and_templates() -> Result<()> {
    let (app, _) = app().await?;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await?;
    let uid = create_user(&app, &admin, "a@example.com", json!({})).await?;
    let user = login(&app, "a@example.com", "pw").await?;

    let (s, _) = send(&app, Method::POST, "/admin/alerts", Some(&admin), Some(json!({"type": "x"}))).await?;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    send(&app, Method::POST, "/admin/alerts", Some(&admin), Some(json!({"type": "maintenance", "message": "tonight"}))).await?;
    send(&app, Method::POST, "/admin/alerts", Some(&admin), Some(json!({"type": "security", "message": "rotate", "userId": uid}))).await?;
    let (s, other) = send(&app, Method::POST, "/admin/alerts", Some(&admin), Some(json!({"type": "security", "message": "other", "userId": "someone"}))).await?;
    assert_eq!(s, StatusCode::CREATED);

    let (s, mine) = send(&app, Method::GET, "/main/alerts", Some(&user), None).await?;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(mine.as_array().map(|a| a.len()), Some(2));

    let id = other["id"].as_i64().unwrap_or_default();
    assert_eq!(send(&app, Method::GET, &format!("/admin/alerts/{id}"), Some(&admin), None).await?.0, StatusCode::OK);
    assert_eq!(send(&app, Method::DELETE, &format!("/admin/alerts/{id}"), Some(&admin), None).await?.0, StatusCode::OK);
    assert_eq!(send(&app, Method::GET, &format!("/admin/alerts/{id}"), Some(&admin), None).await?.0, StatusCode::NOT_FOUND);
    for method in [Method::GET, Method::DELETE] {
        let (s, b) = send(&app, method, "/admin/alerts/not-a-number", Some(&admin), None).await?;
        assert_eq!(s, StatusCode::BAD_REQUEST);
        assert_eq!(b["status"], "error");
        assert_eq!(b["code"], "bad_request");
    }

    let (s, _) = send(&app, Method::PUT, "/policy/templates", Some(&admin), Some(json!([
        {"name": "readers", "document": {"statements": [{"action": ["read"], "effect": "allow", "resource": ["*"]}]}},
        {"statements": []}
    ]))).await?;
    assert_eq!(s, StatusCode::OK);
    let (_, tpls) = send(&app, Method::GET, "/policy/templates", Some(&admin), None).await?;
    assert_eq!(tpls.as_array().map(|a| a.len()), Some(2));
    Ok(())
}
