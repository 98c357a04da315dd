//! Service configuration, read from the environment (optionally seeded from `.env`).

use std::path::PathBuf;
use std::time::Duration;

use crate::policy::Vocabulary;

pub const DEFAULT_HTTP_PORT: u16 = 5000;
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@example.com";
pub const DEFAULT_ADMIN_PASSWORD: &str = "Admin@123";
pub const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60;
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://localhost:5174";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub http_port: u16,
    /// The designated system admin. Exempt from administrative edits.
    pub admin_email: String,
    pub admin_password: String,
    pub session_ttl: Duration,
    pub policy_template: Option<PathBuf>,
    pub cors_origins: Vec<String>,
    pub vocabulary: Vocabulary,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            http_port: DEFAULT_HTTP_PORT,
            admin_email: DEFAULT_ADMIN_EMAIL.to_string(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            policy_template: None,
            cors_origins: split_list(DEFAULT_CORS_ORIGINS),
            vocabulary: Vocabulary::default(),
        }
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',').map(|p| p.trim()).filter(|p| !p.is_empty()).map(str::to_string).collect()
}

fn parse_or<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(v) => v.trim().parse::<T>().unwrap_or_else(|_| {
            tracing::warn!("ignoring invalid {key}={v:?}; using default");
            default
        }),
        None => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(get: F) -> Self {
        let d = Config::default();
        let non_empty = |k: &str| get(k).filter(|v| !v.trim().is_empty());
        let mut vocabulary = d.vocabulary.clone();
        if let Some(a) = non_empty("IDAAS_ACTIONS") { vocabulary.actions = split_list(&a); }
        if let Some(r) = non_empty("IDAAS_RESOURCES") { vocabulary.resources = split_list(&r); }
        Self {
            bind: non_empty("IDAAS_BIND").unwrap_or(d.bind),
            http_port: parse_or("IDAAS_HTTP_PORT", non_empty("IDAAS_HTTP_PORT"), d.http_port),
            admin_email: non_empty("ADMIN_EMAIL").map(|e| e.trim().to_lowercase()).unwrap_or(d.admin_email),
            admin_password: non_empty("ADMIN_PASSWORD").unwrap_or(d.admin_password),
            session_ttl: Duration::from_secs(parse_or(
                "IDAAS_SESSION_TTL_SECS",
                non_empty("IDAAS_SESSION_TTL_SECS"),
                DEFAULT_SESSION_TTL_SECS,
            )),
            policy_template: non_empty("IDAAS_POLICY_TEMPLATE").map(PathBuf::from),
            cors_origins: non_empty("IDAAS_CORS_ORIGINS").map(|s| split_list(&s)).unwrap_or(d.cors_origins),
            vocabulary,
        }
    }
}
