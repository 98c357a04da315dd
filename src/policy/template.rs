use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::document::PolicyDocument;

/// Policy assigned to the seeded system admin when no template file is configured.
pub const BUNDLED_ADMIN_TEMPLATE: &str = include_str!("../../permissions/iam-policy-template.json");

/// Named, reusable policy document managed by admins.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyTemplate {
    pub id: Uuid,
    pub name: String,
    pub document: PolicyDocument,
    pub created_at: DateTime<Utc>,
}

impl PolicyTemplate {
    /// Accepts either `{name?, document}` or a bare policy document.
    /// Unnamed templates get `template_<millis>`.
    pub fn from_input(input: &Value, now: DateTime<Utc>) -> Self {
        let name = input
            .get("name")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("template_{}", now.timestamp_millis()));
        let document = match input.get("document") {
            Some(doc) => PolicyDocument::normalize(doc),
            None => PolicyDocument::normalize(input),
        };
        Self { id: Uuid::new_v4(), name, document, created_at: now }
    }
}

pub fn bundled_admin_template() -> PolicyDocument {
    serde_json::from_str::<Value>(BUNDLED_ADMIN_TEMPLATE)
        .map(|v| PolicyDocument::normalize(&v))
        .unwrap_or_default()
}

/// Read a policy template JSON file and normalize it.
pub fn load_template_file(path: &Path) -> Result<PolicyDocument> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read policy template: {}", path.display()))?;
    let v: Value = serde_json::from_str(&text)
        .with_context(|| format!("Policy template is not valid JSON: {}", path.display()))?;
    Ok(PolicyDocument::normalize(&v))
}
