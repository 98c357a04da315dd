use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub severity: String,
    /// `None` for alerts shown to everyone.
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAlert {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Default)]
struct AlertTable {
    next_id: i64,
    items: Vec<Alert>,
}

#[derive(Clone, Default)]
pub struct AlertStore {
    inner: Arc<RwLock<AlertTable>>,
}

impl AlertStore {
    pub fn new() -> Self { Self::default() }

    /// Returns `None` when type or message is missing.
    pub fn create(&self, new: NewAlert) -> Option<Alert> {
        let kind = new.kind.filter(|s| !s.is_empty())?;
        let message = new.message.filter(|s| !s.is_empty())?;
        let mut t = self.inner.write();
        t.next_id += 1;
        let alert = Alert {
            id: t.next_id,
            kind,
            message,
            severity: new.severity.unwrap_or_else(|| "info".to_string()),
            user_id: new.user_id.filter(|s| !s.is_empty()),
            created_at: Utc::now(),
        };
        t.items.push(alert.clone());
        Some(alert)
    }

    /// Newest first.
    pub fn list(&self) -> Vec<Alert> {
        self.inner.read().items.iter().rev().cloned().collect()
    }

    /// Global alerts plus those addressed to `user_id`, newest first.
    pub fn list_for_user(&self, user_id: &str) -> Vec<Alert> {
        self.inner
            .read()
            .items
            .iter()
            .rev()
            .filter(|a| a.user_id.as_deref().map_or(true, |u| u == user_id))
            .cloned()
            .collect()
    }

    pub fn get(&self, id: i64) -> Option<Alert> {
        self.inner.read().items.iter().find(|a| a.id == id).cloned()
    }

    pub fn remove(&self, id: i64) -> Option<Alert> {
        let mut t = self.inner.write();
        let idx = t.items.iter().position(|a| a.id == id)?;
        Some(t.items.remove(idx))
    }

    pub fn count(&self) -> usize { self.inner.read().items.len() }
}
