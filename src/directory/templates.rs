use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;

use crate::policy::PolicyTemplate;

/// Admin-managed policy templates. Writes replace the whole set.
#[derive(Clone, Default)]
pub struct TemplateStore {
    inner: Arc<RwLock<Vec<PolicyTemplate>>>,
}

impl TemplateStore {
    pub fn new() -> Self { Self::default() }

    /// Newest first.
    pub fn list(&self) -> Vec<PolicyTemplate> {
        self.inner.read().iter().rev().cloned().collect()
    }

    /// Replace all templates. A non-array input clears the set.
    pub fn replace_all(&self, input: &Value) -> Vec<PolicyTemplate> {
        let now = Utc::now();
        let created: Vec<PolicyTemplate> = match input {
            Value::Array(items) => items.iter().map(|t| PolicyTemplate::from_input(t, now)).collect(),
            _ => Vec::new(),
        };
        *self.inner.write() = created.clone();
        tracing::info!(count = created.len(), "policy templates replaced");
        created
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn replace_all_swaps_the_set() {
        let s = TemplateStore::new();
        s.replace_all(&json!([{"name": "a", "document": {"statements": []}}, {"statements": []}]));
        assert_eq!(s.list().len(), 2);
        s.replace_all(&json!([{"name": "b", "document": {}}]));
        let names: Vec<_> = s.list().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["b".to_string()]);
        s.replace_all(&json!({"not": "a list"}));
        assert!(s.list().is_empty());
    }
}
