//! Policy document model.
//!
//! A policy document is a list of allow/deny statements attached to a single user.
//! Documents arrive from persisted JSON of unknown quality, so every path into the
//! typed model goes through `normalize`, which never fails: anything it cannot make
//! sense of collapses to the empty-permission document or to an inert statement.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wildcard accepted in either the action or the resource set.
pub const WILDCARD: &str = "*";

/// Disposition of a statement. Parsed case-insensitively; anything other than
/// allow/deny is kept verbatim as `Other` and never contributes to a decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Effect {
    Allow,
    Deny,
    Other(String),
}

impl Effect {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "allow" => Effect::Allow,
            "deny" => Effect::Deny,
            _ => Effect::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Effect::Allow => "allow",
            Effect::Deny => "deny",
            Effect::Other(s) => s.as_str(),
        }
    }
}

impl From<String> for Effect {
    fn from(s: String) -> Self { Effect::parse(&s) }
}

impl From<Effect> for String {
    fn from(e: Effect) -> Self { e.as_str().to_string() }
}

/// One allow/deny rule. Field order matches the persisted wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    pub action: Vec<String>,
    pub effect: Effect,
    pub resource: Vec<String>,
}

impl Statement {
    pub fn new<A, R>(effect: Effect, actions: A, resources: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            action: dedup(actions.into_iter().map(Into::into)),
            effect,
            resource: dedup(resources.into_iter().map(Into::into)),
        }
    }

    pub fn allow<A, R>(actions: A, resources: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self::new(Effect::Allow, actions, resources)
    }

    pub fn deny<A, R>(actions: A, resources: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self::new(Effect::Deny, actions, resources)
    }

    /// True when both the action set and the resource set cover the request.
    /// An empty set covers nothing.
    pub fn matches(&self, action: &str, resource: &str) -> bool {
        covers(&self.action, action) && covers(&self.resource, resource)
    }

    fn from_value(v: &Value) -> Option<Self> {
        let obj = v.as_object()?;
        let effect = match obj.get("effect") {
            Some(Value::String(s)) => Effect::parse(s),
            _ => Effect::Other(String::new()),
        };
        Some(Self {
            action: string_set(obj.get("action")),
            effect,
            resource: string_set(obj.get("resource")),
        })
    }
}

fn covers(set: &[String], requested: &str) -> bool {
    set.iter().any(|x| x == WILDCARD || x == requested)
}

// Non-array values and non-string members are dropped; a statement left with an
// empty set can never match.
fn string_set(v: Option<&Value>) -> Vec<String> {
    match v {
        Some(Value::Array(items)) => dedup(items.iter().filter_map(|x| x.as_str().map(str::to_string))),
        _ => Vec::new(),
    }
}

fn dedup(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for s in items {
        if !out.contains(&s) { out.push(s); }
    }
    out
}

/// Canonical policy document. Deserializing from any JSON value succeeds and
/// yields the normalized form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct PolicyDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub statements: Vec<Statement>,
}

impl PolicyDocument {
    /// The empty-permission document: every check denies.
    pub fn empty() -> Self { Self::default() }

    pub fn new(statements: Vec<Statement>) -> Self {
        Self { version: None, statements }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Produce the canonical document for arbitrary input. Never fails.
    pub fn normalize(v: &Value) -> Self {
        let Some(obj) = v.as_object() else { return Self::empty(); };
        let version = obj.get("version").and_then(|x| x.as_str()).map(str::to_string);
        let statements = match obj.get("statements") {
            Some(Value::Array(items)) => items.iter().filter_map(Statement::from_value).collect(),
            _ => Vec::new(),
        };
        Self { version, statements }
    }

    /// Normalize an optional stored value; absent and null both give the empty document.
    pub fn from_stored(v: Option<&Value>) -> Self {
        v.map(Self::normalize).unwrap_or_default()
    }

    /// Re-canonicalize a typed document (dedups sets built by hand).
    pub fn normalized(&self) -> Self {
        Self {
            version: self.version.clone(),
            statements: self
                .statements
                .iter()
                .map(|s| Statement::new(s.effect.clone(), s.action.iter().cloned(), s.resource.iter().cloned()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool { self.statements.is_empty() }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({ "statements": [] }))
    }
}

impl From<Value> for PolicyDocument {
    fn from(v: Value) -> Self { Self::normalize(&v) }
}
