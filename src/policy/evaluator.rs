use serde_json::Value;

use super::document::{Effect, PolicyDocument};

/// Outcome of evaluating a policy. The deny reason stays internal: callers surface
/// a generic rejection and only logs see which branch applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// A matching statement carried `deny`.
    Explicit,
    /// No matching `allow` statement.
    NoMatch,
}

impl Decision {
    pub fn is_allowed(self) -> bool { matches!(self, Decision::Allow) }
}

/// Deny-overrides-allow over every matching statement, independent of order.
/// Statements with an unknown effect take part in neither side.
pub fn decide(policy: &PolicyDocument, action: &str, resource: &str) -> Decision {
    let matching = || policy.statements.iter().filter(|st| st.matches(action, resource));
    if matching().any(|st| st.effect == Effect::Deny) {
        return Decision::Deny(DenyReason::Explicit);
    }
    if matching().any(|st| st.effect == Effect::Allow) {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::NoMatch)
    }
}

/// Whether `policy` permits `action` on `resource`. Pure; default-deny.
pub fn evaluate(policy: &PolicyDocument, action: &str, resource: &str) -> bool {
    decide(policy, action, resource).is_allowed()
}

/// Evaluate a raw stored policy value, normalizing it first.
pub fn evaluate_value(policy: Option<&Value>, action: &str, resource: &str) -> bool {
    evaluate(&PolicyDocument::from_stored(policy), action, resource)
}
