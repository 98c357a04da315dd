//! Per-user permission policies: the document model, the allow/deny evaluator and
//! reusable templates.

mod document;
mod evaluator;
mod template;

pub use document::{Effect, PolicyDocument, Statement, WILDCARD};
pub use evaluator::{decide, evaluate, evaluate_value, Decision, DenyReason};
pub use template::{bundled_admin_template, load_template_file, PolicyTemplate, BUNDLED_ADMIN_TEMPLATE};

/// Actions and resources known to this deployment. Used to render permission
/// matrices; the evaluator itself accepts arbitrary strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    pub actions: Vec<String>,
    pub resources: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            actions: vec!["read".into(), "write".into()],
            resources: vec!["service:dashboard".into(), "service:reports".into(), "service:users".into()],
        }
    }
}
