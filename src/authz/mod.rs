//! Request authorization: policy enforcement, the role gate, and their axum layers.

mod enforce;
mod guard;
mod layer;

pub use enforce::{enforce, Capability};
pub use guard::{permission_matrix, PermissionCell, Strategy};
pub use layer::{auth_gate, authorize, bearer_token, guard, GuardState};
