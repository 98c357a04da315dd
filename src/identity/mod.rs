//! Caller identity: who is making the request and how they logged in.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod session;
mod provider;
mod request_context;

pub use principal::{Identity, Principal, Role};
pub use session::{Session, SessionToken, SessionManager};
pub use provider::{AuthProvider, LocalAuthProvider, LoginBody, LoginRequest, LoginResponse, LoginUser};
pub use request_context::RequestContext;
