pub mod access_jwt;
pub mod factory;
pub mod identity;
pub mod key;
pub mod policy;
pub mod verifier;

pub use access_jwt::{AuthError, AuthService};
pub use factory::build_auth_service;
pub use identity::Identity;
pub use policy::{Action, AuthorizationDecision, authorize};
