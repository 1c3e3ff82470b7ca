//! Authorization decisions for mailing-list actions.
//!
//! Pure function of (actor, target, action): no backend lookups, no state.

use crate::services::auth::identity::Identity;

pub const DENY_OTHER_MEMBER: &str = "only admins can (un)subscribe other users";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Subscribe,
    Unsubscribe,
    List,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationDecision {
    pub allowed: bool,
    pub reason: &'static str,
}

impl AuthorizationDecision {
    fn allow(reason: &'static str) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny(reason: &'static str) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

pub fn authorize(actor: &Identity, target_email: &str, action: Action) -> AuthorizationDecision {
    match action {
        Action::List => AuthorizationDecision::allow("authenticated"),
        Action::Subscribe | Action::Unsubscribe if actor.is_admin => {
            AuthorizationDecision::allow("admin")
        }
        Action::Subscribe | Action::Unsubscribe if target_email == actor.email => {
            AuthorizationDecision::allow("self-service")
        }
        Action::Subscribe | Action::Unsubscribe => AuthorizationDecision::deny(DENY_OTHER_MEMBER),
    }
}
