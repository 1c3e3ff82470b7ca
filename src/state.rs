/*
 * Responsibility
 * - Shared context bound to the Router (AppState)
 *   - auth: AuthService (read-only key + validation rules)
 *   - mailing: subscription backend (Mailgun in production, fakes in tests)
 * - Clone is cheap (Arc inside)
 */
use std::fmt;
use std::sync::Arc;

use crate::services::{auth::AuthService, mailing::SubscriptionBackend};

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub mailing: Arc<dyn SubscriptionBackend>,
}

impl AppState {
    pub fn new(auth: Arc<AuthService>, mailing: Arc<dyn SubscriptionBackend>) -> Self {
        Self { auth, mailing }
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("auth", &self.auth)
            .field("mailing", &self.mailing.backend_name())
            .finish()
    }
}
