//! Factory: build `AuthService` from application `Config`.
use std::sync::Arc;

use crate::config::Config;
use crate::services::auth::AuthService;
use crate::services::auth::key::{KeyFormatError, PublicKey};
use crate::services::auth::verifier::VerifierOptions;

pub fn build_auth_service(config: &Config) -> Result<Arc<AuthService>, KeyFormatError> {
    let key = PublicKey::from_config(&config.auth_public_key)?;

    let auth = AuthService::new(
        key,
        VerifierOptions {
            issuer: config.auth_issuer.clone(),
            audience: config.auth_audience.clone(),
            leeway_seconds: config.access_token_leeway_seconds,
        },
    );

    Ok(Arc::new(auth))
}
