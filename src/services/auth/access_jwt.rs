use thiserror::Error;

use crate::services::auth::identity::{ClaimsError, Identity};
use crate::services::auth::key::PublicKey;
use crate::services::auth::verifier::{TokenVerifier, VerificationError, VerifierOptions};

/// Everything that turns a request into `401 Unauthorized`.
///
/// The variants are for operator logs only; clients always get the same generic response.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing or malformed bearer token")]
    MissingToken,
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error(transparent)]
    Claims(#[from] ClaimsError),
}

impl AuthError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingToken => "MissingTokenError",
            Self::Verification(e) => e.kind(),
            Self::Claims(e) => e.kind(),
        }
    }
}

/// Access-token authenticator: verified token -> `Identity`.
///
/// Built once at startup from `Config` and shared through `AppState`.
#[derive(Clone, Debug)]
pub struct AuthService {
    verifier: TokenVerifier,
}

impl AuthService {
    pub fn new(key: PublicKey, options: VerifierOptions) -> Self {
        Self {
            verifier: TokenVerifier::new(key, options),
        }
    }

    /// Verify the token and derive the caller identity. All-or-nothing.
    pub fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = self.verifier.verify(token)?;
        let identity = Identity::from_claims(&claims)?;
        Ok(identity)
    }
}
