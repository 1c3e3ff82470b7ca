use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, Validation, errors::ErrorKind};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::services::auth::key::PublicKey;

/// Verified claim set. Only ever produced by `TokenVerifier::verify`.
pub type Claims = Map<String, Value>;

/// RSA signature family. Everything else (HMAC, EC, EdDSA, `none`) is refused
/// before any signature check runs.
pub const ACCEPTED_ALGORITHMS: [Algorithm; 6] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("malformed token: {0}")]
    MalformedToken(String),
    #[error("unsupported token algorithm '{0}'")]
    UnsupportedAlgorithm(String),
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    TokenExpired,
    #[error("token not yet valid")]
    TokenNotYetValid,
    #[error("invalid '{0}' claim")]
    InvalidClaim(&'static str),
}

impl VerificationError {
    /// Stable name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedToken(_) => "MalformedToken",
            Self::UnsupportedAlgorithm(_) => "UnsupportedAlgorithm",
            Self::InvalidSignature => "InvalidSignature",
            Self::TokenExpired => "TokenExpired",
            Self::TokenNotYetValid => "TokenNotYetValid",
            Self::InvalidClaim(_) => "InvalidClaim",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for VerificationError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::ExpiredSignature => Self::TokenExpired,
            ErrorKind::ImmatureSignature => Self::TokenNotYetValid,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                Self::UnsupportedAlgorithm(e.to_string())
            }
            ErrorKind::InvalidIssuer => Self::InvalidClaim("iss"),
            ErrorKind::InvalidAudience => Self::InvalidClaim("aud"),
            ErrorKind::InvalidSubject => Self::InvalidClaim("sub"),
            // Base64/JSON/UTF-8 problems and malformed exp/nbf values.
            _ => Self::MalformedToken(e.to_string()),
        }
    }
}

/// Knobs for time and issuer checks.
#[derive(Debug, Clone, Default)]
pub struct VerifierOptions {
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub leeway_seconds: u64,
}

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// Compact JWS (JWT) verifier bound to a single RSA public key.
#[derive(Clone)]
pub struct TokenVerifier {
    key: PublicKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("TokenVerifier")
            .field("validation", &self.validation)
            .finish()
    }
}

impl TokenVerifier {
    pub fn new(key: PublicKey, options: VerifierOptions) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        validation.leeway = options.leeway_seconds;
        // exp/nbf are checked only when present.
        validation.required_spec_claims.clear();
        validation.validate_exp = true;
        validation.validate_nbf = true;

        if let Some(issuer) = options.issuer.as_deref() {
            validation.set_issuer(&[issuer]);
        }
        match options.audience.as_deref() {
            Some(audience) => validation.set_audience(&[audience]),
            // Keycloak always sends `aud`; without a configured audience it is not checked.
            None => validation.validate_aud = false,
        }

        Self { key, validation }
    }

    /// Verify signature, algorithm and time window, then return the claims.
    ///
    /// The header is inspected first so that `none`/HMAC tokens fail with
    /// `UnsupportedAlgorithm` no matter what their signature segment holds.
    pub fn verify(&self, token: &str) -> Result<Claims, VerificationError> {
        let alg = declared_algorithm(token)?;
        if !ACCEPTED_ALGORITHMS.contains(&alg) {
            return Err(VerificationError::UnsupportedAlgorithm(format!("{alg:?}")));
        }

        let data =
            jsonwebtoken::decode::<Claims>(token, self.key.decoding_key(), &self.validation)?;

        Ok(data.claims)
    }
}

fn declared_algorithm(token: &str) -> Result<Algorithm, VerificationError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(VerificationError::MalformedToken(format!(
            "expected 3 segments, got {}",
            segments.len()
        )));
    }
    if segments[0].is_empty() || segments[1].is_empty() {
        return Err(VerificationError::MalformedToken(
            "empty header or payload".to_string(),
        ));
    }

    let header_json = URL_SAFE_NO_PAD
        .decode(segments[0])
        .map_err(|e| VerificationError::MalformedToken(format!("header encoding: {e}")))?;
    let header: RawHeader = serde_json::from_slice(&header_json)
        .map_err(|e| VerificationError::MalformedToken(format!("header json: {e}")))?;

    header
        .alg
        .parse::<Algorithm>()
        .map_err(|_| VerificationError::UnsupportedAlgorithm(header.alg))
}
