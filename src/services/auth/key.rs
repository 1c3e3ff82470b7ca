//! RSA public key loading for access-token verification.
//!
//! The key usually arrives through a single-line environment variable, so the
//! raw value is normalized first:
//! - surrounding whitespace and quotes are removed
//! - literal `\n` sequences become newlines
//! - a bare base64 body gets the `PUBLIC KEY` armor added
//!
//! Already-armored input passes through unchanged, so normalization is idempotent.

use std::fmt;

use jsonwebtoken::DecodingKey;
use thiserror::Error;

const BEGIN_MARKER: &str = "-----BEGIN ";
const END_MARKER: &str = "-----END ";
const PUBLIC_KEY_HEADER: &str = "-----BEGIN PUBLIC KEY-----";
const PUBLIC_KEY_FOOTER: &str = "-----END PUBLIC KEY-----";

// PKCS#8 (SubjectPublicKeyInfo) and PKCS#1 public key labels.
const ACCEPTED_LABELS: [&str; 2] = ["PUBLIC KEY", "RSA PUBLIC KEY"];

#[derive(Debug, Error)]
pub enum KeyFormatError {
    #[error("public key is empty")]
    Empty,
    #[error("unexpected key armor '{0}' (expected an RSA public key)")]
    UnexpectedLabel(String),
    #[error("public key is not a valid RSA public key: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
}

/// Turns a configuration value into PEM text.
pub fn normalize_public_key(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('"').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('"').unwrap_or(trimmed);
    let unescaped = trimmed.trim().replace("\\n", "\n");

    if unescaped.contains(BEGIN_MARKER) && unescaped.contains(END_MARKER) {
        return unescaped;
    }

    format!("{PUBLIC_KEY_HEADER}\n{unescaped}\n{PUBLIC_KEY_FOOTER}")
}

/// Label between `-----BEGIN ` and the closing dashes, if any.
fn armor_label(pem: &str) -> Option<&str> {
    let start = pem.find(BEGIN_MARKER)? + BEGIN_MARKER.len();
    let rest = &pem[start..];
    let end = rest.find("-----")?;
    Some(rest[..end].trim())
}

/// Verification key, loaded once at startup and shared read-only.
#[derive(Clone)]
pub struct PublicKey {
    pem: String,
    decoding_key: DecodingKey,
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey").finish_non_exhaustive()
    }
}

impl PublicKey {
    pub fn from_config(raw: &str) -> Result<Self, KeyFormatError> {
        if raw.trim().trim_matches('"').trim().is_empty() {
            return Err(KeyFormatError::Empty);
        }

        let pem = normalize_public_key(raw);

        let label = armor_label(&pem).unwrap_or_default();
        if !ACCEPTED_LABELS.contains(&label) {
            return Err(KeyFormatError::UnexpectedLabel(label.to_string()));
        }

        // Rejects undecodable PEM/ASN.1 and non-RSA keys (EC, Ed25519).
        let decoding_key =
            DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(KeyFormatError::Invalid)?;

        Ok(Self { pem, decoding_key })
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}
