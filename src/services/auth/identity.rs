/*
 * Responsibility
 * - Verified claims (untyped JSON map) -> Identity (typed, per request)
 * - Every missing / wrong-typed claim is a ClaimsError, never a panic
 * - Admin role = "Admin" in `groups`; anything else is fail-closed
 */
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::services::auth::verifier::Claims;

pub const ADMIN_GROUP: &str = "Admin";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("missing claim '{0}'")]
    Missing(&'static str),
    #[error("claim '{0}' has an unexpected type")]
    WrongType(&'static str),
}

impl ClaimsError {
    pub fn kind(&self) -> &'static str {
        "MalformedClaims"
    }
}

/// Authenticated caller, derived from a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub given_name: String,
    pub family_name: String,
    pub display_name: String,
    pub email: String,
    pub is_admin: bool,
}

impl Identity {
    pub fn from_claims(claims: &Claims) -> Result<Self, ClaimsError> {
        let email = required_str(claims, "email")?;
        let given_name = required_str(claims, "given_name")?;
        let family_name = required_str(claims, "family_name")?;

        let is_admin = match claims.get("groups") {
            None | Some(Value::Null) => false,
            Some(Value::Array(groups)) => groups.iter().any(|g| g.as_str() == Some(ADMIN_GROUP)),
            Some(_) => return Err(ClaimsError::WrongType("groups")),
        };

        let display_name = format!("{given_name} {family_name}").trim().to_string();

        Ok(Self {
            given_name: given_name.to_string(),
            family_name: family_name.to_string(),
            display_name,
            email: email.to_string(),
            is_admin,
        })
    }
}

fn required_str<'a>(claims: &'a Claims, name: &'static str) -> Result<&'a str, ClaimsError> {
    match claims.get(name) {
        None | Some(Value::Null) => Err(ClaimsError::Missing(name)),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(ClaimsError::WrongType(name)),
    }
}
