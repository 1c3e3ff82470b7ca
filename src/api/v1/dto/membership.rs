/*
 * Responsibility
 * - Request/response DTOs for /lists, /subscribe, /unsubscribe
 * - validate() for shape checks (authorization is not a DTO concern)
 */
use serde::{Deserialize, Serialize};

/// Form body of `POST /subscribe` and `POST /unsubscribe`.
///
/// Fields default to empty so that a missing field reaches `validate()`
/// and gets our JSON error instead of the framework's plain-text rejection.
#[derive(Debug, Deserialize)]
pub struct MembershipForm {
    #[serde(default)]
    pub list: String,
    #[serde(default)]
    pub member: String,
}

impl MembershipForm {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.list.trim().is_empty() {
            return Err("list is required");
        }
        if self.member.trim().is_empty() {
            return Err("member is required");
        }
        if self.list.len() > 320 || self.member.len() > 320 {
            return Err("addresses must be <= 320 chars");
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListsQuery {
    #[serde(default)]
    pub include_hidden: bool,
}

#[derive(Debug, Serialize)]
pub struct MembershipResponse {
    pub status: &'static str,
    pub list: String,
    pub member: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(list: &str, member: &str) -> MembershipForm {
        MembershipForm {
            list: list.to_string(),
            member: member.to_string(),
        }
    }

    #[test]
    fn requires_both_fields() {
        assert_eq!(form("", "a@x.com").validate(), Err("list is required"));
        assert_eq!(
            form("news@lists.example.com", "  ").validate(),
            Err("member is required")
        );
        assert!(form("news@lists.example.com", "a@x.com").validate().is_ok());
    }

    #[test]
    fn rejects_oversized_addresses() {
        let long = format!("{}@x.com", "a".repeat(400));
        assert!(form("news@lists.example.com", &long).validate().is_err());
    }
}
