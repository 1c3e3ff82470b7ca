//! Subscription backend interface used by the mailing handlers.
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub type BackendResult<T> = Result<T, BackendError>;

/// Backend errors.
///
/// Client-facing kinds (`NotFound`, `Conflict`, `Forbidden`, `BadRequest`) carry a
/// message safe to echo back. The rest are logged and reported as internal errors.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("backend timed out")]
    Timeout,
    #[error("backend transport error: {0}")]
    Transport(String),
    #[error("backend returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("backend response could not be decoded: {0}")]
    Decode(String),
}

/// A mailing list as exposed by `GET /lists`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailingList {
    pub address: String,
    pub name: String,
    pub description: String,
    pub access_level: String,
    pub members_count: u64,
    pub created_at: String,
    pub blocked: bool,
    pub hidden: bool,
}

/// The provider operations the gateway forwards to.
///
/// Implementations bound each call with their own timeout; the caller does not retry.
#[async_trait]
pub trait SubscriptionBackend: Send + Sync + 'static {
    // Returns the backend name (for logging).
    fn backend_name(&self) -> &'static str;

    // Hidden lists are omitted unless `include_hidden` is set.
    async fn list_mailing_lists(&self, include_hidden: bool) -> BackendResult<Vec<MailingList>>;

    async fn subscribe(&self, list_address: &str, member_address: &str) -> BackendResult<()>;

    async fn unsubscribe(&self, list_address: &str, member_address: &str) -> BackendResult<()>;
}

/// Blocked / hidden list addresses from configuration.
#[derive(Debug, Clone, Default)]
pub struct ListVisibility {
    pub blocked: Vec<String>,
    pub hidden: Vec<String>,
}

impl ListVisibility {
    pub fn is_blocked(&self, address: &str) -> bool {
        self.blocked.iter().any(|a| a == address)
    }

    pub fn is_hidden(&self, address: &str) -> bool {
        self.hidden.iter().any(|a| a == address)
    }

    /// Refuse writes to blocked lists before anything is sent upstream.
    pub fn ensure_subscribable(&self, address: &str) -> BackendResult<()> {
        if self.is_blocked(address) {
            return Err(BackendError::Forbidden(format!(
                "mailing list {address} is not open for subscriptions"
            )));
        }
        Ok(())
    }
}
