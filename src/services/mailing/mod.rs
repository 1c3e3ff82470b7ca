pub mod backend;
pub mod mailgun;

pub use backend::{BackendError, ListVisibility, MailingList, SubscriptionBackend};
pub use mailgun::MailgunClient;
