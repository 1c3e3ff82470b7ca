pub mod health;
pub mod mailing;
