/*
 * Responsibility
 * - Public surface of the v1 API (routes(), DTOs, extractors)
 */
pub mod dto;
pub mod extractors;
pub mod handlers;
mod routes;

pub use routes::routes;
