/*
 * Responsibility
 * - Domain services: access-token authentication/authorization and the mailing backend
 * - No axum types here except what handlers need to build responses
 */
pub mod auth;
pub mod mailing;
