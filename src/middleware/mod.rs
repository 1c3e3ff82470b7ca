/*
 * Responsibility
 * - Public interface of the middleware layers
 * - auth (bearer verification), cors, http (request id / tracing / limits)
 */
pub mod auth;
pub mod cors;
pub mod http;
