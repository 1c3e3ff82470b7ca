/*!
 * Authenticated caller extractor
 *
 * Responsibility:
 * - Hand the Identity verified by middleware::auth::access to handlers
 * - Keep the axum-specific part in core; the Identity type lives in services::auth
 */

mod core;

pub use core::CurrentUser;
