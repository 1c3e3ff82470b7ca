//! Access token (RS256 JWT) verification -> Identity into request extensions.
//!
//! - `Authorization: Bearer <jwt>` is required on every protected route.
//! - Any failure answers a generic 401; the concrete kind is logged for operators.
//! - Authorization (who may touch which member) happens in the handlers via
//!   `services::auth::policy`.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::services::auth::AuthError;
use crate::state::AppState;

const BEARER_PREFIX: &str = "Bearer ";

/// Apply authentication to every route of `router`.
///
/// ```ignore
/// let protected = middleware::auth::access::apply(Router::new().route("/lists", get(list)), state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8: State extractor in middleware needs `from_fn_with_state`
    router.layer(middleware::from_fn_with_state(state, access_middleware))
}

/// Pull the token out of `Authorization: Bearer <token>`.
///
/// Anything but exactly one non-empty token after the `Bearer ` scheme is rejected.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let mut values = headers.get_all(header::AUTHORIZATION).iter();
    let value = values.next().ok_or(AuthError::MissingToken)?;
    if values.next().is_some() {
        return Err(AuthError::MissingToken);
    }

    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .ok_or(AuthError::MissingToken)?;

    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(AuthError::MissingToken);
    }

    Ok(token)
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let identity = match bearer_token(req.headers()).and_then(|t| state.auth.authenticate(t)) {
        Ok(identity) => identity,
        Err(err) => {
            tracing::warn!(
                kind = err.kind(),
                error = %err,
                method = %req.method(),
                path = %req.uri().path(),
                "access token rejected"
            );
            return Err(AppError::Unauthorized);
        }
    };

    tracing::debug!(email = %identity.email, admin = identity.is_admin, "authenticated");

    // middleware -> extractor hand-off
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
