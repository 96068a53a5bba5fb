use axum::extract::Request;
use axum::extract::State;
use axum::http::header;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use super::handlers::ApiError;
use crate::domain::user::models::UserId;
use crate::inbound::http::router::AppState;

/// Extension type to store authenticated user ID in request extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Middleware that validates bearer tokens and adds the subject to request
/// extensions. Every failure yields the same generic 401.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authorize(&state, req.headers())?;

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Resolve the bearer token in `headers` to an authenticated user.
///
/// # Errors
/// * `Unauthorized` - Header missing or malformed, or token rejected
pub fn authorize(state: &AppState, headers: &HeaderMap) -> Result<AuthenticatedUser, ApiError> {
    let token = bearer_token(headers).ok_or_else(|| {
        tracing::debug!("Missing or malformed Authorization header");
        ApiError::unauthorized()
    })?;

    let subject = state
        .authenticator
        .validate_token_for(token, &state.settings.issuer_audience)
        .map_err(|_| ApiError::unauthorized())?;

    let user_id = UserId::from_string(&subject).map_err(|e| {
        tracing::warn!(error = %e, "Token subject is not a user ID");
        ApiError::unauthorized()
    })?;

    Ok(AuthenticatedUser { user_id })
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The scheme must be exactly `Bearer ` and the trimmed remainder non-empty.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();

    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
