use axum::extract::State;
use axum::http::StatusCode;
use axum_extra::extract::cookie::CookieJar;

use super::expired_refresh_cookie;
use super::messages;
use super::ApiError;
use super::ApiSuccess;
use crate::domain::user::ports::AuthServicePort;
use crate::inbound::http::router::AppState;

/// Expire the refresh cookie. Succeeds whether or not the cookie was sent.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiSuccess), ApiError> {
    let cookie_name = &state.settings.cookie_name;
    let refresh_token = jar
        .get(cookie_name)
        .map(|cookie| cookie.value().to_string());

    state.auth_service.logout(refresh_token).await?;

    Ok((
        jar.add(expired_refresh_cookie(cookie_name.clone())),
        ApiSuccess::message(StatusCode::OK, messages::USER_LOGOUT_SUCCESS),
    ))
}
