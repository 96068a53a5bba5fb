use axum::extract::State;
use axum::http::StatusCode;
use axum_extra::extract::cookie::CookieJar;

use super::messages;
use super::AccessTokenData;
use super::ApiError;
use super::ApiSuccess;
use crate::domain::user::ports::AuthServicePort;
use crate::inbound::http::router::AppState;
use crate::user::errors::AuthError;

pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<ApiSuccess<AccessTokenData>, ApiError> {
    let refresh_token = jar
        .get(&state.settings.cookie_name)
        .map(|cookie| cookie.value().to_string());

    // A missing or rejected refresh token is an authentication failure here
    let access_token = state
        .auth_service
        .refresh_access_token(refresh_token)
        .await
        .map_err(|e| match e {
            AuthError::TokenInvalid => ApiError::unauthorized(),
            other => ApiError::from(other),
        })?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        messages::USER_LOGIN_SUCCESS,
        AccessTokenData { access_token },
    ))
}
