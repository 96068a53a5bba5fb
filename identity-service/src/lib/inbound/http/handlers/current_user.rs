use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;

use super::messages;
use super::ApiError;
use super::ApiSuccess;
use super::UserData;
use crate::domain::user::ports::AuthServicePort;
use crate::inbound::http::middleware::AuthenticatedUser;
use crate::inbound::http::router::AppState;
use crate::user::errors::AuthError;

pub async fn current_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<ApiSuccess<UserData>, ApiError> {
    state
        .auth_service
        .current_user(&user.user_id)
        .await
        .map_err(|e| match e {
            // Valid token for a user that no longer exists
            AuthError::UserNotFound => ApiError::unauthorized(),
            other => ApiError::from(other),
        })
        .map(|ref user| ApiSuccess::new(StatusCode::OK, messages::USER_RETRIEVED, user.into()))
}
