use axum::extract::State;
use axum::http::StatusCode;

use super::messages;
use super::ApiError;
use super::ApiSuccess;
use crate::domain::user::ports::AuthServicePort;
use crate::inbound::http::router::AppState;

pub async fn health(State(state): State<AppState>) -> Result<ApiSuccess, ApiError> {
    state.auth_service.check_health().await.map_err(|e| {
        tracing::error!(error = %e, "Health check failed");
        ApiError::ServiceUnavailable(messages::UNHEALTHY.to_string())
    })?;

    Ok(ApiSuccess::message(StatusCode::OK, messages::HEALTHY))
}
