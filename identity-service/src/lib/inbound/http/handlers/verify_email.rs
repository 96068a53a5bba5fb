use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

use super::messages;
use super::ApiError;
use super::ApiSuccess;
use crate::domain::user::ports::AuthServicePort;
use crate::inbound::http::router::AppState;

pub async fn verify_email(
    State(state): State<AppState>,
    query: Option<Query<VerifyEmailParams>>,
) -> Result<ApiSuccess, ApiError> {
    let token = query.map(|Query(params)| params.token).unwrap_or_default();

    state.auth_service.verify_email(&token).await?;

    Ok(ApiSuccess::message(
        StatusCode::OK,
        messages::USER_VERIFY_SUCCESS,
    ))
}

#[derive(Clone, Default, Deserialize)]
pub struct VerifyEmailParams {
    #[serde(default)]
    token: String,
}
