use std::fmt;

use axum::extract::State;
use axum::http::StatusCode;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use super::messages;
use super::refresh_cookie;
use super::AccessTokenData;
use super::ApiError;
use super::ApiSuccess;
use crate::domain::user::models::LoginCommand;
use crate::domain::user::ports::AuthServicePort;
use crate::inbound::http::pipeline::ValidJson;
use crate::inbound::http::router::AppState;
use crate::inbound::http::validation::Validate;
use crate::inbound::http::validation::ValidationErrors;
use crate::inbound::http::validation::Validator;

/// Exchange credentials for an access token in the body and a refresh token
/// in an HTTP-only cookie.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidJson(body): ValidJson<LoginRequest>,
) -> Result<(CookieJar, ApiSuccess<AccessTokenData>), ApiError> {
    let tokens = state.auth_service.login(body.into_command()).await?;

    let cookie = refresh_cookie(
        state.settings.cookie_name.clone(),
        tokens.refresh_token,
        state.settings.refresh_ttl,
    );

    Ok((
        jar.add(cookie),
        ApiSuccess::new(
            StatusCode::OK,
            messages::USER_LOGIN_SUCCESS,
            AccessTokenData {
                access_token: tokens.access_token,
            },
        ),
    ))
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

impl LoginRequest {
    fn into_command(self) -> LoginCommand {
        LoginCommand {
            email: self.email,
            password: self.password,
        }
    }
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut validator = Validator::new();
        validator.field("email", &self.email).required().email();
        validator.field("password", &self.password).required();
        validator.finish()
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &"*")
            .field("password", &"*")
            .finish()
    }
}
