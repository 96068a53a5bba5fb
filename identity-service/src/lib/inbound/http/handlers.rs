use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use axum_extra::extract::cookie::Cookie;
use axum_extra::extract::cookie::SameSite;
use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;

use super::validation::ValidationErrors;
use crate::domain::user::models::User;
use crate::user::errors::AuthError;

pub mod current_user;
pub mod health;
pub mod login;
pub mod logout;
pub mod refresh;
pub mod register;
pub mod verify_email;

/// Fixed user-facing messages. Nothing else reaches a response body.
pub mod messages {
    pub const TOKEN_INVALID: &str = "Invalid token.";
    pub const USER_EXISTS: &str = "A user with this email already exists.";
    pub const USER_INPUT_INVALID: &str = "Invalid input.";
    pub const USER_LOGIN_SUCCESS: &str = "Login successful!";
    pub const USER_NOT_FOUND: &str = "Invalid username or password.";
    pub const USER_REG_SUCCESS: &str =
        "A link to activate your account has been emailed to the address provided.";
    pub const USER_UNVERIFIED: &str = "Please verify your email.";
    pub const USER_VERIFY_SUCCESS: &str = "Verification successful!";
    pub const USER_LOGOUT_SUCCESS: &str = "Logout successful.";
    pub const USER_RETRIEVED: &str = "User retrieved.";
    pub const UNAUTHORIZED: &str = "Unauthorized";
    pub const SERVER_ERROR: &str = "An unexpected error occurred.";
    pub const REQUEST_TIMEOUT: &str = "Request timed out.";
    pub const HEALTHY: &str = "healthy";
    pub const UNHEALTHY: &str = "unhealthy";
}

#[derive(Debug, Clone)]
pub struct ApiSuccess<T: Serialize + PartialEq = ()>(StatusCode, Json<ApiResponseBody<T>>);

impl<T> PartialEq for ApiSuccess<T>
where
    T: Serialize + PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0 && self.1 .0 == other.1 .0
    }
}

impl<T: Serialize + PartialEq> ApiSuccess<T> {
    pub fn new(status: StatusCode, message: &str, data: T) -> Self {
        ApiSuccess(status, Json(ApiResponseBody::new(message, data)))
    }
}

impl ApiSuccess<()> {
    pub fn message(status: StatusCode, message: &str) -> Self {
        ApiSuccess(status, Json(ApiResponseBody::message(message)))
    }
}

impl<T: Serialize + PartialEq> IntoResponse for ApiSuccess<T> {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The cause is logged; the client only sees a generic message
    InternalServerError(String),
    UnprocessableEntity(String),
    BadRequest(String),
    Validation(ValidationErrors),
    Unauthorized(String),
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn unauthorized() -> Self {
        ApiError::Unauthorized(messages::UNAUTHORIZED.to_string())
    }

    pub fn invalid_input() -> Self {
        ApiError::BadRequest(messages::USER_INPUT_INVALID.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::InternalServerError(cause) => {
                tracing::error!(error = %cause, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiResponseBody::message(messages::SERVER_ERROR),
                )
            }
            ApiError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiResponseBody::message(&msg),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiResponseBody::message(&msg)),
            ApiError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                ApiResponseBody::invalid_input(errors.into_map()),
            ),
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, ApiResponseBody::message(&msg))
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiResponseBody::message(&msg),
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UserExists => {
                ApiError::UnprocessableEntity(messages::USER_EXISTS.to_string())
            }
            AuthError::UserNotFound => ApiError::Unauthorized(messages::USER_NOT_FOUND.to_string()),
            AuthError::UserNotVerified => {
                ApiError::Unauthorized(messages::USER_UNVERIFIED.to_string())
            }
            AuthError::TokenInvalid => ApiError::BadRequest(messages::TOKEN_INVALID.to_string()),
            AuthError::InvalidEmail(_)
            | AuthError::InvalidUserId(_)
            | AuthError::Password(_)
            | AuthError::Token(_)
            | AuthError::Database(_)
            | AuthError::Unknown(_) => ApiError::InternalServerError(err.to_string()),
        }
    }
}

/// Response envelope: `{message, errors?, data?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponseBody<T: Serialize + PartialEq = ()> {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

impl<T: Serialize + PartialEq> ApiResponseBody<T> {
    pub fn new(message: &str, data: T) -> Self {
        Self {
            message: message.to_string(),
            errors: None,
            data: Some(data),
        }
    }
}

impl ApiResponseBody<()> {
    pub fn message(message: &str) -> Self {
        Self {
            message: message.to_string(),
            errors: None,
            data: None,
        }
    }

    pub fn invalid_input(errors: BTreeMap<String, String>) -> Self {
        Self {
            message: messages::USER_INPUT_INVALID.to_string(),
            errors: Some(errors),
            data: None,
        }
    }
}

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserData {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserData {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.as_str().to_string(),
            verified_at: user.verified_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct AccessTokenData {
    pub access_token: String,
}

impl std::fmt::Debug for AccessTokenData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenData")
            .field("access_token", &"*")
            .finish()
    }
}

/// Refresh token cookie: host-wide, script-invisible, HTTPS-only, same-site.
pub(crate) fn refresh_cookie(
    name: String,
    value: String,
    max_age: chrono::Duration,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::seconds(max_age.num_seconds()))
        .build()
}

/// Same cookie with an empty value and a zero lifetime.
pub(crate) fn expired_refresh_cookie(name: String) -> Cookie<'static> {
    let mut cookie = refresh_cookie(name, String::new(), chrono::Duration::zero());
    cookie.make_removal();
    cookie
}
