use std::fmt;

use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

use super::messages;
use super::ApiError;
use super::ApiSuccess;
use super::UserData;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::RegisterCommand;
use crate::domain::user::ports::AuthServicePort;
use crate::inbound::http::pipeline::ValidJson;
use crate::inbound::http::router::AppState;
use crate::inbound::http::validation::Validate;
use crate::inbound::http::validation::ValidationErrors;
use crate::inbound::http::validation::Validator;

pub async fn register(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<RegisterRequest>,
) -> Result<ApiSuccess<UserData>, ApiError> {
    state
        .auth_service
        .register(body.try_into_command()?)
        .await
        .map_err(ApiError::from)
        .map(|ref user| {
            ApiSuccess::new(StatusCode::CREATED, messages::USER_REG_SUCCESS, user.into())
        })
}

/// HTTP request body for registering a user (raw JSON)
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    password_confirm: String,
}

impl RegisterRequest {
    fn try_into_command(self) -> Result<RegisterCommand, ApiError> {
        let email = EmailAddress::new(self.email).map_err(|_| ApiError::invalid_input())?;
        Ok(RegisterCommand::new(email, self.password))
    }
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut validator = Validator::new();
        validator.field("email", &self.email).required().email();
        validator.field("password", &self.password).required();
        validator
            .field("password_confirm", &self.password_confirm)
            .required()
            .eq_field("password", &self.password);
        validator.finish()
    }
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &"*")
            .field("password", &"*")
            .field("password_confirm", &"*")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, password: &str, password_confirm: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            password_confirm: password_confirm.to_string(),
        }
    }

    #[test]
    fn test_valid_request() {
        assert!(request("a@b.com", "pw1", "pw1").validate().is_ok());
    }

    #[test]
    fn test_each_failing_field_reported_once() {
        let errors = request("", "", "").validate().unwrap_err();

        assert_eq!(errors.get("email"), Some("email is required"));
        assert_eq!(errors.get("password"), Some("password is required"));
        assert_eq!(
            errors.get("password_confirm"),
            Some("password_confirm is required")
        );
    }

    #[test]
    fn test_confirmation_must_match() {
        let errors = request("not-an-email", "pw1", "pw2").validate().unwrap_err();

        assert_eq!(
            errors.get("email"),
            Some("email must be a valid email address")
        );
        assert_eq!(errors.get("password"), None);
        assert_eq!(
            errors.get("password_confirm"),
            Some("password_confirm should match password")
        );
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: Result<RegisterRequest, _> = serde_json::from_str(
            r#"{"email":"a@b.com","password":"pw1","password_confirm":"pw1","role":"admin"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_masks_credentials() {
        let rendered = format!("{:?}", request("a@b.com", "secret-pw", "secret-pw"));
        assert!(!rendered.contains("a@b.com"));
        assert!(!rendered.contains("secret-pw"));
    }
}
