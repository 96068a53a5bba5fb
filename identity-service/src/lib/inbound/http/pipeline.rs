//! Request pipeline for bodies: content-type gate, strict decode, validation
//! and, for protected routes, bearer authentication. Stages run in that
//! order and the first failure becomes the response.

use std::fmt;

use axum::async_trait;
use axum::body::Bytes;
use axum::extract::FromRequest;
use axum::extract::Request;
use axum::http::header;
use axum::http::HeaderMap;
use serde::de::DeserializeOwned;

use super::handlers::ApiError;
use super::middleware::authorize;
use super::middleware::AuthenticatedUser;
use super::validation::Validate;
use crate::inbound::http::router::AppState;

/// A JSON body that passed the content-type gate, strict decoding and
/// validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate + fmt::Debug,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        require_json_content_type(req.headers())?;

        let bytes = Bytes::from_request(req, state).await.map_err(|e| {
            tracing::debug!(error = %e, "Failed to read request body");
            ApiError::invalid_input()
        })?;

        let payload: T = decode_strict(&bytes)?;
        tracing::debug!(payload = ?payload, "Payload decoded");

        payload.validate().map_err(|errors| {
            tracing::debug!(errors = ?errors, "Payload failed validation");
            ApiError::Validation(errors)
        })?;

        Ok(ValidJson(payload))
    }
}

/// A validated JSON body on a route that also requires a bearer token.
///
/// The token is checked after the body, so a bad body is reported as 400
/// even when the token is also bad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated<T> {
    pub user: AuthenticatedUser,
    pub body: T,
}

#[async_trait]
impl<T> FromRequest<AppState> for Authenticated<T>
where
    T: DeserializeOwned + Validate + fmt::Debug,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let headers = req.headers().clone();

        let ValidJson(body) = ValidJson::<T>::from_request(req, state).await?;
        let user = authorize(state, &headers)?;

        Ok(Authenticated { user, body })
    }
}

/// Accept `application/json`, with or without parameters such as charset.
///
/// # Errors
/// * `BadRequest` - Header missing or naming another media type
pub fn require_json_content_type(headers: &HeaderMap) -> Result<(), ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let media_type = content_type.split(';').next().unwrap_or_default().trim();

    if media_type.eq_ignore_ascii_case("application/json") {
        Ok(())
    } else {
        tracing::debug!(content_type = %content_type, "Invalid content-type");
        Err(ApiError::invalid_input())
    }
}

/// Decode a JSON body, rejecting syntax errors, trailing data and any field
/// the target type does not declare (`deny_unknown_fields`).
///
/// # Errors
/// * `BadRequest` - Body does not decode into `T`
pub fn decode_strict<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(bytes).map_err(|e| {
        tracing::debug!(error = %e, "Failed to decode json");
        ApiError::invalid_input()
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use auth::Authenticator;
    use auth::HashingParams;
    use auth::PasswordHasher;
    use auth::TokenSigner;
    use axum::body::to_bytes;
    use axum::body::Body;
    use axum::http::HeaderValue;
    use axum::http::Request as HttpRequest;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::Json;
    use axum::Router;
    use mockall::mock;
    use serde::Deserialize;
    use serde_json::json;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::domain::user::models::LoginCommand;
    use crate::domain::user::models::LoginTokens;
    use crate::domain::user::models::RegisterCommand;
    use crate::domain::user::models::User;
    use crate::domain::user::models::UserId;
    use crate::inbound::http::router::HttpSettings;
    use crate::inbound::http::validation::ValidationErrors;
    use crate::inbound::http::validation::Validator;
    use crate::user::errors::AuthError;
    use crate::user::ports::AuthServicePort;

    const ISSUER: &str = "http://localhost:8888";

    mock! {
        pub TestAuthService {}

        #[axum::async_trait]
        impl AuthServicePort for TestAuthService {
            async fn register(&self, command: RegisterCommand) -> Result<User, AuthError>;
            async fn verify_email(&self, token: &str) -> Result<(), AuthError>;
            async fn login(&self, command: LoginCommand) -> Result<LoginTokens, AuthError>;
            async fn refresh_access_token(
                &self,
                refresh_token: Option<String>,
            ) -> Result<String, AuthError>;
            async fn logout(&self, refresh_token: Option<String>) -> Result<(), AuthError>;
            async fn current_user(&self, id: &UserId) -> Result<User, AuthError>;
            async fn check_health(&self) -> Result<(), AuthError>;
        }
    }

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Note {
        #[serde(default)]
        email: String,
    }

    impl Validate for Note {
        fn validate(&self) -> Result<(), ValidationErrors> {
            let mut validator = Validator::new();
            validator.field("email", &self.email).required().email();
            validator.finish()
        }
    }

    async fn open(ValidJson(note): ValidJson<Note>) -> impl IntoResponse {
        Json(json!({ "email": note.email }))
    }

    async fn protected(Authenticated { user, body }: Authenticated<Note>) -> impl IntoResponse {
        let user_id = user.user_id.to_string();
        Json(json!({ "email": body.email, "user_id": user_id }))
    }

    fn authenticator() -> Arc<Authenticator> {
        let hasher = PasswordHasher::with_params(HashingParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
            output_len: 32,
        })
        .unwrap();
        Arc::new(Authenticator::new(
            hasher,
            TokenSigner::new(b"test_secret_key_at_least_32_bytes!", ISSUER),
        ))
    }

    fn app(authenticator: Arc<Authenticator>) -> Router {
        let state = AppState {
            auth_service: Arc::new(MockTestAuthService::new()),
            authenticator,
            settings: HttpSettings {
                issuer_audience: ISSUER.to_string(),
                cookie_name: "refresh_token".to_string(),
                refresh_ttl: chrono::Duration::days(7),
                request_timeout: std::time::Duration::from_secs(5),
            },
        };

        Router::new()
            .route("/open", post(open))
            .route("/protected", post(protected))
            .with_state(state)
    }

    fn request(path: &str, content_type: Option<&str>, body: &str) -> Request {
        let mut request = HttpRequest::builder()
            .method("POST")
            .uri(path)
            .body(Body::from(body.to_string()))
            .unwrap();
        if let Some(content_type) = content_type {
            request.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_str(content_type).unwrap(),
            );
        }
        request
    }

    async fn send(app: Router, request: Request) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_valid_body_reaches_handler() {
        let (status, body) = send(
            app(authenticator()),
            request("/open", Some("application/json"), r#"{"email":"a@b.com"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"email": "a@b.com"}));
    }

    #[tokio::test]
    async fn test_charset_parameter_is_accepted() {
        let (status, _) = send(
            app(authenticator()),
            request(
                "/open",
                Some("application/json; charset=utf-8"),
                r#"{"email":"a@b.com"}"#,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_content_type_gate() {
        for content_type in [None, Some("text/plain"), Some("application/x-www-form-urlencoded")] {
            let (status, body) = send(
                app(authenticator()),
                request("/open", content_type, r#"{"email":"a@b.com"}"#),
            )
            .await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, json!({"message": "Invalid input."}));
        }
    }

    #[tokio::test]
    async fn test_strict_decoding() {
        for payload in [
            r#"{"email":"a@b.com","admin":true}"#,
            r#"{"email":"a@b.com"#,
            r#"{"email":"a@b.com"} {}"#,
            "",
        ] {
            let (status, body) = send(
                app(authenticator()),
                request("/open", Some("application/json"), payload),
            )
            .await;

            assert_eq!(status, StatusCode::BAD_REQUEST, "payload {:?}", payload);
            assert_eq!(body, json!({"message": "Invalid input."}));
        }
    }

    #[tokio::test]
    async fn test_validation_errors_listed_per_field() {
        let (status, body) = send(
            app(authenticator()),
            request("/open", Some("application/json"), r#"{"email":"nope"}"#),
        )
        .await;

        let mut errors = BTreeMap::new();
        errors.insert("email", "email must be a valid email address");

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"message": "Invalid input.", "errors": errors}));
    }

    #[tokio::test]
    async fn test_protected_body_requires_bearer() {
        let (status, body) = send(
            app(authenticator()),
            request(
                "/protected",
                Some("application/json"),
                r#"{"email":"a@b.com"}"#,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"message": "Unauthorized"}));
    }

    #[tokio::test]
    async fn test_protected_body_checked_before_token() {
        let (status, _) = send(
            app(authenticator()),
            request("/protected", Some("application/json"), r#"{"email":""}"#),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_protected_body_with_valid_token() {
        let authenticator = authenticator();
        let user_id = UserId::new();
        let token = authenticator
            .issue_token(
                &user_id.to_string(),
                &[ISSUER.to_string()],
                chrono::Duration::minutes(5),
            )
            .unwrap();

        let mut request = request(
            "/protected",
            Some("application/json"),
            r#"{"email":"a@b.com"}"#,
        );
        request.headers_mut().insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );

        let (status, body) = send(app(authenticator), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_id"], user_id.to_string());
    }
}
