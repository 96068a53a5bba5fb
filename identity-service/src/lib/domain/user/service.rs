use std::sync::Arc;

use async_trait::async_trait;
use auth::AuthenticationError;
use auth::Authenticator;
use chrono::Duration;

use crate::domain::user::models::LoginCommand;
use crate::domain::user::models::LoginTokens;
use crate::domain::user::models::RegisterCommand;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::verification::VerificationJob;
use crate::domain::user::verification::VerificationQueue;
use crate::user::errors::AuthError;
use crate::user::ports::AuthServicePort;
use crate::user::ports::UserRepository;

/// Token audiences and lifetimes used by the workflow.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Audience of access and refresh tokens (the issuer URL)
    pub issuer_audience: String,
    /// Audience of verification tokens (the verify endpoint URL)
    pub verify_audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

/// Domain service implementation for the identity workflow.
///
/// A user moves from unregistered to unverified on `register` and from
/// unverified to verified on `verify_email`. `login` only succeeds for
/// verified users.
pub struct AuthService<UR>
where
    UR: UserRepository,
{
    repository: Arc<UR>,
    authenticator: Arc<Authenticator>,
    verification_queue: VerificationQueue,
    settings: AuthSettings,
}

impl<UR> AuthService<UR>
where
    UR: UserRepository,
{
    /// Create a new auth service with injected dependencies.
    ///
    /// # Arguments
    /// * `repository` - User persistence implementation
    /// * `authenticator` - Shared password hasher and token signer
    /// * `verification_queue` - Queue feeding the verification mail worker
    /// * `settings` - Token audiences and lifetimes
    ///
    /// # Returns
    /// Configured auth service instance
    pub fn new(
        repository: Arc<UR>,
        authenticator: Arc<Authenticator>,
        verification_queue: VerificationQueue,
        settings: AuthSettings,
    ) -> Self {
        Self {
            repository,
            authenticator,
            verification_queue,
            settings,
        }
    }

    // Argon2 is CPU bound, keep it off the async workers.
    async fn hash_password(&self, password: String) -> Result<String, AuthError> {
        let authenticator = Arc::clone(&self.authenticator);

        tokio::task::spawn_blocking(move || authenticator.hash_password(&password))
            .await
            .map_err(|e| AuthError::Unknown(format!("Hashing task failed: {}", e)))?
            .map_err(AuthError::from)
    }

    async fn issue_login_tokens(
        &self,
        user: &User,
        password: String,
    ) -> Result<LoginTokens, AuthError> {
        let authenticator = Arc::clone(&self.authenticator);
        let stored_hash = user.password_hash.clone();
        let subject = user.id.to_string();
        let audience = vec![self.settings.issuer_audience.clone()];
        let access_ttl = self.settings.access_ttl;
        let refresh_ttl = self.settings.refresh_ttl;

        let result = tokio::task::spawn_blocking(move || {
            authenticator.authenticate(
                &password,
                &stored_hash,
                &subject,
                &audience,
                access_ttl,
                refresh_ttl,
            )
        })
        .await
        .map_err(|e| AuthError::Unknown(format!("Authentication task failed: {}", e)))?
        .map_err(|e| match e {
            AuthenticationError::InvalidCredentials => AuthError::UserNotFound,
            AuthenticationError::PasswordError(err) => AuthError::Password(err),
            AuthenticationError::JwtError(err) => AuthError::Token(err),
        })?;

        Ok(LoginTokens {
            access_token: result.access_token,
            refresh_token: result.refresh_token,
        })
    }

    fn subject_of(&self, token: &str, audience: &str) -> Result<UserId, AuthError> {
        let subject = self
            .authenticator
            .validate_token_for(token, audience)
            .map_err(|_| AuthError::TokenInvalid)?;

        UserId::from_string(&subject).map_err(|_| AuthError::TokenInvalid)
    }
}

#[async_trait]
impl<UR> AuthServicePort for AuthService<UR>
where
    UR: UserRepository,
{
    async fn register(&self, command: RegisterCommand) -> Result<User, AuthError> {
        if self
            .repository
            .find_by_email(command.email.as_str())
            .await?
            .is_some()
        {
            return Err(AuthError::UserExists);
        }

        let password_hash = self.hash_password(command.password).await?;

        // Creating the user and queueing its mail happen together in a task the
        // caller cannot cancel. The store's unique constraint catches a
        // concurrent registration.
        let repository = Arc::clone(&self.repository);
        let verification_queue = self.verification_queue.clone();
        let email = command.email;
        let user = tokio::spawn(async move {
            let user = repository.create(&email, &password_hash).await?;
            tracing::info!(user_id = %user.id, "User registered");
            verification_queue.submit(VerificationJob::from(&user));
            Ok::<_, AuthError>(user)
        })
        .await
        .map_err(|e| AuthError::Unknown(format!("Registration task failed: {}", e)))??;

        Ok(user)
    }

    async fn verify_email(&self, token: &str) -> Result<(), AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::TokenInvalid);
        }

        let user_id = self.subject_of(token, &self.settings.verify_audience)?;

        self.repository
            .mark_verified(&user_id)
            .await
            .map_err(|e| match e {
                AuthError::UserNotFound => AuthError::TokenInvalid,
                other => other,
            })?;

        tracing::info!(user_id = %user_id, "Email verified");

        Ok(())
    }

    async fn login(&self, command: LoginCommand) -> Result<LoginTokens, AuthError> {
        let user = self
            .repository
            .find_by_email(&command.email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !user.is_verified() {
            return Err(AuthError::UserNotVerified);
        }

        let tokens = self.issue_login_tokens(&user, command.password).await?;

        tracing::info!(user_id = %user.id, "User logged in");

        Ok(tokens)
    }

    async fn refresh_access_token(
        &self,
        refresh_token: Option<String>,
    ) -> Result<String, AuthError> {
        let token = refresh_token
            .filter(|token| !token.trim().is_empty())
            .ok_or(AuthError::TokenInvalid)?;

        let user_id = self.subject_of(&token, &self.settings.issuer_audience)?;

        let access_token = self.authenticator.issue_token(
            &user_id.to_string(),
            std::slice::from_ref(&self.settings.issuer_audience),
            self.settings.access_ttl,
        )?;

        tracing::debug!(user_id = %user_id, "Access token refreshed");

        Ok(access_token)
    }

    async fn logout(&self, refresh_token: Option<String>) -> Result<(), AuthError> {
        match refresh_token.map(|token| self.subject_of(&token, &self.settings.issuer_audience)) {
            Some(Ok(user_id)) => tracing::info!(user_id = %user_id, "User logged out"),
            Some(Err(_)) => tracing::debug!("Logout with invalid refresh token"),
            None => tracing::debug!("Logout without refresh token"),
        }

        Ok(())
    }

    async fn current_user(&self, id: &UserId) -> Result<User, AuthError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    async fn check_health(&self) -> Result<(), AuthError> {
        self.repository.ping().await
    }
}
