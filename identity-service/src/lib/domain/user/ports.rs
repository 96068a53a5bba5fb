use async_trait::async_trait;

use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::LoginCommand;
use crate::domain::user::models::LoginTokens;
use crate::domain::user::models::RegisterCommand;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::user::errors::AuthError;
use crate::user::errors::NotifierError;

/// Port for the registration, verification and login workflow.
#[async_trait]
pub trait AuthServicePort: Send + Sync + 'static {
    /// Register a new, unverified user and queue the verification mail.
    ///
    /// # Arguments
    /// * `command` - Validated command containing email and password
    ///
    /// # Returns
    /// Created user entity
    ///
    /// # Errors
    /// * `UserExists` - Email is already registered
    /// * `Password` - Password hashing failed
    /// * `Database` - Database operation failed
    async fn register(&self, command: RegisterCommand) -> Result<User, AuthError>;

    /// Mark the user named by a verification token as verified.
    ///
    /// # Arguments
    /// * `token` - Token carried by the verification link
    ///
    /// # Errors
    /// * `TokenInvalid` - Token is empty, invalid, expired, meant for another
    ///   audience or names an unknown user
    /// * `Database` - Database operation failed
    async fn verify_email(&self, token: &str) -> Result<(), AuthError>;

    /// Check credentials of a verified user and issue an access/refresh pair.
    ///
    /// # Arguments
    /// * `command` - Email and plaintext password
    ///
    /// # Returns
    /// Access and refresh tokens
    ///
    /// # Errors
    /// * `UserNotFound` - Unknown email or wrong password (indistinguishable)
    /// * `UserNotVerified` - User exists but has not verified the email
    /// * `Database` - Database operation failed
    async fn login(&self, command: LoginCommand) -> Result<LoginTokens, AuthError>;

    /// Issue a new access token from a refresh token.
    ///
    /// # Arguments
    /// * `refresh_token` - Refresh token from the client cookie, if any
    ///
    /// # Returns
    /// New access token
    ///
    /// # Errors
    /// * `TokenInvalid` - Token is missing or failed verification
    async fn refresh_access_token(&self, refresh_token: Option<String>)
        -> Result<String, AuthError>;

    /// End the client session.
    ///
    /// Tokens are stateless, so nothing is invalidated server side; the
    /// caller is responsible for expiring the client cookie.
    ///
    /// # Arguments
    /// * `refresh_token` - Refresh token from the client cookie, if any
    async fn logout(&self, refresh_token: Option<String>) -> Result<(), AuthError>;

    /// Retrieve the user behind an authenticated request.
    ///
    /// # Errors
    /// * `UserNotFound` - User no longer exists
    /// * `Database` - Database operation failed
    async fn current_user(&self, id: &UserId) -> Result<User, AuthError>;

    /// Check that the backing store is reachable.
    ///
    /// # Errors
    /// * `Database` - Store did not answer
    async fn check_health(&self) -> Result<(), AuthError>;
}

/// Persistence operations for user aggregate.
///
/// Implementations must enforce email uniqueness themselves; the workflow's
/// existence check is not atomic with the insert.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Retrieve user by email address.
    ///
    /// # Arguments
    /// * `email` - Email address string, compared case-sensitively
    ///
    /// # Returns
    /// Optional user entity (None if not found)
    ///
    /// # Errors
    /// * `Database` - Database operation failed
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    /// Retrieve user by identifier.
    ///
    /// # Arguments
    /// * `id` - User ID
    ///
    /// # Returns
    /// Optional user entity (None if not found)
    ///
    /// # Errors
    /// * `Database` - Database operation failed
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, AuthError>;

    /// Persist a new unverified user. The store generates the ID and
    /// timestamps.
    ///
    /// # Arguments
    /// * `email` - Validated email address
    /// * `password_hash` - Encoded password hash
    ///
    /// # Returns
    /// Created user entity
    ///
    /// # Errors
    /// * `UserExists` - Email is already registered
    /// * `Database` - Database operation failed
    async fn create(&self, email: &EmailAddress, password_hash: &str) -> Result<User, AuthError>;

    /// Set `verified_at` on a user. An already verified user keeps its
    /// original timestamp.
    ///
    /// # Arguments
    /// * `id` - User ID to mark
    ///
    /// # Errors
    /// * `UserNotFound` - User does not exist
    /// * `Database` - Database operation failed
    async fn mark_verified(&self, id: &UserId) -> Result<(), AuthError>;

    /// Round-trip to the store.
    ///
    /// # Errors
    /// * `Database` - Store did not answer
    async fn ping(&self) -> Result<(), AuthError>;
}

/// Outbound delivery of verification messages.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// Send the verification link to a freshly registered address.
    ///
    /// # Arguments
    /// * `to` - Recipient address
    /// * `verification_link` - Absolute URL carrying the verification token
    ///
    /// # Errors
    /// * `BuildFailed` - Message could not be assembled
    /// * `SendFailed` - Transport refused or failed
    async fn send_verification_email(
        &self,
        to: &EmailAddress,
        verification_link: &str,
    ) -> Result<(), NotifierError>;
}
