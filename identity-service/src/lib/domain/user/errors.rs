use thiserror::Error;

/// Error for UserId parsing failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UserIdError {
    #[error("Invalid UUID format: {0}")]
    InvalidFormat(String),
}

/// Error for EmailAddress validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("Invalid email format: {0}")]
    InvalidFormat(String),
}

/// Error for verification mail delivery
#[derive(Debug, Clone, Error)]
pub enum NotifierError {
    #[error("Failed to build message: {0}")]
    BuildFailed(String),

    #[error("Failed to deliver message: {0}")]
    SendFailed(String),

    #[error("Invalid mail transport configuration: {0}")]
    Transport(String),
}

/// Top-level error for every identity workflow operation.
///
/// The first four variants are the user-facing taxonomy; the rest carry an
/// underlying cause that is logged and never shown to the client.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("User already exists")]
    UserExists,

    #[error("User not found")]
    UserNotFound,

    #[error("User not verified")]
    UserNotVerified,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Invalid user ID: {0}")]
    InvalidUserId(#[from] UserIdError),

    #[error("Password error: {0}")]
    Password(#[from] auth::PasswordError),

    #[error("Token error: {0}")]
    Token(#[from] auth::JwtError),

    // Infrastructure errors
    #[error("Database error: {0}")]
    Database(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Error for a single verification mail job
#[derive(Debug, Clone, Error)]
pub enum VerificationError {
    #[error("Failed to sign verification token: {0}")]
    Token(#[from] auth::JwtError),

    #[error("Failed to notify user: {0}")]
    Notifier(#[from] NotifierError),
}
