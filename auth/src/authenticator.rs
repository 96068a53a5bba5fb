use chrono::Duration;

use crate::jwt::JwtError;
use crate::jwt::TokenSigner;
use crate::password::PasswordError;
use crate::password::PasswordHasher;

/// Authentication coordinator combining password verification and token issuance.
///
/// Stateless and `Sync`: one instance is built at process start and shared
/// by reference between every request.
pub struct Authenticator {
    password_hasher: PasswordHasher,
    token_signer: TokenSigner,
}

/// Result of successful authentication.
pub struct AuthenticationResult {
    /// Short-lived bearer token
    pub access_token: String,
    /// Long-lived token used to mint new access tokens
    pub refresh_token: String,
}

/// Authentication operation errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthenticationError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Password error: {0}")]
    PasswordError(#[from] PasswordError),

    #[error("JWT error: {0}")]
    JwtError(#[from] JwtError),
}

impl Authenticator {
    /// Create a new authenticator.
    ///
    /// # Arguments
    /// * `password_hasher` - Hasher used for new and stored credentials
    /// * `token_signer` - Signer used for every issued token
    ///
    /// # Returns
    /// Configured Authenticator instance
    pub fn new(password_hasher: PasswordHasher, token_signer: TokenSigner) -> Self {
        Self {
            password_hasher,
            token_signer,
        }
    }

    /// Issuer of every token this authenticator signs.
    pub fn issuer(&self) -> &str {
        self.token_signer.issuer()
    }

    /// Hash a password for storage.
    ///
    /// # Errors
    /// * `PasswordError` - Hashing operation failed
    pub fn hash_password(&self, password: &str) -> Result<String, PasswordError> {
        self.password_hasher.hash(password)
    }

    /// Check a password against a stored hash.
    ///
    /// # Errors
    /// * `PasswordError` - Stored hash is malformed
    pub fn verify_password(
        &self,
        password: &str,
        stored_hash: &str,
    ) -> Result<bool, PasswordError> {
        self.password_hasher.verify(password, stored_hash)
    }

    /// Verify credentials and issue an access/refresh token pair.
    ///
    /// # Arguments
    /// * `password` - Plaintext password to verify
    /// * `stored_hash` - Stored password hash
    /// * `subject` - Subject written to both tokens
    /// * `audience` - Audience written to both tokens
    /// * `access_ttl` - Access token lifetime
    /// * `refresh_ttl` - Refresh token lifetime
    ///
    /// # Returns
    /// AuthenticationResult with both tokens
    ///
    /// # Errors
    /// * `InvalidCredentials` - Password does not match
    /// * `PasswordError` - Stored hash is malformed
    /// * `JwtError` - Token generation failed
    pub fn authenticate(
        &self,
        password: &str,
        stored_hash: &str,
        subject: &str,
        audience: &[String],
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<AuthenticationResult, AuthenticationError> {
        if !self.password_hasher.verify(password, stored_hash)? {
            return Err(AuthenticationError::InvalidCredentials);
        }

        let access_token = self.token_signer.sign(subject, audience, access_ttl)?;
        let refresh_token = self.token_signer.sign(subject, audience, refresh_ttl)?;

        Ok(AuthenticationResult {
            access_token,
            refresh_token,
        })
    }

    /// Issue a token without password verification.
    ///
    /// Used for refresh flows and verification links, where the caller has
    /// already established who the subject is.
    ///
    /// # Errors
    /// * `JwtError` - Token generation failed
    pub fn issue_token(
        &self,
        subject: &str,
        audience: &[String],
        ttl: Duration,
    ) -> Result<String, JwtError> {
        self.token_signer.sign(subject, audience, ttl)
    }

    /// Validate a token and return its subject.
    ///
    /// # Errors
    /// * `InvalidToken` - Token failed validation
    pub fn validate_token(&self, token: &str) -> Result<String, JwtError> {
        self.token_signer.verify(token)
    }

    /// Validate a token bound to `audience` and return its subject.
    ///
    /// # Errors
    /// * `InvalidToken` - Token failed validation or names another audience
    pub fn validate_token_for(&self, token: &str, audience: &str) -> Result<String, JwtError> {
        self.token_signer.verify_for(token, audience)
    }
}
