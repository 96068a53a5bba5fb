//! Credential primitives for the identity service
//!
//! Provides the stateless building blocks of authentication:
//! - Password hashing (Argon2id, PHC-encoded, constant-time verification)
//! - Signed token issuance and verification (HS256 JWT, pinned algorithm)
//! - Authentication coordination
//!
//! Nothing here performs I/O or holds mutable state; every type is safe to
//! share between concurrent callers.
//!
//! # Examples
//!
//! ## Password Hashing
//! ```
//! use auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::new();
//! let hash = hasher.hash("my_password").unwrap();
//! let is_valid = hasher.verify("my_password", &hash).unwrap();
//! assert!(is_valid);
//! ```
//!
//! ## Signed Tokens
//! ```
//! use auth::TokenSigner;
//! use chrono::Duration;
//!
//! let signer = TokenSigner::new(b"secret_key_at_least_32_bytes_long!", "https://id.example.com");
//! let audience = vec!["https://id.example.com".to_string()];
//! let token = signer.sign("user123", &audience, Duration::minutes(15)).unwrap();
//! assert_eq!(signer.verify(&token).unwrap(), "user123");
//! ```
//!
//! ## Complete Authentication Flow
//! ```
//! use auth::{Authenticator, PasswordHasher, TokenSigner};
//! use chrono::Duration;
//!
//! let auth = Authenticator::new(
//!     PasswordHasher::new(),
//!     TokenSigner::new(b"secret_key_at_least_32_bytes_long!", "https://id.example.com"),
//! );
//!
//! // Register: hash password
//! let hash = auth.hash_password("password123").unwrap();
//!
//! // Login: verify and issue tokens
//! let audience = vec![auth.issuer().to_string()];
//! let result = auth
//!     .authenticate(
//!         "password123",
//!         &hash,
//!         "user123",
//!         &audience,
//!         Duration::minutes(15),
//!         Duration::days(7),
//!     )
//!     .unwrap();
//!
//! // Validate token
//! let subject = auth.validate_token(&result.access_token).unwrap();
//! assert_eq!(subject, "user123");
//! ```

pub mod authenticator;
pub mod jwt;
pub mod password;

// Re-export commonly used items
pub use authenticator::AuthenticationError;
pub use authenticator::AuthenticationResult;
pub use authenticator::Authenticator;
pub use jwt::Claims;
pub use jwt::JwtError;
pub use jwt::TokenSigner;
pub use password::HashingParams;
pub use password::PasswordError;
pub use password::PasswordHasher;
