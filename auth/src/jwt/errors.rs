use thiserror::Error;

/// Error type for JWT operations.
///
/// Verification failures are deliberately opaque: expired, not yet valid,
/// tampered, wrong algorithm and wrong audience all surface as `InvalidToken`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    EncodingFailed(String),

    #[error("Token is invalid")]
    InvalidToken,
}
