use chrono::Duration;
use jsonwebtoken::decode;
use jsonwebtoken::encode;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;

use super::claims::Claims;
use super::errors::JwtError;

/// Issues and verifies compact signed tokens.
///
/// The signing algorithm is pinned to HS256: a token whose header names any
/// other algorithm is rejected before its signature is looked at. Tokens are
/// stateless, so nothing is stored server side and nothing can be revoked
/// before `exp`.
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    issuer: String,
}

impl TokenSigner {
    /// Create a new token signer with a secret key.
    ///
    /// # Arguments
    /// * `secret` - Secret key for signing tokens (should be stored securely)
    /// * `issuer` - Value written to and required in the `iss` claim
    ///
    /// # Returns
    /// TokenSigner instance configured with HS256 algorithm
    ///
    /// # Security Notes
    /// - The secret should be at least 256 bits (32 bytes) for HS256
    /// - Store secrets in environment variables or secure vaults, never in code
    pub fn new(secret: &[u8], issuer: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
            issuer: issuer.into(),
        }
    }

    /// Issuer recorded in every token.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Sign a token for `subject`.
    ///
    /// # Arguments
    /// * `subject` - Subject identifier (user ID)
    /// * `audience` - Intended audiences, used as a purpose tag
    /// * `ttl` - Token lifetime
    ///
    /// # Returns
    /// Compact JWT string
    ///
    /// # Errors
    /// * `EncodingFailed` - Token encoding failed
    pub fn sign(
        &self,
        subject: &str,
        audience: &[String],
        ttl: Duration,
    ) -> Result<String, JwtError> {
        let claims = Claims::new(subject, audience, &self.issuer, ttl);
        self.encode(&claims)
    }

    /// Encode prepared claims.
    ///
    /// # Errors
    /// * `EncodingFailed` - Token encoding failed
    pub fn encode(&self, claims: &Claims) -> Result<String, JwtError> {
        let header = Header::new(self.algorithm);

        encode(&header, claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingFailed(e.to_string()))
    }

    /// Verify a token and return its subject.
    ///
    /// Checks structure, algorithm, signature, issuer and the
    /// `nbf <= now <= exp` window. The audience is not checked.
    ///
    /// # Errors
    /// * `InvalidToken` - Any check failed
    pub fn verify(&self, token: &str) -> Result<String, JwtError> {
        self.decode(token, None).map(|claims| claims.sub)
    }

    /// Verify a token that must name `audience` among its audiences.
    ///
    /// # Errors
    /// * `InvalidToken` - Any check failed, including a missing audience
    pub fn verify_for(&self, token: &str, audience: &str) -> Result<String, JwtError> {
        self.decode(token, Some(audience)).map(|claims| claims.sub)
    }

    /// Decode and validate a token, returning all of its claims.
    ///
    /// # Errors
    /// * `InvalidToken` - Any check failed
    pub fn decode(&self, token: &str, audience: Option<&str>) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf", "iat", "sub", "iss"]);
        validation.set_issuer(&[self.issuer.as_str()]);

        match audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(reason = ?e.kind(), "Token rejected");
                JwtError::InvalidToken
            })
    }
}
