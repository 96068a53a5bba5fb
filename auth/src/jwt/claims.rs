use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Registered JWT claims carried by every token this crate issues.
///
/// `aud` doubles as a purpose tag: a token minted for the email verification
/// endpoint names that endpoint, access and refresh tokens name the issuer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user identifier)
    pub sub: String,

    /// Intended audiences
    pub aud: Vec<String>,

    /// Issuer
    pub iss: String,

    /// JWT ID (random nonce)
    pub jti: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Create claims valid from now until now + `ttl`.
    ///
    /// # Arguments
    /// * `subject` - Unique subject identifier
    /// * `audience` - Intended audiences of the token
    /// * `issuer` - Issuer recorded in the token
    /// * `ttl` - Lifetime; a negative value yields an already-expired token
    ///
    /// # Returns
    /// Claims with a fresh random `jti`
    pub fn new(
        subject: impl ToString,
        audience: &[String],
        issuer: impl ToString,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            sub: subject.to_string(),
            aud: audience.to_vec(),
            iss: issuer.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_claims() {
        let audience = vec!["https://example.com".to_string()];
        let claims = Claims::new(
            "user123",
            &audience,
            "https://example.com",
            Duration::hours(24),
        );

        assert_eq!(claims.sub, "user123");
        assert_eq!(claims.iss, "https://example.com");
        assert_eq!(claims.aud, audience);
        assert_eq!(claims.iat, claims.nbf);
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
    }

    #[test]
    fn test_each_token_gets_its_own_id() {
        let first = Claims::new("user123", &[], "issuer", Duration::minutes(5));
        let second = Claims::new("user123", &[], "issuer", Duration::minutes(5));

        assert_ne!(first.jti, second.jti);
    }

}
