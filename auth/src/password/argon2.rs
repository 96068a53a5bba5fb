use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::Output;
use argon2::password_hash::PasswordHash;
use argon2::password_hash::PasswordHasher as Argon2PasswordHasher;
use argon2::password_hash::Salt;
use argon2::password_hash::SaltString;
use argon2::Algorithm;
use argon2::Argon2;
use argon2::Params;
use argon2::Version;

use super::errors::PasswordError;

/// Cost parameters for new hashes.
///
/// Only used when hashing. Verification always reads the parameters embedded
/// in the stored hash, so changing these never invalidates existing hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism (lanes)
    pub parallelism: u32,
    /// Derived key length in bytes
    pub output_len: usize,
}

impl Default for HashingParams {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 2,
            output_len: 32,
        }
    }
}

/// Password hashing implementation.
///
/// Argon2id, v19, 16-byte random salt, PHC string encoding:
/// `$argon2id$v=19$m=<mem>,t=<iter>,p=<par>$<salt>$<hash>`.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    /// Create a new password hasher with the default cost parameters.
    ///
    /// # Returns
    /// PasswordHasher instance configured with secure defaults
    pub fn new() -> Self {
        Self {
            params: Params::new(64 * 1024, 3, 2, Some(32)).unwrap_or_default(),
        }
    }

    /// Create a password hasher with explicit cost parameters.
    ///
    /// # Arguments
    /// * `params` - Memory cost, iterations, parallelism and output length
    ///
    /// # Errors
    /// * `HashingFailed` - Parameters are outside argon2's accepted ranges
    pub fn with_params(params: HashingParams) -> Result<Self, PasswordError> {
        let params = Params::new(
            params.memory_kib,
            params.iterations,
            params.parallelism,
            Some(params.output_len),
        )
        .map_err(|e| PasswordError::HashingFailed(format!("invalid parameters: {}", e)))?;

        Ok(Self { params })
    }

    /// Hash a plaintext password securely.
    ///
    /// Every call draws a fresh salt from the OS random source.
    ///
    /// # Arguments
    /// * `password` - Plaintext password to hash
    ///
    /// # Returns
    /// PHC string format hash (includes algorithm, parameters, salt, and hash)
    ///
    /// # Errors
    /// * `HashingFailed` - Password hashing operation failed
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());

        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }

    /// Verify a password against a stored hash.
    ///
    /// The key is re-derived with the parameters, version and salt embedded in
    /// `hash`, and compared to the stored key in constant time.
    ///
    /// # Arguments
    /// * `password` - Plaintext password to verify
    /// * `hash` - Stored password hash in PHC string format
    ///
    /// # Returns
    /// True if password matches, false otherwise
    ///
    /// # Errors
    /// * `MalformedHash` - Stored hash is not a well-formed argon2id PHC string
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(hash).map_err(malformed)?;

        if parsed.algorithm.as_str() != "argon2id" {
            return Err(PasswordError::MalformedHash(format!(
                "unsupported algorithm: {}",
                parsed.algorithm
            )));
        }

        let params = Params::try_from(&parsed).map_err(malformed)?;
        let version = match parsed.version {
            Some(v) => Version::try_from(v).map_err(malformed)?,
            None => Version::default(),
        };

        let salt = parsed
            .salt
            .ok_or_else(|| PasswordError::MalformedHash("missing salt".to_string()))?;
        let expected = parsed
            .hash
            .ok_or_else(|| PasswordError::MalformedHash("missing hash".to_string()))?;

        let mut salt_buf = [0u8; Salt::MAX_LENGTH];
        let salt = salt.decode_b64(&mut salt_buf).map_err(malformed)?;

        let mut derived = vec![0u8; expected.len()];
        Argon2::new(Algorithm::Argon2id, version, params)
            .hash_password_into(password.as_bytes(), salt, &mut derived)
            .map_err(malformed)?;

        let derived = Output::new(&derived).map_err(malformed)?;

        // Output equality is constant-time.
        Ok(derived == expected)
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

fn malformed(e: impl std::fmt::Display) -> PasswordError {
    PasswordError::MalformedHash(e.to_string())
}
