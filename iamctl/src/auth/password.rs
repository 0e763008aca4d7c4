//! Password hashing, verification and generation.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::{Engine as _, engine::general_purpose};
use rand::prelude::RngExt;
use rand::rng;

use crate::config::PasswordConfig;
use crate::errors::Error;

const PASSWORD_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz23456789";

/// Argon2 hashing parameters.
#[derive(Debug, Clone, Copy)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Argon2Params {
    fn to_argon2(self) -> Result<Argon2<'static>, Error> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None).map_err(|e| Error::Internal {
            operation: format!("create argon2 params: {e}"),
        })?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_kib: 19456, // 19 MB
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl From<&PasswordConfig> for Argon2Params {
    fn from(config: &PasswordConfig) -> Self {
        Self {
            memory_kib: config.argon2_memory_kib,
            iterations: config.argon2_iterations,
            parallelism: config.argon2_parallelism,
        }
    }
}

/// Hash a string using Argon2id.
pub fn hash_string_with_params(input: &str, params: Argon2Params) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = params.to_argon2()?;

    let hash = argon2.hash_password(input.as_bytes(), &salt).map_err(|e| Error::Internal {
        operation: format!("hash string: {e}"),
    })?;

    Ok(hash.to_string())
}

/// Verify a string against a hash.
///
/// Note: Verification uses the parameters embedded in the hash itself.
pub fn verify_string(input: &str, hash: &str) -> Result<bool, Error> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| Error::Internal {
        operation: format!("parse hash: {e}"),
    })?;

    let argon2 = Argon2::default();
    Ok(argon2.verify_password(input.as_bytes(), &parsed_hash).is_ok())
}

/// Hash a password on a blocking thread to avoid stalling the async runtime
pub async fn hash_password(password: &str, params: Argon2Params) -> Result<String, Error> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_string_with_params(&password, params))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })?
}

/// Verify a password on a blocking thread
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, Error> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || verify_string(&password, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })?
}

/// Check a candidate password against the configured length bounds.
pub fn validate_length(password: &str, config: &PasswordConfig) -> Result<(), Error> {
    let length = password.chars().count();
    if length < config.min_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at least {} characters", config.min_length),
        });
    }
    if length > config.max_length {
        return Err(Error::BadRequest {
            message: format!("Password must be no more than {} characters", config.max_length),
        });
    }
    Ok(())
}

/// Generate an initial credential for a new employee.
///
/// Ambiguous glyphs (`0/O`, `1/l/I`) are left out because the password is read from an email.
pub fn generate_password(length: usize) -> String {
    let mut rng = rng();
    (0..length)
        .map(|_| PASSWORD_ALPHABET[rng.random_range(0..PASSWORD_ALPHABET.len())] as char)
        .collect()
}

/// Generate a secure random token for password reset
pub fn generate_reset_token() -> String {
    // Generate 32 bytes (256 bits) of cryptographically secure random data
    let mut token_bytes = [0u8; 32];
    rng().fill(&mut token_bytes);

    // Encode as base64url without padding
    general_purpose::URL_SAFE_NO_PAD.encode(token_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Cheap parameters so the tests stay fast
    fn test_params() -> Argon2Params {
        Argon2Params {
            memory_kib: 128,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_string_hashing() {
        let input = "test_password_123";
        let hash = hash_string_with_params(input, test_params()).unwrap();

        assert!(!hash.is_empty());
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_string(input, &hash).unwrap());
        assert!(!verify_string("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_same_input_different_hashes() {
        let hash1 = hash_string_with_params("same_password", test_params()).unwrap();
        let hash2 = hash_string_with_params("same_password", test_params()).unwrap();

        // Salted, so the hashes differ but both verify
        assert_ne!(hash1, hash2);
        assert!(verify_string("same_password", &hash1).unwrap());
        assert!(verify_string("same_password", &hash2).unwrap());
    }

    #[tokio::test]
    async fn test_async_hash_and_verify() {
        let hash = hash_password("correct horse", test_params()).await.unwrap();
        assert!(verify_password("correct horse", &hash).await.unwrap());
        assert!(!verify_password("battery staple", &hash).await.unwrap());
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        let result = verify_string("anything", "not-a-phc-string");
        assert!(matches!(result, Err(Error::Internal { .. })));
    }

    #[test]
    fn test_validate_length() {
        let config = PasswordConfig::default();
        assert!(validate_length("short", &config).is_err());
        assert!(validate_length("long-enough", &config).is_ok());

        let too_long = "x".repeat(config.max_length + 1);
        let err = validate_length(&too_long, &config).unwrap_err();
        assert_eq!(
            err.user_message(),
            format!("Password must be no more than {} characters", config.max_length)
        );
    }

    #[test]
    fn test_generate_password() {
        let password = generate_password(12);
        assert_eq!(password.len(), 12);
        assert!(password.bytes().all(|b| PASSWORD_ALPHABET.contains(&b)));
        assert_ne!(generate_password(12), generate_password(12));
    }

    #[test]
    fn test_generate_reset_token() {
        let token1 = generate_reset_token();
        let token2 = generate_reset_token();

        assert_ne!(token1, token2);

        // base64url encoded, 43 chars for 32 bytes, no padding
        assert_eq!(token1.len(), 43);
        assert!(token1.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(!token1.contains('='));
    }
}
