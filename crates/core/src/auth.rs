//! Credential hashing for the user store. Secrets are stored only as
//! salted Argon2id PHC strings; login compares against the stored hash and
//! reports a single undifferentiated failure for unknown email or wrong
//! password.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("credential hashing failed: {0}")]
    Hash(String),
}

/// Hashes a password with a fresh random salt, producing a PHC string
/// suitable for storage.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|error| AuthError::Hash(error.to_string()))
}

/// Verifies a presented password against a stored PHC string.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<(), AuthError> {
    let parsed =
        PasswordHash::new(stored_hash).map_err(|error| AuthError::Hash(error.to_string()))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
mod tests {
    use super::{hash_password, verify_password, AuthError};

    #[test]
    fn hash_then_verify_round_trip() {
        let hash = hash_password("correct horse battery staple").expect("hash");
        verify_password("correct horse battery staple", &hash).expect("verify");
    }

    #[test]
    fn wrong_password_is_rejected() {
        let hash = hash_password("correct horse battery staple").expect("hash");
        let error = verify_password("incorrect horse", &hash).expect_err("must fail");
        assert_eq!(error, AuthError::InvalidCredentials);
    }

    #[test]
    fn each_hash_uses_a_fresh_salt() {
        let first = hash_password("same password").expect("hash");
        let second = hash_password("same password").expect("hash");
        assert_ne!(first, second);
    }

    #[test]
    fn malformed_stored_hash_is_a_hash_error() {
        let error = verify_password("anything", "not-a-phc-string").expect_err("must fail");
        assert!(matches!(error, AuthError::Hash(_)));
    }
}
