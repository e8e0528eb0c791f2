//! Password hashing with Argon2id.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use rand::{RngCore, rngs::OsRng};

use crate::error::DomainError;

const SALT_BYTES: usize = 16;

/// Hashes a password into a PHC string.
pub fn hash_password(password: &str) -> Result<String, DomainError> {
    let mut salt = [0_u8; SALT_BYTES];
    OsRng.fill_bytes(&mut salt);
    let salt =
        SaltString::encode_b64(&salt).map_err(|e| DomainError::PasswordHash(e.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DomainError::PasswordHash(e.to_string()))
}

/// Checks a password against a stored PHC string.
///
/// A stored value that is not a valid PHC string never verifies.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
