//! Session token generation and digesting.
//!
//! Tokens are `st_` followed by 64 lowercase hex characters. Only the
//! SHA-256 digest of a token is ever persisted.

use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

/// Session token prefix.
pub const SESSION_TOKEN_PREFIX: &str = "st";

/// Number of secret bytes encoded in a token.
const SESSION_TOKEN_SECRET_BYTES: usize = 32;

/// Generates a new random session token.
pub fn generate_session_token() -> String {
    let mut secret = [0_u8; SESSION_TOKEN_SECRET_BYTES];
    OsRng.fill_bytes(&mut secret);
    format!("{SESSION_TOKEN_PREFIX}_{}", hex::encode(secret))
}

/// Returns the hex SHA-256 digest under which a token is stored.
pub fn hash_session_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// True if `token` has the shape of a session token.
pub(crate) fn is_well_formed(token: &str) -> bool {
    token
        .strip_prefix(SESSION_TOKEN_PREFIX)
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|secret| {
            secret.len() == SESSION_TOKEN_SECRET_BYTES * 2
                && secret.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        })
}
