//! Domain error types.

use common::ValidationError;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in storage.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The addressed entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Username {0} is already taken")]
    UsernameTaken(String),

    /// Missing, malformed, unknown or expired bearer token.
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}
