use common::{EntityClass, ValidationError};
use thiserror::Error;

/// Errors that can occur when interacting with storage.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed row does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A freshly allocated identifier was already taken.
    ///
    /// The allocator hands out each sequence number once, so this signals a
    /// bug or out-of-band tampering with the counter, not a user error.
    #[error("Allocated {class} identifier {id} already exists")]
    AllocationConflict { class: EntityClass, id: String },

    /// Storage could not complete the operation.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Input was rejected before reaching storage.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
