use thiserror::Error;

use crate::Version;

/// Errors that can occur when interacting with the table store.
#[derive(Debug, Error)]
pub enum TableStoreError {
    /// A concurrency conflict occurred when saving a record.
    /// The expected version did not match the stored version.
    #[error(
        "Concurrency conflict for {entity}/{key}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        entity: String,
        key: String,
        expected: Version,
        actual: Version,
    },

    /// The record was not found in the store.
    #[error("Record not found: {entity}/{key}")]
    RecordNotFound { entity: String, key: String },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for table store operations.
pub type Result<T> = std::result::Result<T, TableStoreError>;
