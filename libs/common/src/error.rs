//! Custom error types for the common library
//!
//! Storage-level failures shared by every service: PostgreSQL and the
//! S3-compatible image bucket.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred while bootstrapping the schema
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

impl DatabaseError {
    /// True when the failed statement hit a unique constraint
    pub fn is_unique_violation(&self) -> bool {
        self.database_error()
            .is_some_and(|e| e.is_unique_violation())
    }

    /// True when the failed statement referenced a missing row
    pub fn is_foreign_key_violation(&self) -> bool {
        self.database_error()
            .is_some_and(|e| e.is_foreign_key_violation())
    }

    fn database_error(&self) -> Option<&dyn sqlx::error::DatabaseError> {
        match self {
            DatabaseError::Connection(e) | DatabaseError::Query(e) => e.as_database_error(),
            _ => None,
        }
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Errors raised by the object storage client
#[derive(Error, Debug)]
pub enum StorageError {
    /// The bucket could not be created or inspected
    #[error("Bucket error: {0}")]
    Bucket(String),

    /// Upload failed
    #[error("Failed to upload object {key}: {message}")]
    Upload { key: String, message: String },

    /// Removal failed
    #[error("Failed to delete object {key}: {message}")]
    Delete { key: String, message: String },
}

pub type StorageResult<T> = Result<T, StorageError>;
