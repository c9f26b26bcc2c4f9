//! Error types for roster storage operations.

use thiserror::Error;

/// Errors that can occur during data store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataStoreError {
    /// The requested record was not found in the data store.
    #[error("record not found in data store")]
    NotFound,
    /// A record with the same identity already exists.
    #[error("record with identity {0} already exists")]
    DuplicateKey(String),
    /// A constraint other than identity uniqueness was violated.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),
    /// An internal storage system error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for DataStoreError {
    fn from(e: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        match e {
            sqlx::Error::RowNotFound => DataStoreError::NotFound,
            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::UniqueViolation => {
                    DataStoreError::DuplicateKey(db_err.message().to_string())
                }
                ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation
                | ErrorKind::ForeignKeyViolation => {
                    DataStoreError::IntegrityViolation(db_err.message().to_string())
                }
                _ => DataStoreError::Internal(db_err.to_string()),
            },
            _ => DataStoreError::Internal(e.to_string()),
        }
    }
}
