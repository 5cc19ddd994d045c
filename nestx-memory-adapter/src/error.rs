use nestx::errors::{ErrorKind, TxError};
use thiserror::Error;

/// Error type for the in-memory database.
///
/// Converted into [`TxError`] at the adapter boundary so application code
/// deals with a single error type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MemoryError {
    /// The table was never created
    #[error("no such table: {0}")]
    NoSuchTable(String),
    /// A row with the same key already exists
    #[error("UNIQUE constraint failed: {table}.{key}")]
    UniqueViolation { table: String, key: String },
    /// A write was attempted through a read-only view
    #[error("attempt to write a readonly database")]
    ReadOnly,
    /// The transaction already committed or rolled back
    #[error("transaction has already been committed or rolled back")]
    Finished,
    /// Commit or rollback on a handle that is not a transaction
    #[error("cannot {0} - no transaction is active")]
    NotInTransaction(&'static str),
    /// Begin on a handle that is already a transaction
    #[error("cannot start a transaction within a transaction")]
    NestedBegin,
    /// Failure requested through the fault injector
    #[error("injected {0} failure")]
    Injected(&'static str),
}

impl From<MemoryError> for TxError {
    fn from(err: MemoryError) -> Self {
        let kind = match &err {
            MemoryError::UniqueViolation { .. } => ErrorKind::UniqueConstraintViolation,
            MemoryError::ReadOnly => ErrorKind::ReadOnlyViolation,
            MemoryError::Finished | MemoryError::NotInTransaction(_) | MemoryError::NestedBegin => {
                ErrorKind::InvalidOperation
            }
            MemoryError::NoSuchTable(_) | MemoryError::Injected(_) => ErrorKind::BackendError,
        };
        TxError::new(&err.to_string(), kind)
    }
}

/// Result type used inside the adapter.
pub type MemoryResult<T> = Result<T, MemoryError>;
