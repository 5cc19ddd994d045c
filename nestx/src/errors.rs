use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};

/// Error kinds for transaction coordination
///
/// Each kind names one category of failure so callers can branch on
/// [`TxError::kind`] instead of matching on messages.
///
/// # Examples
///
/// ```rust
/// use nestx::errors::{ErrorKind, TxError, TxResult};
///
/// fn example() -> TxResult<()> {
///     Err(TxError::new("main database transaction already closed", ErrorKind::AlreadyClosed))
/// }
///
/// assert_eq!(example().unwrap_err().kind(), &ErrorKind::AlreadyClosed);
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Lifecycle Errors - raised by the transaction manager
    /// The transaction id is no longer registered (double close or forged id)
    AlreadyClosed,
    /// The underlying handle failed to begin a transaction
    BeginFailure,
    /// The underlying handle failed to commit
    CommitFailure,
    /// The underlying handle failed to roll back
    RollbackFailure,
    /// A transaction was required but none is reachable from the context
    NotOpenTransaction,
    /// A panic was observed inside the guarded region
    CapturedFault,
    /// A transaction guard was dropped without being closed
    Abandoned,

    // Backend Errors - raised by database adapters
    /// Generic error from a database adapter
    BackendError,
    /// A write was attempted through a read-only handle
    ReadOnlyViolation,
    /// A unique constraint was violated
    UniqueConstraintViolation,

    // Operation Errors
    /// The operation is not valid in the current state
    InvalidOperation,
    /// Failure reported by application code as the outcome of a guarded block
    Application,
    /// IO failure surfaced through an adapter
    IOError,

    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::AlreadyClosed => write!(f, "Already closed"),
            ErrorKind::BeginFailure => write!(f, "Begin failure"),
            ErrorKind::CommitFailure => write!(f, "Commit failure"),
            ErrorKind::RollbackFailure => write!(f, "Rollback failure"),
            ErrorKind::NotOpenTransaction => write!(f, "Not open transaction"),
            ErrorKind::CapturedFault => write!(f, "Captured fault"),
            ErrorKind::Abandoned => write!(f, "Abandoned"),
            ErrorKind::BackendError => write!(f, "Backend error"),
            ErrorKind::ReadOnlyViolation => write!(f, "Read-only violation"),
            ErrorKind::UniqueConstraintViolation => write!(f, "Unique constraint violation"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::Application => write!(f, "Application error"),
            ErrorKind::IOError => write!(f, "IO error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Error type for every fallible operation in this crate.
///
/// `TxError` carries a message, an [`ErrorKind`] and an optional cause. A
/// rollback failure keeps the caller's original failure as its cause, so
/// walking [`Error::source`] always reaches the outcome that triggered the
/// rollback.
///
/// # Examples
///
/// ```rust
/// use nestx::errors::{ErrorKind, TxError};
///
/// let outcome = TxError::new("insert rejected", ErrorKind::Application);
/// let err = TxError::new_with_cause(
///     "main database transaction rollback error: connection reset",
///     ErrorKind::RollbackFailure,
///     outcome,
/// );
/// assert_eq!(err.cause().unwrap().kind(), &ErrorKind::Application);
/// ```
#[derive(Clone)]
pub struct TxError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<TxError>>,
    backtrace: Atomic<Backtrace>,
}

impl TxError {
    /// Creates a new `TxError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        TxError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `TxError` that wraps `cause`.
    ///
    /// # Arguments
    ///
    /// * `message` - A description of the error
    /// * `error_kind` - The category of error
    /// * `cause` - The underlying error, preserved for inspection and `source()`
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: TxError) -> Self {
        TxError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&TxError> {
        self.cause.as_deref()
    }

    /// Returns the innermost error of the cause chain.
    pub fn root_cause(&self) -> &TxError {
        let mut current = self;
        while let Some(cause) = current.cause() {
            current = cause;
        }
        current
    }
}

impl Display for TxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}, wrap: {}", self.message, cause),
            None => write!(f, "{}", self.message),
        }
    }
}

impl Debug for TxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for TxError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for coordinator operations.
pub type TxResult<T> = Result<T, TxError>;

impl From<std::io::Error> for TxError {
    fn from(err: std::io::Error) -> Self {
        TxError::new(&format!("IO error: {}", err), ErrorKind::IOError)
    }
}

impl From<String> for TxError {
    fn from(msg: String) -> Self {
        TxError::new(&msg, ErrorKind::Application)
    }
}

impl From<&str> for TxError {
    fn from(msg: &str) -> Self {
        TxError::new(msg, ErrorKind::Application)
    }
}
