//! Error types for the lockstep primitives

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can be raised by the concurrency primitives
///
/// Ordinary negative outcomes are not errors: a withdrawal against an
/// insufficient balance returns `false` and a drained, completed queue
/// returns `None`.
#[derive(Error, Debug)]
pub enum Error {
    /// The caller passed a value the operation cannot accept
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not permitted in the current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// No account is registered under the given identity
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// The external log sink rejected a batch
    #[error("Log sink error: {0}")]
    Sink(String),

    /// A background worker thread panicked; carries the panic message
    #[error("Worker thread panicked: {0}")]
    WorkerPanicked(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for [`Error::InvalidArgument`]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    /// Shorthand for [`Error::InvalidOperation`]
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation(message.into())
    }
}
