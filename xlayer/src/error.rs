use std::time::Duration;

use thiserror::Error;

/// Classification of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidOperation,
    Timeout,
    Faulted,
    Closed,
    Io,
    Wrap,
    InvalidTarget,
}

#[derive(Debug, Error)]
pub enum Error {
    /// The object was used in a way its current configuration or state forbids.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A blocking operation did not finish before its timeout elapsed.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("communication object is faulted")]
    Faulted,

    #[error("communication object is closed")]
    Closed,

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// A layer failed to wrap an inner channel.
    #[error("failed to wrap channel: {0}")]
    Wrap(String),

    #[error("invalid listen target: {0}")]
    InvalidTarget(String),
}

impl Error {
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation(message.into())
    }

    pub fn timeout(operation: &'static str, after: Duration) -> Self {
        Error::Timeout { operation, after }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidOperation(_) => ErrorKind::InvalidOperation,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Faulted => ErrorKind::Faulted,
            Error::Closed => ErrorKind::Closed,
            Error::Io(_) => ErrorKind::Io,
            Error::Wrap(_) => ErrorKind::Wrap,
            Error::InvalidTarget(_) => ErrorKind::InvalidTarget,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> std::io::Error {
        let kind = match &err {
            Error::Io(e) => e.kind(),
            Error::Timeout { .. } => std::io::ErrorKind::TimedOut,
            Error::Closed => std::io::ErrorKind::NotConnected,
            Error::InvalidOperation(_) | Error::InvalidTarget(_) => {
                std::io::ErrorKind::InvalidInput
            }
            _ => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
