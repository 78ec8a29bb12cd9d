//! Crate-level error type
//!
//! Fine-grained errors live next to the component that produces them
//! (`queue::StoreError`, `registry::DeliveryError`); this type is what the
//! server's top-level entry points return.

use crate::queue::StoreError;

/// Error type for server-level operations
#[derive(Debug)]
pub enum Error {
    /// Socket-level I/O failure (bind, accept)
    Io(std::io::Error),
    /// Pending-queue persistence failure
    Store(StoreError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Store(e) => write!(f, "queue store error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Store(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Error::Store(e)
    }
}

/// Result alias for server-level operations
pub type Result<T> = std::result::Result<T, Error>;
