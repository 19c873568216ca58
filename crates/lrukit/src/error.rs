//! Error types for lrukit

use std::fmt;

/// Result type alias for lrukit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cache operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Cache constructed with a capacity that cannot hold any entry
    InvalidCapacity(usize),

    /// Entry behind an [`EntryRef`](crate::EntryRef) was evicted, removed or replaced
    StaleReference,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidCapacity(capacity) => {
                write!(f, "Invalid capacity: {} (must be at least 1)", capacity)
            }
            Error::StaleReference => write!(f, "Stale reference: entry is no longer cached"),
        }
    }
}

impl std::error::Error for Error {}
