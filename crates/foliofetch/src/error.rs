//! Error types for foliofetch

use std::fmt;
use std::sync::Arc;

/// Result type alias for memoized lookups
pub type Result<T, E> = std::result::Result<T, Error<E>>;

/// Error returned from a memoized `get`
///
/// The operation's own error is shared behind an `Arc`, so every caller that
/// waited on the same execution sees the same instance.
#[derive(Debug)]
pub enum Error<E> {
    /// The wrapped operation failed
    Operation(Arc<E>),

    /// The wrapped operation panicked
    Panicked,

    /// The execution went away without producing an outcome
    Abandoned,
}

impl<E> Error<E> {
    /// The operation's error, if this is one
    pub fn operation(&self) -> Option<&Arc<E>> {
        match self {
            Error::Operation(err) => Some(err),
            _ => None,
        }
    }
}

impl<E> Clone for Error<E> {
    fn clone(&self) -> Self {
        match self {
            Error::Operation(err) => Error::Operation(Arc::clone(err)),
            Error::Panicked => Error::Panicked,
            Error::Abandoned => Error::Abandoned,
        }
    }
}

impl<E: fmt::Display> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Operation(err) => write!(f, "Operation failed: {}", err),
            Error::Panicked => write!(f, "Operation panicked"),
            Error::Abandoned => write!(f, "Operation abandoned before completing"),
        }
    }
}

impl<E> std::error::Error for Error<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Operation(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl<E> From<E> for Error<E> {
    fn from(err: E) -> Self {
        Error::Operation(Arc::new(err))
    }
}
