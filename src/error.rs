//! Error types for cache construction, queries and retrieval
//!
//! A single crate-level error enum keeps pattern matching simple while
//! still distinguishing caller errors from fatal geometry inconsistencies
//! and propagated collaborator failures.

use std::error::Error;
use std::fmt;

/// Boxed error produced by an external collaborator (compute engine,
/// coordinate transform, lattice locator, record sink).
pub type ExternalError = Box<dyn Error + Send + Sync + 'static>;

/// Cache operation error types
#[derive(Debug)]
pub enum CacheError {
    /// Caller-detectable bad input: zero-sized constructor arguments,
    /// out-of-range query or partition indices, empty cache lists.
    InvalidArgument(String),
    /// `finalize()` was called while a query slot was never populated.
    MissingQuery(usize),
    /// Fatal internal-consistency violation: the geometry or bookkeeping
    /// produced values that can never be correct. The current search
    /// step must be aborted, never silently continued.
    Inconsistency(String),
    /// Failure propagated unchanged from an external collaborator.
    External(ExternalError),
}

impl CacheError {
    /// Create an invalid-argument error
    #[inline]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a fatal internal-consistency error
    #[inline]
    pub fn inconsistency(msg: impl Into<String>) -> Self {
        Self::Inconsistency(msg.into())
    }

    /// Wrap a collaborator failure for propagation
    #[inline]
    pub fn external(err: impl Into<ExternalError>) -> Self {
        Self::External(err.into())
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CacheError::MissingQuery(index) => write!(f, "Missing query at index {}", index),
            CacheError::Inconsistency(msg) => write!(f, "Internal inconsistency: {}", msg),
            CacheError::External(err) => write!(f, "Collaborator failure: {}", err),
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CacheError::External(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}
