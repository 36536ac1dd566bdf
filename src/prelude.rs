//! Weftcache prelude - convenient imports for users
//!
//! This module provides everything the search driver needs to work with
//! the cache engine.

// Re-export the public API
pub use crate::cache::{Cache, CacheBuilder, Retrieved};
pub use crate::queries::{CacheQueries, QueryCounts};

// Re-export the error type that every operation returns
pub use crate::error::CacheError;

// Re-export core value types appearing in collaborator signatures
pub use crate::types::{BlockLookup, PhysicalPoint, ReducedPoint, TilingStats};

// Re-export collaborator traits the enclosing search must implement
pub use crate::space::{BlockLocator, ComputeEngine, ReducedTransform, Tiling};

// Re-export reporting hooks
pub use crate::report::{mean_peak_size, write_report, JsonRecordSink, RecordSink};
