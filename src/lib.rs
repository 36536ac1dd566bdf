//! Weftcache - coherent-result caching engine for hierarchical searches
//!
//! A semicoherent-over-segments search looks up, for each semicoherent
//! parameter-space point, the nearest coherent result in each of several
//! time segments. Neighboring semicoherent points frequently map to the
//! same coherent point, so this crate caches computed coherent results,
//! keyed by a per-segment locator index, and evicts them once no future
//! semicoherent point can possibly reuse them.
//!
//! # Features
//!
//! - **Retrieve-or-compute**: per-segment caches answer lookups from
//!   storage or invoke the external compute engine exactly once per key
//! - **Relevance-driven eviction**: a geometric relevance metric proves
//!   when an entry can never be reused, and a dual hash-map/heap index
//!   drops it the moment that happens
//! - **Generation-based invalidation**: expiry is O(1); stale entries
//!   become invisible through their keys and are evicted lazily
//! - **Allocation reuse**: a single retired-item slot recycles entry
//!   storage between evictions and misses
//! - **Staged partitions**: semicoherent frequency blocks subdivide into
//!   partitions processed as independent units

pub mod cache;
pub mod error;
pub mod geometry;
pub mod prelude;
pub mod queries;
pub mod report;
pub mod space;
pub mod types;

// Re-export the public API at the crate root for convenience
pub use cache::{Cache, CacheBuilder, Retrieved};
pub use error::CacheError;
pub use prelude::*;
pub use queries::{CacheQueries, QueryCounts};
