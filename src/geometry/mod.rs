//! Pure parameter-space geometry helpers
//!
//! Partition splitting of frequency blocks and the relevance offsets
//! derived from lattice bounding boxes. Everything here is deterministic
//! arithmetic over tiling statistics; no cache state is touched.

mod partition;
mod relevance;

pub use partition::partition_offsets;
pub use relevance::{coherent_relevance_offset, semi_relevance_offset};
