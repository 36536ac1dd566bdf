//! Collaborator traits at the parameter-space boundary
//!
//! The cache engine is deliberately ignorant of how coherent results are
//! computed, how physical points map into the reduced coordinate systems,
//! and how the lattice is tiled. Those concerns live behind the traits in
//! this module; the enclosing search supplies the implementations.

use crate::error::CacheError;
use crate::types::{BlockLookup, PhysicalPoint, TilingStats};

/// Computes a coherent result for one segment at one physical point.
///
/// One engine instance is owned by each per-segment [`Cache`]; the engine
/// carries whatever per-segment input data it needs. The output type is
/// opaque to the cache.
///
/// [`Cache`]: crate::cache::Cache
pub trait ComputeEngine {
    /// Computed coherent result for one frequency block
    type Output;

    /// Compute the coherent result for a block of `num_bins` frequency
    /// bins starting at `point`.
    fn compute(&mut self, point: &PhysicalPoint, num_bins: u32) -> Result<Self::Output, CacheError>;
}

/// Bidirectional conversion between physical coordinates and one reduced
/// coordinate system.
pub trait ReducedTransform {
    /// Number of reduced parameter-space dimensions
    fn dims(&self) -> usize;

    /// Convert a physical point to reduced coordinates, writing one
    /// coordinate per dimension into `out`.
    fn physical_to_reduced(
        &self,
        point: &PhysicalPoint,
        out: &mut [f64],
    ) -> Result<(), CacheError>;

    /// Convert a reduced point to physical coordinates.
    ///
    /// `reference` optionally supplies a second reduced point used to
    /// resolve coordinate ambiguities left by the reduction.
    fn reduced_to_physical(
        &self,
        point: &[f64],
        reference: Option<&[f64]>,
    ) -> Result<PhysicalPoint, CacheError>;

    /// Remap a reduced point in this system into the `target` system,
    /// writing the remapped coordinates into `out`. `reference` is a
    /// reduced point in this system resolving any ambiguity.
    fn remap_to(
        &self,
        target: &dyn ReducedTransform,
        point: &[f64],
        reference: &[f64],
        out: &mut [f64],
    ) -> Result<(), CacheError>;

    /// A physical point far from every parameter-space boundary, used as
    /// the reference point for bounding-box sampling.
    fn boundary_free_origin(&self) -> PhysicalPoint;
}

/// A lattice tiling of one reduced coordinate system.
pub trait Tiling {
    /// Total number of parameter-space dimensions
    fn dims(&self) -> usize;

    /// Lowest tiled dimension, or `None` if no dimension is tiled
    fn lowest_tiled_dim(&self) -> Option<usize>;

    /// Width of the lattice bounding box in the given dimension
    fn bounding_box(&self, dim: usize) -> f64;

    /// Point-count statistics up to and including the given dimension
    fn stats(&self, dim: usize) -> Result<TilingStats, CacheError>;

    /// Build a nearest-block locator over this tiling
    fn make_locator(&self) -> Result<Box<dyn BlockLocator>, CacheError>;
}

/// Nearest-neighbor lookup of frequency blocks in a lattice tiling.
pub trait BlockLocator {
    /// Find the lattice frequency block nearest to `point`.
    ///
    /// Writes the nearest lattice point into `nearest` and returns the
    /// block's sequential index together with the left/right extent of
    /// the block relative to the nearest point.
    fn nearest_block(&self, point: &[f64], nearest: &mut [f64]) -> Result<BlockLookup, CacheError>;
}
