//! Shared test doubles for the collaborator traits
//!
//! A two-dimensional grid parameter space: dimension 0 is the tracked
//! (slowest-varying) coordinate, dimension 1 is frequency. Transforms
//! apply a constant per-system shift, the locator quantises the tracked
//! coordinate onto blocks of fixed extent, and the compute engine
//! records every invocation.

// Not every test binary exercises every double
#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use weftcache::{
    BlockLocator, BlockLookup, CacheError, ComputeEngine, PhysicalPoint, ReducedTransform, Tiling,
    TilingStats,
};

pub const DIMS: usize = 2;

/// Transform between physical coordinates and one reduced system,
/// modeled as a constant coordinate shift.
#[derive(Debug, Clone)]
pub struct GridTransform {
    pub shift: [f64; DIMS],
}

impl GridTransform {
    pub fn identity() -> Self {
        Self { shift: [0.0; DIMS] }
    }

    pub fn shifted(shift: [f64; DIMS]) -> Self {
        Self { shift }
    }
}

impl ReducedTransform for GridTransform {
    fn dims(&self) -> usize {
        DIMS
    }

    fn physical_to_reduced(&self, point: &PhysicalPoint, out: &mut [f64]) -> Result<(), CacheError> {
        out[0] = point.coords[0] + self.shift[0];
        out[1] = point.freq + self.shift[1];
        Ok(())
    }

    fn reduced_to_physical(
        &self,
        point: &[f64],
        _reference: Option<&[f64]>,
    ) -> Result<PhysicalPoint, CacheError> {
        let mut phys = PhysicalPoint::at_freq(point[1] - self.shift[1]);
        phys.coords.push(point[0] - self.shift[0]);
        Ok(phys)
    }

    fn remap_to(
        &self,
        target: &dyn ReducedTransform,
        point: &[f64],
        reference: &[f64],
        out: &mut [f64],
    ) -> Result<(), CacheError> {
        let phys = self.reduced_to_physical(point, Some(reference))?;
        target.physical_to_reduced(&phys, out)
    }

    fn boundary_free_origin(&self) -> PhysicalPoint {
        let mut origin = PhysicalPoint::at_freq(0.0);
        origin.coords.push(0.0);
        origin
    }
}

/// Lattice tiling double with fixed bounding boxes, statistics and
/// locator geometry.
#[derive(Debug, Clone)]
pub struct GridTiling {
    pub bbox: [f64; DIMS],
    pub total_points: u64,
    pub min_points: u64,
    /// Tracked-coordinate spacing of locator blocks
    pub block_spacing: f64,
    /// Left/right extent reported for every located block
    pub block_left: i32,
    pub block_right: i32,
}

impl GridTiling {
    pub fn new(bbox0: f64, min_points: u64) -> Self {
        Self {
            bbox: [bbox0, 0.0],
            total_points: 1000,
            min_points,
            block_spacing: 1.0,
            block_left: -100,
            block_right: 100,
        }
    }
}

impl Tiling for GridTiling {
    fn dims(&self) -> usize {
        DIMS
    }

    fn lowest_tiled_dim(&self) -> Option<usize> {
        Some(0)
    }

    fn bounding_box(&self, dim: usize) -> f64 {
        self.bbox[dim]
    }

    fn stats(&self, _dim: usize) -> Result<TilingStats, CacheError> {
        Ok(TilingStats {
            total_points: self.total_points,
            min_points: self.min_points,
        })
    }

    fn make_locator(&self) -> Result<Box<dyn BlockLocator>, CacheError> {
        Ok(Box::new(GridLocator {
            spacing: self.block_spacing,
            left: self.block_left,
            right: self.block_right,
        }))
    }
}

/// Locator double quantising the tracked coordinate onto blocks.
#[derive(Debug, Clone)]
pub struct GridLocator {
    pub spacing: f64,
    pub left: i32,
    pub right: i32,
}

impl BlockLocator for GridLocator {
    fn nearest_block(&self, point: &[f64], nearest: &mut [f64]) -> Result<BlockLookup, CacheError> {
        let steps = (point[0] / self.spacing).round().max(0.0);
        nearest.copy_from_slice(point);
        nearest[0] = steps * self.spacing;
        Ok(BlockLookup {
            index: steps as u64,
            left: self.left,
            right: self.right,
        })
    }
}

/// Compute engine double producing `num_bins` copies of the point's
/// frequency and counting every invocation.
#[derive(Debug, Clone)]
pub struct CountingEngine {
    pub calls: Rc<Cell<u64>>,
    pub fail_next: Rc<Cell<bool>>,
}

impl CountingEngine {
    pub fn new() -> Self {
        Self {
            calls: Rc::new(Cell::new(0)),
            fail_next: Rc::new(Cell::new(false)),
        }
    }
}

impl ComputeEngine for CountingEngine {
    type Output = Vec<f32>;

    fn compute(&mut self, point: &PhysicalPoint, num_bins: u32) -> Result<Self::Output, CacheError> {
        if self.fail_next.replace(false) {
            return Err(CacheError::external(std::io::Error::new(
                std::io::ErrorKind::Other,
                "segment data unavailable",
            )));
        }
        self.calls.set(self.calls.get() + 1);
        Ok(vec![point.freq as f32; num_bins as usize])
    }
}

/// A reduced semicoherent point at the given tracked coordinate and
/// frequency.
pub fn semi_point(dim0: f64, freq: f64) -> Vec<f64> {
    vec![dim0, freq]
}
