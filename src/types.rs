//! Core value types shared across the query and cache layers

use arrayvec::ArrayVec;

/// Maximum number of parameter-space dimensions supported.
///
/// Search parameter spaces are low-dimensional (sky position plus a few
/// frequency-drift terms), so point storage is kept inline and
/// allocation-free.
pub const MAX_DIMS: usize = 8;

/// A point in one of the reduced coordinate systems, one coordinate per
/// parameter-space dimension.
pub type ReducedPoint = ArrayVec<f64, MAX_DIMS>;

/// Create a zero-filled reduced point with the given dimension count.
#[inline]
pub fn zero_reduced(dims: usize) -> ReducedPoint {
    let mut point = ReducedPoint::new();
    for _ in 0..dims {
        point.push(0.0);
    }
    point
}

/// A point in physical search coordinates.
///
/// The frequency coordinate is held separately from the remaining
/// parameters because frequency blocks are indexed and shifted in units
/// of the lattice frequency spacing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhysicalPoint {
    /// Physical frequency of the first bin in the block
    pub freq: f64,
    /// Remaining physical parameters (sky position, drift terms)
    pub coords: ArrayVec<f64, MAX_DIMS>,
}

impl PhysicalPoint {
    /// Create a point with the given frequency and no other parameters.
    #[inline]
    pub fn at_freq(freq: f64) -> Self {
        Self {
            freq,
            coords: ArrayVec::new(),
        }
    }

    /// Shift the frequency coordinate by `bins` steps of `spacing`.
    #[inline]
    pub fn shift_freq(&mut self, spacing: f64, bins: i32) {
        self.freq += spacing * f64::from(bins);
    }
}

/// Per-dimension statistics of a lattice tiling.
#[derive(Debug, Clone, Copy, Default)]
pub struct TilingStats {
    /// Total number of points up to and including this dimension
    pub total_points: u64,
    /// Minimum number of points in a block of this dimension
    pub min_points: u64,
}

/// Result of a nearest-block lookup against a lattice locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLookup {
    /// Sequential index of the located frequency block
    pub index: u64,
    /// Index of the left-most point in the block, relative to the
    /// nearest point
    pub left: i32,
    /// Index of the right-most point in the block, relative to the
    /// nearest point
    pub right: i32,
}
