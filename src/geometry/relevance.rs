//! Relevance offsets derived from lattice bounding boxes
//!
//! Relevance orders cache entries for eviction: it is the coordinate
//! along the slowest-varying tiled dimension, adjusted by a fixed offset
//! so that semicoherent points carry the *leftmost* edge of their
//! bounding box and coherent entries carry the *rightmost* edge. Once a
//! coherent entry's rightmost reach falls behind the current semicoherent
//! leftmost edge, no future semicoherent point can overlap it.

use crate::error::CacheError;
use crate::space::{ReducedTransform, Tiling};
use crate::types::zero_reduced;

/// Offset applied to a semicoherent point's tracked coordinate to obtain
/// its relevance: negative half of the tiling bounding box in the lowest
/// tiled dimension, i.e. the leftmost edge of the point's bounding box.
pub fn semi_relevance_offset(tiling: &dyn Tiling, dim0: usize) -> f64 {
    -0.5 * tiling.bounding_box(dim0)
}

/// Offset applied to a coherent point's tracked coordinate to obtain its
/// relevance: the worst-case rightward reach of a coherent tile's
/// bounding box, measured in semicoherent coordinates.
///
/// Samples the vertices, edge midpoints and face midpoints of the
/// coherent bounding box around a reference point far from any
/// parameter-space boundary, remaps each sample into the semicoherent
/// system, and returns the maximum resulting coordinate in dimension
/// `dim0` minus the reference point's own coordinate there.
pub fn coherent_relevance_offset(
    coh_tiling: &dyn Tiling,
    coh_transform: &dyn ReducedTransform,
    semi_transform: &dyn ReducedTransform,
    dim0: usize,
) -> Result<f64, CacheError> {
    let dims = coh_tiling.dims();

    // Reference point in both reduced coordinate systems
    let origin = coh_transform.boundary_free_origin();
    let mut coh_origin = zero_reduced(dims);
    coh_transform.physical_to_reduced(&origin, &mut coh_origin)?;
    let mut semi_origin = zero_reduced(dims);
    semi_transform.physical_to_reduced(&origin, &mut semi_origin)?;
    let semi_origin_dim0 = semi_origin[dim0];

    let bbox: Vec<f64> = (0..dims).map(|i| coh_tiling.bounding_box(i)).collect();

    // Walk the Cartesian product of {-1, 0, +1} half-width steps across
    // all dimensions with an index-vector odometer, covering vertices,
    // edge midpoints and face midpoints of the bounding box
    let mut steps = vec![-1i32; dims];
    let mut sample = zero_reduced(dims);
    let mut semi_sample = zero_reduced(dims);
    let mut max_dim0 = semi_origin_dim0;
    loop {
        for i in 0..dims {
            sample[i] = coh_origin[i] - f64::from(steps[i]) * 0.5 * bbox[i];
        }
        coh_transform.remap_to(semi_transform, &sample, &coh_origin, &mut semi_sample)?;
        if semi_sample[dim0] > max_dim0 {
            max_dim0 = semi_sample[dim0];
        }

        let mut dim = 0;
        loop {
            if dim == dims {
                return Ok(max_dim0 - semi_origin_dim0);
            }
            steps[dim] += 1;
            if steps[dim] <= 1 {
                break;
            }
            steps[dim] = -1;
            dim += 1;
        }
    }
}
