//! Per-semicoherent-step cache query batch
//!
//! One `CacheQueries` is created per search run and re-initialised at
//! every semicoherent step. Each step populates one query per segment,
//! then finalises the batch to obtain the physical frequency block the
//! per-segment caches are asked to retrieve against.

use std::sync::Arc;

use crate::cache::Cache;
use crate::error::CacheError;
use crate::geometry;
use crate::space::{ComputeEngine, ReducedTransform, Tiling};
use crate::types::{zero_reduced, PhysicalPoint, MAX_DIMS};

/// Sums of the per-query and semicoherent counters, reported by
/// [`CacheQueries::counts`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct QueryCounts {
    /// Number of computed coherent results, over all queries
    pub coherent_results: u64,
    /// Number of distinct coherent templates computed, over all queries
    pub coherent_templates: u64,
    /// Number of semicoherent templates, over all steps
    pub semi_templates: u64,
}

/// Storage for a series of per-segment cache queries.
pub struct CacheQueries {
    /// Number of parameter-space dimensions
    dims: usize,
    /// Lowest tiled parameter-space dimension
    dim0: usize,
    /// Frequency spacing used by the lattices
    freq_spacing: f64,
    /// Number of query slots (one per segment)
    num_queries: usize,
    /// Number of partitions of the semicoherent frequency block
    num_partitions: usize,
    /// Current partition of the semicoherent frequency block
    pub(crate) partition_index: usize,
    /// Per-partition offset to the coherent left-most index
    part_left_offset: Vec<i32>,
    /// Per-partition offset to the coherent right-most index
    part_right_offset: Vec<i32>,
    /// 1-based locator index per query; 0 means "no query yet"
    pub(crate) coherent_index: Vec<u64>,
    /// Physical point of each queried coherent frequency block
    pub(crate) coherent_phys: Vec<PhysicalPoint>,
    /// Left-most point index of each queried coherent frequency block
    pub(crate) coherent_left: Vec<i32>,
    /// Right-most point index of each queried coherent frequency block
    pub(crate) coherent_right: Vec<i32>,
    /// Relevance of each queried coherent frequency block
    pub(crate) coherent_relevance: Vec<f32>,
    /// Computed coherent results per query
    pub(crate) coherent_results_computed: Vec<u64>,
    /// Computed coherent templates per query
    pub(crate) coherent_templates_computed: Vec<u64>,
    /// Transform for the semicoherent reduced coordinate system
    semi_transform: Arc<dyn ReducedTransform>,
    /// Sequential index of the current semicoherent frequency block
    semi_index: u64,
    /// Current semicoherent coordinate in dimension `dim0`
    semi_dim0: f64,
    /// Physical point of the current semicoherent frequency block
    semi_phys: PhysicalPoint,
    /// Left-most point index of the current semicoherent block
    pub(crate) semi_left: i32,
    /// Right-most point index of the current semicoherent block
    semi_right: i32,
    /// Relevance of the current semicoherent frequency block
    pub(crate) semi_relevance: f32,
    /// Offset used in computation of semicoherent point relevance
    semi_relevance_offset: f64,
    /// Number of semicoherent templates, over all steps
    semi_templates: u64,
}

impl CacheQueries {
    /// Create query storage over the semicoherent tiling.
    ///
    /// `num_queries` is the number of segments; `num_partitions` divides
    /// each semicoherent frequency block into staged units. The
    /// per-partition coherent index offsets are derived once here, from
    /// the tiling's *minimum* frequency-block point count: an
    /// under-estimate shared by every semicoherent block, so coherent
    /// bounds always enclose the per-step semicoherent bounds.
    pub fn new(
        semi_tiling: &dyn Tiling,
        semi_transform: Arc<dyn ReducedTransform>,
        freq_spacing: f64,
        num_queries: usize,
        num_partitions: usize,
    ) -> Result<Self, CacheError> {
        if freq_spacing.is_nan() || freq_spacing < 0.0 {
            return Err(CacheError::invalid_argument("freq_spacing must be >= 0"));
        }
        if num_queries == 0 {
            return Err(CacheError::invalid_argument("num_queries must be > 0"));
        }
        if num_partitions == 0 {
            return Err(CacheError::invalid_argument("num_partitions must be > 0"));
        }
        let dims = semi_tiling.dims();
        if dims == 0 || dims > MAX_DIMS {
            return Err(CacheError::invalid_argument(format!(
                "tiling must have 1 to {} dimensions, has {}",
                MAX_DIMS, dims
            )));
        }
        let dim0 = semi_tiling.lowest_tiled_dim().unwrap_or(0);

        let semi_relevance_offset = geometry::semi_relevance_offset(semi_tiling, dim0);

        // Minimum number of points in a semicoherent frequency block
        let stats = semi_tiling.stats(dims - 1)?;
        if stats.min_points == 0 {
            return Err(CacheError::inconsistency(
                "tiling reports empty minimum frequency block",
            ));
        }
        let min_points = u32::try_from(stats.min_points).map_err(|_| {
            CacheError::invalid_argument(format!(
                "minimum frequency block of {} points too large",
                stats.min_points
            ))
        })?;

        let mut part_left_offset = Vec::with_capacity(num_partitions);
        let mut part_right_offset = Vec::with_capacity(num_partitions);
        for index in 0..num_partitions {
            let (left, right) =
                geometry::partition_offsets(min_points, num_partitions as u32, index as u32)?;
            part_left_offset.push(left);
            part_right_offset.push(right);
        }

        Ok(Self {
            dims,
            dim0,
            freq_spacing,
            num_queries,
            num_partitions,
            partition_index: 0,
            part_left_offset,
            part_right_offset,
            coherent_index: vec![0; num_queries],
            coherent_phys: vec![PhysicalPoint::default(); num_queries],
            coherent_left: vec![0; num_queries],
            coherent_right: vec![0; num_queries],
            coherent_relevance: vec![0.0; num_queries],
            coherent_results_computed: vec![0; num_queries],
            coherent_templates_computed: vec![0; num_queries],
            semi_transform,
            semi_index: 0,
            semi_dim0: 0.0,
            semi_phys: PhysicalPoint::default(),
            semi_left: 0,
            semi_right: 0,
            semi_relevance: 0.0,
            semi_relevance_offset,
            semi_templates: 0,
        })
    }

    /// Initialise the batch for one semicoherent step.
    ///
    /// Resets every query slot to "no query yet" and records the current
    /// semicoherent point, its frequency-block bounds and the partition
    /// being processed.
    pub fn init(
        &mut self,
        semi_index: u64,
        semi_reduced: &[f64],
        semi_left: i32,
        semi_right: i32,
        partition_index: usize,
    ) -> Result<(), CacheError> {
        if semi_reduced.len() != self.dims {
            return Err(CacheError::invalid_argument(format!(
                "semicoherent point has {} dimensions, expected {}",
                semi_reduced.len(),
                self.dims
            )));
        }
        if partition_index >= self.num_partitions {
            return Err(CacheError::invalid_argument(format!(
                "partition index {} out of range [0,{})",
                partition_index, self.num_partitions
            )));
        }

        for index in self.coherent_index.iter_mut() {
            *index = 0;
        }

        self.semi_index = semi_index;
        self.semi_dim0 = semi_reduced[self.dim0];
        self.semi_phys = self
            .semi_transform
            .reduced_to_physical(semi_reduced, None)?;
        self.semi_left = semi_left;
        self.semi_right = semi_right;
        self.partition_index = partition_index;

        // Relevance of the semicoherent block: tracked coordinate plus
        // the (negative) half-width offset, i.e. the leftmost edge of
        // its bounding box
        self.semi_relevance = (self.semi_dim0 + self.semi_relevance_offset) as f32;

        Ok(())
    }

    /// Populate one query slot against a per-segment cache.
    ///
    /// Converts the current semicoherent point into the cache's coherent
    /// coordinate system and, for interpolating caches, locates the
    /// nearest coherent frequency block. The located block must contain
    /// the semicoherent block; any violation is a fatal inconsistency,
    /// never silently corrected.
    pub fn query<E: ComputeEngine>(
        &mut self,
        cache: &Cache<E>,
        query_index: usize,
    ) -> Result<(), CacheError> {
        if cache.dims() != self.dims || cache.dim0() != self.dim0 {
            return Err(CacheError::invalid_argument(format!(
                "cache geometry (dims={}, dim0={}) does not match queries (dims={}, dim0={})",
                cache.dims(),
                cache.dim0(),
                self.dims,
                self.dim0
            )));
        }
        if query_index >= self.num_queries {
            return Err(CacheError::invalid_argument(format!(
                "query index {} out of range [0,{})",
                query_index, self.num_queries
            )));
        }

        // Current semicoherent point in coherent reduced coordinates
        let mut coh_point = zero_reduced(self.dims);
        cache
            .coh_transform()
            .physical_to_reduced(&self.semi_phys, &mut coh_point)?;
        let mut coh_near = coh_point.clone();

        // Values for a non-interpolating search: the coherent block is
        // the semicoherent one
        let mut index = self.semi_index;
        let mut left = self.semi_left;
        let mut right = self.semi_right;

        // An interpolating search locates the nearest coherent block
        if let Some(locator) = cache.locator() {
            let lookup = locator.nearest_block(&coh_point, &mut coh_near)?;
            if lookup.index >= cache.max_index() {
                return Err(CacheError::inconsistency(format!(
                    "coherent index {} out of range [0,{}) at semicoherent index {}, query {}",
                    lookup.index,
                    cache.max_index(),
                    self.semi_index,
                    query_index
                )));
            }
            if lookup.left > lookup.right {
                return Err(CacheError::inconsistency(format!(
                    "inverted coherent range [{},{}] at semicoherent index {}, query {}",
                    lookup.left, lookup.right, self.semi_index, query_index
                )));
            }
            if lookup.left > self.semi_left || self.semi_right > lookup.right {
                return Err(CacheError::inconsistency(format!(
                    "coherent range [{},{}] does not contain semicoherent range [{},{}] \
                     at semicoherent index {}, query {}",
                    lookup.left,
                    lookup.right,
                    self.semi_left,
                    self.semi_right,
                    self.semi_index,
                    query_index
                )));
            }
            index = lookup.index;
            left = lookup.left;
            right = lookup.right;
        }

        // Store the locator index 1-based, so 0 keeps meaning "no query"
        self.coherent_index[query_index] = index + 1;
        self.coherent_left[query_index] = left;
        self.coherent_right[query_index] = right;

        // Nearest coherent point back in physical coordinates
        self.coherent_phys[query_index] = cache
            .coh_transform()
            .reduced_to_physical(&coh_near, Some(coh_point.as_slice()))?;

        // Relevance of the coherent block: its nearest point remapped to
        // semicoherent coordinates, clamped from below by the current
        // semicoherent coordinate, plus the rightward-reach offset
        let mut semi_near = zero_reduced(self.dims);
        cache
            .coh_transform()
            .remap_to(cache.semi_transform(), &coh_near, &coh_point, &mut semi_near)?;
        let near_dim0 = semi_near[self.dim0].max(self.semi_dim0);
        self.coherent_relevance[query_index] = (near_dim0 + cache.relevance_offset()) as f32;

        Ok(())
    }

    /// Finalise the batch for the current step and partition.
    ///
    /// Returns the physical start point and bin count of the selected
    /// semicoherent partition, or `None` if this partition holds no
    /// points for the current block (a valid skip, not an error). Every
    /// query slot must have been populated.
    pub fn finalize(&mut self) -> Result<Option<(PhysicalPoint, u32)>, CacheError> {
        for (index, &coherent_index) in self.coherent_index.iter().enumerate() {
            if coherent_index == 0 {
                return Err(CacheError::MissingQuery(index));
            }
        }

        // Offsets selecting the current partition of this block
        let semi_nfreqs = (self.semi_right - self.semi_left + 1) as u32;
        let (semi_left_offset, semi_right_offset) = geometry::partition_offsets(
            semi_nfreqs,
            self.num_partitions as u32,
            self.partition_index as u32,
        )?;

        // The precomputed coherent offsets were derived from the minimum
        // block size, so they must enclose the per-step offsets
        if self.part_left_offset[self.partition_index] > semi_left_offset
            || semi_right_offset > self.part_right_offset[self.partition_index]
        {
            return Err(CacheError::inconsistency(format!(
                "coherent partition offsets [{},{}] do not enclose semicoherent offsets [{},{}]",
                self.part_left_offset[self.partition_index],
                self.part_right_offset[self.partition_index],
                semi_left_offset,
                semi_right_offset
            )));
        }

        // Shrink the semicoherent block to the partition; blocks with
        // fewer points than partitions leave some partitions empty
        self.semi_left += semi_left_offset;
        self.semi_right += semi_right_offset;
        if self.semi_right < self.semi_left {
            return Ok(None);
        }
        let semi_nfreqs = (self.semi_right - self.semi_left + 1) as u32;

        // Enclose the partition in every queried coherent block
        for query_index in 0..self.num_queries {
            self.coherent_left[query_index] += self.part_left_offset[self.partition_index];
            self.coherent_right[query_index] += self.part_right_offset[self.partition_index];
        }

        // Shift physical frequencies to the first point of the partition
        self.semi_phys.shift_freq(self.freq_spacing, self.semi_left);
        for query_index in 0..self.num_queries {
            let left = self.coherent_left[query_index];
            self.coherent_phys[query_index].shift_freq(self.freq_spacing, left);
        }

        self.semi_templates += u64::from(semi_nfreqs);

        Ok(Some((self.semi_phys.clone(), semi_nfreqs)))
    }

    /// Summed computed-result, computed-template and semicoherent
    /// template counters. Pure read.
    pub fn counts(&self) -> QueryCounts {
        QueryCounts {
            coherent_results: self.coherent_results_computed.iter().sum(),
            coherent_templates: self.coherent_templates_computed.iter().sum(),
            semi_templates: self.semi_templates,
        }
    }

    /// Number of query slots.
    pub fn num_queries(&self) -> usize {
        self.num_queries
    }

    /// Number of partitions of the semicoherent frequency block.
    pub fn num_partitions(&self) -> usize {
        self.num_partitions
    }

    /// Relevance threshold of the current semicoherent block.
    pub fn semi_relevance(&self) -> f32 {
        self.semi_relevance
    }
}
