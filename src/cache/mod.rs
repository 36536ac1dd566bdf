//! Per-segment coherent-result cache
//!
//! Retrieve-or-compute storage for coherent results, with a dual index:
//! a hash map for key lookup and a relevance heap for eviction ordering.
//! The map is the single owner of item payloads; the heap holds plain
//! ordering records, and every removal path updates both structures
//! within one operation.
//!
//! Eviction is driven by relevance. Iteration over the parameter space
//! visits the slowest-varying tiled dimension monotonically, so once an
//! entry's relevance falls behind the current semicoherent threshold it
//! can never again be the nearest match for any future point and is safe
//! to drop. A fixed-capacity cache instead evicts only on overflow,
//! using relevance just to pick the victim.

mod bitset;
mod heap;
mod item;

pub use item::{CacheItem, ItemKey};

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::CacheError;
use crate::geometry;
use crate::queries::CacheQueries;
use crate::space::{BlockLocator, ComputeEngine, ReducedTransform, Tiling};
use crate::types::MAX_DIMS;

use bitset::ComputedBitset;
use heap::RelevanceHeap;
use item::EntryRank;

/// Outcome of a successful [`Cache::retrieve`] call.
#[derive(Debug)]
pub struct Retrieved<'a, R> {
    /// The cached or freshly computed coherent result
    pub result: &'a R,
    /// 1-based locator index of the result
    pub coherent_index: u64,
    /// Bin offset aligning the coherent block against the current
    /// semicoherent block
    pub combine_offset: u32,
}

/// Builder for [`Cache`] eviction policy and interpolation settings.
///
/// The engine type `E` is carried only so that `Cache::builder()` can be
/// called without a turbofish; it is inferred from the engine passed to
/// [`CacheBuilder::build`] and is otherwise inert.
pub struct CacheBuilder<E: ComputeEngine> {
    interpolating: bool,
    max_size: usize,
    evict_aggressively: bool,
    _engine: PhantomData<fn() -> E>,
}

impl<E: ComputeEngine> Default for CacheBuilder<E> {
    fn default() -> Self {
        CacheBuilder {
            interpolating: false,
            max_size: 0,
            evict_aggressively: false,
            _engine: PhantomData,
        }
    }
}

impl<E: ComputeEngine> Clone for CacheBuilder<E> {
    fn clone(&self) -> Self {
        CacheBuilder {
            interpolating: self.interpolating,
            max_size: self.max_size,
            evict_aggressively: self.evict_aggressively,
            _engine: PhantomData,
        }
    }
}

impl<E: ComputeEngine> std::fmt::Debug for CacheBuilder<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheBuilder")
            .field("interpolating", &self.interpolating)
            .field("max_size", &self.max_size)
            .field("evict_aggressively", &self.evict_aggressively)
            .finish()
    }
}

impl<E: ComputeEngine> CacheBuilder<E> {
    /// Enable nearest-neighbor interpolation against the coherent
    /// lattice. Non-interpolating caches reuse the semicoherent bounds
    /// directly.
    pub fn interpolating(mut self, interpolating: bool) -> Self {
        self.interpolating = interpolating;
        self
    }

    /// Bound the cache to `max_size` resident items; `0` (the default)
    /// keeps the cache unbounded and enables relevance-driven eviction.
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Evict every below-threshold item on each miss, instead of only
    /// the least relevant one.
    pub fn evict_aggressively(mut self, evict_aggressively: bool) -> Self {
        self.evict_aggressively = evict_aggressively;
        self
    }

    /// Build a cache over the given coherent tiling and collaborators.
    pub fn build(
        self,
        coh_tiling: &dyn Tiling,
        coh_transform: Arc<dyn ReducedTransform>,
        semi_transform: Arc<dyn ReducedTransform>,
        engine: E,
    ) -> Result<Cache<E>, CacheError> {
        let dims = coh_tiling.dims();
        if dims == 0 || dims > MAX_DIMS {
            return Err(CacheError::invalid_argument(format!(
                "tiling must have 1 to {} dimensions, has {}",
                MAX_DIMS, dims
            )));
        }
        let dim0 = coh_tiling.lowest_tiled_dim().unwrap_or(0);

        // Worst-case rightward reach of a coherent tile's bounding box,
        // measured in semicoherent coordinates
        let relevance_offset = geometry::coherent_relevance_offset(
            coh_tiling,
            coh_transform.as_ref(),
            semi_transform.as_ref(),
            dim0,
        )?;

        // An interpolating cache needs a locator over the coherent
        // lattice, and the frequency-block count bounding its indices
        let (locator, max_index) = if self.interpolating {
            let locator = coh_tiling.make_locator()?;
            let max_index = match dims.checked_sub(2) {
                Some(dim) => coh_tiling.stats(dim)?.total_points,
                None => 1,
            };
            (Some(locator), max_index)
        } else {
            (None, 0)
        };

        log::debug!(
            "created cache: dims={}, dim0={}, interpolating={}, max_size={}, \
             evict_aggressively={}, relevance_offset={}",
            dims,
            dim0,
            self.interpolating,
            self.max_size,
            self.evict_aggressively,
            relevance_offset
        );

        Ok(Cache {
            dims,
            dim0,
            coh_transform,
            semi_transform,
            engine,
            locator,
            max_index,
            generation: 0,
            relevance_offset,
            // Relevance-driven eviction only applies to an unbounded
            // cache; a fixed-size cache discards items on overflow alone
            any_eviction: self.max_size == 0,
            evict_aggressively: self.evict_aggressively,
            index: HashMap::new(),
            heap: RelevanceHeap::new(self.max_size),
            computed: ComputedBitset::new(),
            retired: None,
            peak_size: 0,
        })
    }
}

/// Cache of coherent results for one segment.
pub struct Cache<E: ComputeEngine> {
    /// Number of parameter-space dimensions
    dims: usize,
    /// Lowest tiled parameter-space dimension
    dim0: usize,
    /// Transform for the coherent reduced coordinate system
    coh_transform: Arc<dyn ReducedTransform>,
    /// Transform for the semicoherent reduced coordinate system
    semi_transform: Arc<dyn ReducedTransform>,
    /// Compute engine for this segment
    engine: E,
    /// Nearest-block locator; present only for interpolating caches
    locator: Option<Box<dyn BlockLocator>>,
    /// Exclusive upper bound on locator indices (0 if non-interpolating)
    max_index: u64,
    /// Current generation; embedded in every lookup key
    generation: u32,
    /// Offset used in computation of coherent point relevance
    relevance_offset: f64,
    /// Whether relevance-driven eviction is enabled
    any_eviction: bool,
    /// Whether eviction removes every below-threshold item
    evict_aggressively: bool,
    /// Owning lookup index
    index: HashMap<ItemKey, CacheItem<E::Output>>,
    /// Eviction ordering over the index's items
    heap: RelevanceHeap,
    /// Records which results have ever been computed
    computed: ComputedBitset,
    /// Single retired item kept for storage reuse on the next miss
    retired: Option<CacheItem<E::Output>>,
    /// Peak number of resident items
    peak_size: u32,
}

impl<E: ComputeEngine> Cache<E> {
    /// Start building a cache.
    pub fn builder() -> CacheBuilder<E> {
        CacheBuilder::default()
    }

    /// Retrieve the coherent result for a populated query, computing and
    /// caching it on a miss.
    ///
    /// On a miss the compute engine runs before any cache mutation, so a
    /// propagated failure leaves neither the index nor the heap touched.
    pub fn retrieve(
        &mut self,
        queries: &mut CacheQueries,
        query_index: usize,
    ) -> Result<Retrieved<'_, E::Output>, CacheError> {
        if query_index >= queries.num_queries() {
            return Err(CacheError::invalid_argument(format!(
                "query index {} out of range [0,{})",
                query_index,
                queries.num_queries()
            )));
        }

        if queries.coherent_index[query_index] == 0 {
            return Err(CacheError::invalid_argument(format!(
                "query slot {} was never populated",
                query_index
            )));
        }

        let key = ItemKey {
            generation: self.generation,
            locator_index: queries.coherent_index[query_index],
        };

        if !self.index.contains_key(&key) {
            self.compute_and_insert(queries, query_index, key)?;
        }

        let combine_offset = queries.semi_left - queries.coherent_left[query_index];
        if combine_offset < 0 {
            return Err(CacheError::inconsistency(format!(
                "combine offset {} < 0 at locator index {}",
                combine_offset, key.locator_index
            )));
        }

        // A capacity-bounced brand-new item lives in the retired slot
        // rather than the index, but is still handed to the caller
        let item = match self.index.get(&key) {
            Some(item) => item,
            None => self
                .retired
                .as_ref()
                .filter(|item| item.key == key)
                .ok_or_else(|| {
                    CacheError::inconsistency(format!(
                        "item for locator index {} vanished during retrieval",
                        key.locator_index
                    ))
                })?,
        };

        Ok(Retrieved {
            result: &item.result,
            coherent_index: item.key.locator_index,
            combine_offset: combine_offset as u32,
        })
    }

    /// Miss path of [`Cache::retrieve`]: compute the result, insert it,
    /// and run the eviction step.
    fn compute_and_insert(
        &mut self,
        queries: &mut CacheQueries,
        query_index: usize,
        key: ItemKey,
    ) -> Result<(), CacheError> {
        let relevance = queries.coherent_relevance[query_index];
        let num_bins =
            (queries.coherent_right[query_index] - queries.coherent_left[query_index] + 1) as u32;

        // Compute first; only then touch the cache structures
        let result = self
            .engine
            .compute(&queries.coherent_phys[query_index], num_bins)?;

        // Reuse the retired item's storage if one is parked, otherwise
        // make a new item
        let item = match self.retired.take() {
            Some(mut item) => {
                item.key = key;
                item.relevance = relevance;
                item.result = result;
                item
            }
            None => CacheItem {
                key,
                relevance,
                result,
            },
        };
        self.index.insert(key, item);

        self.evict_step(key, relevance, queries.semi_relevance)?;

        let size = self.heap.len() as u32;
        if size > self.peak_size {
            self.peak_size = size;
        }

        // Count every computed result; count a template only the first
        // time this (partition, locator index) is ever computed
        queries.coherent_results_computed[query_index] += u64::from(num_bins);
        let bit = queries.partition_index as u64 * self.max_index + key.locator_index;
        if !self.computed.get(bit) {
            queries.coherent_templates_computed[query_index] += u64::from(num_bins);
            self.computed.set(bit);
        }

        Ok(())
    }

    /// Eviction step, run once per miss after the new item has been
    /// inserted into the index but before its rank enters the heap.
    fn evict_step(
        &mut self,
        new_key: ItemKey,
        new_relevance: f32,
        semi_relevance: f32,
    ) -> Result<(), CacheError> {
        let new_rank = EntryRank::new(new_key, new_relevance);
        let threshold = EntryRank::threshold(self.generation, semi_relevance);

        // The new item's rank is not yet in the heap, so the current
        // root is always some older item
        let root_below = self.heap.least().is_some_and(|least| *least < threshold);

        if self.any_eviction && root_below {
            // Exchange the stale root for the new rank, parking the
            // evicted item for storage reuse on the next miss
            if let Some(evicted) = self.heap.replace_least(new_rank) {
                let item = self.take_item(evicted.key())?;
                log::trace!(
                    "evicted locator index {} (relevance {}) below threshold {}",
                    evicted.locator_index,
                    evicted.relevance,
                    semi_relevance
                );
                self.retired = Some(item);
            }

            // Aggressive mode keeps dropping stale roots outright,
            // skipping the just-inserted rank
            while self.evict_aggressively {
                match self.heap.least().copied() {
                    Some(least) if least.key() != new_key && least < threshold => {
                        self.heap.pop_least();
                        self.take_item(least.key())?;
                    }
                    _ => break,
                }
            }
        } else {
            // A full bounded heap hands back a displaced rank: either
            // its old root, or the new rank itself if nothing ranks
            // below it
            if let Some(bumped) = self.heap.insert(new_rank) {
                let item = self.take_item(bumped.key())?;
                self.retired = Some(item);
            }
        }

        Ok(())
    }

    /// Remove an item from the index in lockstep with its heap removal.
    fn take_item(&mut self, key: ItemKey) -> Result<CacheItem<E::Output>, CacheError> {
        self.index.remove(&key).ok_or_else(|| {
            CacheError::inconsistency(format!(
                "heap ranked locator index {} of generation {} absent from index",
                key.locator_index, key.generation
            ))
        })
    }

    /// Expire every resident item in O(1).
    ///
    /// Advances the generation: existing items are no longer reachable by
    /// lookup, but stay resident for relevance comparisons and storage
    /// reuse until evicted lazily.
    pub fn expire(&mut self) {
        self.generation += 1;
        log::debug!("cache expired, generation now {}", self.generation);
    }

    /// Drop every resident item and reset the generation to 0.
    ///
    /// The computed-bitset and the retired slot survive: template counts
    /// stay at-most-once across clears.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.index.clear();
        self.generation = 0;
        log::debug!("cache cleared");
    }

    /// Number of resident items.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the cache holds no items.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Current generation.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Peak number of resident items over the cache's lifetime.
    pub fn peak_size(&self) -> u32 {
        self.peak_size
    }

    /// Whether this cache interpolates against a coherent locator.
    pub fn is_interpolating(&self) -> bool {
        self.locator.is_some()
    }

    /// Relevances of the resident items belonging to the current
    /// generation.
    pub fn resident_relevances(&self) -> Vec<f32> {
        self.index
            .values()
            .filter(|item| item.key.generation == self.generation)
            .map(|item| item.relevance)
            .collect()
    }

    pub(crate) fn dims(&self) -> usize {
        self.dims
    }

    pub(crate) fn dim0(&self) -> usize {
        self.dim0
    }

    pub(crate) fn coh_transform(&self) -> &dyn ReducedTransform {
        self.coh_transform.as_ref()
    }

    pub(crate) fn semi_transform(&self) -> &dyn ReducedTransform {
        self.semi_transform.as_ref()
    }

    pub(crate) fn locator(&self) -> Option<&dyn BlockLocator> {
        self.locator.as_deref()
    }

    pub(crate) fn max_index(&self) -> u64 {
        self.max_index
    }

    pub(crate) fn relevance_offset(&self) -> f64 {
        self.relevance_offset
    }
}
