//! Cache items, lookup keys and eviction ordering records

use std::cmp::Ordering;

/// Lookup key of a cache item.
///
/// The generation is part of the key, so incrementing the cache
/// generation makes every existing item invisible to lookup without
/// touching it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemKey {
    /// Generation the item was computed in
    pub generation: u32,
    /// 1-based coherent locator index (0 is reserved for "no query")
    pub locator_index: u64,
}

/// One cached coherent result.
///
/// Owned exclusively by the cache index; the relevance heap only holds
/// [`EntryRank`] records referring to items by key.
#[derive(Debug)]
pub struct CacheItem<R> {
    /// Lookup key, duplicated here so a retired item still knows what it
    /// was
    pub key: ItemKey,
    /// Eviction ordering key
    pub relevance: f32,
    /// Computed coherent result
    pub result: R,
}

/// Lightweight eviction-ordering record held by the relevance heap.
///
/// Ordered by `(generation, relevance)` ascending; the locator index is
/// carried only so the owning index entry can be removed alongside, and
/// never participates in ordering.
#[derive(Debug, Clone, Copy)]
pub struct EntryRank {
    /// Generation of the ranked item
    pub generation: u32,
    /// Relevance of the ranked item
    pub relevance: f32,
    /// Locator index of the ranked item
    pub locator_index: u64,
}

impl EntryRank {
    /// Rank of an item with the given key and relevance.
    #[inline]
    pub fn new(key: ItemKey, relevance: f32) -> Self {
        Self {
            generation: key.generation,
            relevance,
            locator_index: key.locator_index,
        }
    }

    /// Ranking threshold for eviction decisions: anything ordering below
    /// `(generation, relevance)` can never be reused.
    #[inline]
    pub fn threshold(generation: u32, relevance: f32) -> Self {
        Self {
            generation,
            relevance,
            locator_index: 0,
        }
    }

    /// Lookup key of the ranked item.
    #[inline]
    pub fn key(&self) -> ItemKey {
        ItemKey {
            generation: self.generation,
            locator_index: self.locator_index,
        }
    }
}

impl Ord for EntryRank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.generation
            .cmp(&other.generation)
            .then_with(|| self.relevance.total_cmp(&other.relevance))
    }
}

impl PartialOrd for EntryRank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for EntryRank {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EntryRank {}
