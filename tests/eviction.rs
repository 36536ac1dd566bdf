//! Eviction policies: relevance-driven, aggressive, capacity-bounded

mod common;

use std::sync::Arc;

use common::{semi_point, CountingEngine, GridTiling, GridTransform};
use weftcache::{Cache, CacheQueries, JsonRecordSink};

fn identity() -> Arc<GridTransform> {
    Arc::new(GridTransform::identity())
}

/// Wide bounding boxes keep several steps' entries relevant at once.
fn wide_tiling() -> GridTiling {
    GridTiling::new(5.0, 10)
}

fn step(
    queries: &mut CacheQueries,
    cache: &Cache<CountingEngine>,
    semi_index: u64,
    dim0: f64,
) {
    queries
        .init(semi_index, &semi_point(dim0, 100.0), -3, 6, 0)
        .unwrap();
    queries.query(cache, 0).unwrap();
    queries.finalize().unwrap().unwrap();
}

#[test]
fn test_all_residents_stay_at_or_above_threshold() {
    for aggressive in [false, true] {
        let tiling = wide_tiling();
        let mut queries = CacheQueries::new(&tiling, identity(), 0.1, 1, 1).unwrap();
        let mut cache = Cache::builder()
            .interpolating(true)
            .evict_aggressively(aggressive)
            .build(&tiling, identity(), identity(), CountingEngine::new())
            .unwrap();

        for index in 0u64..20 {
            step(&mut queries, &cache, index, index as f64);
            cache.retrieve(&mut queries, 0).unwrap();

            let threshold = queries.semi_relevance();
            for relevance in cache.resident_relevances() {
                assert!(
                    relevance >= threshold,
                    "resident relevance {} below threshold {} (aggressive={})",
                    relevance,
                    threshold,
                    aggressive
                );
            }
        }

        // Several entries stay resident while still relevant
        assert!(cache.len() > 1);
        assert!(cache.peak_size() > 1);
    }
}

#[test]
fn test_unbounded_cache_keeps_relevant_entries() {
    let tiling = wide_tiling();
    let mut queries = CacheQueries::new(&tiling, identity(), 0.1, 1, 1).unwrap();
    let engine = CountingEngine::new();
    let calls = engine.calls.clone();
    let mut cache = Cache::builder()
        .interpolating(true)
        .build(&tiling, identity(), identity(), engine)
        .unwrap();

    // Entries within the relevance window are never evicted, so walking
    // back over recent blocks hits the cache
    for index in 0u64..4 {
        step(&mut queries, &cache, index, index as f64);
        cache.retrieve(&mut queries, 0).unwrap();
    }
    assert_eq!(calls.get(), 4);
    for index in 0u64..4 {
        step(&mut queries, &cache, 4 + index, index as f64);
        cache.retrieve(&mut queries, 0).unwrap();
    }
    assert_eq!(calls.get(), 4);
}

#[test]
fn test_stale_generation_entries_evicted_first() {
    let tiling = wide_tiling();
    let mut queries = CacheQueries::new(&tiling, identity(), 0.1, 1, 1).unwrap();
    let mut cache = Cache::builder()
        .interpolating(true)
        .evict_aggressively(true)
        .build(&tiling, identity(), identity(), CountingEngine::new())
        .unwrap();

    for index in 0u64..3 {
        step(&mut queries, &cache, index, index as f64);
        cache.retrieve(&mut queries, 0).unwrap();
    }
    assert_eq!(cache.len(), 3);

    // After expiry every dormant entry ranks below any new-generation
    // threshold; the first miss sweeps them all out
    cache.expire();
    step(&mut queries, &cache, 3, 0.0);
    cache.retrieve(&mut queries, 0).unwrap();
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_bounded_cache_never_exceeds_capacity() {
    let tiling = wide_tiling();
    let mut queries = CacheQueries::new(&tiling, identity(), 0.1, 1, 1).unwrap();
    let mut cache = Cache::builder()
        .interpolating(true)
        .max_size(2)
        .build(&tiling, identity(), identity(), CountingEngine::new())
        .unwrap();

    for index in 0u64..6 {
        step(&mut queries, &cache, index, index as f64);
        cache.retrieve(&mut queries, 0).unwrap();
        assert!(cache.len() <= 2);
    }
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.peak_size(), 2);

    // The survivors are the most relevant blocks: both recent blocks hit
    let engine_hits_before = queries.counts().coherent_results;
    step(&mut queries, &cache, 6, 5.0);
    cache.retrieve(&mut queries, 0).unwrap();
    step(&mut queries, &cache, 7, 4.0);
    cache.retrieve(&mut queries, 0).unwrap();
    assert_eq!(queries.counts().coherent_results, engine_hits_before);
}

#[test]
fn test_bounced_item_is_returned_but_not_cached() {
    let tiling = wide_tiling();
    let mut queries = CacheQueries::new(&tiling, identity(), 0.1, 1, 1).unwrap();
    let engine = CountingEngine::new();
    let calls = engine.calls.clone();
    let mut cache = Cache::builder()
        .interpolating(true)
        .max_size(2)
        .build(&tiling, identity(), identity(), engine)
        .unwrap();

    // Fill the cache with two highly relevant blocks
    step(&mut queries, &cache, 0, 5.0);
    cache.retrieve(&mut queries, 0).unwrap();
    step(&mut queries, &cache, 1, 6.0);
    cache.retrieve(&mut queries, 0).unwrap();
    assert_eq!(calls.get(), 2);

    // A block ranking below both residents bounces off the full cache,
    // but its result is still handed back
    step(&mut queries, &cache, 2, 1.0);
    let retrieved = cache.retrieve(&mut queries, 0).unwrap();
    assert_eq!(retrieved.coherent_index, 2);
    assert_eq!(retrieved.result.len(), 201);
    assert_eq!(calls.get(), 3);
    assert_eq!(cache.len(), 2);

    // Because it was never cached, asking again recomputes
    cache.retrieve(&mut queries, 0).unwrap();
    assert_eq!(calls.get(), 4);
}

#[test]
fn test_report_aggregates_mean_peak_size() {
    let tiling = wide_tiling();
    let mut caches = Vec::new();
    for segment in 0u64..2 {
        let mut queries = CacheQueries::new(&tiling, identity(), 0.1, 1, 1).unwrap();
        let mut cache = Cache::builder()
            .interpolating(true)
            .build(&tiling, identity(), identity(), CountingEngine::new())
            .unwrap();
        // Segment 0 sees one block, segment 1 sees three
        let steps = 1 + 2 * segment;
        for index in 0u64..steps {
            step(&mut queries, &cache, index, index as f64);
            cache.retrieve(&mut queries, 0).unwrap();
        }
        caches.push(cache);
    }

    assert_eq!(weftcache::mean_peak_size(&caches).unwrap(), 2.0);

    let mut sink = JsonRecordSink::new();
    weftcache::write_report(&mut sink, &caches).unwrap();
    let json = sink.as_json();
    assert_eq!(json["cache-mean-peak-size"]["value"], 2.0);

    let mut out = Vec::new();
    sink.write_to(&mut out).unwrap();
    assert!(!out.is_empty());
}
