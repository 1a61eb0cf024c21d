//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check capacity, recency and find-or-load behavior over
//! arbitrary operation sequences.

use proptest::prelude::*;
use std::collections::HashSet;

use crate::cache::{BufferStore, Cache};
use crate::config::Config;

// == Test Configuration ==
const TEST_MAX_SIZE: usize = 16;

// == Strategies ==
/// Generates a sequence of store operations for testing
#[derive(Debug, Clone)]
enum CacheOp {
    Insert { value: u16 },
    Get { value: u16 },
    Remove { value: u16 },
    Shrink,
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (0u16..64).prop_map(|value| CacheOp::Insert { value }),
        (0u16..64).prop_map(|value| CacheOp::Get { value }),
        (0u16..64).prop_map(|value| CacheOp::Remove { value }),
        Just(CacheOp::Shrink),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Capacity: for any sequence of operations, the entry count never exceeds
    // the maximum and the reserved slots never exceed the maximum either.
    #[test]
    fn prop_capacity_enforcement(
        increment in 1usize..=TEST_MAX_SIZE,
        ops in prop::collection::vec(cache_op_strategy(), 1..200)
    ) {
        let mut store = BufferStore::new(TEST_MAX_SIZE, increment).unwrap();

        for op in ops {
            match op {
                CacheOp::Insert { value } => {
                    store.insert(value);
                }
                CacheOp::Get { value } => {
                    if let Some(index) = store.find(|v| *v == value) {
                        store.touch(index);
                    }
                }
                CacheOp::Remove { value } => {
                    if let Some(index) = store.find(|v| *v == value) {
                        store.remove_at(index);
                    }
                }
                CacheOp::Shrink => {
                    store.shrink();
                }
            }
            prop_assert!(store.len() <= TEST_MAX_SIZE, "Size {} exceeds max", store.len());
            prop_assert!(store.len() <= store.capacity(), "Entries outgrew reserved slots");
            prop_assert!(store.capacity() <= TEST_MAX_SIZE, "Buffer grew past max");
        }
    }

    // Recency: after any mix of inserts and touches, the tail is the last
    // touched or inserted value and an overflow evicts the head.
    #[test]
    fn prop_recency_order(ops in prop::collection::vec(cache_op_strategy(), 1..100)) {
        let mut store = BufferStore::new(TEST_MAX_SIZE, 4).unwrap();
        let mut model: Vec<u16> = Vec::new();

        for op in ops {
            match op {
                CacheOp::Insert { value } => {
                    if model.len() == TEST_MAX_SIZE {
                        let expected = model.remove(0);
                        prop_assert_eq!(store.insert(value), Some(expected));
                    } else {
                        prop_assert_eq!(store.insert(value), None);
                    }
                    model.push(value);
                }
                CacheOp::Get { value } => {
                    if let Some(index) = store.find(|v| *v == value) {
                        let touched = store.touch(index).value;
                        let position = model.iter().position(|v| *v == value).unwrap();
                        model.remove(position);
                        model.push(touched);
                    }
                }
                CacheOp::Remove { value } => {
                    if let Some(index) = store.find(|v| *v == value) {
                        store.remove_at(index);
                        model.remove(index);
                    }
                }
                CacheOp::Shrink => {
                    store.shrink();
                }
            }

            let actual: Vec<u16> = store.iter().map(|entry| entry.value).collect();
            prop_assert_eq!(&actual, &model, "Recency order diverged");
        }
    }

    // Find-or-load: repeating a lookup with no intervening mutation returns
    // the same value and never grows the cache.
    #[test]
    fn prop_find_or_load_idempotent_on_hit(
        prefill in prop::collection::vec(0u16..64, 0..TEST_MAX_SIZE),
        target in 0u16..64
    ) {
        let rt = runtime();
        let _guard = rt.enter();
        let config = Config {
            max_size: TEST_MAX_SIZE,
            buffer_increment: 4,
            ..Config::default()
        };
        let cache = Cache::from_config(&config).unwrap();
        for value in &prefill {
            cache.insert(*value);
        }

        let first = cache.get_or_load(|v| *v == target, || Ok(target)).unwrap();
        let size_after_first = cache.len();
        let second = cache
            .get_or_load(|v| *v == target, || Err(anyhow::anyhow!("second lookup must hit")))
            .unwrap();

        prop_assert_eq!(first, second);
        prop_assert_eq!(cache.len(), size_after_first);
        prop_assert_eq!(cache.cached_values().last().copied(), Some(target));
    }

    // Eviction: inserting into a full cache drops exactly the least recently
    // touched value and keeps the new one retrievable.
    #[test]
    fn prop_overflow_evicts_exactly_oldest(
        values in prop::collection::hash_set(0u16..1000, 2..TEST_MAX_SIZE),
        touched in any::<prop::sample::Index>()
    ) {
        let values: Vec<u16> = values.into_iter().collect();
        let capacity = values.len();
        let mut store = BufferStore::new(capacity, 1).unwrap();
        for value in &values {
            store.insert(*value);
        }

        // Touch one entry; the head afterwards is the eviction candidate
        let index = touched.index(capacity);
        store.touch(index);
        let oldest = store.iter().next().map(|entry| entry.value).unwrap();

        let evicted = store.insert(5000);

        prop_assert_eq!(evicted, Some(oldest));
        prop_assert_eq!(store.len(), capacity);
        let remaining: HashSet<u16> = store.iter().map(|entry| entry.value).collect();
        prop_assert!(!remaining.contains(&oldest));
        prop_assert!(remaining.contains(&5000));
        prop_assert!(remaining.contains(&values[index]));
    }
}
