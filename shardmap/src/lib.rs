use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

pub mod refs;

use crossbeam_utils::CachePadded;
use parking_lot::{RwLock, RwLockReadGuard};
use rustc_hash::FxBuildHasher;

pub use crate::refs::Ref;

/// A concurrent, sharded in-memory hash map.
/// Each shard is an independent `HashMap` behind its own `RwLock`; the shard a key lives in is a
/// pure function of the key's hash, see [`ShardedMap::shard_index`].
pub struct ShardedMap<K, V, S = FxBuildHasher> {
    shift: u32,
    shards: Box<[CachePadded<RwLock<HashMap<K, V, S>>>]>,
    hasher: S,
}

impl<K, V> ShardedMap<K, V, FxBuildHasher>
where
    K: Eq + Hash,
{
    /// Create a new sharded map with the given number of shards, rounded up to a power of two.
    pub fn with_shards(shard_count: usize) -> Self {
        Self::with_hasher_and_shards(FxBuildHasher, shard_count)
    }
}

impl<K, V, S> ShardedMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone,
{
    /// Create a new sharded map with a custom hasher and number of shards.
    /// Every shard uses a clone of `hasher`, so [`ShardedMap::hash`] is the hash the shard sees.
    pub fn with_hasher_and_shards(hasher: S, shard_count: usize) -> Self {
        let shard_count = shard_count.next_power_of_two();
        let shift = u64::BITS - shard_count.trailing_zeros();

        let shards = (0..shard_count)
            .map(|_| CachePadded::new(RwLock::new(HashMap::with_hasher(hasher.clone()))))
            .collect::<Vec<_>>();

        Self {
            shift,
            shards: shards.into_boxed_slice(),
            hasher,
        }
    }

    pub fn shards(&self) -> &[CachePadded<RwLock<HashMap<K, V, S>>>] {
        &self.shards
    }

    /// Hash a key with the map's hasher.
    pub fn hash<Q>(&self, key: &Q) -> u64
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.hasher.hash_one(key)
    }

    /// Map a hash to the shard that owns it.
    /// The top 7 bits are dropped and the next `log2(shard_count)` bits select the shard, leaving
    /// the low bits untouched for the shard's own bucket selection.
    pub fn shard_index(&self, hash: u64) -> usize {
        (hash << 7).checked_shr(self.shift).unwrap_or(0) as usize
    }

    /// Get the number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard_for_key<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard_index(self.hash(key))
    }

    /// Get a read reference to a value in the map.
    /// The owning shard stays read-locked for as long as the returned [`Ref`] lives.
    pub fn get<Q>(&self, key: &Q) -> Option<Ref<'_, V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let shard = self.shards[self.shard_for_key(key)].read();
        RwLockReadGuard::try_map(shard, |map| map.get(key))
            .ok()
            .map(Ref::new)
    }

    /// Insert a key-value pair into the map, returning the previous value if there was one.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let shard_idx = self.shard_for_key(&key);
        self.shards[shard_idx].write().insert(key, value)
    }

    /// Remove a key from the map.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let shard_idx = self.shard_for_key(key);
        self.shards[shard_idx].write().remove(key)
    }

    /// Check if the map contains a key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let shard_idx = self.shard_for_key(key);
        self.shards[shard_idx].read().contains_key(key)
    }

    /// Get an approximate length of the map (sum of all shard lengths).
    /// This is approximate because shards can be modified concurrently.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    /// Check if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.read().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_basic_operations() {
        let map: ShardedMap<String, String> = ShardedMap::with_shards(8);

        // Test insert and get
        assert!(map.insert("key1".to_string(), "value1".to_string()).is_none());
        assert_eq!(map.get("key1").unwrap().value(), "value1");

        // Test contains_key
        assert!(map.contains_key("key1"));
        assert!(!map.contains_key("key2"));

        // Test update
        assert_eq!(
            map.insert("key1".to_string(), "value2".to_string()),
            Some("value1".to_string())
        );
        assert_eq!(map.get("key1").unwrap().as_str(), "value2");

        // Test remove
        assert_eq!(map.remove("key1"), Some("value2".to_string()));
        assert!(!map.contains_key("key1"));
        assert!(map.is_empty());
    }

    #[test]
    fn test_concurrent_access() {
        let map: Arc<ShardedMap<String, String>> = Arc::new(ShardedMap::with_shards(16));

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let map = Arc::clone(&map);
                thread::spawn(move || {
                    for j in 0..100 {
                        let key = format!("key_{i}_{j}");
                        let value = format!("value_{i}_{j}");
                        map.insert(key.clone(), value.clone());
                        assert_eq!(*map.get(&key).unwrap(), value);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        // Verify all entries exist
        for i in 0..10 {
            for j in 0..100 {
                let key = format!("key_{i}_{j}");
                let expected_value = format!("value_{i}_{j}");
                assert_eq!(*map.get(&key).unwrap(), expected_value);
            }
        }

        assert_eq!(map.len(), 1000);
    }

    #[test]
    fn test_shard_distribution() {
        let map: ShardedMap<u64, u64> = ShardedMap::with_shards(8);

        // Insert many keys and verify they're distributed across shards
        let mut shard_usage = [0; 8];
        for i in 0..1000u64 {
            let shard_idx = map.shard_index(map.hash(&i));
            shard_usage[shard_idx] += 1;
            map.insert(i, i * 2);
        }

        // Verify all shards are used (probabilistically very likely with 1000 keys)
        assert!(shard_usage.iter().all(|&count| count > 0));

        assert_eq!(shard_usage.iter().sum::<usize>(), 1000);
        assert_eq!(map.len(), 1000);

        // Every key must live in the shard its hash points at
        for (idx, shard) in map.shards().iter().enumerate() {
            for key in shard.read().keys() {
                assert_eq!(map.shard_index(map.hash(key)), idx);
            }
            assert_eq!(shard.read().len(), shard_usage[idx]);
        }
    }

    #[test]
    fn test_shard_count_rounds_to_power_of_two() {
        let map: ShardedMap<u32, i64> = ShardedMap::with_shards(12);
        assert_eq!(map.shard_count(), 16);

        let single: ShardedMap<u32, i64> = ShardedMap::with_shards(1);
        assert_eq!(single.shard_count(), 1);
        assert_eq!(single.shard_index(u64::MAX), 0);
        assert_eq!(single.shard_index(0), 0);
    }

    #[test]
    fn shard_index_is_always_in_range() {
        proptest!(|(hash in any::<u64>(), log2 in 0u32..12)| {
            let map: ShardedMap<u32, i64> = ShardedMap::with_shards(1 << log2);
            prop_assert!(map.shard_index(hash) < map.shard_count());
        });
    }
}
