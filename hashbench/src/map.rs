use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

use clap::ValueEnum;
use shardmap::ShardedMap;

/// Map operations the workloads drive.
pub trait BenchMap<K> {
    fn insert(&mut self, key: K, value: i64);

    /// `true` if `key` is present.
    fn contains(&self, key: &K) -> bool;

    /// `true` if `key` was present.
    fn remove(&mut self, key: &K) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The sharded view of this map, if it has one.
    fn partitioned(&self) -> Option<&dyn PartitionedMap<K>> {
        None
    }
}

/// A map split into a fixed number of independently locked shards, insertable through a shared
/// reference from many threads.
pub trait PartitionedMap<K>: Sync {
    fn hash_key(&self, key: &K) -> u64;

    /// Shard that stores keys with this hash, in `0..shard_count()`.
    fn shard_index(&self, hash: u64) -> usize;

    fn shard_count(&self) -> usize;

    fn insert_shared(&self, key: K, value: i64);
}

impl<K, S> BenchMap<K> for HashMap<K, i64, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn insert(&mut self, key: K, value: i64) {
        HashMap::insert(self, key, value);
    }

    fn contains(&self, key: &K) -> bool {
        self.contains_key(key)
    }

    fn remove(&mut self, key: &K) -> bool {
        HashMap::remove(self, key).is_some()
    }

    fn len(&self) -> usize {
        HashMap::len(self)
    }
}

impl<K, S> BenchMap<K> for ShardedMap<K, i64, S>
where
    K: Eq + Hash + Send + Sync,
    S: BuildHasher + Clone + Send + Sync,
{
    fn insert(&mut self, key: K, value: i64) {
        ShardedMap::insert(self, key, value);
    }

    fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    fn remove(&mut self, key: &K) -> bool {
        ShardedMap::remove(self, key).is_some()
    }

    fn len(&self) -> usize {
        ShardedMap::len(self)
    }

    fn partitioned(&self) -> Option<&dyn PartitionedMap<K>> {
        Some(self)
    }
}

impl<K, S> PartitionedMap<K> for ShardedMap<K, i64, S>
where
    K: Eq + Hash + Send + Sync,
    S: BuildHasher + Clone + Send + Sync,
{
    fn hash_key(&self, key: &K) -> u64 {
        self.hash(key)
    }

    fn shard_index(&self, hash: u64) -> usize {
        ShardedMap::shard_index(self, hash)
    }

    fn shard_count(&self) -> usize {
        ShardedMap::shard_count(self)
    }

    fn insert_shared(&self, key: K, value: i64) {
        ShardedMap::insert(self, key, value);
    }
}

/// Map implementation under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MapKind {
    /// `std::collections::HashMap`, single-threaded
    Std,
    /// `shardmap::ShardedMap`, partitioned across worker threads for random inserts
    Sharded,
}

impl MapKind {
    /// Implementation tag written into every record.
    pub fn tag(&self) -> &'static str {
        match self {
            MapKind::Std => "std::collections::HashMap",
            MapKind::Sharded => "shardmap::ShardedMap",
        }
    }
}
