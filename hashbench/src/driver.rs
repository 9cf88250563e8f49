//! Partitioned concurrent insertion.
//!
//! Each worker walks the same stretch of the key sequence from its own copy of the generator and
//! inserts only the keys whose shard it owns under the [`PartitionPlan`]. Shard ownership is
//! disjoint, so workers never contend on a shard lock, and the only other state a worker writes is
//! its own progress counter slot.

use std::thread;

use tracing::trace;

use crate::counters::{CounterSlot, ProgressCounters};
use crate::error::{BenchError, Result};
use crate::map::{BenchMap, PartitionedMap};
use crate::partition::PartitionPlan;
use crate::rsu::Rsu;

/// Everything one worker needs; consumed by the worker thread.
struct InsertTask<'a, M: ?Sized> {
    worker: usize,
    plan: PartitionPlan,
    count: u64,
    map: &'a M,
    rsu: Rsu,
}

impl<M> InsertTask<'_, M>
where
    M: PartitionedMap<i64> + ?Sized,
{
    fn run(mut self, slot: CounterSlot<'_>) {
        for key in self.rsu.by_ref().take(self.count as usize) {
            let key = i64::from(key);
            let shard = self.map.shard_index(self.map.hash_key(&key));
            if self.plan.owns(self.worker, shard) {
                self.map.insert_shared(key, 0);
                slot.increment();
            }
        }
        trace!(worker = self.worker, "insert task finished");
    }
}

/// Insert the next `count` keys of `rsu` into `map` using one thread per worker in `plan`.
///
/// On return `rsu` has been advanced by `count`, exactly as if the keys had been drawn from it
/// directly, so the next call continues the sequence. A panicking worker is reported as
/// [`BenchError::WorkerPanicked`] after all workers have been joined.
pub fn insert_partitioned<M>(
    map: &M,
    plan: &PartitionPlan,
    count: u64,
    rsu: &mut Rsu,
    counters: &ProgressCounters,
) -> Result<()>
where
    M: PartitionedMap<i64> + ?Sized,
{
    if plan.shard_count() != map.shard_count() {
        return Err(BenchError::InvalidArgument(format!(
            "partition plan is for {} shards but the map has {}",
            plan.shard_count(),
            map.shard_count()
        )));
    }
    if count == 0 {
        return Ok(());
    }

    thread::scope(|s| {
        let handles = (0..plan.workers())
            .map(|worker| {
                let task = InsertTask {
                    worker,
                    plan: *plan,
                    count,
                    map,
                    rsu: rsu.clone(),
                };
                let slot = counters.slot(worker);
                thread::Builder::new()
                    .name(format!("insert-{worker}"))
                    .spawn_scoped(s, move || task.run(slot))
            })
            .collect::<std::io::Result<Vec<_>>>();

        // workers replay private copies of the sequence, move the reference copy past them
        rsu.advance(count);

        let mut result = Ok(());
        for (worker, handle) in handles?.into_iter().enumerate() {
            if handle.join().is_err() && result.is_ok() {
                result = Err(BenchError::WorkerPanicked { worker });
            }
        }
        result
    })
}

/// Single-threaded counterpart of [`insert_partitioned`] for maps without shards.
pub fn insert_serial<M>(map: &mut M, count: u64, rsu: &mut Rsu, counters: &ProgressCounters)
where
    M: BenchMap<i64> + ?Sized,
{
    let slot = counters.slot(0);
    for key in rsu.take(count as usize) {
        map.insert(i64::from(key), 0);
        slot.increment();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};
    use shardmap::ShardedMap;
    use std::collections::HashMap;
    use std::thread::ThreadId;

    /// Sharded map stand-in that remembers which thread inserted each key.
    struct RecordingMap {
        inner: ShardedMap<i64, i64>,
        inserts: Mutex<Vec<(ThreadId, i64)>>,
    }

    impl PartitionedMap<i64> for RecordingMap {
        fn hash_key(&self, key: &i64) -> u64 {
            self.inner.hash(key)
        }

        fn shard_index(&self, hash: u64) -> usize {
            self.inner.shard_index(hash)
        }

        fn shard_count(&self) -> usize {
            self.inner.shard_count()
        }

        fn insert_shared(&self, key: i64, value: i64) {
            self.inserts.lock().push((thread::current().id(), key));
            self.inner.insert(key, value);
        }
    }

    #[test]
    fn test_partitioned_insert_counts_every_key_once() {
        let map: ShardedMap<i64, i64> = ShardedMap::with_shards(64);
        let plan = PartitionPlan::new(8, 64).unwrap();
        let counters = ProgressCounters::new();
        let mut rsu = Rsu::new(76687, 76688);

        insert_partitioned(&map, &plan, 1000, &mut rsu, &counters).unwrap();

        // the generator never repeats, so every candidate is accepted by exactly one worker
        assert_eq!(counters.total(), 1000);
        assert_eq!(map.len(), 1000);
        for (worker, range) in (0..8).map(|w| (w, plan.shard_range(w))) {
            let in_range: usize = map.shards()[range].iter().map(|s| s.read().len()).sum();
            assert_eq!(counters.get(worker) as usize, in_range);
        }

        // same keys as a plain walk of the sequence
        let expected: FxHashSet<i64> = Rsu::new(76687, 76688).take(1000).map(i64::from).collect();
        for key in &expected {
            assert!(map.contains_key(key));
        }
    }

    #[test]
    fn test_workers_only_insert_owned_shards() {
        let map = RecordingMap {
            inner: ShardedMap::with_shards(64),
            inserts: Mutex::new(Vec::new()),
        };
        let plan = PartitionPlan::new(8, 64).unwrap();
        let counters = ProgressCounters::new();
        let mut rsu = Rsu::new(1, 2);

        insert_partitioned(&map, &plan, 5000, &mut rsu, &counters).unwrap();

        let inserts = map.inserts.into_inner();
        assert_eq!(inserts.len(), 5000);

        // every thread wrote into exactly one worker's shard range
        let mut owner_by_thread: FxHashMap<ThreadId, usize> = FxHashMap::default();
        for (thread_id, key) in inserts {
            let owner = plan.owner(map.inner.shard_index(map.inner.hash(&key)));
            let first = *owner_by_thread.entry(thread_id).or_insert(owner);
            assert_eq!(first, owner);
        }
        assert!(owner_by_thread.len() <= 8);
    }

    #[test]
    fn test_reference_generator_resumes_after_run() {
        let map: ShardedMap<i64, i64> = ShardedMap::with_shards(16);
        let plan = PartitionPlan::new(4, 16).unwrap();
        let counters = ProgressCounters::new();

        let mut rsu = Rsu::new(5, 6);
        insert_partitioned(&map, &plan, 300, &mut rsu, &counters).unwrap();
        insert_partitioned(&map, &plan, 300, &mut rsu, &counters).unwrap();

        let mut expected = Rsu::new(5, 6);
        expected.advance(600);
        assert_eq!(rsu, expected);
        assert_eq!(map.len(), 600);
        assert_eq!(counters.total(), 600);
    }

    #[test]
    fn test_zero_count_is_noop() {
        let map: ShardedMap<i64, i64> = ShardedMap::with_shards(8);
        let plan = PartitionPlan::new(8, 8).unwrap();
        let counters = ProgressCounters::new();
        let mut rsu = Rsu::new(1, 1);
        let before = rsu.clone();

        insert_partitioned(&map, &plan, 0, &mut rsu, &counters).unwrap();
        assert_eq!(rsu, before);
        assert!(map.is_empty());
        assert_eq!(counters.total(), 0);
    }

    #[test]
    fn test_plan_for_other_shard_count_is_rejected() {
        let map: ShardedMap<i64, i64> = ShardedMap::with_shards(32);
        let plan = PartitionPlan::new(8, 64).unwrap();
        let counters = ProgressCounters::new();
        let mut rsu = Rsu::new(1, 1);

        let err = insert_partitioned(&map, &plan, 10, &mut rsu, &counters).unwrap_err();
        assert!(matches!(err, BenchError::InvalidArgument(_)));
        assert!(map.is_empty());
    }

    #[test]
    fn test_worker_panic_is_reported() {
        struct PanickyMap(ShardedMap<i64, i64>);

        impl PartitionedMap<i64> for PanickyMap {
            fn hash_key(&self, key: &i64) -> u64 {
                self.0.hash(key)
            }
            fn shard_index(&self, hash: u64) -> usize {
                self.0.shard_index(hash)
            }
            fn shard_count(&self) -> usize {
                self.0.shard_count()
            }
            fn insert_shared(&self, key: i64, _value: i64) {
                let shard = self.shard_index(self.hash_key(&key));
                if shard < 4 {
                    panic!("allocation failed");
                }
                self.0.insert(key, 0);
            }
        }

        let map = PanickyMap(ShardedMap::with_shards(8));
        let plan = PartitionPlan::new(2, 8).unwrap();
        let counters = ProgressCounters::new();
        let mut rsu = Rsu::new(1, 1);

        let err = insert_partitioned(&map, &plan, 1000, &mut rsu, &counters).unwrap_err();
        assert!(matches!(err, BenchError::WorkerPanicked { worker: 0 }));
    }

    #[test]
    fn test_serial_insert() {
        let mut map: HashMap<i64, i64, FxBuildHasher> = HashMap::default();
        let counters = ProgressCounters::new();
        let mut rsu = Rsu::new(9, 10);

        insert_serial(&mut map, 250, &mut rsu, &counters);
        assert_eq!(map.len(), 250);
        assert_eq!(counters.get(0), 250);

        let mut expected = Rsu::new(9, 10);
        expected.advance(250);
        assert_eq!(rsu, expected);
    }
}
