use std::ops::Range;

use crate::counters::MAX_WORKERS;
use crate::error::{BenchError, Result};

/// Static assignment of map shards to insertion workers.
///
/// Worker `w` owns the contiguous run of shards `w * modulo .. (w + 1) * modulo` where
/// `modulo = shard_count / workers`. Since ownership depends only on the shard index, and the shard
/// index only on the key's hash, two workers never write to the same shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionPlan {
    workers: usize,
    shard_count: usize,
    modulo: usize,
}

impl PartitionPlan {
    /// Validate `workers` against `shard_count`.
    /// Rejects any combination where the shard ranges would not tile `0..shard_count` exactly.
    pub fn new(workers: usize, shard_count: usize) -> Result<Self> {
        if workers == 0 || !workers.is_power_of_two() {
            return Err(BenchError::InvalidWorkerCount(workers));
        }
        if workers > MAX_WORKERS {
            return Err(BenchError::TooManyWorkers {
                workers,
                max: MAX_WORKERS,
            });
        }
        if workers > shard_count {
            return Err(BenchError::WorkersExceedShards {
                workers,
                shards: shard_count,
            });
        }
        if shard_count % workers != 0 {
            return Err(BenchError::ShardsNotDivisible {
                workers,
                shards: shard_count,
            });
        }

        Ok(Self {
            workers,
            shard_count,
            modulo: shard_count / workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn shard_count(&self) -> usize {
        self.shard_count
    }

    /// Number of consecutive shards owned by each worker.
    pub fn modulo(&self) -> usize {
        self.modulo
    }

    /// The worker that owns `shard_index`.
    #[inline]
    pub fn owner(&self, shard_index: usize) -> usize {
        shard_index / self.modulo
    }

    #[inline]
    pub fn owns(&self, worker: usize, shard_index: usize) -> bool {
        self.owner(shard_index) == worker
    }

    pub fn shard_range(&self, worker: usize) -> Range<usize> {
        worker * self.modulo..(worker + 1) * self.modulo
    }
}
