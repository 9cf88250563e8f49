use std::collections::HashMap;
use std::sync::Arc;

use rustc_hash::FxBuildHasher;
use shardmap::ShardedMap;
use tracing::info;

use crate::counters::Progress;
use crate::error::{BenchError, Result};
use crate::map::{BenchMap, MapKind};
use crate::memory::MemoryProbe;
use crate::partition::PartitionPlan;
use crate::report::RecordSink;
use crate::sampler::{Sampler, SamplerConfig, SamplerStats};
use crate::workload::{self, Workload, WorkloadContext, WorkloadOutcome};

/// Full description of one benchmark run.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    /// Number of keys.
    pub count: u64,
    pub workload: Workload,
    pub map: MapKind,
    /// Insertion workers for the partitioned random workload.
    pub threads: usize,
    /// Shards of the sharded map, a power of two.
    pub shards: usize,
    /// Super-steps of the random workload.
    pub loops: u64,
    /// Seed of the unique key sequence.
    pub seed: u32,
    pub sampler: SamplerConfig,
}

impl BenchConfig {
    pub fn new(count: u64, workload: Workload) -> Self {
        Self {
            count,
            workload,
            map: MapKind::Sharded,
            threads: 8,
            shards: 64,
            loops: 10,
            seed: 76687,
            sampler: SamplerConfig::default(),
        }
    }

    /// Reject every invalid setting before any thread is started.
    pub fn validate(&self) -> Result<()> {
        if self.loops == 0 {
            return Err("loop count must be at least 1".into());
        }
        if !self.shards.is_power_of_two() {
            return Err(format!("shard count must be a power of two, got {}", self.shards).into());
        }
        if self.sampler.poll_interval.is_zero() {
            return Err("poll interval must be positive".into());
        }
        for threshold in [self.sampler.coarse_threshold, self.sampler.fine_threshold] {
            if !(threshold.is_finite() && threshold > 0.0) {
                return Err(format!("sampler threshold must be positive, got {threshold}").into());
            }
        }
        self.partition_plan()?;
        Ok(())
    }

    /// Worker-to-shard assignment for the random workload, `None` when it runs single-threaded.
    pub fn partition_plan(&self) -> Result<Option<PartitionPlan>> {
        match (self.map, self.workload) {
            (MapKind::Sharded, Workload::Random) => {
                Ok(Some(PartitionPlan::new(self.threads, self.shards)?))
            }
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub workload: WorkloadOutcome,
    pub sampler: SamplerStats,
}

/// Run one benchmark: validate, start the sampler, run the workload, stop the sampler.
///
/// The sampler is stopped and joined and the sink flushed whether or not the workload
/// succeeded; records emitted before a failure stay in the sink.
pub fn run(
    config: &BenchConfig,
    sink: Arc<dyn RecordSink>,
    probe: Arc<dyn MemoryProbe>,
) -> Result<RunSummary> {
    config.validate()?;
    let plan = config.partition_plan()?;

    match config.map {
        MapKind::Std => execute(
            config,
            plan,
            sink,
            probe,
            HashMap::<i64, i64, FxBuildHasher>::default(),
            HashMap::<String, i64, FxBuildHasher>::default(),
        ),
        MapKind::Sharded => execute(
            config,
            plan,
            sink,
            probe,
            ShardedMap::<i64, i64>::with_shards(config.shards),
            ShardedMap::<String, i64>::with_shards(config.shards),
        ),
    }
}

fn execute<N, T>(
    config: &BenchConfig,
    plan: Option<PartitionPlan>,
    sink: Arc<dyn RecordSink>,
    probe: Arc<dyn MemoryProbe>,
    mut numeric: N,
    mut strings: T,
) -> Result<RunSummary>
where
    N: BenchMap<i64>,
    T: BenchMap<String>,
{
    let test = config.workload.name();
    let tag = config.map.tag();
    let progress = Arc::new(Progress::new());

    info!(
        test,
        tag,
        count = config.count,
        workers = plan.map_or(1, |p| p.workers()),
        "starting benchmark"
    );

    let sampler = Sampler::new(
        config.sampler,
        test,
        tag,
        Arc::clone(&progress),
        probe,
        Arc::clone(&sink),
    )
    .spawn()?;

    let ctx = WorkloadContext {
        test,
        tag,
        progress: &progress,
        sink: sink.as_ref(),
    };
    let count = config.count;
    let outcome = match config.workload {
        Workload::Sequential => workload::sequential(&mut numeric, count, &ctx),
        Workload::Random => workload::random(
            &mut numeric,
            count,
            config.loops,
            config.seed,
            plan.as_ref(),
            &ctx,
        ),
        Workload::Lookup => workload::lookup(&mut numeric, count, &ctx),
        Workload::Delete => workload::delete(&mut numeric, count, &ctx),
        Workload::SequentialString => workload::sequential_string(&mut strings, count, &ctx),
        Workload::RandomString => workload::random_string(&mut strings, count, &ctx),
        Workload::DeleteString => workload::delete_string(&mut strings, count, &ctx),
    };

    let sampler = sampler.stop();
    let flushed = sink.flush().map_err(BenchError::from);
    let outcome = outcome?;
    let sampler = sampler?;
    flushed?;

    info!(
        elapsed = ?outcome.elapsed,
        len = outcome.len,
        records = sampler.records,
        peak_bytes = sampler.peak_bytes,
        "benchmark finished"
    );
    Ok(RunSummary {
        workload: outcome,
        sampler,
    })
}
