use std::time::Duration;

use clap::ValueEnum;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::counters::{CounterSlot, Progress};
use crate::driver::{insert_partitioned, insert_serial};
use crate::error::Result;
use crate::map::BenchMap;
use crate::partition::PartitionPlan;
use crate::report::{Record, RecordSink, Timer};
use crate::rsu::Rsu;

/// Seed for the fill, shuffle and probe generator, fixed so every map sees the same keys.
const FILL_SEED: u64 = 1;

/// Upper bound of the random string keys.
const RANDOM_STRING_MAX: u32 = i32::MAX as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Workload {
    /// Insert 0..count in order
    #[value(name = "sequential")]
    Sequential,
    /// Insert unique pseudo-random keys in super-steps, partitioned across workers when possible
    #[value(name = "random")]
    Random,
    /// Fill, then probe every present key and as many random ones
    #[value(name = "lookup")]
    Lookup,
    /// Fill, then erase every key in shuffled order
    #[value(name = "delete")]
    Delete,
    /// Insert the decimal strings of 0..count
    #[value(name = "sequentialstring")]
    SequentialString,
    /// Insert decimal strings of random numbers
    #[value(name = "randomstring")]
    RandomString,
    /// Insert, then erase, the decimal strings of 0..count
    #[value(name = "deletestring")]
    DeleteString,
}

impl Workload {
    /// Test name written into every record.
    pub fn name(&self) -> &'static str {
        match self {
            Workload::Sequential => "sequential",
            Workload::Random => "random",
            Workload::Lookup => "lookup",
            Workload::Delete => "delete",
            Workload::SequentialString => "sequentialstring",
            Workload::RandomString => "randomstring",
            Workload::DeleteString => "deletestring",
        }
    }
}

/// What the workloads share with the orchestrator and the sampler.
pub struct WorkloadContext<'a> {
    pub test: &'static str,
    pub tag: &'static str,
    pub progress: &'a Progress,
    pub sink: &'a dyn RecordSink,
}

impl WorkloadContext<'_> {
    fn report_time(&self, count: i64, timer: &Timer) -> Result<()> {
        self.sink.emit(Record::Time {
            test: self.test,
            count,
            tag: self.tag,
            seconds: timer.seconds(),
        })?;
        Ok(())
    }

    fn slot(&self) -> CounterSlot<'_> {
        self.progress.counters().slot(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkloadOutcome {
    /// Duration of the timed phase.
    pub elapsed: Duration,
    /// Map size once the workload finished.
    pub len: usize,
    /// Successful probes, lookup only.
    pub hits: Option<usize>,
}

pub fn sequential<M: BenchMap<i64>>(
    map: &mut M,
    count: u64,
    ctx: &WorkloadContext<'_>,
) -> Result<WorkloadOutcome> {
    let slot = ctx.slot();
    let timer = Timer::start();
    for key in 0..count as i64 {
        map.insert(key, 0);
        slot.increment();
    }
    ctx.report_time(count as i64, &timer)?;

    Ok(WorkloadOutcome {
        elapsed: timer.elapsed(),
        len: map.len(),
        hits: None,
    })
}

/// Insert `count` keys of the unique sequence seeded by `seed` in `loops` super-steps.
///
/// The super-step index is published before each step and set to `loops` after the last one, and
/// a time record with the cumulative count follows every step. With a `plan` and a partitionable
/// map each step runs on the plan's workers; otherwise it runs on this thread.
pub fn random<M: BenchMap<i64>>(
    map: &mut M,
    count: u64,
    loops: u64,
    seed: u32,
    plan: Option<&PartitionPlan>,
    ctx: &WorkloadContext<'_>,
) -> Result<WorkloadOutcome> {
    let mut rsu = Rsu::new(seed, seed.wrapping_add(1));
    let per_loop = count / loops;
    let timer = Timer::start();

    for loop_idx in 0..loops {
        ctx.progress.set_loop_index(loop_idx as usize);
        // the last step picks up the remainder
        let step = if loop_idx + 1 == loops {
            count - per_loop * (loops - 1)
        } else {
            per_loop
        };
        insert_step(map, plan, step, &mut rsu, ctx.progress)?;

        let total = ctx.progress.total();
        ctx.report_time(total, &timer)?;
        debug!(loop_idx, total, "super-step finished");
    }
    ctx.progress.set_loop_index(loops as usize);

    info!("inserted {:.2}M", map.len() as f64 / 1_000_000.0);
    Ok(WorkloadOutcome {
        elapsed: timer.elapsed(),
        len: map.len(),
        hits: None,
    })
}

fn insert_step<M: BenchMap<i64>>(
    map: &mut M,
    plan: Option<&PartitionPlan>,
    count: u64,
    rsu: &mut Rsu,
    progress: &Progress,
) -> Result<()> {
    if let Some(plan) = plan {
        if let Some(partitioned) = map.partitioned() {
            return insert_partitioned(partitioned, plan, count, rsu, progress.counters());
        }
    }
    insert_serial(map, count, rsu, progress.counters());
    Ok(())
}

/// `i * 10 + r` for `r` in `0..10`, shuffled.
fn fill_values(len: usize, rng: &mut ChaCha8Rng) -> Vec<i64> {
    let mut values: Vec<i64> = (0..len as i64)
        .map(|i| i * 10 + rng.random_range(0..10))
        .collect();
    values.shuffle(rng);
    values
}

fn insert_all<M: BenchMap<i64>>(map: &mut M, values: &[i64], slot: &CounterSlot<'_>) {
    for &value in values {
        map.insert(value, 0);
        slot.increment();
    }
}

pub fn lookup<M: BenchMap<i64>>(
    map: &mut M,
    count: u64,
    ctx: &WorkloadContext<'_>,
) -> Result<WorkloadOutcome> {
    let mut rng = ChaCha8Rng::seed_from_u64(FILL_SEED);
    let values = fill_values(count as usize, &mut rng);
    insert_all(map, &values, &ctx.slot());

    let max_val = values.len() as i64 * 10;
    let timer = Timer::start();
    let mut hits = 0;
    for value in &values {
        hits += map.contains(value) as usize;
        hits += map.contains(&rng.random_range(0..max_val)) as usize;
    }
    ctx.report_time(count as i64, &timer)?;
    debug!(hits, "lookup finished");

    Ok(WorkloadOutcome {
        elapsed: timer.elapsed(),
        len: map.len(),
        hits: Some(hits),
    })
}

pub fn delete<M: BenchMap<i64>>(
    map: &mut M,
    count: u64,
    ctx: &WorkloadContext<'_>,
) -> Result<WorkloadOutcome> {
    let mut rng = ChaCha8Rng::seed_from_u64(FILL_SEED);
    let mut values = fill_values(count as usize, &mut rng);
    insert_all(map, &values, &ctx.slot());
    // don't delete in insertion order
    values.shuffle(&mut rng);

    let timer = Timer::start();
    for value in &values {
        map.remove(value);
    }
    ctx.report_time(count as i64, &timer)?;

    Ok(WorkloadOutcome {
        elapsed: timer.elapsed(),
        len: map.len(),
        hits: None,
    })
}

pub fn sequential_string<M: BenchMap<String>>(
    map: &mut M,
    count: u64,
    ctx: &WorkloadContext<'_>,
) -> Result<WorkloadOutcome> {
    let slot = ctx.slot();
    let timer = Timer::start();
    for i in 0..count {
        map.insert(i.to_string(), 0);
        slot.increment();
    }
    ctx.report_time(count as i64, &timer)?;

    Ok(WorkloadOutcome {
        elapsed: timer.elapsed(),
        len: map.len(),
        hits: None,
    })
}

pub fn random_string<M: BenchMap<String>>(
    map: &mut M,
    count: u64,
    ctx: &WorkloadContext<'_>,
) -> Result<WorkloadOutcome> {
    let mut rng = ChaCha8Rng::seed_from_u64(FILL_SEED);
    let slot = ctx.slot();
    let timer = Timer::start();
    for _ in 0..count {
        map.insert(rng.random_range(0..=RANDOM_STRING_MAX).to_string(), 0);
        slot.increment();
    }
    ctx.report_time(count as i64, &timer)?;

    Ok(WorkloadOutcome {
        elapsed: timer.elapsed(),
        len: map.len(),
        hits: None,
    })
}

/// Only the erase phase is timed.
pub fn delete_string<M: BenchMap<String>>(
    map: &mut M,
    count: u64,
    ctx: &WorkloadContext<'_>,
) -> Result<WorkloadOutcome> {
    let slot = ctx.slot();
    let mut timer = Timer::start();
    for i in 0..count {
        map.insert(i.to_string(), 0);
        slot.increment();
    }

    timer.reset();
    for i in 0..count {
        map.remove(&i.to_string());
    }
    ctx.report_time(count as i64, &timer)?;

    Ok(WorkloadOutcome {
        elapsed: timer.elapsed(),
        len: map.len(),
        hits: None,
    })
}
