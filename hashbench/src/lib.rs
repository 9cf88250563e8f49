pub mod bench;
pub mod counters;
pub mod driver;
pub mod error;
pub mod map;
pub mod memory;
pub mod partition;
pub mod report;
pub mod rsu;
pub mod sampler;
pub mod workload;

pub use bench::{BenchConfig, RunSummary, run};
pub use counters::{MAX_WORKERS, Progress, ProgressCounters};
pub use driver::{insert_partitioned, insert_serial};
pub use error::{BenchError, Result};
pub use map::{BenchMap, MapKind, PartitionedMap};
pub use memory::{MemoryProbe, ProcessMemory};
pub use partition::PartitionPlan;
pub use report::{MemorySink, Record, RecordSink, Timer, WriterSink};
pub use rsu::Rsu;
pub use sampler::{
    AdaptivePolicy, Emission, Sample, Sampler, SamplerConfig, SamplerHandle, SamplerStats,
};
pub use workload::Workload;
