use std::io;
use thiserror::Error;

/// Errors that can occur while configuring or running a benchmark
#[derive(Error, Debug)]
pub enum BenchError {
    /// Worker count is zero or not a power of two
    #[error("worker count must be a non-zero power of two, got {0}")]
    InvalidWorkerCount(usize),

    /// More workers than there are progress counter slots
    #[error("worker count {workers} exceeds the supported maximum of {max}")]
    TooManyWorkers { workers: usize, max: usize },

    /// Not every worker would own at least one shard
    #[error("{workers} workers cannot partition {shards} shards")]
    WorkersExceedShards { workers: usize, shards: usize },

    /// Shard ranges would not cover the map exactly
    #[error("worker count {workers} does not evenly divide shard count {shards}")]
    ShardsNotDivisible { workers: usize, shards: usize },

    /// A partitioned insertion worker panicked
    #[error("insertion worker {worker} panicked")]
    WorkerPanicked { worker: usize },

    /// The memory sampler thread panicked
    #[error("memory sampler panicked")]
    SamplerPanicked,

    /// IO errors when writing the record stream
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, BenchError>;

impl From<String> for BenchError {
    fn from(msg: String) -> Self {
        BenchError::InvalidArgument(msg)
    }
}

impl From<&str> for BenchError {
    fn from(msg: &str) -> Self {
        BenchError::InvalidArgument(msg.to_string())
    }
}
