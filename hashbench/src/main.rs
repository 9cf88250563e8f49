use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use hashbench::{
    BenchConfig, MapKind, ProcessMemory, RecordSink, SamplerConfig, Workload, WriterSink,
};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hashbench")]
#[command(about = "Throughput and memory benchmark for hash maps")]
struct Cli {
    /// Number of keys
    count: u64,

    /// Workload to run
    #[arg(value_enum)]
    workload: Workload,

    /// Map implementation under test
    #[arg(long, value_enum, default_value = "sharded")]
    map: MapKind,

    /// Insertion workers for the random workload (power of two)
    #[arg(long, default_value = "8")]
    threads: usize,

    /// Shards of the sharded map (power of two, multiple of --threads)
    #[arg(long, default_value = "64")]
    shards: usize,

    /// Super-steps of the random workload
    #[arg(long, default_value = "10")]
    loops: u64,

    /// Seed of the unique key sequence
    #[arg(long, default_value = "76687")]
    seed: u32,

    /// Memory poll interval in milliseconds
    #[arg(long, default_value = "1")]
    poll_ms: u64,

    /// Delay before the first memory reading in milliseconds
    #[arg(long, default_value = "10")]
    settle_ms: u64,

    /// Change since the last memory record that triggers a new one
    #[arg(long, default_value = "0.03")]
    coarse_threshold: f64,

    /// Change since the previous poll that triggers a memory record
    #[arg(long, default_value = "0.01")]
    fine_threshold: f64,

    /// Write records to this file instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

impl Cli {
    fn config(&self) -> BenchConfig {
        BenchConfig {
            count: self.count,
            workload: self.workload,
            map: self.map,
            threads: self.threads,
            shards: self.shards,
            loops: self.loops,
            seed: self.seed,
            sampler: SamplerConfig {
                poll_interval: Duration::from_millis(self.poll_ms),
                settle_delay: Duration::from_millis(self.settle_ms),
                coarse_threshold: self.coarse_threshold,
                fine_threshold: self.fine_threshold,
            },
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> hashbench::Result<()> {
    let config = cli.config();
    config.validate()?;

    let sink: Arc<dyn RecordSink> = match &cli.output {
        Some(path) => Arc::new(WriterSink::create(path)?),
        None => Arc::new(WriterSink::stdout()),
    };
    hashbench::run(&config, sink, Arc::new(ProcessMemory))?;
    Ok(())
}
