//! The line-oriented result stream.
//!
//! Each record is one CSV line, either `<test>,time,<count>,<impl>,<seconds>` or
//! `<test>,memory,<count>,<impl>,<bytes>`. Time records come from the orchestrating thread and
//! memory records from the sampler, interleaved in emission order.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Time {
        test: &'static str,
        count: i64,
        tag: &'static str,
        seconds: f64,
    },
    Memory {
        test: &'static str,
        count: i64,
        tag: &'static str,
        bytes: u64,
    },
}

impl Record {
    pub fn count(&self) -> i64 {
        match self {
            Record::Time { count, .. } | Record::Memory { count, .. } => *count,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Time {
                test,
                count,
                tag,
                seconds,
            } => write!(f, "{test},time,{count},{tag},{seconds:.6}"),
            Record::Memory {
                test,
                count,
                tag,
                bytes,
            } => write!(f, "{test},memory,{count},{tag},{bytes}"),
        }
    }
}

/// Wall clock for a timed phase, reported in seconds at millisecond resolution.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn reset(&mut self) {
        self.start = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn seconds(&self) -> f64 {
        self.elapsed().as_millis() as f64 / 1000.0
    }
}

/// Destination for records. Shared by the orchestrator and the sampler thread.
pub trait RecordSink: Send + Sync {
    fn emit(&self, record: Record) -> io::Result<()>;

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes each record as a line to any `Write`.
pub struct WriterSink<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl WriterSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl WriterSink<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write + Send> RecordSink for WriterSink<W> {
    fn emit(&self, record: Record) -> io::Result<()> {
        writeln!(self.out.lock(), "{record}")
    }

    fn flush(&self) -> io::Result<()> {
        self.out.lock().flush()
    }
}

/// Keeps records in memory, in emission order.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<Record>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }
}

impl RecordSink for MemorySink {
    fn emit(&self, record: Record) -> io::Result<()> {
        self.records.lock().push(record);
        Ok(())
    }
}
