//! Background memory/progress sampler.
//!
//! The sampler thread polls resident memory on a short fixed interval and decides after every poll
//! whether the reading is worth a record. Dense output during volatile phases and sparse output
//! during steady growth comes from [`AdaptivePolicy`]; the thread itself only reads the shared
//! [`Progress`] and never touches the map or any lock the insertion workers take.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::counters::Progress;
use crate::error::{BenchError, Result};
use crate::memory::MemoryProbe;
use crate::report::{Record, RecordSink};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerConfig {
    /// Delay between memory polls.
    pub poll_interval: Duration,
    /// Delay before the first reading.
    pub settle_delay: Duration,
    /// Relative change from the last emitted reading that triggers a record.
    pub coarse_threshold: f64,
    /// Relative change from the previous poll that triggers a record.
    pub fine_threshold: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            settle_delay: Duration::from_millis(10),
            coarse_threshold: 0.03,
            fine_threshold: 0.01,
        }
    }
}

/// One observation: cumulative insert count and resident bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub count: i64,
    pub bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    None,
    Single(Sample),
    /// Readings on both sides of a sudden allocation.
    Bracket { before: Sample, after: Sample },
}

impl Emission {
    pub fn is_none(&self) -> bool {
        matches!(self, Emission::None)
    }

    pub fn samples(&self) -> impl Iterator<Item = Sample> {
        let (first, second) = match *self {
            Emission::None => (None, None),
            Emission::Single(sample) => (Some(sample), None),
            Emission::Bracket { before, after } => (Some(before), Some(after)),
        };
        first.into_iter().chain(second)
    }

    fn last(&self) -> Option<Sample> {
        self.samples().last()
    }
}

/// |to - from| / from, with a zero baseline read as no change.
fn relative_change(from: u64, to: u64) -> f64 {
    if from == 0 {
        return 0.0;
    }
    from.abs_diff(to) as f64 / from as f64
}

/// (to - from) / from, positive for growth only.
fn relative_growth(from: u64, to: u64) -> f64 {
    if from == 0 || to <= from {
        return 0.0;
    }
    (to - from) as f64 / from as f64
}

/// Emission rule of the sampler.
///
/// A reading is emitted when it moved more than `coarse` from the last emitted reading, or more
/// than `fine` from the previous poll. A single-poll growth beyond `coarse` also emits the
/// previous poll, so the trace keeps both sides of the jump. A reading equal to the last emitted
/// one is suppressed, except when the super-step index advanced since the last emission: every
/// super-step gets at least one record.
///
/// A zero reading carries no information: while the coarse baseline is zero, the first non-zero
/// reading replaces it without being emitted.
#[derive(Debug, Clone)]
pub struct AdaptivePolicy {
    coarse: f64,
    fine: f64,
    baseline: u64,
    last_emitted: Sample,
    last_observed: Sample,
    last_loop: usize,
}

impl AdaptivePolicy {
    /// `initial` is taken to be already emitted.
    pub fn new(coarse: f64, fine: f64, initial: Sample, loop_index: usize) -> Self {
        Self {
            coarse,
            fine,
            baseline: initial.bytes,
            last_emitted: initial,
            last_observed: initial,
            last_loop: loop_index,
        }
    }

    pub fn from_config(config: &SamplerConfig, initial: Sample, loop_index: usize) -> Self {
        Self::new(
            config.coarse_threshold,
            config.fine_threshold,
            initial,
            loop_index,
        )
    }

    pub fn observe(&mut self, current: Sample, loop_index: usize) -> Emission {
        let previous = self.last_observed;
        if self.baseline == 0 {
            self.baseline = current.bytes;
        }
        let triggered = relative_change(self.baseline, current.bytes) > self.coarse
            || relative_change(previous.bytes, current.bytes) > self.fine;

        let mut emission = Emission::None;
        if triggered {
            if relative_growth(previous.bytes, current.bytes) > self.coarse
                && previous != self.last_emitted
            {
                emission = Emission::Bracket {
                    before: previous,
                    after: current,
                };
            } else if current != self.last_emitted {
                emission = Emission::Single(current);
            }
        }
        if emission.is_none() && loop_index > self.last_loop {
            emission = Emission::Single(current);
        }

        if let Some(last) = emission.last() {
            self.baseline = last.bytes;
            self.last_emitted = last;
            self.last_loop = loop_index;
        }
        self.last_observed = current;
        emission
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerStats {
    pub polls: u64,
    pub records: u64,
    pub peak_bytes: u64,
}

/// Sampler thread state, moved into the thread by [`Sampler::spawn`].
pub struct Sampler {
    config: SamplerConfig,
    test: &'static str,
    tag: &'static str,
    progress: Arc<Progress>,
    probe: Arc<dyn MemoryProbe>,
    sink: Arc<dyn RecordSink>,
}

impl Sampler {
    pub fn new(
        config: SamplerConfig,
        test: &'static str,
        tag: &'static str,
        progress: Arc<Progress>,
        probe: Arc<dyn MemoryProbe>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            config,
            test,
            tag,
            progress,
            probe,
            sink,
        }
    }

    /// Start sampling on a new thread. Sampling stops when the handle is stopped or dropped.
    pub fn spawn(self) -> Result<SamplerHandle> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let thread = thread::Builder::new()
            .name("memory-sampler".into())
            .spawn(move || self.run(stop_rx))?;
        Ok(SamplerHandle {
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    fn run(self, stop: mpsc::Receiver<()>) -> SamplerStats {
        let mut stats = SamplerStats::default();

        // every wait doubles as the cancellation check
        let cancelled = |timeout: Duration| {
            !matches!(stop.recv_timeout(timeout), Err(RecvTimeoutError::Timeout))
        };

        if cancelled(self.config.settle_delay) {
            return stats;
        }

        let initial = self.read();
        let mut policy =
            AdaptivePolicy::from_config(&self.config, initial, self.progress.loop_index());
        stats.peak_bytes = initial.bytes;
        self.emit(initial, &mut stats);
        debug!(bytes = initial.bytes, "sampler started");

        while !cancelled(self.config.poll_interval) {
            let current = self.read();
            stats.polls += 1;
            stats.peak_bytes = stats.peak_bytes.max(current.bytes);
            for sample in policy.observe(current, self.progress.loop_index()).samples() {
                self.emit(sample, &mut stats);
            }
        }

        debug!(
            polls = stats.polls,
            records = stats.records,
            peak_bytes = stats.peak_bytes,
            "sampler stopped"
        );
        stats
    }

    fn read(&self) -> Sample {
        Sample {
            count: self.progress.total(),
            bytes: self.probe.resident_bytes(),
        }
    }

    fn emit(&self, sample: Sample, stats: &mut SamplerStats) {
        let record = Record::Memory {
            test: self.test,
            count: sample.count,
            tag: self.tag,
            bytes: sample.bytes,
        };
        match self.sink.emit(record) {
            Ok(()) => stats.records += 1,
            Err(e) => warn!("failed to write memory record: {e}"),
        }
    }
}

/// Owner of a running sampler thread. Dropping it stops and joins the thread.
pub struct SamplerHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<SamplerStats>>,
}

impl SamplerHandle {
    /// Signal the sampler and wait for it to exit.
    pub fn stop(mut self) -> Result<SamplerStats> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<SamplerStats> {
        if let Some(stop) = self.stop.take() {
            // a closed channel also stops the sampler
            let _ = stop.send(());
        }
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| BenchError::SamplerPanicked),
            None => Ok(SamplerStats::default()),
        }
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("{e}");
        }
    }
}
