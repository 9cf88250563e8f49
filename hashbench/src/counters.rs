//! Progress shared between the insertion workers, the orchestrator and the memory sampler.
//!
//! Slot `w` of [`ProgressCounters`] is written only by worker `w`. Writers bump their slot with a
//! relaxed load/store pair instead of a read-modify-write, and readers sum the slots without any
//! cross-slot ordering, so a mid-run [`ProgressCounters::total`] can lag behind the workers. Once
//! the workers have been joined the total is exact.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

/// Capacity of [`ProgressCounters`], and so the largest supported worker count.
pub const MAX_WORKERS: usize = 16;

pub struct ProgressCounters {
    slots: [CachePadded<AtomicI64>; MAX_WORKERS],
}

impl ProgressCounters {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| CachePadded::new(AtomicI64::new(0))),
        }
    }

    /// Writer handle for one worker's slot.
    pub fn slot(&self, worker: usize) -> CounterSlot<'_> {
        CounterSlot {
            cell: &self.slots[worker],
        }
    }

    #[inline]
    pub fn increment(&self, worker: usize) {
        self.slot(worker).increment();
    }

    pub fn get(&self, worker: usize) -> i64 {
        self.slots[worker].load(Ordering::Relaxed)
    }

    /// Sum of all slots. Not an atomic snapshot across slots.
    pub fn total(&self) -> i64 {
        self.slots.iter().map(|slot| slot.load(Ordering::Relaxed)).sum()
    }

    pub fn reset(&self) {
        for slot in &self.slots {
            slot.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for ProgressCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// The single-writer view of one counter slot.
pub struct CounterSlot<'a> {
    cell: &'a AtomicI64,
}

impl CounterSlot<'_> {
    #[inline]
    pub fn increment(&self) {
        // only one thread ever writes this slot
        let current = self.cell.load(Ordering::Relaxed);
        self.cell.store(current + 1, Ordering::Relaxed);
    }
}

/// Counters plus the index of the super-step currently in flight.
#[derive(Default)]
pub struct Progress {
    counters: ProgressCounters,
    loop_index: AtomicUsize,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counters(&self) -> &ProgressCounters {
        &self.counters
    }

    pub fn total(&self) -> i64 {
        self.counters.total()
    }

    pub fn loop_index(&self) -> usize {
        self.loop_index.load(Ordering::Acquire)
    }

    /// Mark super-step `index` as started. Called by the orchestrator between super-steps only.
    pub fn set_loop_index(&self, index: usize) {
        self.loop_index.store(index, Ordering::Release);
    }

    pub fn reset(&self) {
        self.counters.reset();
        self.set_loop_index(0);
    }
}
