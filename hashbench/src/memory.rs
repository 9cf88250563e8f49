use std::fs;

/// Source of resident memory readings for the sampler.
pub trait MemoryProbe: Send + Sync {
    /// Current resident set size in bytes, or 0 when it cannot be determined.
    fn resident_bytes(&self) -> u64;
}

impl<F> MemoryProbe for F
where
    F: Fn() -> u64 + Send + Sync,
{
    fn resident_bytes(&self) -> u64 {
        self()
    }
}

/// Page size assumed when converting `statm` page counts to bytes.
const PAGE_SIZE: u64 = 4096;

/// Resident memory of the current process, read from `/proc/self/statm`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessMemory;

impl MemoryProbe for ProcessMemory {
    fn resident_bytes(&self) -> u64 {
        fs::read_to_string("/proc/self/statm")
            .ok()
            .and_then(|statm| parse_statm(&statm))
            .unwrap_or(0)
    }
}

/// Resident bytes from a `statm` line: size resident shared text lib data dt (in pages).
fn parse_statm(statm: &str) -> Option<u64> {
    let resident_pages = statm.split_whitespace().nth(1)?.parse::<u64>().ok()?;
    Some(resident_pages.saturating_mul(PAGE_SIZE))
}
