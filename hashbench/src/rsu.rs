//! Deterministic generator of unique pseudo-random `u32` keys.
//!
//! Every output is a bijective function of a running index, so a generator never repeats a value
//! until the index wraps after `2^32` calls. Copies of a generator that have been advanced the same
//! number of steps produce the same stream, which is what lets partitioned workers consume one
//! logical sequence without sharing any state.

/// Largest prime below `2^32` with `p ≡ 3 (mod 4)`.
const PRIME: u32 = 4_294_967_291;

/// Quadratic residue permutation over `0..PRIME`; the five values at or above the prime map to
/// themselves.
fn permute_qpr(x: u32) -> u32 {
    if x >= PRIME {
        return x;
    }
    let residue = ((x as u64 * x as u64) % PRIME as u64) as u32;
    if x <= PRIME / 2 {
        residue
    } else {
        PRIME - residue
    }
}

/// Random sequence of unique `u32` values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rsu {
    index: u32,
    intermediate_offset: u32,
}

impl Rsu {
    pub fn new(seed_base: u32, seed_offset: u32) -> Self {
        Self {
            index: permute_qpr(permute_qpr(seed_base).wrapping_add(0x682f_0161)),
            intermediate_offset: permute_qpr(permute_qpr(seed_offset).wrapping_add(0x4679_0905)),
        }
    }

    /// Skip `steps` values without producing them.
    /// Equivalent to calling `next()` `steps` times, in constant time.
    pub fn advance(&mut self, steps: u64) {
        // the index lives in Z/2^32, so only the low 32 bits of `steps` matter
        self.index = self.index.wrapping_add(steps as u32);
    }
}

impl Iterator for Rsu {
    type Item = u32;

    #[inline]
    fn next(&mut self) -> Option<u32> {
        let value = permute_qpr(
            (permute_qpr(self.index).wrapping_add(self.intermediate_offset)) ^ 0x5bf0_3635,
        );
        self.index = self.index.wrapping_add(1);
        Some(value)
    }
}
