//! Forkable random provider used by the generator/mutator layer (spec §4.2).
//!
//! Wraps `libafl_bolts`'s RNG machinery, the same way the teacher threads
//! `libafl::prelude::{HasRand, Rand}` through every generation/mutation call
//! site (`evm::abi`, `mutation_utils`). A child provider is derived by
//! reading 8 bytes from the parent and reseeding a fresh generator with
//! them, so that per-worker determinism is preserved under a fixed root
//! seed (spec §8 property 6) while each worker still gets an independent
//! stream.

use libafl_bolts::rands::{Rand, StdRand};

#[derive(Debug, Clone)]
pub struct RandProvider {
    inner: StdRand,
}

impl RandProvider {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: StdRand::with_seed(seed),
        }
    }

    /// Derive an independent child stream from this provider without
    /// consuming it in a way that is position-dependent on later use —
    /// only the 8 bytes read here affect the child's seed.
    pub fn fork(&mut self) -> Self {
        let seed = self.inner.next();
        Self::new(seed)
    }

    pub fn below(&mut self, upper_bound_excl: u64) -> u64 {
        if upper_bound_excl == 0 {
            return 0;
        }
        self.inner.below(upper_bound_excl)
    }

    /// Uniform value in `[lo, hi]` inclusive.
    pub fn between(&mut self, lo: u64, hi: u64) -> u64 {
        if hi <= lo {
            return lo;
        }
        lo + self.below(hi - lo + 1)
    }

    pub fn coinflip(&mut self, probability: f64) -> bool {
        self.inner.coinflip(probability.clamp(0.0, 1.0))
    }

    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.below(items.len() as u64) as usize;
        items.get(idx)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.inner.next()
    }

    pub fn bytes(&mut self, len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(len);
        while out.len() < len {
            out.extend_from_slice(&self.inner.next().to_le_bytes());
        }
        out.truncate(len);
        out
    }
}

impl Default for RandProvider {
    fn default() -> Self {
        Self::new(libafl_bolts::current_nanos())
    }
}
