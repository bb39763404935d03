//! Per-contract bit-indexed coverage map (spec §3 "CoverageMap", §4.4,
//! §5, §8 property 4).
//!
//! The teacher's `evm::middlewares::coverage::Coverage` keys per-contract
//! `HashMap<pc, ...>` sets by `EVMAddress` (the deployed address) and walks
//! the bytecode once up front to find valid instruction boundaries
//! (`instructions_pc`, skipping PUSH immediates). This module keys by
//! runtime-bytecode *content hash* instead of address — spec §3 defines
//! coverage identity as "contract-code-identity (content hash of runtime
//! bytecode)" so that two proxies delegating to the same implementation,
//! or the same contract redeployed at a different address, share one
//! coverage record — and stores a flat bitset instead of a pc-keyed
//! `HashMap`, since the teacher's own `instructions_pc` walk is itself
//! already building exactly that kind of dense PC index.

use crate::types::CodeHash;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// A fixed-length bitset over program counters `0..length`.
#[derive(Debug, Clone)]
pub struct BitSet {
    bits: Vec<u8>,
    length: usize,
}

impl BitSet {
    pub fn new(length: usize) -> Self {
        Self {
            bits: vec![0u8; length.div_ceil(8)],
            length,
        }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns true iff the bit transitioned 0 -> 1.
    pub fn set(&mut self, pc: usize) -> bool {
        if pc >= self.length {
            return false;
        }
        let byte = pc / 8;
        let mask = 1u8 << (pc % 8);
        let was_set = self.bits[byte] & mask != 0;
        self.bits[byte] |= mask;
        !was_set
    }

    pub fn get(&self, pc: usize) -> bool {
        pc < self.length && self.bits[pc / 8] & (1u8 << (pc % 8)) != 0
    }

    pub fn count_set(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Bitwise OR in place. Differing lengths for what should be the same
    /// bytecode identity is a bug (spec §3 invariant); the shorter map is
    /// padded rather than panicking, to keep coverage merges infallible.
    pub fn merge_from(&mut self, other: &BitSet) {
        if other.length > self.length {
            self.bits.resize(other.bits.len(), 0);
            self.length = other.length;
        }
        for (i, byte) in other.bits.iter().enumerate() {
            self.bits[i] |= byte;
        }
    }

    /// Bitwise OR of two bitsets into a fresh one, for display merging of
    /// the success/reverted maps (spec §9 open question).
    pub fn or(&self, other: &BitSet) -> BitSet {
        let mut out = self.clone();
        out.merge_from(other);
        out
    }
}

/// Process-lifetime coverage state: a successful-execution map and a
/// separately tracked reverted-execution map, per spec §9 ("the spec
/// treats them as two separate maps, OR-ed together only when presenting
/// to the user").
#[derive(Debug, Default)]
pub struct CoverageMap {
    successful: Mutex<HashMap<CodeHash, BitSet>>,
    reverted: Mutex<HashMap<CodeHash, BitSet>>,
}

impl CoverageMap {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sets bit `pc` for `identity` (allocating a `length`-bit entry if
    /// absent) in the requested map, returning true iff the bit
    /// transitioned 0 -> 1.
    pub fn set_covered(&self, identity: CodeHash, length: usize, pc: usize, reverted: bool) -> bool {
        let map = if reverted { &self.reverted } else { &self.successful };
        let mut guard = map.lock();
        let entry = guard.entry(identity).or_insert_with(|| BitSet::new(length));
        entry.set(pc)
    }

    /// Bitwise-OR `bits` into the global map for `identity`, returning the
    /// set of newly-covered program counters (spec §4.4 "compute the delta
    /// `new_bits = executed_coverage \ global_coverage`").
    pub fn merge_and_diff(&self, identity: CodeHash, bits: &BitSet, reverted: bool) -> Vec<usize> {
        let map = if reverted { &self.reverted } else { &self.successful };
        let mut guard = map.lock();
        let entry = guard
            .entry(identity)
            .or_insert_with(|| BitSet::new(bits.len()));
        let mut new_bits = Vec::new();
        for pc in 0..bits.len() {
            if bits.get(pc) && entry.set(pc) {
                new_bits.push(pc);
            }
        }
        new_bits
    }

    pub fn total_bits_set(&self) -> usize {
        self.successful.lock().values().map(BitSet::count_set).sum()
    }

    /// Combined view for triage display: successful OR reverted, per
    /// identity (spec §9 open question resolution).
    pub fn display_snapshot(&self, identity: &CodeHash) -> Option<BitSet> {
        let successful = self.successful.lock();
        let reverted = self.reverted.lock();
        match (successful.get(identity), reverted.get(identity)) {
            (Some(s), Some(r)) => Some(s.or(r)),
            (Some(s), None) => Some(s.clone()),
            (None, Some(r)) => Some(r.clone()),
            (None, None) => None,
        }
    }

    pub fn contains_identity(&self, identity: &CodeHash) -> bool {
        self.successful.lock().contains_key(identity)
    }

    /// Print a per-contract executed/total instruction-count summary to
    /// stdout, for offline triage when this run's bytecode lengths are
    /// known up front (teacher: `FuzzHost::record_instruction_coverage`,
    /// gated the same way behind the `record_instruction_coverage`
    /// feature).
    #[cfg(feature = "record_instruction_coverage")]
    pub fn print_summary(&self) {
        let successful = self.successful.lock();
        let mut executed_total = 0usize;
        let mut capacity_total = 0usize;
        for (identity, bits) in successful.iter() {
            executed_total += bits.count_set();
            capacity_total += bits.len();
            println!(
                "coverage: {} of {} instructions executed for {}",
                bits.count_set(),
                bits.len(),
                hex::encode(identity.as_slice()),
            );
        }
        println!("coverage: {executed_total} of {capacity_total} instructions executed in total");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(byte: u8) -> CodeHash {
        crate::types::keccak256(&[byte])
    }

    #[test]
    fn set_returns_true_only_on_transition() {
        let mut bits = BitSet::new(16);
        assert!(bits.set(3));
        assert!(!bits.set(3));
        assert!(bits.get(3));
        assert!(!bits.get(4));
    }

    #[test]
    fn merge_is_bitwise_or_and_never_downgrades() {
        let mut a = BitSet::new(8);
        a.set(1);
        let mut b = BitSet::new(8);
        b.set(2);
        a.merge_from(&b);
        assert!(a.get(1));
        assert!(a.get(2));
        assert_eq!(a.count_set(), 2);
    }

    #[test]
    fn coverage_map_reports_only_newly_set_bits() {
        let map = CoverageMap::new();
        let id = hash(1);
        let mut candidate = BitSet::new(32);
        candidate.set(5);
        candidate.set(9);
        let first = map.merge_and_diff(id, &candidate, false);
        assert_eq!(first, vec![5, 9]);

        let mut candidate2 = BitSet::new(32);
        candidate2.set(5);
        candidate2.set(12);
        let second = map.merge_and_diff(id, &candidate2, false);
        assert_eq!(second, vec![12]);
        assert_eq!(map.total_bits_set(), 3);
    }

    #[test]
    fn successful_and_reverted_maps_are_independent_until_display() {
        let map = CoverageMap::new();
        let id = hash(2);
        let mut success_bits = BitSet::new(16);
        success_bits.set(1);
        map.merge_and_diff(id, &success_bits, false);

        let mut revert_bits = BitSet::new(16);
        revert_bits.set(7);
        map.merge_and_diff(id, &revert_bits, true);

        let merged = map.display_snapshot(&id).unwrap();
        assert!(merged.get(1));
        assert!(merged.get(7));
    }
}
