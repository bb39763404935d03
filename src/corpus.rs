//! Seed corpus: mutable/immutable pools, acceptance rule, selection
//! strategy, and on-disk persistence (spec §3 "Corpus", §4.4, §6 "Corpus
//! directory", §9 open question on sequence-selection weighting).
//!
//! The teacher's `OnDiskCorpus`/`InMemoryCorpus` (from `libafl`) are driven
//! through the `Corpus`/`Scheduler` trait pair and store `Testcase<VS>`
//! wrapped metadata. This crate drops that trait machinery (spec's
//! fuzzer worker is plain `std::thread`, not a `libafl::Fuzzer`) and keeps
//! only the two ideas this fuzzer actually needs from it: a coverage-keyed
//! acceptance rule, and "pull one, maybe from a protected pool" selection.

use crate::contracts::ContractCatalog;
use crate::coverage::CoverageMap;
use crate::error::{FuzzError, FuzzResult};
use crate::rand_provider::RandProvider;
use crate::sequence::CallSequence;
use crate::types::{keccak256, CodeHash};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct CorpusEntry {
    pub sequence: CallSequence,
    /// Set when this entry was loaded from disk and replaying it produced a
    /// coverage fingerprint different from a from-scratch execution of the
    /// same bytes — i.e. some of the bits it once contributed were already
    /// claimed by a sequence loaded earlier in this run (spec §4.4 "a
    /// sequence whose replay produces a different coverage fingerprint is
    /// kept but marked 'healed'").
    pub healed: bool,
}

/// Fold a set of (identity, pc, reverted) coverage bits into one stable
/// content hash, used both as the corpus's in-memory dedup key and as the
/// healing comparison (spec §4.4).
pub fn fingerprint_of(bits: &[(CodeHash, usize, bool)]) -> CodeHash {
    let mut sorted: Vec<&(CodeHash, usize, bool)> = bits.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
    let mut buf = Vec::with_capacity(sorted.len() * 41);
    for (identity, pc, reverted) in sorted {
        buf.extend_from_slice(identity.as_slice());
        buf.extend_from_slice(&(*pc as u64).to_be_bytes());
        buf.push(*reverted as u8);
    }
    keccak256(&buf)
}

/// Two pools of call sequences: a mutable pool this run grows via the
/// acceptance rule, and an immutable pool of pre-seeded reference sequences
/// that are drawn from but never evicted (spec §3 "Corpus").
#[derive(Default)]
pub struct Corpus {
    mutable: Mutex<Vec<Arc<CorpusEntry>>>,
    immutable: Mutex<Vec<Arc<CorpusEntry>>>,
    seen_fingerprints: Mutex<HashSet<CodeHash>>,
}

impl Corpus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn mutable_len(&self) -> usize {
        self.mutable.lock().len()
    }

    pub fn immutable_len(&self) -> usize {
        self.immutable.lock().len()
    }

    /// Add a fixed reference sequence to the protected pool (spec §6
    /// "seeded from an external corpus directory" read at startup,
    /// distinct from this run's own discoveries).
    pub fn seed_immutable(&self, sequence: CallSequence) {
        self.immutable
            .lock()
            .push(Arc::new(CorpusEntry { sequence, healed: false }));
    }

    /// Spec §4.4 acceptance rule: a candidate sequence is kept in the
    /// mutable pool iff it set at least one new coverage bit and no
    /// already-accepted sequence produced the identical set of new bits.
    /// Returns `true` iff the sequence was inserted.
    pub fn submit(&self, sequence: CallSequence, new_bits: &[(CodeHash, usize, bool)]) -> bool {
        if new_bits.is_empty() {
            return false;
        }
        let fingerprint = fingerprint_of(new_bits);
        if !self.seen_fingerprints.lock().insert(fingerprint) {
            return false;
        }
        self.mutable
            .lock()
            .push(Arc::new(CorpusEntry { sequence, healed: false }));
        true
    }

    /// Draw one sequence to mutate. Spec §9 resolves the open question on
    /// weighting this way: `immutable_pool_bias` is the probability of
    /// drawing from the immutable pool *when it is non-empty*; otherwise,
    /// and whenever the mutable pool itself is empty, the draw falls back
    /// to the other non-empty pool. `None` means both pools are empty, so
    /// the worker should fall back to generating a fresh empty sequence
    /// (spec §4.7 "empty_new_sequence" strategy).
    pub fn select_for_mutation(
        &self,
        rng: &mut RandProvider,
        immutable_pool_bias: f64,
    ) -> Option<CallSequence> {
        let mutable = self.mutable.lock();
        let immutable = self.immutable.lock();
        if mutable.is_empty() && immutable.is_empty() {
            return None;
        }
        let draw_immutable = if immutable.is_empty() {
            false
        } else if mutable.is_empty() {
            true
        } else {
            rng.coinflip(immutable_pool_bias)
        };
        if draw_immutable {
            rng.choose(&immutable).map(|e| e.sequence.clone())
        } else {
            rng.choose(&mutable).map(|e| e.sequence.clone())
        }
    }

    /// Draw two sequences (with replacement if the pool has exactly one
    /// entry) for the splice strategy (spec §4.7 "splice_corpus_entries").
    /// Only the mutable pool participates: splicing immutable reference
    /// sequences together would defeat their purpose as a fixed baseline.
    pub fn select_for_splice(&self, rng: &mut RandProvider) -> Option<(CallSequence, CallSequence)> {
        let mutable = self.mutable.lock();
        if mutable.is_empty() {
            return None;
        }
        let a = rng.choose(&mutable)?.sequence.clone();
        let b = rng.choose(&mutable)?.sequence.clone();
        Some((a, b))
    }

    /// Persist every mutable-pool entry as one JSON file named by a stable
    /// content hash of its encoded form (spec §6 corpus on-disk layout),
    /// then remove any other `*.json` file already in `dir` that isn't one
    /// of those content-hash names. The immutable pool is a read-only seed
    /// input, not this run's own output, and is never written back.
    ///
    /// A directory loaded via `read_sequences_from_dir`/`heal_and_seed`
    /// lands every entry in the mutable pool, so this reconciliation makes
    /// a load -> run -> persist cycle of the same directory idempotent:
    /// a stale input file (e.g. named by the loader rather than by this
    /// run's content hash) is superseded by the hash-named file for the
    /// same sequence instead of accumulating alongside it (spec §4.4
    /// "Persistence").
    pub fn persist_to_dir(&self, dir: &Path, catalog: &ContractCatalog) -> FuzzResult<()> {
        fs::create_dir_all(dir).map_err(|e| FuzzError::CorpusLoadError {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;
        let mut written = HashSet::new();
        for entry in self.mutable.lock().iter() {
            let json = entry.sequence.to_json(catalog);
            let bytes = serde_json::to_vec(&json).map_err(|e| FuzzError::CorpusLoadError {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })?;
            let name = format!("{}.json", hex::encode(keccak256(&bytes).as_slice()));
            let path = dir.join(&name);
            fs::write(&path, &bytes).map_err(|e| FuzzError::CorpusLoadError {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            written.insert(name);
        }
        let stale = fs::read_dir(dir)
            .map_err(|e| FuzzError::CorpusLoadError {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"))
            .filter(|e| !written.contains(&e.file_name().to_string_lossy().into_owned()));
        for entry in stale {
            fs::remove_file(entry.path()).map_err(|e| FuzzError::CorpusLoadError {
                path: entry.path().display().to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Parse every `*.json` file in `dir` into a `CallSequence`, logging and
    /// skipping any file that fails to decode (spec §7 "corpus load errors
    /// are logged and skipped, never fatal"). Does not replay or heal —
    /// call `heal_and_seed` with the parsed sequences once a chain/coverage
    /// replay facility is available.
    pub fn read_sequences_from_dir(
        dir: &Path,
        catalog: &ContractCatalog,
    ) -> FuzzResult<Vec<CallSequence>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries: Vec<_> = fs::read_dir(dir)
            .map_err(|e| FuzzError::CorpusLoadError {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"))
            .collect();
        entries.sort_by_key(|e| e.file_name());

        let mut sequences = Vec::with_capacity(entries.len());
        for entry in entries {
            let path = entry.path();
            let parsed = fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).map_err(|e| e.to_string()))
                .and_then(|value| CallSequence::from_json(&value, catalog).map_err(|e| e.to_string()));
            match parsed {
                Ok(sequence) => sequences.push(sequence),
                Err(reason) => {
                    tracing::warn!("skipping unreadable corpus file {}: {reason}", path.display());
                }
            }
        }
        Ok(sequences)
    }

    /// Replay each previously-loaded sequence both against a scratch
    /// coverage map (the "as captured" fingerprint) and against the run's
    /// real shared `CoverageMap` (the "as replayed now" fingerprint),
    /// seeding coverage from it either way and marking it healed if the two
    /// diverge (spec §4.4, §8 end-to-end scenario d). `replay` executes one
    /// sequence against a freshly forked chain with a tracer bound to the
    /// given coverage map, returning the bits it newly set there.
    pub fn heal_and_seed(
        &self,
        sequences: Vec<CallSequence>,
        global_coverage: &Arc<CoverageMap>,
        mut replay: impl FnMut(&CallSequence, &Arc<CoverageMap>) -> FuzzResult<Vec<(CodeHash, usize, bool)>>,
    ) -> FuzzResult<()> {
        for sequence in sequences {
            let scratch = CoverageMap::new();
            let standalone_bits = replay(&sequence, &scratch)?;
            let standalone_fp = fingerprint_of(&standalone_bits);

            let incremental_bits = replay(&sequence, global_coverage)?;
            let incremental_fp = fingerprint_of(&incremental_bits);

            let healed = standalone_fp != incremental_fp;
            self.seen_fingerprints.lock().insert(incremental_fp);
            self.mutable.lock().push(Arc::new(CorpusEntry { sequence, healed }));
        }
        Ok(())
    }
}
