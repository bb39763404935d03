//! Fuzzer coordinator: spawns workers, owns every piece of process-lifetime
//! shared state, aggregates metrics, and drives shutdown (spec §3 "Fuzzer
//! Coordinator", §4.8, §5 cancellation/timeout handling, §6 exit codes).
//!
//! The teacher's `fuzzers::evm_fuzzer::EVMFuzzer::fuzz` owns a single
//! `libafl::Fuzzer` loop plus a `StdShMemProvider`/`LlmpRestartingEventManager`
//! pair for (eventually) multi-process coordination, even though today it
//! only drives one in-process executor. This module keeps the shape —
//! one coordinator owning shared state and handing workers their view of
//! it — but drops the multi-process event manager: spec §5 scopes
//! concurrency to OS threads within one process, so plain `std::thread`
//! handles plus the `Arc`-shared state `worker.rs` already expects are
//! enough.

use crate::chain::Chain;
use crate::config::FuzzerConfig;
use crate::contracts::ContractCatalog;
use crate::corpus::Corpus;
use crate::coverage::CoverageMap;
use crate::error::FuzzResult;
use crate::event::{
    CallSequenceTested, CallSequenceTesting, ContractAdded, ContractDeleted, Emitter,
    FuzzerStopped, TestCaseStatusChanged, WorkerChainCreated, WorkerChainSetup,
};
use crate::sequence::CallSequence;
use crate::static_analysis::ConstantsUsed;
use crate::testcase::{TestCaseRegistry, TestCaseStatus};
use crate::tracer::Tracer;
use crate::types::EVMAddress;
use crate::value_set::ValueSet;
use crate::worker::{run_worker, WorkerOutcome, WorkerShared};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Aggregated throughput/coverage metrics, refreshed as workers report in
/// (spec §4.8 "aggregates metrics (calls/s, seq/s, coverage bits, failed
/// tests)").
#[derive(Debug, Default)]
pub struct Metrics {
    sequences_tested: AtomicU64,
    calls_tested: AtomicU64,
}

impl Metrics {
    pub fn sequences_tested(&self) -> u64 {
        self.sequences_tested.load(Ordering::Relaxed)
    }

    pub fn calls_tested(&self) -> u64 {
        self.calls_tested.load(Ordering::Relaxed)
    }

    fn record_sequence(&self, calls: usize) {
        self.sequences_tested.fetch_add(1, Ordering::Relaxed);
        self.calls_tested.fetch_add(calls as u64, Ordering::Relaxed);
    }
}

/// Final summary returned once every worker has stopped (spec §4.8
/// "returns aggregated results").
#[derive(Debug)]
pub struct FuzzerResult {
    pub exit_code: i32,
    pub sequences_tested: u64,
    pub calls_tested: u64,
    pub coverage_bits: usize,
    pub failed_test_ids: Vec<String>,
}

/// Everything the coordinator owns and workers borrow through `Arc`s: the
/// shared `ValueSet`/`CoverageMap`/`Corpus`/`TestCaseRegistry`, the contract
/// catalog, config, and the root cancellation token (spec §3 "Lifecycle
/// summary", §5 "shared resources and their discipline").
pub struct FuzzerCoordinator {
    config: Arc<FuzzerConfig>,
    catalog: Arc<ContractCatalog>,
    value_set: Arc<Mutex<ValueSet>>,
    coverage: Arc<CoverageMap>,
    corpus: Arc<Corpus>,
    test_cases: Arc<TestCaseRegistry>,
    cancel: Arc<AtomicBool>,
    metrics: Arc<Metrics>,
    corpus_dir: Option<PathBuf>,

    contract_added: Emitter<ContractAdded>,
    contract_deleted: Emitter<ContractDeleted>,
    chain_created: Arc<Emitter<WorkerChainCreated>>,
    chain_setup: Arc<Emitter<WorkerChainSetup>>,
    sequence_testing: Arc<Emitter<CallSequenceTesting>>,
    sequence_tested: Arc<Emitter<CallSequenceTested>>,
    fuzzer_stopped: Emitter<FuzzerStopped>,
}

impl FuzzerCoordinator {
    /// Build a coordinator over an already-resolved contract catalog (spec
    /// §6 "consumed from compiler": compilation itself is an external
    /// collaborator, but this crate owns what happens once the catalog
    /// exists).
    pub fn new(config: FuzzerConfig, catalog: ContractCatalog) -> FuzzResult<Self> {
        config.validate()?;
        let test_cases = TestCaseRegistry::new();
        test_cases.discover(&catalog, &config.property_test_prefix, &config.optimization_test_prefix);
        Ok(Self {
            config: Arc::new(config),
            catalog: Arc::new(catalog),
            value_set: Arc::new(Mutex::new(ValueSet::new())),
            coverage: CoverageMap::new(),
            corpus: Corpus::new(),
            test_cases,
            cancel: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(Metrics::default()),
            corpus_dir: None,
            contract_added: Emitter::new(),
            contract_deleted: Emitter::new(),
            chain_created: Arc::new(Emitter::new()),
            chain_setup: Arc::new(Emitter::new()),
            sequence_testing: Arc::new(Emitter::new()),
            sequence_tested: Arc::new(Emitter::new()),
            fuzzer_stopped: Emitter::new(),
        })
    }

    /// Seed the shared `ValueSet` from an AST literal walk (spec §4.1 "AST
    /// walk").
    pub fn seed_value_set_from_ast(&self, ast: &serde_json::Value) {
        self.value_set.lock().seed_from_ast(ast);
    }

    /// Seed the shared `ValueSet` from static-analysis output (spec §4.1
    /// "Static-analysis output", §6 "consumed from static-analysis tool").
    pub fn seed_value_set_from_static_analysis(&self, constants: &ConstantsUsed) {
        self.value_set
            .lock()
            .seed_from_static_analysis(&constants.flatten());
    }

    /// Reload a persisted corpus directory, replaying each sequence and
    /// seeding coverage/healing state before any worker starts (spec §4.4
    /// "Persistence", §8 end-to-end scenario d). Remembers `dir` so a later
    /// `run` call persists back to the same place.
    pub fn load_corpus_dir(&mut self, dir: &Path) -> FuzzResult<()> {
        let sequences = Corpus::read_sequences_from_dir(dir, &self.catalog)?;
        let catalog = self.catalog.clone();
        self.corpus.heal_and_seed(sequences, &self.coverage, |sequence, coverage| {
            replay_for_coverage(sequence, &catalog, coverage)
        })?;
        self.corpus_dir = Some(dir.to_path_buf());
        Ok(())
    }

    pub fn subscribe_sequence_tested(
        &self,
        callback: impl Fn(&CallSequenceTested) -> FuzzResult<()> + Send + Sync + 'static,
    ) {
        self.sequence_tested.subscribe(callback);
    }

    pub fn subscribe_test_case_status(
        &self,
        callback: impl Fn(&TestCaseStatusChanged) -> FuzzResult<()> + Send + Sync + 'static,
    ) {
        self.test_cases.subscribe(callback);
    }

    pub fn subscribe_fuzzer_stopped(
        &self,
        callback: impl Fn(&FuzzerStopped) -> FuzzResult<()> + Send + Sync + 'static,
    ) {
        self.fuzzer_stopped.subscribe(callback);
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    pub fn coverage_bits(&self) -> usize {
        self.coverage.total_bits_set()
    }

    pub fn test_case_snapshot(&self) -> Vec<crate::testcase::TestCase> {
        self.test_cases.snapshot()
    }

    /// Signal every worker to stop at the next sequence/call boundary
    /// (spec §5 "Cancellation is cooperative"). Safe to call from another
    /// thread while `run` is in progress.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Notify subscribers that a contract became part of the fuzzed set, so
    /// an external API layer can surface it live (spec §6 event stream).
    pub fn announce_contract_added(&self, name: String, address: EVMAddress) -> FuzzResult<()> {
        self.contract_added.publish(ContractAdded { name, address })
    }

    pub fn announce_contract_deleted(&self, name: String, address: EVMAddress) -> FuzzResult<()> {
        self.contract_deleted.publish(ContractDeleted { name, address })
    }

    /// Spawn `config.worker_count` worker threads, wait for every one to
    /// either finish its budget or observe cancellation, then persist the
    /// corpus and publish `FuzzerStopped` (spec §4.8).
    ///
    /// On a clean run with no failed test cases the exit code is 0; if any
    /// test case ended `Failed`, it is `config.failure_exit_code` instead
    /// (spec §6 "Exit codes"). A fuzzer-wide setup error short-circuits
    /// before any worker is spawned and surfaces as `Err` (spec §7
    /// "Fuzzer-wide errors... surface through the coordinator's return
    /// value").
    pub fn run(&self) -> FuzzResult<FuzzerResult> {
        if self.catalog.iter().next().is_none() {
            return Err(crate::error::FuzzError::CompilationUnavailable(
                "no target contracts in catalog".to_string(),
            ));
        }

        let metrics = self.metrics.clone();
        self.sequence_tested.subscribe(move |event: &CallSequenceTested| {
            metrics.record_sequence(event.sequence_len);
            Ok(())
        });

        let shared = Arc::new(WorkerShared {
            catalog: self.catalog.clone(),
            coverage: self.coverage.clone(),
            corpus: self.corpus.clone(),
            test_cases: self.test_cases.clone(),
            value_set: self.value_set.clone(),
            config: self.config.clone(),
            cancel: self.cancel.clone(),
            chain_created: self.chain_created.clone(),
            chain_setup: self.chain_setup.clone(),
            sequence_testing: self.sequence_testing.clone(),
            sequence_tested: self.sequence_tested.clone(),
        });

        let handles: Vec<JoinHandle<FuzzResult<WorkerOutcome>>> = (0..self.config.worker_count)
            .map(|worker_id| {
                let shared = shared.clone();
                std::thread::spawn(move || run_worker(worker_id, shared))
            })
            .collect();

        // A wall-clock deadline is enforced by every worker individually
        // (spec §5 "Timeouts"), but the coordinator also watches it here so
        // that a deadline firing while every worker is mid-sequence still
        // results in a prompt `cancel()` rather than waiting for each
        // worker to notice on its own next boundary check.
        if let Some(deadline) = self.config.deadline {
            let cancel = self.cancel.clone();
            std::thread::spawn(move || {
                std::thread::sleep(deadline);
                cancel.store(true, Ordering::Relaxed);
            });
        }

        let mut sequences_run_total = 0u64;
        for handle in handles {
            match handle.join() {
                Ok(Ok(outcome)) => sequences_run_total += outcome.sequences_run,
                Ok(Err(err)) => return Err(err),
                Err(_) => {
                    return Err(crate::error::FuzzError::ChainExecutionError(
                        "a worker thread panicked".to_string(),
                    ))
                }
            }
        }

        if let Some(dir) = &self.corpus_dir {
            self.corpus.persist_to_dir(dir, &self.catalog)?;
        }

        #[cfg(feature = "record_instruction_coverage")]
        self.coverage.print_summary();

        let failed_test_ids: Vec<String> = self
            .test_cases
            .snapshot()
            .into_iter()
            .filter(|c| c.status == TestCaseStatus::Failed)
            .map(|c| c.id)
            .collect();

        let exit_code = if failed_test_ids.is_empty() {
            0
        } else {
            self.config.failure_exit_code
        };

        self.fuzzer_stopped.publish(FuzzerStopped {
            exit_code,
            failed_tests: failed_test_ids.len(),
        })?;

        Ok(FuzzerResult {
            exit_code,
            sequences_tested: sequences_run_total,
            calls_tested: self.metrics.calls_tested(),
            coverage_bits: self.coverage.total_bits_set(),
            failed_test_ids,
        })
    }
}

/// Replay `sequence` against a fresh chain fork with a tracer bound to
/// `coverage`, returning the bits it set (spec §4.4 "re-executed against a
/// fresh chain fork").
fn replay_for_coverage(
    sequence: &CallSequence,
    catalog: &Arc<ContractCatalog>,
    coverage: &Arc<CoverageMap>,
) -> FuzzResult<Vec<(crate::types::CodeHash, usize, bool)>> {
    let mut chain = Chain::new();
    let mut deployed = std::collections::HashMap::new();
    let deployer = EVMAddress::from([0xAAu8; 20]);
    chain.fund(deployer, crate::types::EVMU256::from(1_000_000_000_000_000_000u64));
    for contract in catalog.iter() {
        let mut tracer = Tracer::new(catalog.clone(), CoverageMap::new());
        if let Ok(outcome) = chain.deploy(&contract.init_bytecode, &[], deployer, crate::types::EVMU256::ZERO, &mut tracer) {
            if let Some(addr) = outcome.created_address {
                deployed.insert(contract.name.clone(), addr);
            }
        }
    }
    let mut resolved = sequence.clone();
    resolved.resolve_pseudo_addresses(&deployed);

    let mut new_bits = Vec::new();
    for element in &resolved.elements {
        chain.advance_block(element.block_number_delay, element.block_timestamp_delay);
        let req = element.to_tx_request()?;
        let mut tracer = Tracer::new(catalog.clone(), coverage.clone());
        let outcome = chain.call(&req, &mut tracer)?;
        new_bits.extend(outcome.new_coverage_bits);
    }
    Ok(new_bits)
}
