//! Per-worker fuzzing loop: fork a chain, predeploy contracts, then
//! repeatedly grow, execute, and judge call sequences (spec §3 "Fuzzer
//! worker", §4.7).
//!
//! The teacher's `fuzzers::evm_fuzzer` wires an entire `libafl::Fuzzer`
//! pipeline (scheduler, mutational stage, feedback, objective) per run,
//! driven by a single-threaded event loop. This crate instead runs one of
//! these loops per OS thread (spec §5 "parallel OS-thread-backed workers",
//! an explicit departure from the teacher's single `Fuzzer::fuzz_loop`),
//! with no scheduler/feedback trait objects: strategy selection, oracle
//! evaluation, and corpus acceptance are plain function calls against the
//! shared `Corpus`/`CoverageMap`/`TestCaseRegistry` this module is handed.

use crate::abi::{decode_return_bool, decode_return_int256, encode_call, AbiType, Generator, StandardMutator};
use crate::chain::Chain;
use crate::config::FuzzerConfig;
use crate::contracts::{ContractCatalog, MethodAbi};
use crate::corpus::Corpus;
use crate::coverage::CoverageMap;
use crate::error::FuzzResult;
use crate::event::{CallSequenceTested, CallSequenceTesting, Emitter, WorkerChainCreated, WorkerChainSetup};
use crate::rand_provider::RandProvider;
use crate::sequence::{CallSequence, CallSequenceElement, DataAbiValues};
use crate::shrinker::{self, ShrinkRequest};
use crate::testcase::{test_case_id, TestCaseKind, TestCaseRegistry};
use crate::tracer::{decode_panic_code, Tracer};
use crate::types::{EVMAddress, EVMU256};
use crate::value_set::ValueSet;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// The three ways a worker grows the sequence it is about to test (spec
/// §4.7 `StrategyWeights`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthStrategy {
    EmptyNewSequence,
    MutateCorpusEntry,
    SpliceCorpusEntries,
}

/// Weighted choice among the three strategies; falls back to
/// `EmptyNewSequence` whenever the corpus has nothing to draw from,
/// regardless of the configured weights (spec §9 sequence-selection open
/// question, resolved the same way as `Corpus::select_for_mutation`).
pub fn choose_strategy(rng: &mut RandProvider, cfg: &FuzzerConfig, corpus: &Corpus) -> GrowthStrategy {
    if corpus.mutable_len() == 0 && corpus.immutable_len() == 0 {
        return GrowthStrategy::EmptyNewSequence;
    }
    let w = &cfg.strategy_weights;
    let total = w.empty_new_sequence + w.mutate_corpus_entry + w.splice_corpus_entries;
    let draw = rng.coinflip(w.empty_new_sequence / total.max(f64::MIN_POSITIVE));
    if draw {
        return GrowthStrategy::EmptyNewSequence;
    }
    let remaining = w.mutate_corpus_entry + w.splice_corpus_entries;
    if remaining <= 0.0 || corpus.mutable_len() == 0 {
        return GrowthStrategy::MutateCorpusEntry;
    }
    if rng.coinflip(w.splice_corpus_entries / remaining) {
        GrowthStrategy::SpliceCorpusEntries
    } else {
        GrowthStrategy::MutateCorpusEntry
    }
}

/// Every state-changing, non-property, non-optimization method across the
/// catalog — the pool of calls a worker can append to a sequence (spec
/// §4.7 step 3 "pick a contract, a method").
fn call_targets<'a>(catalog: &'a ContractCatalog, cfg: &FuzzerConfig) -> Vec<(&'a str, &'a MethodAbi)> {
    let mut out = Vec::new();
    for contract in catalog.iter() {
        for method in &contract.abi.methods {
            if method.is_assertion_candidate(&cfg.property_test_prefix, &cfg.optimization_test_prefix) {
                out.push((contract.name.as_str(), method));
            }
        }
    }
    out
}

/// Build one freshly generated call against `contract_name`/`method`,
/// using `StandardMutator` as the generator (spec §4.7 step 3, §4.2).
pub fn build_call_element(
    rng: &mut RandProvider,
    pool: &ValueSet,
    cfg: &crate::config::MutationConfig,
    sender: EVMAddress,
    to: EVMAddress,
    method: &MethodAbi,
) -> FuzzResult<CallSequenceElement> {
    let types: Vec<AbiType> = method.inputs.iter().map(|(_, t)| t.clone()).collect();
    let mut values = Vec::with_capacity(types.len());
    for ty in &types {
        values.push(StandardMutator.generate(ty, rng, pool, cfg)?);
    }
    let calldata = encode_call(method.selector(), &types, &values)?;
    Ok(CallSequenceElement {
        from: sender,
        to: Some(to),
        to_pseudo: None,
        nonce: 0,
        value: EVMU256::ZERO,
        gas_limit: 5_000_000,
        gas_price: EVMU256::ZERO,
        data: calldata,
        data_abi_values: Some(DataAbiValues {
            method_signature: method.signature(),
            input_values: values,
        }),
        block_number_delay: rng.below(3),
        block_timestamp_delay: rng.below(15),
    })
}

/// Shared, process-lifetime state every worker thread reads and mutates
/// through its own `Arc` handle (spec §5 "shared resource discipline").
pub struct WorkerShared {
    pub catalog: Arc<ContractCatalog>,
    pub coverage: Arc<CoverageMap>,
    pub corpus: Arc<Corpus>,
    pub test_cases: Arc<TestCaseRegistry>,
    pub value_set: Arc<Mutex<ValueSet>>,
    pub config: Arc<FuzzerConfig>,
    pub cancel: Arc<AtomicBool>,
    pub chain_created: Arc<Emitter<WorkerChainCreated>>,
    pub chain_setup: Arc<Emitter<WorkerChainSetup>>,
    pub sequence_testing: Arc<Emitter<CallSequenceTesting>>,
    pub sequence_tested: Arc<Emitter<CallSequenceTested>>,
}

pub struct WorkerOutcome {
    pub worker_id: usize,
    pub sequences_run: u64,
}

const DEPLOYER_SEED_BALANCE: u64 = 1_000_000_000_000_000_000;

/// Fork a fresh chain and deploy every catalog contract with no
/// constructor arguments under a single funded deployer address (spec
/// §4.7 step 2). Contracts whose constructor genuinely needs arguments are
/// outside this crate's scope (spec SUPPLEMENT: constructor-argument
/// synthesis is an external collaborator's job, same as compilation).
fn predeploy(catalog: &ContractCatalog, deployer: EVMAddress) -> FuzzResult<(Chain, HashMap<String, EVMAddress>, HashMap<EVMAddress, String>)> {
    let mut chain = Chain::new();
    chain.fund(deployer, EVMU256::from(DEPLOYER_SEED_BALANCE));
    let mut deployed = HashMap::new();
    let mut reverse = HashMap::new();
    for contract in catalog.iter() {
        let catalog_arc = Arc::new(catalog.clone());
        let coverage = CoverageMap::new();
        let mut tracer = Tracer::new(catalog_arc, coverage);
        let outcome = chain.deploy(&contract.init_bytecode, &[], deployer, EVMU256::ZERO, &mut tracer)?;
        if let Some(addr) = outcome.created_address {
            deployed.insert(contract.name.clone(), addr);
            reverse.insert(addr, contract.name.clone());
        }
    }
    Ok((chain, deployed, reverse))
}

fn resolve_element_method<'a>(
    catalog: &'a ContractCatalog,
    reverse_deployed: &HashMap<EVMAddress, String>,
    element: &CallSequenceElement,
) -> Option<&'a MethodAbi> {
    let to = element.to?;
    let name = reverse_deployed.get(&to)?;
    let contract = catalog.by_name(name)?;
    if element.data.len() < 4 {
        return None;
    }
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&element.data[..4]);
    contract.abi.method_by_selector(selector)
}

/// Identifies one test case that just transitioned to `Failed` this round,
/// with enough ABI context to re-verify the failure on a fresh chain fork
/// during shrinking (spec §4.6 step 2 predicate, §4.7 step 3 "yield for
/// shrinking").
#[derive(Debug, Clone)]
struct FailureWitness {
    id: String,
    kind: TestCaseKind,
    contract: String,
    method_signature: String,
}

/// Run every `property_` and `optimize_` oracle method against the
/// current chain state after a call, updating `test_cases` and returning
/// every property test newly found failing this round (spec §4.5, §4.8).
fn evaluate_oracles(
    shared: &WorkerShared,
    chain: &mut Chain,
    deployed: &HashMap<String, EVMAddress>,
    sender: EVMAddress,
    sequence_so_far: &CallSequence,
) -> FuzzResult<Vec<FailureWitness>> {
    let mut newly_failed = Vec::new();
    for contract in shared.catalog.iter() {
        let Some(&address) = deployed.get(&contract.name) else { continue };
        for method in &contract.abi.methods {
            if method.is_property_test(&shared.config.property_test_prefix) {
                let id = test_case_id(TestCaseKind::Property, &contract.name, &method.signature());
                shared.test_cases.mark_running(&id)?;
                let calldata = encode_call(method.selector(), &[], &[])?;
                let req = crate::chain::TxRequest {
                    from: sender,
                    to: Some(address),
                    value: EVMU256::ZERO,
                    gas_limit: 5_000_000,
                    gas_price: EVMU256::ZERO,
                    data: calldata,
                };
                let mut tracer = Tracer::new(shared.catalog.clone(), shared.coverage.clone());
                let outcome = chain.call(&req, &mut tracer)?;
                let holds = outcome.success && decode_return_bool(&outcome.output).unwrap_or(false);
                if holds {
                    shared.test_cases.mark_passed_if_not_failed(&id)?;
                } else {
                    shared
                        .test_cases
                        .record_failure(&id, sequence_so_far.clone(), outcome.trace)?;
                    newly_failed.push(FailureWitness {
                        id,
                        kind: TestCaseKind::Property,
                        contract: contract.name.clone(),
                        method_signature: method.signature(),
                    });
                }
            } else if method.is_optimization_test(&shared.config.optimization_test_prefix) {
                let id = test_case_id(TestCaseKind::Optimization, &contract.name, &method.signature());
                shared.test_cases.mark_running(&id)?;
                let calldata = encode_call(method.selector(), &[], &[])?;
                let req = crate::chain::TxRequest {
                    from: sender,
                    to: Some(address),
                    value: EVMU256::ZERO,
                    gas_limit: 5_000_000,
                    gas_price: EVMU256::ZERO,
                    data: calldata,
                };
                let mut tracer = Tracer::new(shared.catalog.clone(), shared.coverage.clone());
                let outcome = chain.call(&req, &mut tracer)?;
                if outcome.success {
                    if let Ok(value) = decode_return_int256(&outcome.output) {
                        shared
                            .test_cases
                            .consider_optimization_value(&id, value, sequence_so_far.clone(), outcome.trace)?;
                    }
                }
            }
        }
    }
    Ok(newly_failed)
}

/// Check whether the just-executed element reverted with an enabled panic
/// code, recording an assertion-test failure if so (spec §4.5 "Assertion
/// test").
fn check_assertion_failure(
    shared: &WorkerShared,
    catalog: &ContractCatalog,
    reverse_deployed: &HashMap<EVMAddress, String>,
    element: &CallSequenceElement,
    outcome: &crate::chain::TxOutcome,
    sequence_so_far: &CallSequence,
) -> FuzzResult<Option<FailureWitness>> {
    if !outcome.reverted {
        return Ok(None);
    }
    let Some(panic_code) = decode_panic_code(&outcome.output) else {
        return Ok(None);
    };
    if !shared.config.enabled_panic_codes.contains(&panic_code) {
        return Ok(None);
    }
    let Some(method) = resolve_element_method(catalog, reverse_deployed, element) else {
        return Ok(None);
    };
    let Some(&to) = element.to.as_ref() else { return Ok(None) };
    let Some(contract_name) = reverse_deployed.get(&to) else { return Ok(None) };
    let id = test_case_id(TestCaseKind::Assertion, contract_name, &method.signature());
    shared
        .test_cases
        .record_failure(&id, sequence_so_far.clone(), outcome.trace.clone())?;
    Ok(Some(FailureWitness {
        id,
        kind: TestCaseKind::Assertion,
        contract: contract_name.clone(),
        method_signature: method.signature(),
    }))
}

/// Build a shrink-verification predicate for `witness`: redeploys the
/// catalog fresh under `deployer` and replays a candidate sequence,
/// reporting whether the same test case would still be observed failing
/// (spec §4.6 "a pure function of post-execution state that must remain
/// true for the shrink to be valid"). Never touches the shared
/// `TestCaseRegistry` or `CoverageMap` — every replay runs against its own
/// scratch coverage map, so shrink verification has no side effect on the
/// run's real corpus/coverage state.
fn make_shrink_predicate(
    catalog: Arc<ContractCatalog>,
    deployer: EVMAddress,
    witness: FailureWitness,
    enabled_panic_codes: std::collections::HashSet<crate::config::PanicCode>,
) -> impl Fn(&CallSequence) -> FuzzResult<bool> {
    move |candidate: &CallSequence| -> FuzzResult<bool> {
        let (mut chain, deployed, reverse_deployed) = predeploy(&catalog, deployer)?;
        let mut resolved = candidate.clone();
        resolved.resolve_pseudo_addresses(&deployed);

        match witness.kind {
            TestCaseKind::Assertion => {
                for element in &resolved.elements {
                    chain.advance_block(element.block_number_delay, element.block_timestamp_delay);
                    let req = element.to_tx_request()?;
                    let mut tracer = Tracer::new(catalog.clone(), CoverageMap::new());
                    let outcome = chain.call(&req, &mut tracer)?;
                    let Some(&to) = element.to.as_ref() else { continue };
                    let Some(contract_name) = reverse_deployed.get(&to) else { continue };
                    if contract_name != &witness.contract {
                        continue;
                    }
                    if !outcome.reverted {
                        continue;
                    }
                    let Some(panic_code) = decode_panic_code(&outcome.output) else { continue };
                    if !enabled_panic_codes.contains(&panic_code) {
                        continue;
                    }
                    let Some(method) = resolve_element_method(&catalog, &reverse_deployed, element) else {
                        continue;
                    };
                    if method.signature() == witness.method_signature {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            TestCaseKind::Property => {
                let Some(&address) = deployed.get(&witness.contract) else { return Ok(false) };
                let Some(contract) = catalog.by_name(&witness.contract) else { return Ok(false) };
                let Some(method) = contract
                    .abi
                    .methods
                    .iter()
                    .find(|m| m.signature() == witness.method_signature)
                else {
                    return Ok(false);
                };
                for element in &resolved.elements {
                    chain.advance_block(element.block_number_delay, element.block_timestamp_delay);
                    let req = element.to_tx_request()?;
                    let mut tracer = Tracer::new(catalog.clone(), CoverageMap::new());
                    chain.call(&req, &mut tracer)?;

                    let calldata = encode_call(method.selector(), &[], &[])?;
                    let check_req = crate::chain::TxRequest {
                        from: deployer,
                        to: Some(address),
                        value: EVMU256::ZERO,
                        gas_limit: 5_000_000,
                        gas_price: EVMU256::ZERO,
                        data: calldata,
                    };
                    let mut check_tracer = Tracer::new(catalog.clone(), CoverageMap::new());
                    let check_outcome = chain.call(&check_req, &mut check_tracer)?;
                    let holds = check_outcome.success && decode_return_bool(&check_outcome.output).unwrap_or(false);
                    if !holds {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            TestCaseKind::Optimization => Ok(false),
        }
    }
}

/// The main per-worker loop. Runs until cancelled, the deadline elapses,
/// or `test_limit` sequences have been executed (spec §4.7, §5
/// cancellation/deadline handling).
pub fn run_worker(worker_id: usize, shared: Arc<WorkerShared>) -> FuzzResult<WorkerOutcome> {
    let mut rng = RandProvider::new(shared.config.root_seed.wrapping_add(worker_id as u64));
    let deployer = EVMAddress::from(rng.bytes(20).try_into().unwrap_or([0u8; 20]));
    let start = Instant::now();
    let mut sequences_run = 0u64;

    'reset: loop {
        let (mut chain, deployed, reverse_deployed) = predeploy(&shared.catalog, deployer)?;
        shared.chain_created.publish(WorkerChainCreated { worker_id })?;
        shared
            .chain_setup
            .publish(WorkerChainSetup { worker_id, deployed_contracts: deployed.values().copied().collect() })?;

        let mut sequences_since_reset = 0usize;
        while sequences_since_reset < shared.config.sequences_per_worker_reset {
            if shared.cancel.load(Ordering::Relaxed) {
                break 'reset;
            }
            if let Some(deadline) = shared.config.deadline {
                if start.elapsed() >= deadline {
                    break 'reset;
                }
            }
            if let Some(limit) = shared.config.test_limit {
                if sequences_run >= limit {
                    break 'reset;
                }
            }

            let mut sequence = match choose_strategy(&mut rng, &shared.config, &shared.corpus) {
                GrowthStrategy::EmptyNewSequence => CallSequence::new(),
                GrowthStrategy::MutateCorpusEntry => shared
                    .corpus
                    .select_for_mutation(&mut rng, shared.config.immutable_pool_bias)
                    .map(|mut s| {
                        s.resolve_pseudo_addresses(&deployed);
                        s
                    })
                    .unwrap_or_default(),
                GrowthStrategy::SpliceCorpusEntries => shared
                    .corpus
                    .select_for_splice(&mut rng)
                    .map(|(mut a, b)| {
                        a.resolve_pseudo_addresses(&deployed);
                        let mut b = b;
                        b.resolve_pseudo_addresses(&deployed);
                        a.elements.extend(b.elements);
                        a
                    })
                    .unwrap_or_default(),
            };

            let targets = call_targets(&shared.catalog, &shared.config);
            if targets.is_empty() || deployed.is_empty() {
                break 'reset;
            }
            while sequence.len() < shared.config.sequence_length_max {
                let (contract_name, method) = *rng.choose(&targets).expect("targets is non-empty");
                let Some(&to) = deployed.get(contract_name) else { continue };
                let pool = shared.value_set.lock();
                let element = build_call_element(&mut rng, &pool, &crate::config::MutationConfig::default(), deployer, to, method)?;
                drop(pool);
                sequence.push(element);
                if rng.coinflip(0.3) {
                    break;
                }
            }

            if sequence.is_empty() {
                continue;
            }

            shared.sequence_testing.publish(CallSequenceTesting { worker_id, sequence_len: sequence.len() })?;

            chain.advance_block(0, 0);
            let mut new_bits_total: Vec<(crate::types::CodeHash, usize, bool)> = Vec::new();
            let mut stop_early = false;
            let mut running = CallSequence::new();
            for element in &sequence.elements {
                chain.advance_block(element.block_number_delay, element.block_timestamp_delay);
                let req = element.to_tx_request()?;
                let mut tracer = Tracer::new(shared.catalog.clone(), shared.coverage.clone());
                let outcome = chain.call(&req, &mut tracer)?;
                running.push(element.clone());
                new_bits_total.extend(outcome.new_coverage_bits.iter().copied());

                let assertion_witness =
                    check_assertion_failure(&shared, &shared.catalog, &reverse_deployed, element, &outcome, &running)?;
                let property_witnesses = evaluate_oracles(&shared, &mut chain, &deployed, deployer, &running)?;

                let witnesses: Vec<FailureWitness> = assertion_witness.into_iter().chain(property_witnesses).collect();

                if !witnesses.is_empty() && shared.config.stop_on_first_failure {
                    let pool_snapshot = shared.value_set.lock().clone();
                    let mutation_cfg = crate::config::MutationConfig::default();
                    for witness in witnesses {
                        let predicate = make_shrink_predicate(
                            shared.catalog.clone(),
                            deployer,
                            witness.clone(),
                            shared.config.enabled_panic_codes.clone(),
                        );
                        let shrunk = shrink_failure(
                            &shared.catalog,
                            &shared.coverage,
                            running.clone(),
                            &reverse_deployed,
                            predicate,
                            &mut rng,
                            &pool_snapshot,
                            &mutation_cfg,
                            shared.config.shrink_round_budget,
                        );
                        if let Ok(shrunk) = shrunk {
                            shared.test_cases.update_offending_sequence(&witness.id, shrunk)?;
                        }
                    }
                    stop_early = true;
                    break;
                }
            }

            shared.sequence_tested.publish(CallSequenceTested {
                worker_id,
                sequence_len: sequence.len(),
                new_coverage_bits: new_bits_total.len(),
            })?;

            shared.corpus.submit(sequence, &new_bits_total);
            sequences_run += 1;
            sequences_since_reset += 1;

            if stop_early {
                break 'reset;
            }
        }
    }

    Ok(WorkerOutcome { worker_id, sequences_run })
}

/// Shrink a captured failing sequence against a live-replay predicate.
/// Invoked directly from `run_worker`'s failure handling whenever
/// `stop_on_first_failure` is configured and a test case just failed, with
/// the predicate `make_shrink_predicate` built for that specific failure
/// (spec §4.6, §4.7 step 3 "yield for shrinking", §4.8).
pub fn shrink_failure(
    catalog: &Arc<ContractCatalog>,
    coverage: &Arc<CoverageMap>,
    sequence: CallSequence,
    reverse_deployed: &HashMap<EVMAddress, String>,
    still_fails: impl Fn(&CallSequence) -> FuzzResult<bool>,
    rng: &mut RandProvider,
    pool: &ValueSet,
    cfg: &crate::config::MutationConfig,
    round_budget: usize,
) -> FuzzResult<CallSequence> {
    let element_methods = sequence
        .elements
        .iter()
        .map(|e| resolve_element_method(catalog, reverse_deployed, e))
        .collect();
    let _ = coverage;
    let request = ShrinkRequest { sequence, element_methods };
    let predicate = |seq: &CallSequence| still_fails(seq);
    shrinker::shrink(request, &predicate, rng, pool, cfg, round_budget)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyWeights;
    use crate::contracts::StateMutability;

    fn test_config() -> FuzzerConfig {
        let mut cfg = FuzzerConfig::default();
        cfg.worker_count = 1;
        cfg
    }

    #[test]
    fn choose_strategy_falls_back_to_empty_when_corpus_is_empty() {
        let cfg = test_config();
        let corpus = Corpus::new();
        let mut rng = RandProvider::new(1);
        for _ in 0..20 {
            assert_eq!(choose_strategy(&mut rng, &cfg, &corpus), GrowthStrategy::EmptyNewSequence);
        }
    }

    #[test]
    fn choose_strategy_only_splices_when_mutable_pool_is_non_empty() {
        let mut cfg = test_config();
        cfg.strategy_weights = StrategyWeights {
            empty_new_sequence: 0.0,
            mutate_corpus_entry: 0.0,
            splice_corpus_entries: 1.0,
        };
        let corpus = Corpus::new();
        corpus.seed_immutable(CallSequence::new());
        let mut rng = RandProvider::new(1);
        // Only the immutable pool is seeded; splice draws exclusively from
        // the mutable pool, so strategy selection must not pick it.
        assert_ne!(choose_strategy(&mut rng, &cfg, &corpus), GrowthStrategy::SpliceCorpusEntries);
    }

    #[test]
    fn build_call_element_encodes_the_selector_of_the_chosen_method() {
        let method = MethodAbi {
            name: "withdraw".to_string(),
            inputs: vec![("amount".to_string(), AbiType::Uint { bits: 256 })],
            outputs: vec![],
            mutability: StateMutability::NonPayable,
        };
        let mut rng = RandProvider::new(3);
        let pool = ValueSet::new();
        let cfg = crate::config::MutationConfig::default();
        let element = build_call_element(
            &mut rng,
            &pool,
            &cfg,
            EVMAddress::from([0x01u8; 20]),
            EVMAddress::from([0x02u8; 20]),
            &method,
        )
        .unwrap();
        assert_eq!(&element.data[..4], &method.selector());
        assert!(element.data_abi_values.is_some());
    }

    #[test]
    fn call_targets_excludes_view_property_and_optimization_methods() {
        let catalog = ContractCatalog::new(vec![crate::contracts::CompiledContract {
            name: "Vault".to_string(),
            source_path: "Vault.sol".to_string(),
            init_bytecode: vec![],
            runtime_bytecode: vec![],
            abi: crate::contracts::ContractAbi {
                methods: vec![
                    MethodAbi {
                        name: "withdraw".to_string(),
                        inputs: vec![],
                        outputs: vec![],
                        mutability: StateMutability::NonPayable,
                    },
                    MethodAbi {
                        name: "property_solvent".to_string(),
                        inputs: vec![],
                        outputs: vec![AbiType::Bool],
                        mutability: StateMutability::View,
                    },
                    MethodAbi {
                        name: "balance".to_string(),
                        inputs: vec![],
                        outputs: vec![AbiType::Uint { bits: 256 }],
                        mutability: StateMutability::View,
                    },
                ],
                events: vec![],
            },
        }]);
        let cfg = test_config();
        let targets = call_targets(&catalog, &cfg);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].1.name, "withdraw");
    }
}
