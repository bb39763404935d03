//! Coverage monotonicity (spec §8 property 4), the shrinker invariant (spec
//! §8 property 5), and corpus-directory seeding/healing at startup (spec §8
//! end-to-end scenario d).

mod support;

use fuzzforge_core::abi::{encode_call, AbiType, AbiValue, Bits256};
use fuzzforge_core::chain::Chain;
use fuzzforge_core::config::{FuzzerConfig, MutationConfig, PanicCode};
use fuzzforge_core::contracts::{ContractCatalog, MethodAbi};
use fuzzforge_core::coordinator::FuzzerCoordinator;
use fuzzforge_core::coverage::CoverageMap;
use fuzzforge_core::rand_provider::RandProvider;
use fuzzforge_core::sequence::{CallSequence, CallSequenceElement, DataAbiValues};
use fuzzforge_core::shrinker::{shrink, ShrinkRequest};
use fuzzforge_core::tracer::{decode_panic_code, Tracer};
use fuzzforge_core::types::{EVMAddress, EVMU256};
use fuzzforge_core::value_set::ValueSet;
use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};

/// Property 4: total coverage bits, sampled after every sequence a worker
/// tests, never decreases — `CoverageMap::merge_and_diff` only ever ORs new
/// bits in, it never clears one (spec §4.4).
#[test]
fn coverage_bit_count_never_decreases_across_a_run() {
    let catalog = ContractCatalog::new(vec![support::branch_contract()]);
    let mut cfg = FuzzerConfig::default();
    cfg.worker_count = 1;
    cfg.root_seed = 3;
    cfg.test_limit = Some(150);
    cfg.sequence_length_max = 3;
    let coordinator = Arc::new(FuzzerCoordinator::new(cfg, catalog).unwrap());

    let samples: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
    let samples_for_sub = samples.clone();
    let coordinator_for_sub = coordinator.clone();
    coordinator.subscribe_sequence_tested(move |_event| {
        samples_for_sub.lock().unwrap().push(coordinator_for_sub.coverage_bits());
        Ok(())
    });

    coordinator.run().unwrap();

    let samples = samples.lock().unwrap();
    assert!(!samples.is_empty(), "the branch fixture should test at least one sequence");
    assert!(
        samples.windows(2).all(|w| w[0] <= w[1]),
        "coverage bit count regressed somewhere in the run: {samples:?}"
    );
    assert!(*samples.last().unwrap() > 0);
}

/// Property 5: shrinking a failing sequence keeps it failing while reducing
/// it. Two calls that never trip the panic bracket a third that always
/// does; the shrinker should isolate exactly that one call.
#[test]
fn shrinking_a_multi_call_failure_isolates_the_single_panicking_call() {
    let contract = support::assertion_contract();
    let method = contract.abi.method_named("f").unwrap().clone();
    let catalog = Arc::new(ContractCatalog::new(vec![contract]));
    let deployer = EVMAddress::from([0xAAu8; 20]);

    let make_element = |arg: u64| -> CallSequenceElement {
        let values = vec![AbiValue::Uint { bits: 8, value: Bits256::from_u64(arg) }];
        let calldata = encode_call(method.selector(), &[AbiType::Uint { bits: 8 }], &values).unwrap();
        CallSequenceElement {
            from: deployer,
            to: None,
            to_pseudo: Some("Asserter".to_string()),
            nonce: 0,
            value: EVMU256::ZERO,
            gas_limit: 5_000_000,
            gas_price: EVMU256::ZERO,
            data: calldata,
            data_abi_values: Some(DataAbiValues { method_signature: method.signature(), input_values: values }),
            block_number_delay: 0,
            block_timestamp_delay: 0,
        }
    };

    let mut sequence = CallSequence::new();
    sequence.push(make_element(1));
    sequence.push(make_element(42));
    sequence.push(make_element(3));

    let still_fails = |seq: &CallSequence| -> fuzzforge_core::FuzzResult<bool> {
        let mut chain = Chain::new();
        chain.fund(deployer, EVMU256::from(1_000_000_000_000_000_000u64));
        let mut deploy_tracer = Tracer::new(catalog.clone(), CoverageMap::new());
        let outcome = chain.deploy(
            &catalog.by_name("Asserter").unwrap().init_bytecode,
            &[],
            deployer,
            EVMU256::ZERO,
            &mut deploy_tracer,
        )?;
        let address = outcome.created_address.expect("Asserter deploys successfully");

        let mut resolved = seq.clone();
        let mut deployed = HashMap::new();
        deployed.insert("Asserter".to_string(), address);
        resolved.resolve_pseudo_addresses(&deployed);

        for element in &resolved.elements {
            let req = element.to_tx_request()?;
            let mut tracer = Tracer::new(catalog.clone(), CoverageMap::new());
            let outcome = chain.call(&req, &mut tracer)?;
            if outcome.reverted {
                if decode_panic_code(&outcome.output) == Some(PanicCode::Assertion) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    };

    assert!(still_fails(&sequence).unwrap(), "the unshrunk sequence must reproduce the panic first");

    let element_methods = vec![Some(&method), Some(&method), Some(&method)];
    let request = ShrinkRequest { sequence, element_methods };
    let mut rng = RandProvider::new(5);
    let pool = ValueSet::new();
    let mutation_cfg = MutationConfig::default();
    let shrunk = shrink(request, &still_fails, &mut rng, &pool, &mutation_cfg, 200).unwrap();

    assert_eq!(shrunk.len(), 1, "the two non-panicking calls should be removed");
    assert!(still_fails(&shrunk).unwrap(), "the shrunk sequence must still reproduce the panic");
}

/// Scenario (d): loading a corpus directory at startup replays every
/// sequence, seeds the shared coverage map from it before any worker runs,
/// and persists it back at the end of the run.
#[test]
fn load_corpus_dir_seeds_coverage_and_survives_a_zero_call_run() {
    let contract = support::branch_contract();
    let method = contract.abi.method_named("branch").unwrap().clone();
    let catalog = ContractCatalog::new(vec![contract]);

    let calldata = encode_call(
        method.selector(),
        &[AbiType::Uint { bits: 256 }],
        &[AbiValue::Uint { bits: 256, value: Bits256::from_u64(0) }],
    )
    .unwrap();

    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("corpus");
    fs::create_dir_all(&dir).unwrap();
    let seed = serde_json::json!([{
        "call": {
            "from": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            "to": "DeployedContract:Brancher",
            "nonce": 0,
            "value": "0x0",
            "gasLimit": 5_000_000,
            "gasPrice": "0x0",
            "data": format!("0x{}", hex::encode(&calldata)),
        },
        "blockNumberDelay": 0,
        "blockTimestampDelay": 0,
    }]);
    fs::write(dir.join("seed.json"), serde_json::to_vec(&seed).unwrap()).unwrap();

    let mut cfg = FuzzerConfig::default();
    cfg.worker_count = 1;
    cfg.test_limit = Some(0);
    let mut coordinator = FuzzerCoordinator::new(cfg, catalog).unwrap();
    assert_eq!(coordinator.coverage_bits(), 0);

    coordinator.load_corpus_dir(&dir).unwrap();
    assert!(
        coordinator.coverage_bits() > 0,
        "replaying the seeded sequence at load time should record coverage immediately"
    );

    coordinator.run().unwrap();
    let remaining: Vec<_> = fs::read_dir(&dir).unwrap().collect();
    assert_eq!(remaining.len(), 1, "the seeded sequence should persist back as the sole corpus entry");
}
