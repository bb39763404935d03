//! Test-case discovery, status tracking, and failure capture (spec §3
//! "TestCase", §4.5, §4.8, §8 end-to-end scenarios a-c).
//!
//! The teacher keeps one `Testcase<VS>` per libafl corpus entry, scored by
//! an `ObjectivesTuple`. This crate's notion of a "test case" is the
//! spec's different one: a fixed, discovered-once-at-startup property,
//! assertion, or optimization target on a contract, whose `status` tracks
//! across the whole run rather than per corpus entry. `MethodAbi`'s own
//! `is_property_test`/`is_optimization_test`/`is_assertion_candidate`
//! classifiers (`contracts.rs`) already do the discovery work; this module
//! owns the resulting registry, the status state machine, and publishes
//! `TestCaseStatusChanged` (spec §6) on every transition.

use crate::abi::{constrain, type_min, Bits256};
use crate::config::PanicCode;
use crate::contracts::ContractCatalog;
use crate::error::FuzzResult;
use crate::event::{Emitter, TestCaseStatusChanged};
use crate::sequence::CallSequence;
use crate::tracer::ExecutionTrace;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestCaseStatus {
    NotStarted,
    Running,
    Passed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestCaseKind {
    Property,
    Assertion,
    Optimization,
}

impl TestCaseKind {
    fn tag(self) -> &'static str {
        match self {
            TestCaseKind::Property => "property",
            TestCaseKind::Assertion => "assertion",
            TestCaseKind::Optimization => "optimization",
        }
    }
}

/// Stable id scheme: `kind:contract:methodSignature` (spec §3 "TestCase").
pub fn test_case_id(kind: TestCaseKind, contract: &str, method_signature: &str) -> String {
    format!("{}:{}:{}", kind.tag(), contract, method_signature)
}

#[derive(Debug, Clone)]
pub struct TestCase {
    pub id: String,
    pub kind: TestCaseKind,
    pub contract: String,
    pub method_signature: String,
    pub status: TestCaseStatus,
    pub latest_offending_sequence: Option<CallSequence>,
    pub captured_trace: Option<ExecutionTrace>,
    /// Running maximum for `Optimization` test cases, seeded at
    /// `type_min(true, 256)` (spec §4.5 "Optimization test", §9 open
    /// question on sentinel exactness — resolved in `DESIGN.md`).
    pub optimization_best: Option<Bits256>,
}

impl TestCase {
    fn new(kind: TestCaseKind, contract: String, method_signature: String) -> Self {
        let id = test_case_id(kind, &contract, &method_signature);
        Self {
            id,
            kind,
            contract,
            method_signature,
            status: TestCaseStatus::NotStarted,
            latest_offending_sequence: None,
            captured_trace: None,
            optimization_best: (kind == TestCaseKind::Optimization)
                .then(|| type_min(true, 256)),
        }
    }
}

/// Process-lifetime registry of every test case discovered on startup,
/// guarded by a single mutex (spec §5 "shared resource discipline": test
/// case status is one of the explicitly shared, mutex-guarded structures).
pub struct TestCaseRegistry {
    cases: Mutex<HashMap<String, TestCase>>,
    events: Emitter<TestCaseStatusChanged>,
}

impl TestCaseRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            cases: Mutex::new(HashMap::new()),
            events: Emitter::new(),
        })
    }

    pub fn subscribe(&self, callback: impl Fn(&TestCaseStatusChanged) -> FuzzResult<()> + Send + Sync + 'static) {
        self.events.subscribe(callback);
    }

    /// Walk every contract's ABI and register one `TestCase` per matching
    /// method (spec §4.5). Idempotent: re-running discovery against the
    /// same catalog never resets an in-progress or resolved status.
    pub fn discover(&self, catalog: &ContractCatalog, property_prefix: &str, optimization_prefix: &str) {
        let mut cases = self.cases.lock();
        for contract in catalog.iter() {
            for method in &contract.abi.methods {
                let kind = if method.is_property_test(property_prefix) {
                    TestCaseKind::Property
                } else if method.is_optimization_test(optimization_prefix) {
                    TestCaseKind::Optimization
                } else if method.is_assertion_candidate(property_prefix, optimization_prefix) {
                    TestCaseKind::Assertion
                } else {
                    continue;
                };
                let signature = method.signature();
                let id = test_case_id(kind, &contract.name, &signature);
                cases
                    .entry(id)
                    .or_insert_with(|| TestCase::new(kind, contract.name.clone(), signature));
            }
        }
    }

    pub fn snapshot(&self) -> Vec<TestCase> {
        self.cases.lock().values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<TestCase> {
        self.cases.lock().get(id).cloned()
    }

    pub fn ids_of_kind(&self, kind: TestCaseKind) -> Vec<String> {
        self.cases
            .lock()
            .values()
            .filter(|c| c.kind == kind)
            .map(|c| c.id.clone())
            .collect()
    }

    pub fn failed_count(&self) -> usize {
        self.cases
            .lock()
            .values()
            .filter(|c| c.status == TestCaseStatus::Failed)
            .count()
    }

    fn transition(&self, id: &str, new_status: TestCaseStatus) -> FuzzResult<()> {
        let old_status = {
            let mut cases = self.cases.lock();
            let Some(case) = cases.get_mut(id) else {
                return Ok(());
            };
            if case.status == new_status {
                return Ok(());
            }
            let old = case.status;
            case.status = new_status;
            old
        };
        self.events.publish(TestCaseStatusChanged {
            test_case_id: id.to_string(),
            old_status,
            new_status,
        })
    }

    pub fn mark_running(&self, id: &str) -> FuzzResult<()> {
        self.transition(id, TestCaseStatus::Running)
    }

    /// A property test returned `true`, or an assertion/optimization target
    /// call completed without triggering a failure this round. A test case
    /// already `Failed` stays `Failed` — failure is terminal for a given id
    /// (spec §4.5: once a counterexample is found it is kept, not retried
    /// away by a later passing run).
    pub fn mark_passed_if_not_failed(&self, id: &str) -> FuzzResult<()> {
        let already_failed = self
            .cases
            .lock()
            .get(id)
            .map(|c| c.status == TestCaseStatus::Failed)
            .unwrap_or(true);
        if already_failed {
            return Ok(());
        }
        self.transition(id, TestCaseStatus::Passed)
    }

    /// Record a property-test or assertion-test counterexample: capture the
    /// offending sequence and trace, transition to `Failed` (spec §4.5, §4.8
    /// "captured trace").
    pub fn record_failure(
        &self,
        id: &str,
        sequence: CallSequence,
        trace: Option<ExecutionTrace>,
    ) -> FuzzResult<()> {
        {
            let mut cases = self.cases.lock();
            if let Some(case) = cases.get_mut(id) {
                case.latest_offending_sequence = Some(sequence);
                case.captured_trace = trace;
            }
        }
        self.transition(id, TestCaseStatus::Failed)
    }

    /// Replace a `Failed` test case's offending sequence with a shrunk
    /// equivalent, leaving status and captured trace untouched (spec §4.6
    /// "yield for shrinking": the shrinker reports a minimized witness for
    /// a failure `record_failure` already captured, not a new failure).
    pub fn update_offending_sequence(&self, id: &str, sequence: CallSequence) -> FuzzResult<()> {
        let mut cases = self.cases.lock();
        if let Some(case) = cases.get_mut(id) {
            case.latest_offending_sequence = Some(sequence);
        }
        Ok(())
    }

    /// Fold a freshly observed `optimize_` return value into the running
    /// maximum (spec §4.5 "Optimization test: track the maximum value
    /// observed"). Returns `true` (and captures the sequence/trace as the
    /// new best witness) iff `candidate` strictly improves the maximum.
    pub fn consider_optimization_value(
        &self,
        id: &str,
        candidate: Bits256,
        sequence: CallSequence,
        trace: Option<ExecutionTrace>,
    ) -> FuzzResult<bool> {
        let improved = {
            let mut cases = self.cases.lock();
            let Some(case) = cases.get_mut(id) else {
                return Ok(false);
            };
            let candidate = constrain(candidate, true, 256);
            let improves = match case.optimization_best {
                Some(best) => candidate.cmp_signed(&best) == std::cmp::Ordering::Greater,
                None => true,
            };
            if improves {
                case.optimization_best = Some(candidate);
                case.latest_offending_sequence = Some(sequence);
                case.captured_trace = trace;
            }
            improves
        };
        if improved {
            self.mark_running(id)?;
        }
        Ok(improved)
    }
}
