//! Forkable in-memory EVM wrapper (spec §3 "Test Chain"/§4.7 step 1, §6
//! "Consumed from EVM library").
//!
//! The teacher's `evm::vm::EVMExecutor` drives `revm_interpreter` directly
//! and reimplements a good deal of transaction-level bookkeeping (nonce
//! management, `SinglePostExecution` continuations for subroutine-style
//! re-entrant calls) to integrate with its `libafl` executor trait. This
//! module instead wraps the full `revm::EVM` convenience type — genesis
//! setup, nonce/balance handling, and block context are all handled by
//! `revm` itself — and only adds the fork/deploy/call surface this fuzzer's
//! worker loop actually needs.

use crate::error::{FuzzError, FuzzResult};
use crate::tracer::{ExecutionTrace, Tracer};
use crate::types::{CodeHash, EVMAddress, EVMU256};
use revm::db::{CacheDB, EmptyDB};
use revm::primitives::{Bytecode, ExecutionResult, Output, TransactTo, B256};
use revm::EVM;
use std::collections::HashMap;

/// One EVM message, independent of the corpus wire format (spec §6
/// "deploy(bytecode, args, sender, value)", "call(msg, state, tracer)").
#[derive(Debug, Clone)]
pub struct TxRequest {
    pub from: EVMAddress,
    pub to: Option<EVMAddress>,
    pub value: EVMU256,
    pub gas_limit: u64,
    pub gas_price: EVMU256,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct TxOutcome {
    pub success: bool,
    pub reverted: bool,
    pub output: Vec<u8>,
    pub created_address: Option<EVMAddress>,
    pub gas_used: u64,
    /// The call tree recorded by the tracer for this transaction, for
    /// assertion-failure rendering and revert-reason decoding (spec §4.3).
    pub trace: Option<ExecutionTrace>,
    /// Coverage bits this transaction newly set in the shared `CoverageMap`
    /// (spec §4.4 corpus acceptance delta). `bool` is the reverted flag.
    pub new_coverage_bits: Vec<(CodeHash, usize, bool)>,
}

/// A forkable EVM instance over an in-memory, copy-on-fork state
/// (`CacheDB<EmptyDB>` is plain `Clone`, so `fork_state` is a cheap deep
/// copy rather than a real disk/RPC fork).
pub struct Chain {
    evm: EVM<CacheDB<EmptyDB>>,
}

impl Chain {
    pub fn new() -> Self {
        let mut evm = EVM::new();
        evm.database(CacheDB::new(EmptyDB::default()));
        evm.env.cfg.disable_eip3607 = true;
        evm.env.block.number = EVMU256::from(1u64);
        evm.env.block.timestamp = EVMU256::from(1u64);
        evm.env.block.gas_limit = EVMU256::from(u64::MAX);
        Self { evm }
    }

    /// Credit `address` with `wei` and bump its nonce to zero, so freshly
    /// generated sender addresses can pay for gas/value without a prior
    /// funding transaction (spec §4.7 step 2 predeploy/fund step).
    pub fn fund(&mut self, address: EVMAddress, wei: EVMU256) {
        let db = self.evm.db.as_mut().expect("chain database always present");
        let mut info = db.basic(address).ok().flatten().unwrap_or_default();
        info.balance = wei;
        db.insert_account_info(address, info);
    }

    /// A private writable fork of the current state (spec §4.7 step 1,
    /// §4.6 "All shrink evaluations run on a freshly forked chain state").
    pub fn fork_state(&self) -> Self {
        let db = self
            .evm
            .db
            .as_ref()
            .expect("chain database always present")
            .clone();
        let mut evm = EVM::new();
        evm.env = self.evm.env.clone();
        evm.database(db);
        Self { evm }
    }

    pub fn advance_block(&mut self, number_delta: u64, timestamp_delta: u64) {
        self.evm.env.block.number += EVMU256::from(number_delta);
        self.evm.env.block.timestamp += EVMU256::from(timestamp_delta);
    }

    pub fn block_number(&self) -> u64 {
        self.evm.env.block.number.to::<u64>()
    }

    pub fn block_timestamp(&self) -> u64 {
        self.evm.env.block.timestamp.to::<u64>()
    }

    fn prepare_env(&mut self, req: &TxRequest) {
        self.evm.env.tx.caller = req.from;
        self.evm.env.tx.transact_to = match req.to {
            Some(to) => TransactTo::Call(to),
            None => TransactTo::Create(revm::primitives::CreateScheme::Create),
        };
        self.evm.env.tx.value = req.value;
        self.evm.env.tx.gas_limit = req.gas_limit;
        self.evm.env.tx.gas_price = req.gas_price;
        self.evm.env.tx.data = req.data.clone().into();
        self.evm.env.tx.nonce = None;
    }

    /// `deploy(bytecode, args, sender, value)` (spec §6). `args` is the
    /// ABI-encoded constructor argument tail appended to `init_bytecode`.
    pub fn deploy(
        &mut self,
        init_bytecode: &[u8],
        args: &[u8],
        sender: EVMAddress,
        value: EVMU256,
        tracer: &mut Tracer,
    ) -> FuzzResult<TxOutcome> {
        let mut data = init_bytecode.to_vec();
        data.extend_from_slice(args);
        let req = TxRequest {
            from: sender,
            to: None,
            value,
            gas_limit: self.evm.env.block.gas_limit.to::<u64>(),
            gas_price: EVMU256::ZERO,
            data,
        };
        self.execute(&req, tracer)
    }

    /// `call(msg, state, tracer) -> (result, state')` (spec §6); state is
    /// mutated in place rather than returned, matching `CacheDB`'s
    /// `DatabaseCommit` semantics used by `transact_commit`.
    pub fn call(&mut self, req: &TxRequest, tracer: &mut Tracer) -> FuzzResult<TxOutcome> {
        self.execute(req, tracer)
    }

    fn execute(&mut self, req: &TxRequest, tracer: &mut Tracer) -> FuzzResult<TxOutcome> {
        self.prepare_env(req);
        let tx_hash = synthetic_tx_hash(req, self.block_number());
        tracer.on_tx_start(tx_hash);
        let result = self
            .evm
            .inspect_commit(tracer)
            .map_err(|e| FuzzError::ChainExecutionError(format!("{e:?}")))?;
        let mut outcome = classify_result(result);
        let lengths = self.code_length_table();
        outcome.trace = tracer.on_tx_end(&lengths);
        outcome.new_coverage_bits = tracer.take_new_bits();
        Ok(outcome)
    }

    /// Code-hash -> bytecode-length table the tracer needs to allocate
    /// `CoverageMap` entries (spec §4.4 `set_covered(C, L, pc)`).
    pub fn code_length_table(&self) -> HashMap<CodeHash, usize> {
        self.evm
            .db
            .as_ref()
            .map(|db| {
                db.contracts
                    .iter()
                    .map(|(hash, code)| (*hash, code.bytecode.len()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Load a contract's runtime bytecode directly into an account without
    /// running a CREATE transaction, for predeploys (spec §4.7 step 2).
    pub fn set_code(&mut self, address: EVMAddress, runtime_bytecode: Vec<u8>) {
        let bytecode = Bytecode::new_raw(runtime_bytecode.into());
        let db = self.evm.db.as_mut().expect("chain database always present");
        let mut info = db.basic(address).ok().flatten().unwrap_or_default();
        info.code_hash = bytecode.hash_slow();
        info.code = Some(bytecode);
        db.insert_account_info(address, info);
    }

    pub fn read_storage(&mut self, address: EVMAddress, slot: EVMU256) -> FuzzResult<EVMU256> {
        let db = self.evm.db.as_mut().expect("chain database always present");
        db.storage(address, slot)
            .map_err(|e| FuzzError::ChainExecutionError(format!("{e:?}")))
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

fn classify_result(result: ExecutionResult) -> TxOutcome {
    match result {
        ExecutionResult::Success { output, gas_used, .. } => {
            let (created_address, data) = match output {
                Output::Call(data) => (None, data.to_vec()),
                Output::Create(data, address) => (address, data.to_vec()),
            };
            TxOutcome {
                success: true,
                reverted: false,
                output: data,
                created_address,
                gas_used,
                trace: None,
                new_coverage_bits: Vec::new(),
            }
        }
        ExecutionResult::Revert { output, gas_used } => TxOutcome {
            success: false,
            reverted: true,
            output: output.to_vec(),
            created_address: None,
            gas_used,
            trace: None,
            new_coverage_bits: Vec::new(),
        },
        ExecutionResult::Halt { gas_used, .. } => TxOutcome {
            success: false,
            reverted: false,
            output: Vec::new(),
            created_address: None,
            gas_used,
            trace: None,
            new_coverage_bits: Vec::new(),
        },
    }
}

/// A transaction identifier for tracer reset/keying purposes. Not a
/// consensus transaction hash — this chain never produces blocks that are
/// shared with anything outside the fuzzer, so a content hash of the
/// request plus block number is sufficient to distinguish traces.
fn synthetic_tx_hash(req: &TxRequest, block_number: u64) -> B256 {
    let mut buf = Vec::with_capacity(64 + req.data.len());
    buf.extend_from_slice(req.from.as_slice());
    if let Some(to) = req.to {
        buf.extend_from_slice(to.as_slice());
    }
    buf.extend_from_slice(&block_number.to_be_bytes());
    buf.extend_from_slice(&req.data);
    crate::types::keccak256(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::ContractCatalog;
    use crate::coverage::CoverageMap;
    use std::sync::Arc;

    fn tracer() -> Tracer {
        Tracer::new(Arc::new(ContractCatalog::new(vec![])), CoverageMap::new())
    }

    #[test]
    fn fund_then_deploy_simple_creation_succeeds() {
        let mut chain = Chain::new();
        let sender = EVMAddress::from([0x11u8; 20]);
        chain.fund(sender, EVMU256::from(10u64.pow(18)));
        // Minimal init code: PUSH1 0 PUSH1 0 RETURN (returns empty runtime code).
        let init = vec![0x60, 0x00, 0x60, 0x00, 0xf3];
        let mut t = tracer();
        let outcome = chain.deploy(&init, &[], sender, EVMU256::ZERO, &mut t).unwrap();
        assert!(outcome.success);
        assert!(outcome.created_address.is_some());
    }

    #[test]
    fn fork_state_is_independent_of_parent() {
        let mut chain = Chain::new();
        let addr = EVMAddress::from([0x22u8; 20]);
        chain.fund(addr, EVMU256::from(5u64));
        let mut fork = chain.fork_state();
        fork.fund(addr, EVMU256::from(999u64));
        let parent_balance = chain
            .evm
            .db
            .as_mut()
            .unwrap()
            .basic(addr)
            .unwrap()
            .unwrap()
            .balance;
        assert_eq!(parent_balance, EVMU256::from(5u64));
    }

    #[test]
    fn advance_block_accumulates_deltas() {
        let mut chain = Chain::new();
        let start = chain.block_number();
        chain.advance_block(3, 100);
        chain.advance_block(2, 50);
        assert_eq!(chain.block_number(), start + 5);
    }
}
