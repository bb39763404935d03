//! Execution tracer: a stateful VM-callback observer that reconstructs a
//! call-frame tree, resolves contract identity, and renders a textual
//! trace (spec §3 "CallFrame"/"ExecutionTrace", §4.3, §9).
//!
//! The teacher wraps `revm`/`revm_interpreter` behind its own generic
//! `Middleware<VS, I, S>` trait (`evm::middlewares::coverage::Coverage` is
//! one such middleware). This module instead implements the external EVM
//! library's own public hook trait, `revm::Inspector`, directly — the
//! spec's five callbacks (`on_tx_start/on_enter/on_opcode/on_exit/
//! on_tx_end`) are folded out of `Inspector`'s eight hooks
//! (`initialize_interp`, `step`, `step_end`, `log`, `call`, `call_end`,
//! `create`, `create_end`, `selfdestruct`) inside this one file, instead of
//! introducing a second middleware layer on top of it.
//!
//! **Parent/child cycle avoidance** (spec §9): frames live in a flat
//! arena (`Vec<CallFrame>`); `parent` and child references are indices,
//! never owning pointers.

use crate::contracts::ContractCatalog;
use crate::coverage::CoverageMap;
use crate::types::{checksum, keccak256, EVMAddress, EVMBytes, EVMU256, B256};
use revm::interpreter::{
    CallInputs, CreateInputs, Gas, InstructionResult, Interpreter,
};
use revm::{Database, EVMData, Inspector};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOpType {
    Call,
    CallCode,
    DelegateCall,
    StaticCall,
    Create,
    Create2,
}

impl CallOpType {
    fn is_creation(self) -> bool {
        matches!(self, CallOpType::Create | CallOpType::Create2)
    }
}

#[derive(Debug, Clone)]
pub struct EventLog {
    pub address: EVMAddress,
    pub topics: Vec<B256>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum FrameOp {
    Child(usize),
    Log(EventLog),
}

#[derive(Debug, Clone)]
pub struct CallFrame {
    pub parent: Option<usize>,
    pub depth: usize,
    pub op_type: CallOpType,
    pub sender: EVMAddress,
    pub to: EVMAddress,
    pub code_address: EVMAddress,
    pub input: Vec<u8>,
    pub value: EVMU256,
    pub init_bytecode: Option<Vec<u8>>,
    pub runtime_bytecode: Option<Vec<u8>>,
    pub constructor_args: Option<Vec<u8>>,
    pub resolved_name: Option<String>,
    pub return_data: Vec<u8>,
    pub return_error: Option<String>,
    pub reverted: bool,
    pub executed_code: bool,
    pub self_destructed: bool,
    pub operations: Vec<FrameOp>,
}

impl CallFrame {
    fn new(
        parent: Option<usize>,
        depth: usize,
        op_type: CallOpType,
        sender: EVMAddress,
        to: EVMAddress,
        input: Vec<u8>,
        value: EVMU256,
    ) -> Self {
        Self {
            parent,
            depth,
            op_type,
            sender,
            to,
            code_address: to,
            input,
            value,
            init_bytecode: None,
            runtime_bytecode: None,
            constructor_args: None,
            resolved_name: None,
            return_data: Vec::new(),
            return_error: None,
            reverted: false,
            executed_code: false,
            self_destructed: false,
            operations: Vec::new(),
        }
    }
}

/// Completed trace: the frame arena plus the root index (spec §3
/// "ExecutionTrace wraps the top-level CallFrame plus a reference to the
/// known contract definitions").
#[derive(Debug, Clone)]
pub struct ExecutionTrace {
    pub frames: Vec<CallFrame>,
    pub root: usize,
    pub tx_hash: B256,
}

impl ExecutionTrace {
    pub fn render(&self, catalog: &ContractCatalog) -> String {
        let mut out = String::new();
        self.render_frame(self.root, 0, catalog, &mut out);
        out
    }

    fn render_frame(&self, idx: usize, indent: usize, catalog: &ContractCatalog, out: &mut String) {
        let frame = &self.frames[idx];
        let pad = "  ".repeat(indent);
        let tag = if frame.op_type.is_creation() {
            "creation"
        } else if frame.code_address != frame.to {
            "proxy call"
        } else {
            "call"
        };
        let resolved = frame
            .resolved_name
            .as_ref()
            .and_then(|name| catalog.by_name(name));
        let call_desc = match resolved {
            Some(contract) => {
                let selector_matches = |m: &crate::contracts::MethodAbi| {
                    frame.input.len() >= 4 && m.selector() == frame.input[..4]
                };
                match contract.abi.methods.iter().find(|m| selector_matches(m)) {
                    Some(method) => format!("{}.{}(...)", contract.name, method.name),
                    None => format!("{}.<fallback>", contract.name),
                }
            }
            None => format!("msg_data={}", hex::encode(&frame.input)),
        };
        out.push_str(&format!(
            "{pad}[{tag}] {} -> {} {call_desc}\n",
            checksum(&frame.sender),
            checksum(&frame.to)
        ));
        for op in &frame.operations {
            match op {
                FrameOp::Child(child_idx) => self.render_frame(*child_idx, indent + 1, catalog, out),
                FrameOp::Log(log) => {
                    let event = resolved.and_then(|c| {
                        log.topics.first().and_then(|t0| c.abi.event_by_topic0(t0))
                    });
                    let line = match event {
                        Some(ev) => format!("{pad}  {}(data={})", ev.name, hex::encode(&log.data)),
                        None => format!(
                            "{pad}  <event topics={:?} data={}>",
                            log.topics.iter().map(hex::encode).collect::<Vec<_>>(),
                            hex::encode(&log.data)
                        ),
                    };
                    out.push_str(&line);
                    out.push('\n');
                }
            }
        }
        if frame.self_destructed {
            out.push_str(&format!("{pad}  SELFDESTRUCT\n"));
        }
        let exit = render_exit(frame);
        out.push_str(&format!("{pad}  {exit}\n"));
    }
}

fn render_exit(frame: &CallFrame) -> String {
    if let Some(err) = &frame.return_error {
        if frame.reverted {
            if let Some(reason) = decode_revert_reason(&frame.return_data) {
                format!("revert('{reason}')")
            } else if let Some(panic) = decode_panic(&frame.return_data) {
                panic
            } else {
                format!("revert (error: {})", hex::encode(&frame.return_data))
            }
        } else {
            format!("vm error({err})")
        }
    } else {
        format!("return({})", hex::encode(&frame.return_data))
    }
}

const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

fn decode_revert_reason(data: &[u8]) -> Option<String> {
    if data.len() < 4 || data[..4] != ERROR_STRING_SELECTOR {
        return None;
    }
    // ABI-encoded single `string`: 32-byte offset, 32-byte length, data.
    let payload = &data[4..];
    if payload.len() < 64 {
        return None;
    }
    let len_bytes = &payload[32..64];
    let len = u64::from_be_bytes(len_bytes[24..32].try_into().ok()?) as usize;
    let str_bytes = payload.get(64..64 + len)?;
    String::from_utf8(str_bytes.to_vec()).ok()
}

fn decode_panic(data: &[u8]) -> Option<String> {
    if data.len() < 4 || data[..4] != PANIC_SELECTOR {
        return None;
    }
    let code_bytes = data.get(4..36)?;
    let code = crate::config::PanicCode::from_code(code_bytes[31]);
    Some(match code {
        Some(c) => format!("panic({c:?})"),
        None => format!("panic(0x{:02x})", data[35]),
    })
}

/// The `Panic(uint256)` code carried by a revert's return data, if any
/// (spec §4.5 "assertion test"/"panic code"). Used by the worker to decide
/// whether a reverted call is an enabled assertion failure rather than an
/// ordinary `require`/`revert`.
pub fn decode_panic_code(data: &[u8]) -> Option<crate::config::PanicCode> {
    if data.len() < 4 || data[..4] != PANIC_SELECTOR {
        return None;
    }
    let code_bytes = data.get(4..36)?;
    crate::config::PanicCode::from_code(code_bytes[31])
}

/// A stateful `revm::Inspector` that folds its hooks into the spec's five
/// tracer callbacks.
pub struct Tracer {
    catalog: Arc<ContractCatalog>,
    coverage: Arc<CoverageMap>,
    frames: Vec<CallFrame>,
    call_stack: Vec<usize>,
    pending_log: Option<EventLog>,
    tx_hash: B256,
    record_reverted: bool,
    // Per-frame executed-pc bitmaps, merged into the shared CoverageMap on
    // `on_tx_end` (spec §5: per-contract mutex/atomic discipline — batching
    // avoids a lock acquisition per opcode).
    pending_coverage: Vec<(B256, usize, bool)>,
    // Bits that actually transitioned 0->1 in the shared map during the last
    // `on_tx_end`, for the worker's corpus-acceptance delta (spec §4.4).
    last_new_bits: Vec<(B256, usize, bool)>,
}

impl Tracer {
    pub fn new(catalog: Arc<ContractCatalog>, coverage: Arc<CoverageMap>) -> Self {
        Self {
            catalog,
            coverage,
            frames: Vec::new(),
            call_stack: Vec::new(),
            pending_log: None,
            tx_hash: B256::ZERO,
            record_reverted: false,
            pending_coverage: Vec::new(),
            last_new_bits: Vec::new(),
        }
    }

    pub fn on_tx_start(&mut self, tx_hash: B256) {
        self.frames.clear();
        self.call_stack.clear();
        self.pending_log = None;
        self.pending_coverage.clear();
        self.tx_hash = tx_hash;
        self.record_reverted = false;
    }

    fn on_enter(
        &mut self,
        op_type: CallOpType,
        from: EVMAddress,
        to: EVMAddress,
        input: Vec<u8>,
        value: EVMU256,
    ) -> usize {
        let parent = self.call_stack.last().copied();
        let depth = parent.map(|p| self.frames[p].depth + 1).unwrap_or(0);
        let mut frame = CallFrame::new(parent, depth, op_type, from, to, input, value);
        if op_type.is_creation() {
            frame.init_bytecode = Some(frame.input.clone());
        }
        let idx = self.frames.len();
        self.frames.push(frame);
        if let Some(parent_idx) = parent {
            self.frames[parent_idx].operations.push(FrameOp::Child(idx));
        }
        self.call_stack.push(idx);
        idx
    }

    fn on_opcode(&mut self, pc: usize, opcode: u8, code_hash: B256, code_len: usize) {
        let Some(&current) = self.call_stack.last() else {
            return;
        };
        self.frames[current].executed_code = true;
        self.pending_coverage.push((code_hash, pc, self.record_reverted));
        let _ = code_len;
        if opcode == 0xff {
            // SELFDESTRUCT
            self.frames[current].self_destructed = true;
        }
        if let Some(log) = self.pending_log.take() {
            self.frames[current].operations.push(FrameOp::Log(log));
        }
    }

    fn on_exit(
        &mut self,
        output: Vec<u8>,
        err: Option<String>,
        reverted: bool,
        runtime_bytecode: Option<Vec<u8>>,
    ) {
        let Some(current) = self.call_stack.pop() else {
            return;
        };
        {
            let frame = &mut self.frames[current];
            frame.return_data = output;
            frame.return_error = err;
            frame.reverted = reverted;
            if runtime_bytecode.is_some() {
                frame.runtime_bytecode = runtime_bytecode.clone();
            }
        }
        if let Some(bytecode) = runtime_bytecode {
            if let Some(contract) = self.catalog.find_by_runtime_bytecode(&bytecode) {
                let is_creation = self.frames[current].op_type.is_creation();
                let name = contract.name.clone();
                if is_creation {
                    let init_bytecode = contract.init_bytecode.clone();
                    let frame = &mut self.frames[current];
                    frame.constructor_args = Some(contract.constructor_args(&frame.input).to_vec());
                    let _ = init_bytecode;
                }
                self.frames[current].resolved_name = Some(name);
            }
        }
    }

    pub fn on_tx_end(&mut self, coverage_identities: &std::collections::HashMap<B256, usize>) -> Option<ExecutionTrace> {
        self.last_new_bits.clear();
        for (code_hash, pc, reverted) in self.pending_coverage.drain(..) {
            if let Some(&len) = coverage_identities.get(&code_hash) {
                if self.coverage.set_covered(code_hash, len, pc, reverted) {
                    self.last_new_bits.push((code_hash, pc, reverted));
                }
            }
        }
        if self.frames.is_empty() {
            return None;
        }
        Some(ExecutionTrace {
            frames: std::mem::take(&mut self.frames),
            root: 0,
            tx_hash: self.tx_hash,
        })
    }

    /// Bits that transitioned 0 -> 1 in the shared `CoverageMap` during the
    /// last `on_tx_end` (spec §4.4 corpus acceptance rule). Draining rather
    /// than peeking keeps a worker's per-sequence accumulation simple: call
    /// once per transaction and fold the results.
    pub fn take_new_bits(&mut self) -> Vec<(B256, usize, bool)> {
        std::mem::take(&mut self.last_new_bits)
    }
}

fn classify_call(scheme: revm::interpreter::CallScheme) -> CallOpType {
    use revm::interpreter::CallScheme::*;
    match scheme {
        Call => CallOpType::Call,
        CallCode => CallOpType::CallCode,
        DelegateCall => CallOpType::DelegateCall,
        StaticCall => CallOpType::StaticCall,
    }
}

/// Best-effort lookup of an already-deployed account's runtime bytecode
/// from the journaled state, used to resolve contract identity for plain
/// `CALL`-family frames (spec §4.3). Accounts not yet loaded into the
/// journal (never touched this tx) are simply unresolved; the tracer falls
/// back to `msg_data=<hex>` rendering for them.
fn account_runtime_bytecode<DB: Database>(data: &mut EVMData<'_, DB>, address: EVMAddress) -> Option<Vec<u8>> {
    data.journaled_state
        .state
        .get(&address)
        .and_then(|account| account.info.code.as_ref())
        .map(|code| code.bytes().to_vec())
}

impl<DB: Database> Inspector<DB> for Tracer {
    fn step(&mut self, interp: &mut Interpreter, _data: &mut EVMData<'_, DB>) {
        let pc = interp.program_counter();
        let opcode = interp.current_opcode();
        let code_hash = keccak256(interp.contract.bytecode.original_bytecode_slice());
        let code_len = interp.contract.bytecode.original_bytecode_slice().len();
        self.on_opcode(pc, opcode, code_hash, code_len);
    }

    fn log(&mut self, _data: &mut EVMData<'_, DB>, address: &EVMAddress, topics: &[B256], data: &EVMBytes) {
        self.pending_log = Some(EventLog {
            address: *address,
            topics: topics.to_vec(),
            data: data.to_vec(),
        });
    }

    fn call(&mut self, data: &mut EVMData<'_, DB>, inputs: &mut CallInputs) -> (InstructionResult, Gas, EVMBytes) {
        let op_type = classify_call(inputs.context.scheme);
        let idx = self.on_enter(
            op_type,
            inputs.context.caller,
            inputs.context.address,
            inputs.input.to_vec(),
            inputs.transfer.value,
        );
        if let Some(bytecode) = account_runtime_bytecode(data, inputs.context.code_address) {
            self.frames[idx].code_address = inputs.context.code_address;
            self.frames[idx].runtime_bytecode = Some(bytecode.clone());
            if let Some(contract) = self.catalog.find_by_runtime_bytecode(&bytecode) {
                self.frames[idx].resolved_name = Some(contract.name.clone());
            }
        }
        (InstructionResult::Continue, Gas::new(inputs.gas_limit), EVMBytes::new())
    }

    fn call_end(
        &mut self,
        _data: &mut EVMData<'_, DB>,
        _inputs: &CallInputs,
        remaining_gas: Gas,
        ret: InstructionResult,
        out: EVMBytes,
    ) -> (InstructionResult, Gas, EVMBytes) {
        let reverted = matches!(ret, InstructionResult::Revert);
        let err = if ret.is_error() { Some(format!("{ret:?}")) } else { None };
        self.on_exit(out.to_vec(), err, reverted, None);
        (ret, remaining_gas, out)
    }

    fn create(&mut self, data: &mut EVMData<'_, DB>, inputs: &mut CreateInputs) -> (InstructionResult, Option<EVMAddress>, Gas, EVMBytes) {
        let op_type = if inputs.scheme.is_create2() {
            CallOpType::Create2
        } else {
            CallOpType::Create
        };
        let placeholder_to = inputs.created_address(data.journaled_state.depth());
        self.on_enter(op_type, inputs.caller, placeholder_to, inputs.init_code.to_vec(), inputs.value);
        (InstructionResult::Continue, None, Gas::new(inputs.gas_limit), EVMBytes::new())
    }

    fn create_end(
        &mut self,
        _data: &mut EVMData<'_, DB>,
        _inputs: &CreateInputs,
        ret: InstructionResult,
        address: Option<EVMAddress>,
        remaining_gas: Gas,
        out: EVMBytes,
    ) -> (InstructionResult, Option<EVMAddress>, Gas, EVMBytes) {
        let reverted = matches!(ret, InstructionResult::Revert);
        let err = if ret.is_error() { Some(format!("{ret:?}")) } else { None };
        // Skip bytecode resolution for failed creations (spec §4.3).
        let runtime_bytecode = if address.is_some() && !reverted {
            Some(out.to_vec())
        } else {
            None
        };
        self.on_exit(out.to_vec(), err, reverted, runtime_bytecode);
        (ret, address, remaining_gas, out)
    }

    fn selfdestruct(&mut self, _contract: EVMAddress, _target: EVMAddress) {
        if let Some(&current) = self.call_stack.last() {
            self.frames[current].self_destructed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{CompiledContract, ContractAbi, MethodAbi, StateMutability};
    use crate::abi::AbiType;

    fn sample_catalog() -> Arc<ContractCatalog> {
        let method = MethodAbi {
            name: "set".to_string(),
            inputs: vec![("x".to_string(), AbiType::Uint { bits: 256 })],
            outputs: vec![],
            mutability: StateMutability::NonPayable,
        };
        let contract = CompiledContract {
            name: "Counter".to_string(),
            source_path: "Counter.sol".to_string(),
            init_bytecode: vec![0x60, 0x00],
            runtime_bytecode: vec![0x60, 0x01],
            abi: ContractAbi { methods: vec![method], events: vec![] },
        };
        Arc::new(ContractCatalog::new(vec![contract]))
    }

    #[test]
    fn enter_exit_produces_well_formed_single_frame_trace() {
        let mut tracer = Tracer::new(sample_catalog(), CoverageMap::new());
        tracer.on_tx_start(B256::ZERO);
        let idx = tracer.on_enter(
            CallOpType::Call,
            EVMAddress::ZERO,
            EVMAddress::ZERO,
            vec![0u8, 1, 2, 3],
            EVMU256::ZERO,
        );
        assert_eq!(idx, 0);
        tracer.on_opcode(0, 0x00, B256::ZERO, 2);
        tracer.on_exit(vec![1, 2, 3], None, false, Some(vec![0x60, 0x01]));
        let trace = tracer.on_tx_end(&std::collections::HashMap::new()).unwrap();
        assert_eq!(trace.root, 0);
        let root = &trace.frames[0];
        assert!(root.parent.is_none());
        assert!(root.executed_code);
        assert!(!root.reverted);
    }

    #[test]
    fn nested_calls_appear_in_temporal_order() {
        let mut tracer = Tracer::new(sample_catalog(), CoverageMap::new());
        tracer.on_tx_start(B256::ZERO);
        tracer.on_enter(CallOpType::Call, EVMAddress::ZERO, EVMAddress::ZERO, vec![], EVMU256::ZERO);
        tracer.on_opcode(0, 0x00, B256::ZERO, 1);
        let child1 = tracer.on_enter(CallOpType::Call, EVMAddress::ZERO, EVMAddress::ZERO, vec![], EVMU256::ZERO);
        tracer.on_exit(vec![], None, false, None);
        let child2 = tracer.on_enter(CallOpType::Call, EVMAddress::ZERO, EVMAddress::ZERO, vec![], EVMU256::ZERO);
        tracer.on_exit(vec![], None, false, None);
        tracer.on_exit(vec![], None, false, None);
        let trace = tracer.on_tx_end(&std::collections::HashMap::new()).unwrap();
        let root = &trace.frames[0];
        let order: Vec<usize> = root
            .operations
            .iter()
            .filter_map(|op| match op {
                FrameOp::Child(i) => Some(*i),
                _ => None,
            })
            .collect();
        assert_eq!(order, vec![child1, child2]);
    }

    #[test]
    fn decodes_standard_revert_reason() {
        let mut data = ERROR_STRING_SELECTOR.to_vec();
        data.extend_from_slice(&[0u8; 31]);
        data.push(32);
        data.extend_from_slice(&[0u8; 27]);
        data.extend_from_slice(&5u32.to_be_bytes());
        data.extend_from_slice(b"nope\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0");
        assert_eq!(decode_revert_reason(&data).as_deref(), Some("nope"));
    }
}
