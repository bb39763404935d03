//! Hand-assembled EVM bytecode fixtures shared by the integration tests
//! (spec §8 end-to-end scenarios). There is no Solidity compiler in this
//! workspace, so these contracts are built byte-by-byte the way the
//! teacher's own fixture bytecode (`evm::test_utils`) is: a minimal
//! CODECOPY constructor wrapping a runtime body assembled with plain
//! opcode bytes, with jump destinations computed from the lengths of the
//! pieces already assembled rather than hand-counted.

#![allow(dead_code)]

use fuzzforge_core::contracts::{CompiledContract, ContractAbi, MethodAbi, StateMutability};
use fuzzforge_core::abi::AbiType;

const PUSH1: u8 = 0x60;
const PUSH4: u8 = 0x63;
const PUSH32: u8 = 0x7f;
const DUP1: u8 = 0x80;
const EQ: u8 = 0x14;
const JUMPI: u8 = 0x57;
const JUMPDEST: u8 = 0x5b;
const POP: u8 = 0x50;
const REVERT: u8 = 0xfd;
const STOP: u8 = 0x00;
const CALLDATALOAD: u8 = 0x35;
const SHR: u8 = 0x1c;
const SLOAD: u8 = 0x54;
const SSTORE: u8 = 0x55;
const SGT: u8 = 0x13;
const MSTORE: u8 = 0x52;
const RETURN: u8 = 0xf3;
const ISZERO: u8 = 0x15;
const CODECOPY: u8 = 0x39;

fn push1(buf: &mut Vec<u8>, v: u8) {
    buf.push(PUSH1);
    buf.push(v);
}

fn push4(buf: &mut Vec<u8>, v: [u8; 4]) {
    buf.push(PUSH4);
    buf.extend_from_slice(&v);
}

fn push32(buf: &mut Vec<u8>, v: [u8; 32]) {
    buf.push(PUSH32);
    buf.extend_from_slice(&v);
}

/// Wrap `runtime` in a constructor that CODECOPYs it from the init
/// bytecode into memory and returns it, the standard pattern a Solidity
/// compiler emits for a contract with no constructor logic.
pub fn wrap_init(runtime: &[u8]) -> Vec<u8> {
    let mut code = Vec::new();
    let offset: u16 = 13; // length of this constructor, fixed regardless of runtime length
    let len: u16 = runtime.len() as u16;
    code.push(0x61); // PUSH2
    code.extend_from_slice(&len.to_be_bytes());
    code.push(DUP1);
    code.push(0x61); // PUSH2
    code.extend_from_slice(&offset.to_be_bytes());
    push1(&mut code, 0x00);
    code.push(CODECOPY);
    push1(&mut code, 0x00);
    code.push(RETURN);
    debug_assert_eq!(code.len(), offset as usize);
    code.extend_from_slice(runtime);
    code
}

fn selector_dispatch_prologue() -> Vec<u8> {
    let mut buf = Vec::new();
    push1(&mut buf, 0x00);
    buf.push(CALLDATALOAD);
    push1(&mut buf, 0xE0);
    buf.push(SHR);
    buf
}

fn selector_branch_cmp(buf: &mut Vec<u8>, selector: [u8; 4], dest: u8) {
    buf.push(DUP1);
    push4(buf, selector);
    buf.push(EQ);
    push1(buf, dest);
    buf.push(JUMPI);
}

fn fallback_revert(buf: &mut Vec<u8>) {
    buf.push(POP);
    push1(buf, 0x00);
    push1(buf, 0x00);
    buf.push(REVERT);
}

/// `set(int256)` storing its argument into slot 0, and `property_positive()`
/// reading slot 0 and returning `slot > 0` as a `bool` (spec §8 scenario a:
/// property-test detection). Two-method selector dispatch.
pub fn property_contract_runtime(set_selector: [u8; 4], prop_selector: [u8; 4]) -> Vec<u8> {
    let mut set_body = Vec::new();
    set_body.push(JUMPDEST);
    push1(&mut set_body, 0x04);
    set_body.push(CALLDATALOAD);
    push1(&mut set_body, 0x00);
    set_body.push(SSTORE);
    set_body.push(STOP);

    let mut prop_body = Vec::new();
    prop_body.push(JUMPDEST);
    push1(&mut prop_body, 0x00); // operand b = 0
    push1(&mut prop_body, 0x00); // slot
    prop_body.push(SLOAD); // operand a = slot value
    prop_body.push(SGT); // a > b  <=>  slot > 0
    push1(&mut prop_body, 0x00);
    prop_body.push(MSTORE);
    push1(&mut prop_body, 0x20);
    push1(&mut prop_body, 0x00);
    prop_body.push(RETURN);

    let mut header = selector_dispatch_prologue();
    let header_len = header.len() + 10 /* set branch cmp */ + 10 /* prop branch cmp */ + 6 /* fallback */;
    let set_dest = header_len as u8;
    let prop_dest = (header_len + set_body.len()) as u8;

    selector_branch_cmp(&mut header, set_selector, set_dest);
    selector_branch_cmp(&mut header, prop_selector, prop_dest);
    fallback_revert(&mut header);

    assert_eq!(header.len(), header_len, "header length must match the offsets baked into it");

    let mut runtime = header;
    runtime.extend_from_slice(&set_body);
    runtime.extend_from_slice(&prop_body);
    runtime
}

/// `bump(uint256)` storing its argument into slot 0, and `optimize_value()`
/// reading slot 0 back as a signed `int256` with no comparison (spec §8
/// scenario c: optimization-test maximization).
pub fn optimization_contract_runtime(bump_selector: [u8; 4], optimize_selector: [u8; 4]) -> Vec<u8> {
    let mut bump_body = Vec::new();
    bump_body.push(JUMPDEST);
    push1(&mut bump_body, 0x04);
    bump_body.push(CALLDATALOAD);
    push1(&mut bump_body, 0x00);
    bump_body.push(SSTORE);
    bump_body.push(STOP);

    let mut optimize_body = Vec::new();
    optimize_body.push(JUMPDEST);
    push1(&mut optimize_body, 0x00);
    optimize_body.push(SLOAD);
    push1(&mut optimize_body, 0x00);
    optimize_body.push(MSTORE);
    push1(&mut optimize_body, 0x20);
    push1(&mut optimize_body, 0x00);
    optimize_body.push(RETURN);

    let mut header = selector_dispatch_prologue();
    let header_len = header.len() + 10 + 10 + 6;
    let bump_dest = header_len as u8;
    let optimize_dest = (header_len + bump_body.len()) as u8;

    selector_branch_cmp(&mut header, bump_selector, bump_dest);
    selector_branch_cmp(&mut header, optimize_selector, optimize_dest);
    fallback_revert(&mut header);

    assert_eq!(header.len(), header_len);

    let mut runtime = header;
    runtime.extend_from_slice(&bump_body);
    runtime.extend_from_slice(&optimize_body);
    runtime
}

/// `f(uint8)`: reverts with a Solidity `Panic(uint256)` carrying the
/// `Assertion` code (0x01) whenever the argument equals 42, otherwise
/// returns normally (spec §8 scenario b: assertion-test detection). Single
/// method, no selector dispatch needed since the worker only ever calls
/// this contract's one method.
pub fn assertion_contract_runtime() -> Vec<u8> {
    const PANIC_SELECTOR: u32 = 0x4e487b71;

    let mut prologue = Vec::new();
    push1(&mut prologue, 0x04);
    prologue.push(CALLDATALOAD);
    push1(&mut prologue, 0x2a); // 42
    prologue.push(EQ);
    let panic_dest = 10u8; // prologue is always exactly this many bytes, see debug_assert below
    push1(&mut prologue, panic_dest);
    prologue.push(JUMPI);
    prologue.push(STOP);
    debug_assert_eq!(prologue.len(), panic_dest as usize);

    // This word's first 4 bytes must be the selector: the second MSTORE
    // below (at memory offset 4) overwrites bytes [4..36), so only bytes
    // [0..4) of this first word survive into the returned data.
    let mut selector_word = [0u8; 32];
    selector_word[0..4].copy_from_slice(&PANIC_SELECTOR.to_be_bytes());

    let mut panic_section = Vec::new();
    panic_section.push(JUMPDEST);
    push32(&mut panic_section, selector_word);
    push1(&mut panic_section, 0x00);
    panic_section.push(MSTORE);
    push1(&mut panic_section, 0x01);
    push1(&mut panic_section, 0x04);
    panic_section.push(MSTORE);
    push1(&mut panic_section, 0x24); // 36
    push1(&mut panic_section, 0x00);
    panic_section.push(REVERT);

    let mut runtime = prologue;
    runtime.extend_from_slice(&panic_section);
    runtime
}

/// `branch(uint256)`: executes one of two disjoint instruction ranges
/// depending on whether the argument is zero, for coverage-delta tests
/// (spec §8 property 4, scenario d).
pub fn branch_contract_runtime() -> Vec<u8> {
    // PUSH1(2) + CALLDATALOAD(1) + ISZERO(1) + PUSH1(2) + JUMPI(1), fixed
    // regardless of the destination byte value (PUSH1 is always 2 bytes).
    const PROLOGUE_LEN: u8 = 7;

    let mut nonzero_body = Vec::new();
    push1(&mut nonzero_body, 0x01);
    push1(&mut nonzero_body, 0x00);
    nonzero_body.push(SSTORE);
    nonzero_body.push(STOP);

    let zero_dest = PROLOGUE_LEN + nonzero_body.len() as u8;

    let mut prologue = Vec::new();
    push1(&mut prologue, 0x04);
    prologue.push(CALLDATALOAD);
    prologue.push(ISZERO);
    push1(&mut prologue, zero_dest);
    prologue.push(JUMPI);
    debug_assert_eq!(prologue.len(), PROLOGUE_LEN as usize);

    let mut zero_body = Vec::new();
    zero_body.push(JUMPDEST);
    push1(&mut zero_body, 0x02);
    push1(&mut zero_body, 0x00);
    zero_body.push(SSTORE);
    zero_body.push(STOP);

    let mut runtime = prologue;
    runtime.extend_from_slice(&nonzero_body);
    runtime.extend_from_slice(&zero_body);
    runtime
}

fn method(
    name: &str,
    inputs: Vec<(&str, AbiType)>,
    outputs: Vec<AbiType>,
    mutability: StateMutability,
) -> MethodAbi {
    MethodAbi {
        name: name.to_string(),
        inputs: inputs.into_iter().map(|(n, t)| (n.to_string(), t)).collect(),
        outputs,
        mutability,
    }
}

pub fn property_contract() -> CompiledContract {
    let set = method(
        "set",
        vec![("value", AbiType::Int { bits: 256 })],
        vec![],
        StateMutability::NonPayable,
    );
    let prop = method(
        "property_positive",
        vec![],
        vec![AbiType::Bool],
        StateMutability::View,
    );
    let runtime = property_contract_runtime(set.selector(), prop.selector());
    CompiledContract {
        name: "Counter".to_string(),
        source_path: "Counter.sol".to_string(),
        init_bytecode: wrap_init(&runtime),
        runtime_bytecode: runtime,
        abi: ContractAbi { methods: vec![set, prop], events: vec![] },
    }
}

pub fn optimization_contract() -> CompiledContract {
    let bump = method(
        "bump",
        vec![("value", AbiType::Uint { bits: 256 })],
        vec![],
        StateMutability::NonPayable,
    );
    let optimize = method(
        "optimize_value",
        vec![],
        vec![AbiType::Int { bits: 256 }],
        StateMutability::View,
    );
    let runtime = optimization_contract_runtime(bump.selector(), optimize.selector());
    CompiledContract {
        name: "Ratchet".to_string(),
        source_path: "Ratchet.sol".to_string(),
        init_bytecode: wrap_init(&runtime),
        runtime_bytecode: runtime,
        abi: ContractAbi { methods: vec![bump, optimize], events: vec![] },
    }
}

pub fn assertion_contract() -> CompiledContract {
    let f = method(
        "f",
        vec![("x", AbiType::Uint { bits: 8 })],
        vec![],
        StateMutability::NonPayable,
    );
    let runtime = assertion_contract_runtime();
    CompiledContract {
        name: "Asserter".to_string(),
        source_path: "Asserter.sol".to_string(),
        init_bytecode: wrap_init(&runtime),
        runtime_bytecode: runtime,
        abi: ContractAbi { methods: vec![f], events: vec![] },
    }
}

pub fn branch_contract() -> CompiledContract {
    let branch = method(
        "branch",
        vec![("x", AbiType::Uint { bits: 256 })],
        vec![],
        StateMutability::NonPayable,
    );
    let runtime = branch_contract_runtime();
    CompiledContract {
        name: "Brancher".to_string(),
        source_path: "Brancher.sol".to_string(),
        init_bytecode: wrap_init(&runtime),
        runtime_bytecode: runtime,
        abi: ContractAbi { methods: vec![branch], events: vec![] },
    }
}
