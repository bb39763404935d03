//! Type aliases over the external EVM library's primitives.
//!
//! Mirrors the teacher's `evm::types` module, which aliases `revm`/
//! `primitive-types` types under short `EVM*` names used everywhere else in
//! the crate instead of spelling out `revm::primitives::*` at every call
//! site.

pub use revm::primitives::{Address as EVMAddress, Bytes as EVMBytes, B256, U256 as EVMU256};

/// 20-byte account address, aliased for readability at call sites that deal
/// with the value-generation layer rather than the EVM directly.
pub type Address20 = [u8; 20];

/// Content hash used as a coverage/contract-identity key (keccak-256).
pub type CodeHash = B256;

pub fn keccak256(data: &[u8]) -> B256 {
    B256::from(ethers_core::utils::keccak256(data))
}

/// EIP-55 mixed-case checksum encoding of an address, used by the tracer's
/// textual rendering.
pub fn checksum(addr: &EVMAddress) -> String {
    ethers_core::utils::to_checksum(&ethers_core::types::H160::from_slice(addr.as_slice()), None)
}
