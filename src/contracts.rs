//! Compiled-contract catalog consumed from an external compiler (spec §6:
//! "A list of contracts; each contract carries its name, source path,
//! init-bytecode, runtime-bytecode, and ABI"), plus the bytecode-identity
//! matching the tracer uses for contract resolution (spec §4.3).

use crate::abi::AbiType;
use crate::types::{keccak256, CodeHash};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateMutability {
    Pure,
    View,
    NonPayable,
    Payable,
}

impl StateMutability {
    pub fn is_view(&self) -> bool {
        matches!(self, StateMutability::Pure | StateMutability::View)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodAbi {
    pub name: String,
    pub inputs: Vec<(String, AbiType)>,
    pub outputs: Vec<AbiType>,
    pub mutability: StateMutability,
}

impl MethodAbi {
    /// Canonical `name(type1,type2,...)` signature used for the selector
    /// and for corpus persistence's `methodSignature` field (spec §6).
    pub fn signature(&self) -> String {
        let args: Vec<String> = self.inputs.iter().map(|(_, ty)| canonical_type_name(ty)).collect();
        format!("{}({})", self.name, args.join(","))
    }

    pub fn selector(&self) -> [u8; 4] {
        let hash = keccak256(self.signature().as_bytes());
        let mut sel = [0u8; 4];
        sel.copy_from_slice(&hash[..4]);
        sel
    }

    /// Zero-argument view method matching the configured property prefix,
    /// returning `bool` (spec §4.5).
    pub fn is_property_test(&self, prefix: &str) -> bool {
        self.inputs.is_empty()
            && self.mutability.is_view()
            && self.name.starts_with(prefix)
            && self.outputs.len() == 1
            && self.outputs[0] == AbiType::Bool
    }

    /// Zero-argument method matching the configured optimization prefix,
    /// returning `int256` (spec §4.5).
    pub fn is_optimization_test(&self, prefix: &str) -> bool {
        self.inputs.is_empty()
            && self.name.starts_with(prefix)
            && self.outputs.len() == 1
            && self.outputs[0] == AbiType::Int { bits: 256 }
    }

    /// Any non-view, non-property, non-optimization method (spec §4.5
    /// "Assertion test").
    pub fn is_assertion_candidate(&self, property_prefix: &str, optimization_prefix: &str) -> bool {
        !self.mutability.is_view()
            && !self.is_property_test(property_prefix)
            && !self.is_optimization_test(optimization_prefix)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventAbi {
    pub name: String,
    /// `(field name, type, indexed)`.
    pub inputs: Vec<(String, AbiType, bool)>,
}

impl EventAbi {
    pub fn signature(&self) -> String {
        let args: Vec<String> = self.inputs.iter().map(|(_, ty, _)| canonical_type_name(ty)).collect();
        format!("{}({})", self.name, args.join(","))
    }

    pub fn topic0(&self) -> CodeHash {
        keccak256(self.signature().as_bytes())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractAbi {
    pub methods: Vec<MethodAbi>,
    pub events: Vec<EventAbi>,
}

impl ContractAbi {
    pub fn method_named(&self, name: &str) -> Option<&MethodAbi> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn method_by_selector(&self, selector: [u8; 4]) -> Option<&MethodAbi> {
        self.methods.iter().find(|m| m.selector() == selector)
    }

    pub fn event_by_topic0(&self, topic0: &CodeHash) -> Option<&EventAbi> {
        self.events.iter().find(|e| &e.topic0() == topic0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledContract {
    pub name: String,
    pub source_path: String,
    pub init_bytecode: Vec<u8>,
    pub runtime_bytecode: Vec<u8>,
    pub abi: ContractAbi,
}

impl CompiledContract {
    /// `input_data[len(compiled_init_bytecode):]`, as computed once a
    /// creation frame's code is resolved to this contract (spec §4.3).
    pub fn constructor_args<'a>(&self, input_data: &'a [u8]) -> &'a [u8] {
        let cutoff = self.init_bytecode.len().min(input_data.len());
        &input_data[cutoff..]
    }
}

/// Strip the trailing Solidity CBOR metadata section (a 2-byte big-endian
/// length, at the very end, covering a preceding CBOR-encoded map) so that
/// bytecode-identity comparisons ignore compiler metadata, per spec §4.3
/// "bytecode match against the catalog (with metadata bytes ignored)".
pub fn strip_metadata(bytecode: &[u8]) -> &[u8] {
    if bytecode.len() < 2 {
        return bytecode;
    }
    let len_bytes = &bytecode[bytecode.len() - 2..];
    let meta_len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
    let total_trailer = meta_len + 2;
    if meta_len > 0 && total_trailer <= bytecode.len() {
        &bytecode[..bytecode.len() - total_trailer]
    } else {
        bytecode
    }
}

/// A list of contracts indexed by name and by (metadata-stripped) init and
/// runtime bytecode, for the tracer's contract-identity resolution.
#[derive(Debug, Clone, Default)]
pub struct ContractCatalog {
    contracts: Vec<CompiledContract>,
    by_name: HashMap<String, usize>,
}

impl ContractCatalog {
    pub fn new(contracts: Vec<CompiledContract>) -> Self {
        let by_name = contracts
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        Self { contracts, by_name }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledContract> {
        self.contracts.iter()
    }

    pub fn by_name(&self, name: &str) -> Option<&CompiledContract> {
        self.by_name.get(name).map(|&i| &self.contracts[i])
    }

    pub fn find_by_runtime_bytecode(&self, bytecode: &[u8]) -> Option<&CompiledContract> {
        let target = strip_metadata(bytecode);
        self.contracts
            .iter()
            .find(|c| strip_metadata(&c.runtime_bytecode) == target)
    }

    pub fn find_by_init_bytecode(&self, bytecode: &[u8]) -> Option<&CompiledContract> {
        let target = strip_metadata(bytecode);
        self.contracts
            .iter()
            .find(|c| strip_metadata(&c.init_bytecode) == target)
    }

    /// Find any method across the whole catalog whose canonical
    /// `name(type1,type2,...)` signature matches `signature`, used to
    /// recover a persisted call's argument types from its corpus-recorded
    /// `methodSignature` alone (spec §6 `dataAbiValues`).
    pub fn method_by_signature(&self, signature: &str) -> Option<&MethodAbi> {
        self.contracts
            .iter()
            .flat_map(|c| c.abi.methods.iter())
            .find(|m| m.signature() == signature)
    }
}

pub fn canonical_type_name(ty: &AbiType) -> String {
    match ty {
        AbiType::Address => "address".to_string(),
        AbiType::Int { bits } => format!("int{bits}"),
        AbiType::Uint { bits } => format!("uint{bits}"),
        AbiType::Bool => "bool".to_string(),
        AbiType::String => "string".to_string(),
        AbiType::Bytes => "bytes".to_string(),
        AbiType::FixedBytes { len } => format!("bytes{len}"),
        AbiType::FixedArray { elem, len } => format!("{}[{len}]", canonical_type_name(elem)),
        AbiType::Array { elem } => format!("{}[]", canonical_type_name(elem)),
        AbiType::Tuple { fields } => {
            let inner: Vec<String> = fields.iter().map(|(_, ty)| canonical_type_name(ty)).collect();
            format!("({})", inner.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_method(name: &str, mutability: StateMutability) -> MethodAbi {
        MethodAbi {
            name: name.to_string(),
            inputs: vec![],
            outputs: vec![],
            mutability,
        }
    }

    #[test]
    fn signature_and_selector_match_known_vector() {
        let method = MethodAbi {
            name: "transfer".to_string(),
            inputs: vec![
                ("to".to_string(), AbiType::Address),
                ("amount".to_string(), AbiType::Uint { bits: 256 }),
            ],
            outputs: vec![AbiType::Bool],
            mutability: StateMutability::NonPayable,
        };
        assert_eq!(method.signature(), "transfer(address,uint256)");
        // Well-known ERC-20 transfer selector.
        assert_eq!(method.selector(), [0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn classifies_property_assertion_and_optimization_methods() {
        let mut property = sample_method("property_positive", StateMutability::View);
        property.outputs = vec![AbiType::Bool];
        assert!(property.is_property_test("property_"));
        assert!(!property.is_assertion_candidate("property_", "optimize_"));

        let mut optimization = sample_method("optimize_value", StateMutability::NonPayable);
        optimization.outputs = vec![AbiType::Int { bits: 256 }];
        assert!(optimization.is_optimization_test("optimize_"));

        let assertion = sample_method("set", StateMutability::NonPayable);
        assert!(assertion.is_assertion_candidate("property_", "optimize_"));
    }

    #[test]
    fn metadata_stripping_ignores_trailing_cbor_blob() {
        let mut code = vec![0x60, 0x80, 0x60, 0x40];
        let metadata = vec![0xa2, 0x64, b'i', b'p', b'f', b's'];
        code.extend_from_slice(&metadata);
        code.extend_from_slice(&(metadata.len() as u16).to_be_bytes());
        let stripped = strip_metadata(&code);
        assert_eq!(stripped, &[0x60, 0x80, 0x60, 0x40]);
    }

    #[test]
    fn catalog_resolves_by_bytecode_ignoring_metadata() {
        let mut runtime = vec![0x60, 0x80];
        let metadata = vec![0xde, 0xad];
        runtime.extend_from_slice(&metadata);
        runtime.extend_from_slice(&(metadata.len() as u16).to_be_bytes());

        let contract = CompiledContract {
            name: "Vault".to_string(),
            source_path: "Vault.sol".to_string(),
            init_bytecode: vec![0x60, 0x00],
            runtime_bytecode: runtime.clone(),
            abi: ContractAbi { methods: vec![], events: vec![] },
        };
        let catalog = ContractCatalog::new(vec![contract]);

        let mut other_metadata_runtime = vec![0x60, 0x80];
        other_metadata_runtime.extend_from_slice(&[0xbe, 0xef, 0xbe]);
        other_metadata_runtime.extend_from_slice(&(3u16).to_be_bytes());

        assert!(catalog.find_by_runtime_bytecode(&other_metadata_runtime).is_some());
        assert_eq!(
            catalog.find_by_runtime_bytecode(&other_metadata_runtime).unwrap().name,
            "Vault"
        );
    }
}
