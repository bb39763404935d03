//! Deduplicated pools of interesting values, seeded from source ASTs and
//! static-analysis output, and mutated in place as new values surface
//! during fuzzing (spec §3, §4.1).
//!
//! The teacher's `evm::abi` module hand-rolls its own lossy numeric
//! representation (`ABILossyType::T256`, a fixed `[u8; 32]` big-endian
//! buffer) rather than reaching for a bignum crate; `PoolInt` here follows
//! the same shape — sign flag plus 32-byte big-endian magnitude — since
//! every integer this fuzzer ever stores or generates is already bounded by
//! the EVM word size. No arithmetic happens on `PoolInt` itself: mutation
//! (`abi.rs`) draws values from the pool and performs arithmetic at the
//! target ABI type's own bit width.

use crate::static_analysis::{ConstantKind, StaticAnalysisConstant};
use crate::types::{keccak256, Address20, CodeHash};
use std::collections::{HashMap, HashSet};

/// An arbitrary-precision integer bounded to 256 bits, as sign + magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolInt {
    pub negative: bool,
    pub magnitude: [u8; 32],
}

impl PoolInt {
    pub fn zero() -> Self {
        Self {
            negative: false,
            magnitude: [0u8; 32],
        }
    }

    pub fn from_u64(v: u64) -> Self {
        let mut magnitude = [0u8; 32];
        magnitude[24..].copy_from_slice(&v.to_be_bytes());
        Self {
            negative: false,
            magnitude,
        }
    }

    pub fn from_i64(v: i64) -> Self {
        if v < 0 {
            let mut p = Self::from_u64(v.unsigned_abs());
            p.negative = true;
            p
        } else {
            Self::from_u64(v as u64)
        }
    }

    pub fn is_zero(&self) -> bool {
        self.magnitude.iter().all(|b| *b == 0)
    }

    /// Mathematical negation (not two's-complement wrap — that happens at a
    /// specific bit width during mutation, not here).
    pub fn negated(&self) -> Self {
        if self.is_zero() {
            *self
        } else {
            Self {
                negative: !self.negative,
                magnitude: self.magnitude,
            }
        }
    }

    /// Reinterpret the low 20 bytes of the magnitude as an address.
    pub fn as_address(&self) -> Address20 {
        let mut out = [0u8; 20];
        out.copy_from_slice(&self.magnitude[12..32]);
        out
    }

    pub fn to_be_bytes(self) -> [u8; 32] {
        self.magnitude
    }

    /// Parse a decimal or `0x`-prefixed hex literal, with an optional
    /// leading `-`, into a [`PoolInt`]. Values wider than 256 bits are
    /// truncated to their low 256 bits (Solidity literals never exceed
    /// this width).
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (negative, rest) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let magnitude = if let Some(hex_digits) = rest
            .strip_prefix("0x")
            .or_else(|| rest.strip_prefix("0X"))
        {
            parse_hex_to_be_bytes(hex_digits)?
        } else {
            parse_decimal_to_be_bytes(rest)?
        };
        let negative = negative && magnitude.iter().any(|b| *b != 0);
        Some(Self { negative, magnitude })
    }
}

fn parse_hex_to_be_bytes(hex_digits: &str) -> Option<[u8; 32]> {
    let padded = if hex_digits.len() % 2 == 1 {
        format!("0{hex_digits}")
    } else {
        hex_digits.to_string()
    };
    let mut decoded = hex::decode(padded).ok()?;
    if decoded.len() > 32 {
        decoded = decoded[decoded.len() - 32..].to_vec();
    }
    let mut out = [0u8; 32];
    out[32 - decoded.len()..].copy_from_slice(&decoded);
    Some(out)
}

fn parse_decimal_to_be_bytes(digits: &str) -> Option<[u8; 32]> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Little-endian 64-bit limbs covering 256 bits; schoolbook
    // multiply-by-ten-and-add, dropping overflow past the 4th limb since
    // Solidity integer literals never exceed 256 bits.
    let mut limbs = [0u64; 4];
    for ch in digits.bytes() {
        let digit = (ch - b'0') as u128;
        let mut carry = digit;
        for limb in limbs.iter_mut() {
            let v = (*limb as u128) * 10 + carry;
            *limb = v as u64;
            carry = v >> 64;
        }
    }
    let mut out = [0u8; 32];
    for (i, limb) in limbs.iter().enumerate() {
        let be = limb.to_be_bytes();
        out[24 - i * 8..32 - i * 8].copy_from_slice(&be);
    }
    Some(out)
}

/// The fourth dedup container keyed by subdenomination multiplier name
/// (spec §4.1 AST-walk rule).
const SUBDENOMINATIONS: &[(&str, u64)] = &[
    ("wei", 1),
    ("gwei", 1_000_000_000),
    ("szabo", 1_000_000_000_000),
    ("finney", 1_000_000_000_000_000),
    ("ether", 1_000_000_000_000_000_000),
    ("seconds", 1),
    ("minutes", 60),
    ("hours", 3_600),
    ("days", 86_400),
    ("weeks", 604_800),
    ("years", 31_536_000),
];

fn multiply_by_subdenomination(value: PoolInt, name: &str) -> PoolInt {
    let Some((_, factor)) = SUBDENOMINATIONS.iter().find(|(n, _)| *n == name) else {
        return value;
    };
    if *factor == 1 {
        return value;
    }
    // Schoolbook multiply of the 256-bit magnitude by a small u64 factor.
    let mut limbs = be_bytes_to_limbs(value.magnitude);
    let mut carry: u128 = 0;
    for limb in limbs.iter_mut() {
        let v = (*limb as u128) * (*factor as u128) + carry;
        *limb = v as u64;
        carry = v >> 64;
    }
    PoolInt {
        negative: value.negative,
        magnitude: limbs_to_be_bytes(limbs),
    }
}

fn be_bytes_to_limbs(bytes: [u8; 32]) -> [u64; 4] {
    let mut limbs = [0u64; 4];
    for i in 0..4 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[24 - i * 8..32 - i * 8]);
        limbs[i] = u64::from_be_bytes(buf);
    }
    limbs
}

fn limbs_to_be_bytes(limbs: [u64; 4]) -> [u8; 32] {
    let mut out = [0u8; 32];
    for (i, limb) in limbs.iter().enumerate() {
        out[24 - i * 8..32 - i * 8].copy_from_slice(&limb.to_be_bytes());
    }
    out
}

/// Polymorphic value accepted by the single `add` entry point (spec §4.1).
#[derive(Debug, Clone)]
pub enum Primitive {
    Int(PoolInt),
    Str(String),
    Bytes(Vec<u8>),
    Address(Address20),
}

/// Four deduplicated pools plus seeders (spec §3 "ValueSet").
#[derive(Debug, Clone, Default)]
pub struct ValueSet {
    integers: HashSet<PoolInt>,
    strings: HashSet<String>,
    // Keyed by content hash per spec §3: "byte identity uses a
    // cryptographic hash as the map key to avoid O(n) comparison".
    bytes: HashMap<CodeHash, Vec<u8>>,
    addresses: HashSet<Address20>,
}

impl ValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_int(&mut self, v: PoolInt) -> bool {
        self.integers.insert(v)
    }
    pub fn add_string(&mut self, v: String) -> bool {
        self.strings.insert(v)
    }
    pub fn add_bytes(&mut self, v: Vec<u8>) -> bool {
        self.bytes.insert(keccak256(&v), v).is_none()
    }
    pub fn add_address(&mut self, v: Address20) -> bool {
        self.addresses.insert(v)
    }

    pub fn add(&mut self, v: Primitive) -> bool {
        match v {
            Primitive::Int(i) => self.add_int(i),
            Primitive::Str(s) => self.add_string(s),
            Primitive::Bytes(b) => self.add_bytes(b),
            Primitive::Address(a) => self.add_address(a),
        }
    }

    pub fn contains_int(&self, v: &PoolInt) -> bool {
        self.integers.contains(v)
    }
    pub fn contains_string(&self, v: &str) -> bool {
        self.strings.contains(v)
    }
    pub fn contains_bytes(&self, v: &[u8]) -> bool {
        self.bytes.contains_key(&keccak256(v))
    }
    pub fn contains_address(&self, v: &Address20) -> bool {
        self.addresses.contains(v)
    }

    pub fn remove_int(&mut self, v: &PoolInt) -> bool {
        self.integers.remove(v)
    }
    pub fn remove_string(&mut self, v: &str) -> bool {
        self.strings.remove(v)
    }
    pub fn remove_bytes(&mut self, v: &[u8]) -> bool {
        self.bytes.remove(&keccak256(v)).is_some()
    }
    pub fn remove_address(&mut self, v: &Address20) -> bool {
        self.addresses.remove(v)
    }

    pub fn iter_ints(&self) -> impl Iterator<Item = &PoolInt> {
        self.integers.iter()
    }
    pub fn iter_strings(&self) -> impl Iterator<Item = &String> {
        self.strings.iter()
    }
    pub fn iter_bytes(&self) -> impl Iterator<Item = &Vec<u8>> {
        self.bytes.values()
    }
    pub fn iter_addresses(&self) -> impl Iterator<Item = &Address20> {
        self.addresses.iter()
    }

    pub fn int_count(&self) -> usize {
        self.integers.len()
    }
    pub fn string_count(&self) -> usize {
        self.strings.len()
    }
    pub fn bytes_count(&self) -> usize {
        self.bytes.len()
    }
    pub fn address_count(&self) -> usize {
        self.addresses.len()
    }

    /// Recursively walk any tree of JSON maps/lists, seeding literal nodes
    /// (spec §4.1 "AST walk").
    pub fn seed_from_ast(&mut self, node: &serde_json::Value) {
        match node {
            serde_json::Value::Object(map) => {
                let is_literal = map
                    .get("nodeType")
                    .and_then(|v| v.as_str())
                    .map(|s| s == "Literal")
                    .unwrap_or(false)
                    && map.contains_key("id");
                if is_literal {
                    self.seed_literal_node(map);
                }
                for value in map.values() {
                    self.seed_from_ast(value);
                }
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    self.seed_from_ast(item);
                }
            }
            _ => {}
        }
    }

    fn seed_literal_node(&mut self, map: &serde_json::Map<String, serde_json::Value>) {
        let kind = map.get("kind").and_then(|v| v.as_str()).unwrap_or("");
        let raw_value = map.get("value").and_then(|v| v.as_str());
        match kind {
            "number" => {
                let Some(raw) = raw_value else { return };
                let Some(mut parsed) = PoolInt::parse(raw) else {
                    return;
                };
                if let Some(sub) = map.get("subdenomination").and_then(|v| v.as_str()) {
                    parsed = multiply_by_subdenomination(parsed, sub);
                }
                self.add_int(parsed);
                self.add_int(parsed.negated());
                self.add_address(parsed.as_address());
            }
            "string" => {
                if let Some(raw) = raw_value {
                    self.add_string(raw.to_string());
                }
            }
            _ => {}
        }
    }

    /// Seed from static-analysis `{type, value}` records (spec §4.1,
    /// §6 "Consumed from static-analysis tool").
    pub fn seed_from_static_analysis(&mut self, records: &[StaticAnalysisConstant]) {
        for record in records {
            match record.kind {
                ConstantKind::SignedInteger | ConstantKind::UnsignedInteger => {
                    let Some(raw) = record.value.as_str() else {
                        continue;
                    };
                    let Some(parsed) = PoolInt::parse(raw) else {
                        continue;
                    };
                    self.add_int(parsed);
                    self.add_int(parsed.negated());
                    self.add_bytes(parsed.to_be_bytes().to_vec());
                }
                ConstantKind::Bool => {
                    self.add_int(PoolInt::zero());
                    self.add_int(PoolInt::from_u64(1));
                }
                ConstantKind::String => {
                    if let Some(raw) = record.value.as_str() {
                        self.add_bytes(raw.as_bytes().to_vec());
                        self.add_string(raw.to_string());
                    }
                }
                ConstantKind::Address => {
                    let Some(raw) = record.value.as_str() else {
                        continue;
                    };
                    let Some(addr) = parse_address(raw) else {
                        continue;
                    };
                    self.add_bytes(addr.to_vec());
                    self.add_address(addr);
                }
            }
        }
    }
}

fn parse_address(raw: &str) -> Option<Address20> {
    let hex_digits = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X"))?;
    let decoded = hex::decode(hex_digits).ok()?;
    if decoded.len() != 20 {
        return None;
    }
    let mut out = [0u8; 20];
    out.copy_from_slice(&decoded);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn duplicates_collapse_across_containers() {
        let mut vs = ValueSet::new();
        assert!(vs.add_int(PoolInt::from_u64(7)));
        assert!(!vs.add_int(PoolInt::from_u64(7)));
        assert!(vs.add_string("hello".into()));
        assert!(!vs.add_string("hello".into()));
        assert!(vs.add_bytes(vec![1, 2, 3]));
        assert!(!vs.add_bytes(vec![1, 2, 3]));
        assert!(vs.add_address([9u8; 20]));
        assert!(!vs.add_address([9u8; 20]));
        assert_eq!(vs.int_count(), 1);
        assert_eq!(vs.string_count(), 1);
        assert_eq!(vs.bytes_count(), 1);
        assert_eq!(vs.address_count(), 1);
    }

    #[test]
    fn parses_decimal_and_hex_and_negative() {
        let a = PoolInt::parse("12345").unwrap();
        assert!(!a.negative);
        assert_eq!(a.magnitude[28..], 12345u32.to_be_bytes());

        let b = PoolInt::parse("0xff").unwrap();
        assert_eq!(b.magnitude[31], 0xff);

        let c = PoolInt::parse("-42").unwrap();
        assert!(c.negative);
        assert_eq!(c.magnitude[31], 42);

        let zero = PoolInt::parse("-0").unwrap();
        assert!(!zero.negative);
    }

    #[test]
    fn negation_round_trips() {
        let v = PoolInt::from_i64(-5);
        let back = v.negated();
        assert!(!back.negative);
        assert_eq!(back, PoolInt::from_u64(5));
        assert_eq!(PoolInt::zero().negated(), PoolInt::zero());
    }

    #[test]
    fn ast_walk_seeds_number_and_subdenomination_literals() {
        let mut vs = ValueSet::new();
        let ast = json!({
            "nodeType": "FunctionDefinition",
            "body": {
                "nodeType": "Block",
                "statements": [
                    {
                        "id": 1,
                        "nodeType": "Literal",
                        "kind": "number",
                        "value": "2",
                        "subdenomination": "ether"
                    },
                    {
                        "id": 2,
                        "nodeType": "Literal",
                        "kind": "string",
                        "value": "hello"
                    }
                ]
            }
        });
        vs.seed_from_ast(&ast);
        let two_ether = PoolInt::parse("2000000000000000000").unwrap();
        assert!(vs.contains_int(&two_ether));
        assert!(vs.contains_int(&two_ether.negated()));
        assert!(vs.contains_string("hello"));
    }

    #[test]
    fn static_analysis_seeds_all_kinds() {
        let mut vs = ValueSet::new();
        let records = vec![
            StaticAnalysisConstant {
                kind: ConstantKind::UnsignedInteger,
                value: json!("100"),
            },
            StaticAnalysisConstant {
                kind: ConstantKind::Bool,
                value: json!(true),
            },
            StaticAnalysisConstant {
                kind: ConstantKind::String,
                value: json!("abc"),
            },
            StaticAnalysisConstant {
                kind: ConstantKind::Address,
                value: json!("0x000000000000000000000000000000000000ab"),
            },
        ];
        vs.seed_from_static_analysis(&records);
        assert!(vs.contains_int(&PoolInt::from_u64(100)));
        assert!(vs.contains_int(&PoolInt::from_u64(100).negated()));
        assert!(vs.contains_int(&PoolInt::zero()));
        assert!(vs.contains_int(&PoolInt::from_u64(1)));
        assert!(vs.contains_string("abc"));
        assert!(vs.contains_bytes(b"abc"));
        let mut addr = [0u8; 20];
        addr[19] = 0xab;
        assert!(vs.contains_address(&addr));
        assert!(vs.contains_bytes(&addr));
    }
}
