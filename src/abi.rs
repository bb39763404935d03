//! The ABI value type lattice, typed generation/mutation, and the portable
//! JSON codec (spec §3 "ABI type lattice", §4.2, §6, §8 property 2/3).
//!
//! The teacher expresses "generation/mutation over a tagged variant set" as
//! `ABILossyType` + `BoxedABI` (`Box<dyn ABI>` behind `typetag`). This module
//! keeps the same "recursive dispatch on a tagged enum" shape (spec §9
//! "Dynamic reflection on ABI values") but drops the lossy `T256`
//! representation for an explicit, width-aware one: every integer carries
//! its own bit length and is stored as a full 256-bit two's-complement word
//! (`Bits256`), exactly as the EVM itself represents `intN`/`uintN` — zero-
//! or sign-extended beyond `N` bits. That makes `constrain` (spec §8
//! property 3) a pure masking/sign-extension operation instead of a
//! variable-width bignum operation.

use crate::config::MutationConfig;
use crate::error::{FuzzError, FuzzResult};
use crate::rand_provider::RandProvider;
use crate::types::Address20;
use crate::value_set::{PoolInt, ValueSet};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::cmp::Ordering;

// ---------------------------------------------------------------------
// Bits256: a 256-bit word, used as the canonical storage for every
// int/uint regardless of its declared bit length.
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bits256([u64; 4]);

impl Bits256 {
    pub const ZERO: Bits256 = Bits256([0, 0, 0, 0]);

    pub fn from_u64(v: u64) -> Self {
        Bits256([v, 0, 0, 0])
    }

    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        let mut limbs = [0u64; 4];
        for (i, limb) in limbs.iter_mut().enumerate() {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[24 - i * 8..32 - i * 8]);
            *limb = u64::from_be_bytes(buf);
        }
        Bits256(limbs)
    }

    pub fn to_be_bytes(self) -> [u8; 32] {
        let mut out = [0u8; 32];
        for (i, limb) in self.0.iter().enumerate() {
            out[24 - i * 8..32 - i * 8].copy_from_slice(&limb.to_be_bytes());
        }
        out
    }

    pub fn from_pool_int(v: PoolInt) -> Self {
        let magnitude = Bits256::from_be_bytes(v.to_be_bytes());
        if v.negative {
            magnitude.negate_wrap()
        } else {
            magnitude
        }
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0, 0, 0, 0]
    }

    fn bit(&self, i: u32) -> bool {
        (self.0[(i / 64) as usize] >> (i % 64)) & 1 == 1
    }

    fn set_bit(&mut self, i: u32) {
        self.0[(i / 64) as usize] |= 1u64 << (i % 64);
    }

    fn clear_bit(&mut self, i: u32) {
        self.0[(i / 64) as usize] &= !(1u64 << (i % 64));
    }

    pub fn bitnot(self) -> Self {
        Bits256([!self.0[0], !self.0[1], !self.0[2], !self.0[3]])
    }

    pub fn negate_wrap(self) -> Self {
        self.bitnot().wrapping_add(Bits256::from_u64(1))
    }

    pub fn wrapping_add(self, other: Self) -> Self {
        let mut out = [0u64; 4];
        let mut carry: u128 = 0;
        for i in 0..4 {
            let sum = self.0[i] as u128 + other.0[i] as u128 + carry;
            out[i] = sum as u64;
            carry = sum >> 64;
        }
        Bits256(out)
    }

    pub fn wrapping_sub(self, other: Self) -> Self {
        self.wrapping_add(other.negate_wrap())
    }

    pub fn wrapping_mul(self, other: Self) -> Self {
        let mut acc = [0u64; 8];
        for i in 0..4 {
            let mut carry: u128 = 0;
            for j in 0..4 {
                let idx = i + j;
                let prod = self.0[i] as u128 * other.0[j] as u128 + acc[idx] as u128 + carry;
                acc[idx] = prod as u64;
                carry = prod >> 64;
            }
            let mut k = i + 4;
            while carry > 0 && k < 8 {
                let sum = acc[k] as u128 + carry;
                acc[k] = sum as u64;
                carry = sum >> 64;
                k += 1;
            }
        }
        Bits256([acc[0], acc[1], acc[2], acc[3]])
    }

    fn shl1(self) -> Self {
        let mut out = [0u64; 4];
        let mut carry = 0u64;
        for i in 0..4 {
            out[i] = (self.0[i] << 1) | carry;
            carry = self.0[i] >> 63;
        }
        Bits256(out)
    }

    pub fn cmp_unsigned(&self, other: &Self) -> Ordering {
        for i in (0..4).rev() {
            match self.0[i].cmp(&other.0[i]) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }

    /// Two's-complement signed order. Same-sign values compare the same
    /// way under `cmp_unsigned` as under two's-complement signed order, so
    /// only differing sign bits need special-casing (spec §4.5 optimization
    /// maximization, §9 "type(int256).min" open question).
    pub fn cmp_signed(&self, other: &Self) -> Ordering {
        match (self.bit(255), other.bit(255)) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => self.cmp_unsigned(other),
        }
    }

    /// Unsigned division via restoring binary long division.
    pub fn div_rem_unsigned(self, divisor: Self) -> (Self, Self) {
        if divisor.is_zero() {
            return (Bits256::ZERO, self);
        }
        let mut quotient = Bits256::ZERO;
        let mut remainder = Bits256::ZERO;
        for i in (0..256u32).rev() {
            remainder = remainder.shl1();
            if self.bit(i) {
                remainder.set_bit(0);
            }
            if remainder.cmp_unsigned(&divisor) != Ordering::Less {
                remainder = remainder.wrapping_sub(divisor);
                quotient.set_bit(i);
            }
        }
        (quotient, remainder)
    }

    fn divmod_small(self, divisor: u64) -> (Self, u64) {
        let mut quotient = [0u64; 4];
        let mut remainder: u128 = 0;
        for i in (0..4).rev() {
            let cur = (remainder << 64) | self.0[i] as u128;
            quotient[i] = (cur / divisor as u128) as u64;
            remainder = cur % divisor as u128;
        }
        (Bits256(quotient), remainder as u64)
    }

    /// Truncating signed division/remainder (EVM SDIV/SMOD semantics),
    /// operating on values already sign-extended over all 256 bits.
    pub fn signed_div_rem(self, divisor: Self) -> (Self, Self) {
        if divisor.is_zero() {
            return (Bits256::ZERO, self);
        }
        let a_neg = self.bit(255);
        let b_neg = divisor.bit(255);
        let a_abs = if a_neg { self.negate_wrap() } else { self };
        let b_abs = if b_neg { divisor.negate_wrap() } else { divisor };
        let (q, r) = a_abs.div_rem_unsigned(b_abs);
        let q = if a_neg ^ b_neg { q.negate_wrap() } else { q };
        let r = if a_neg { r.negate_wrap() } else { r };
        (q, r)
    }

    pub fn mask_low_bits(mut self, bit_len: u32) -> Self {
        if bit_len >= 256 {
            return self;
        }
        for i in bit_len..256 {
            self.clear_bit(i);
        }
        self
    }

    pub fn sign_extend(mut self, bit_len: u32) -> Self {
        if bit_len == 0 || bit_len >= 256 {
            return self;
        }
        if self.bit(bit_len - 1) {
            for i in bit_len..256 {
                self.set_bit(i);
            }
        }
        self
    }

    pub fn to_decimal_string(self, signed: bool) -> String {
        let negative = signed && self.bit(255);
        let magnitude = if negative { self.negate_wrap() } else { self };
        let digits = magnitude.to_decimal_digits();
        if negative {
            format!("-{digits}")
        } else {
            digits
        }
    }

    fn to_decimal_digits(self) -> String {
        if self.is_zero() {
            return "0".to_string();
        }
        let mut value = self;
        let mut digits = Vec::new();
        while !value.is_zero() {
            let (q, r) = value.divmod_small(10);
            digits.push(b'0' + r as u8);
            value = q;
        }
        digits.reverse();
        String::from_utf8(digits).expect("ascii digits")
    }

    pub fn parse_decimal(s: &str, signed: bool, bit_len: u32) -> Option<Self> {
        let parsed = PoolInt::parse(s)?;
        Some(constrain(Bits256::from_pool_int(parsed), signed, bit_len))
    }
}

/// Wrap an arbitrary 256-bit word into the representation valid for a
/// `(signed, bit_len)` ABI integer type (spec §4.2, §8 property 3).
pub fn constrain(raw: Bits256, signed: bool, bit_len: u32) -> Bits256 {
    let masked = raw.mask_low_bits(bit_len);
    if signed {
        masked.sign_extend(bit_len)
    } else {
        masked
    }
}

pub fn type_min(signed: bool, bit_len: u32) -> Bits256 {
    if !signed || bit_len == 0 {
        return Bits256::ZERO;
    }
    let mut v = Bits256::ZERO;
    v.set_bit(bit_len - 1);
    v.sign_extend(bit_len)
}

pub fn type_max(signed: bool, bit_len: u32) -> Bits256 {
    let mut all_low = Bits256::ZERO;
    for i in 0..bit_len.min(256) {
        all_low.set_bit(i);
    }
    if signed && bit_len > 0 {
        all_low.clear_bit(bit_len - 1);
    }
    all_low
}

// ---------------------------------------------------------------------
// ABI type lattice and values (spec §3).
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbiType {
    Address,
    Int { bits: u16 },
    Uint { bits: u16 },
    Bool,
    String,
    Bytes,
    FixedBytes { len: u8 },
    FixedArray { elem: Box<AbiType>, len: usize },
    Array { elem: Box<AbiType> },
    Tuple { fields: Vec<(String, AbiType)> },
}

impl AbiType {
    pub fn validate(&self) -> FuzzResult<()> {
        match self {
            AbiType::Int { bits } | AbiType::Uint { bits } => {
                if *bits == 0 || *bits > 256 || bits % 8 != 0 {
                    return Err(FuzzError::config(format!(
                        "integer bit length must be a multiple of 8 in 8..=256, got {bits}"
                    )));
                }
            }
            AbiType::FixedBytes { len } => {
                if *len == 0 || *len > 32 {
                    return Err(FuzzError::config(format!(
                        "fixed bytes length must be in 1..=32, got {len}"
                    )));
                }
            }
            AbiType::FixedArray { elem, .. } | AbiType::Array { elem } => elem.validate()?,
            AbiType::Tuple { fields } => {
                for (_, ty) in fields {
                    ty.validate()?;
                }
            }
            AbiType::Address | AbiType::Bool | AbiType::String | AbiType::Bytes => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AbiValue {
    Address(Address20),
    Int { bits: u16, value: Bits256 },
    Uint { bits: u16, value: Bits256 },
    Bool(bool),
    /// Raw bytes, not a validated Rust `String` — Solidity ABI `string` is
    /// wire-encoded as arbitrary bytes with no UTF-8 guarantee.
    String(Vec<u8>),
    Bytes(Vec<u8>),
    FixedBytes(Vec<u8>),
    Array(Vec<AbiValue>),
    Tuple(Vec<(String, AbiValue)>),
}

// ---------------------------------------------------------------------
// JSON codec (spec §4.2 "JSON-compatible encoding", §8 property 2).
// ---------------------------------------------------------------------

const HEX_ESCAPE_MARKER: &str = "\u{0}\u{0}hex:";

fn encode_string_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) if !s.starts_with(HEX_ESCAPE_MARKER) => s.to_string(),
        _ => format!("{HEX_ESCAPE_MARKER}{}", hex::encode(bytes)),
    }
}

fn decode_string_bytes(s: &str) -> Vec<u8> {
    match s.strip_prefix(HEX_ESCAPE_MARKER) {
        Some(hex_part) => hex::decode(hex_part).unwrap_or_default(),
        None => s.as_bytes().to_vec(),
    }
}

pub fn encode_value(value: &AbiValue) -> serde_json::Value {
    match value {
        AbiValue::Address(a) => json!(format!("0x{}", hex::encode(a))),
        AbiValue::Int { value, .. } => json!(value.to_decimal_string(true)),
        AbiValue::Uint { value, .. } => json!(value.to_decimal_string(false)),
        AbiValue::Bool(b) => json!(*b),
        AbiValue::String(bytes) => json!(encode_string_bytes(bytes)),
        AbiValue::Bytes(b) => json!(format!("0x{}", hex::encode(b))),
        AbiValue::FixedBytes(b) => json!(format!("0x{}", hex::encode(b))),
        AbiValue::Array(items) => serde_json::Value::Array(items.iter().map(encode_value).collect()),
        AbiValue::Tuple(fields) => {
            let mut map = serde_json::Map::new();
            for (name, v) in fields {
                map.insert(name.clone(), encode_value(v));
            }
            serde_json::Value::Object(map)
        }
    }
}

pub fn decode_value(ty: &AbiType, json: &serde_json::Value) -> FuzzResult<AbiValue> {
    match ty {
        AbiType::Address => {
            let s = json
                .as_str()
                .ok_or_else(|| FuzzError::abi("address value must be a string"))?;
            let digits = s.strip_prefix("0x").unwrap_or(s);
            let decoded = hex::decode(digits).map_err(|e| FuzzError::abi(e.to_string()))?;
            if decoded.len() != 20 {
                return Err(FuzzError::abi("address must decode to 20 bytes"));
            }
            let mut out = [0u8; 20];
            out.copy_from_slice(&decoded);
            Ok(AbiValue::Address(out))
        }
        AbiType::Int { bits } => {
            let s = json
                .as_str()
                .ok_or_else(|| FuzzError::abi("int value must be a decimal string"))?;
            let value = Bits256::parse_decimal(s, true, *bits as u32)
                .ok_or_else(|| FuzzError::abi(format!("invalid int literal: {s}")))?;
            Ok(AbiValue::Int { bits: *bits, value })
        }
        AbiType::Uint { bits } => {
            let s = json
                .as_str()
                .ok_or_else(|| FuzzError::abi("uint value must be a decimal string"))?;
            let value = Bits256::parse_decimal(s, false, *bits as u32)
                .ok_or_else(|| FuzzError::abi(format!("invalid uint literal: {s}")))?;
            Ok(AbiValue::Uint { bits: *bits, value })
        }
        AbiType::Bool => json
            .as_bool()
            .map(AbiValue::Bool)
            .ok_or_else(|| FuzzError::abi("bool value must be a JSON boolean")),
        AbiType::String => {
            let s = json
                .as_str()
                .ok_or_else(|| FuzzError::abi("string value must be a JSON string"))?;
            Ok(AbiValue::String(decode_string_bytes(s)))
        }
        AbiType::Bytes => {
            let s = json
                .as_str()
                .ok_or_else(|| FuzzError::abi("bytes value must be a hex string"))?;
            let digits = s.strip_prefix("0x").unwrap_or(s);
            Ok(AbiValue::Bytes(
                hex::decode(digits).map_err(|e| FuzzError::abi(e.to_string()))?,
            ))
        }
        AbiType::FixedBytes { len } => {
            let s = json
                .as_str()
                .ok_or_else(|| FuzzError::abi("fixed bytes value must be a hex string"))?;
            let digits = s.strip_prefix("0x").unwrap_or(s);
            let decoded = hex::decode(digits).map_err(|e| FuzzError::abi(e.to_string()))?;
            if decoded.len() != *len as usize {
                return Err(FuzzError::abi(format!(
                    "fixed bytes expected {len} bytes, got {}",
                    decoded.len()
                )));
            }
            Ok(AbiValue::FixedBytes(decoded))
        }
        AbiType::FixedArray { elem, len } => {
            let items = json
                .as_array()
                .ok_or_else(|| FuzzError::abi("fixed array value must be a JSON array"))?;
            if items.len() != *len {
                return Err(FuzzError::abi(format!(
                    "fixed array expected {len} elements, got {}",
                    items.len()
                )));
            }
            let decoded: FuzzResult<Vec<_>> = items.iter().map(|v| decode_value(elem, v)).collect();
            Ok(AbiValue::Array(decoded?))
        }
        AbiType::Array { elem } => {
            let items = json
                .as_array()
                .ok_or_else(|| FuzzError::abi("array value must be a JSON array"))?;
            let decoded: FuzzResult<Vec<_>> = items.iter().map(|v| decode_value(elem, v)).collect();
            Ok(AbiValue::Array(decoded?))
        }
        AbiType::Tuple { fields } => {
            let obj = json
                .as_object()
                .ok_or_else(|| FuzzError::abi("tuple value must be a JSON object"))?;
            let mut out = Vec::with_capacity(fields.len());
            for (name, field_ty) in fields {
                let field_json = obj
                    .get(name)
                    .ok_or_else(|| FuzzError::abi(format!("tuple missing field {name}")))?;
                out.push((name.clone(), decode_value(field_ty, field_json)?));
            }
            Ok(AbiValue::Tuple(out))
        }
    }
}

// ---------------------------------------------------------------------
// EVM calldata codec (spec §4.5/§4.7 "ABI-encoded call data", §6
// "consumed from EVM library").
//
// The teacher's `evm::abi::BoxedABI::get_bytes` hand-rolls the same
// head/tail layout the Solidity ABI spec defines, walking its own tagged
// `ABILossyType` tree rather than calling out to `ethabi`. This module
// does the same over `AbiType`/`AbiValue` instead of pulling in
// `ethers_core::abi`'s `Token`/`ParamType`, since the value lattice here
// already carries exact bit widths and two's-complement words that would
// otherwise have to be round-tripped through `ethabi`'s own types.
// ---------------------------------------------------------------------

fn word_from_bytes_left(bytes: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let len = bytes.len().min(32);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}

fn word_from_uint(value: u128) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[16..].copy_from_slice(&value.to_be_bytes());
    out
}

/// True iff `ty`'s encoding needs a length prefix or an offset pointer,
/// per the ABI spec's static/dynamic type distinction.
pub fn is_dynamic_type(ty: &AbiType) -> bool {
    match ty {
        AbiType::Address
        | AbiType::Int { .. }
        | AbiType::Uint { .. }
        | AbiType::Bool
        | AbiType::FixedBytes { .. } => false,
        AbiType::String | AbiType::Bytes => true,
        AbiType::FixedArray { elem, .. } => is_dynamic_type(elem),
        AbiType::Array { .. } => true,
        AbiType::Tuple { fields } => fields.iter().any(|(_, ty)| is_dynamic_type(ty)),
    }
}

/// Encode a value known to be statically sized: a single 32-byte word for
/// scalars, or a flat concatenation of its children's static words for a
/// non-dynamic tuple/fixed array.
fn encode_static(ty: &AbiType, value: &AbiValue) -> FuzzResult<Vec<u8>> {
    match (ty, value) {
        (AbiType::Address, AbiValue::Address(a)) => Ok(word_from_bytes_left(a).to_vec()),
        (AbiType::Int { .. }, AbiValue::Int { value, .. }) => Ok(value.to_be_bytes().to_vec()),
        (AbiType::Uint { .. }, AbiValue::Uint { value, .. }) => Ok(value.to_be_bytes().to_vec()),
        (AbiType::Bool, AbiValue::Bool(b)) => {
            let mut word = [0u8; 32];
            word[31] = *b as u8;
            Ok(word.to_vec())
        }
        (AbiType::FixedBytes { .. }, AbiValue::FixedBytes(bytes)) => {
            let mut word = [0u8; 32];
            let len = bytes.len().min(32);
            word[..len].copy_from_slice(&bytes[..len]);
            Ok(word.to_vec())
        }
        (AbiType::FixedArray { elem, len }, AbiValue::Array(items)) => {
            if items.len() != *len {
                return Err(FuzzError::abi("fixed array length mismatch during encoding"));
            }
            let mut out = Vec::with_capacity(32 * len);
            for item in items {
                out.extend_from_slice(&encode_static(elem, item)?);
            }
            Ok(out)
        }
        (AbiType::Tuple { fields }, AbiValue::Tuple(values)) => {
            let mut out = Vec::new();
            for ((_, field_ty), (_, field_val)) in fields.iter().zip(values.iter()) {
                out.extend_from_slice(&encode_static(field_ty, field_val)?);
            }
            Ok(out)
        }
        _ => Err(FuzzError::abi(
            "encode called with a value that does not match its declared type",
        )),
    }
}

/// Encode a value known to be dynamic: length-prefixed bytes for
/// `string`/`bytes`, or a head/tail tuple encoding for arrays/tuples that
/// contain a dynamic element somewhere inside them.
fn encode_dynamic(ty: &AbiType, value: &AbiValue) -> FuzzResult<Vec<u8>> {
    match (ty, value) {
        (AbiType::String, AbiValue::String(bytes)) | (AbiType::Bytes, AbiValue::Bytes(bytes)) => {
            let mut out = word_from_uint(bytes.len() as u128).to_vec();
            out.extend_from_slice(bytes);
            let padded = bytes.len().div_ceil(32) * 32;
            out.resize(32 + padded, 0);
            Ok(out)
        }
        (AbiType::Array { elem }, AbiValue::Array(items)) => {
            let mut out = word_from_uint(items.len() as u128).to_vec();
            let types: Vec<AbiType> = std::iter::repeat((**elem).clone()).take(items.len()).collect();
            out.extend_from_slice(&encode_head_tail(&types, items)?);
            Ok(out)
        }
        (AbiType::FixedArray { elem, len }, AbiValue::Array(items)) => {
            if items.len() != *len {
                return Err(FuzzError::abi("fixed array length mismatch during encoding"));
            }
            let types: Vec<AbiType> = std::iter::repeat((**elem).clone()).take(items.len()).collect();
            encode_head_tail(&types, items)
        }
        (AbiType::Tuple { fields }, AbiValue::Tuple(values)) => {
            let types: Vec<AbiType> = fields.iter().map(|(_, t)| t.clone()).collect();
            let values: Vec<AbiValue> = values.iter().map(|(_, v)| v.clone()).collect();
            encode_head_tail(&types, &values)
        }
        _ => Err(FuzzError::abi(
            "encode called with a value that does not match its declared type",
        )),
    }
}

/// The generic ABI head/tail layout shared by top-level parameter lists,
/// dynamic arrays' elements, and dynamic tuples/fixed arrays: a fixed-size
/// head (one word per static value, one offset pointer per dynamic value)
/// followed by the dynamic values' own encodings in order.
fn encode_head_tail(types: &[AbiType], values: &[AbiValue]) -> FuzzResult<Vec<u8>> {
    if types.len() != values.len() {
        return Err(FuzzError::abi("argument count does not match type count"));
    }
    let mut head_slots: Vec<Option<Vec<u8>>> = Vec::with_capacity(types.len());
    let mut tails: Vec<Vec<u8>> = Vec::with_capacity(types.len());
    for (ty, value) in types.iter().zip(values.iter()) {
        if is_dynamic_type(ty) {
            head_slots.push(None);
            tails.push(encode_dynamic(ty, value)?);
        } else {
            head_slots.push(Some(encode_static(ty, value)?));
            tails.push(Vec::new());
        }
    }
    let head_total: usize = head_slots
        .iter()
        .map(|s| s.as_ref().map(|b| b.len()).unwrap_or(32))
        .sum();
    let mut offset = head_total;
    let mut head = Vec::with_capacity(head_total);
    for (slot, tail) in head_slots.iter().zip(tails.iter()) {
        match slot {
            Some(bytes) => head.extend_from_slice(bytes),
            None => {
                head.extend_from_slice(&word_from_uint(offset as u128));
                offset += tail.len();
            }
        }
    }
    let mut out = head;
    for tail in tails {
        out.extend_from_slice(&tail);
    }
    Ok(out)
}

/// ABI-encode a parameter list, the shape `deploy`/`call` need for
/// constructor arguments and `CallSequenceElement.data`'s argument tail
/// (spec §6).
pub fn encode_params(types: &[AbiType], values: &[AbiValue]) -> FuzzResult<Vec<u8>> {
    encode_head_tail(types, values)
}

/// `selector ++ abi_encode(args)`, the full calldata for a non-constructor
/// call (spec §3 "CallSequenceElement", §4.7 step 3).
pub fn encode_call(selector: [u8; 4], types: &[AbiType], values: &[AbiValue]) -> FuzzResult<Vec<u8>> {
    let mut out = selector.to_vec();
    out.extend_from_slice(&encode_params(types, values)?);
    Ok(out)
}

/// Decode a `bool` return value: the EVM encodes it as a single 32-byte
/// word with the boolean in the low byte (spec §4.5 property-test oracle).
pub fn decode_return_bool(data: &[u8]) -> FuzzResult<bool> {
    if data.len() < 32 {
        return Err(FuzzError::abi("return data too short to decode a bool"));
    }
    Ok(data[31] != 0)
}

/// Decode an `int256`/`uint256` return value: a single big-endian 32-byte
/// word (spec §4.5 optimization-test oracle).
pub fn decode_return_int256(data: &[u8]) -> FuzzResult<Bits256> {
    if data.len() < 32 {
        return Err(FuzzError::abi("return data too short to decode an int256"));
    }
    let mut buf = [0u8; 32];
    buf.copy_from_slice(&data[..32]);
    Ok(Bits256::from_be_bytes(buf))
}

// ---------------------------------------------------------------------
// Generator / Mutator (spec §4.2, §9 "Generator/mutator polymorphism").
// ---------------------------------------------------------------------

pub trait Generator {
    fn generate(
        &self,
        ty: &AbiType,
        rng: &mut RandProvider,
        pool: &ValueSet,
        cfg: &MutationConfig,
    ) -> FuzzResult<AbiValue>;
}

pub trait Mutator {
    fn mutate(
        &self,
        ty: &AbiType,
        value: &AbiValue,
        rng: &mut RandProvider,
        pool: &ValueSet,
        cfg: &MutationConfig,
    ) -> FuzzResult<AbiValue>;
}

const PRINTABLE_ALPHABET_LO: u8 = b' ';
const PRINTABLE_ALPHABET_HI: u8 = b'~';

fn random_printable_byte(rng: &mut RandProvider) -> u8 {
    let span = (PRINTABLE_ALPHABET_HI - PRINTABLE_ALPHABET_LO) as u64 + 1;
    PRINTABLE_ALPHABET_LO + rng.below(span) as u8
}

fn random_dynamic_len(rng: &mut RandProvider, cfg: &MutationConfig) -> usize {
    rng.between(cfg.min_dynamic_len as u64, cfg.max_dynamic_len as u64) as usize
}

/// Pool for integer perturbation is `ValueSet.integers ∪ {type_min,
/// type_max}` (min omitted for unsigned) (spec §4.2).
fn pick_integer_operand(
    rng: &mut RandProvider,
    pool: &ValueSet,
    signed: bool,
    bits: u32,
) -> Bits256 {
    let pool_ints: Vec<&PoolInt> = pool.iter_ints().collect();
    let extra_count = if signed { 2 } else { 1 };
    let total = pool_ints.len() + extra_count;
    if total == 0 {
        return Bits256::ZERO;
    }
    let idx = rng.below(total as u64) as usize;
    if idx < pool_ints.len() {
        constrain(Bits256::from_pool_int(*pool_ints[idx]), signed, bits)
    } else if !signed {
        type_max(signed, bits)
    } else if idx == pool_ints.len() {
        type_min(signed, bits)
    } else {
        type_max(signed, bits)
    }
}

pub struct RandomGenerator;

impl Generator for RandomGenerator {
    fn generate(
        &self,
        ty: &AbiType,
        rng: &mut RandProvider,
        pool: &ValueSet,
        cfg: &MutationConfig,
    ) -> FuzzResult<AbiValue> {
        Ok(match ty {
            AbiType::Address => {
                let addresses: Vec<&Address20> = pool.iter_addresses().collect();
                if !addresses.is_empty() && !rng.coinflip(cfg.generate_random_address_bias) {
                    let idx = rng.below(addresses.len() as u64) as usize;
                    AbiValue::Address(*addresses[idx])
                } else {
                    let bytes = rng.bytes(20);
                    let mut out = [0u8; 20];
                    out.copy_from_slice(&bytes);
                    AbiValue::Address(out)
                }
            }
            AbiType::Int { bits } => AbiValue::Int {
                bits: *bits,
                value: generate_integer(rng, pool, cfg, true, *bits as u32),
            },
            AbiType::Uint { bits } => AbiValue::Uint {
                bits: *bits,
                value: generate_integer(rng, pool, cfg, false, *bits as u32),
            },
            AbiType::Bool => AbiValue::Bool(rng.coinflip(0.5)),
            AbiType::String => {
                let strings: Vec<&String> = pool.iter_strings().collect();
                if !strings.is_empty() && !rng.coinflip(cfg.generate_random_string_bias) {
                    let idx = rng.below(strings.len() as u64) as usize;
                    AbiValue::String(strings[idx].clone().into_bytes())
                } else {
                    let len = random_dynamic_len(rng, cfg);
                    AbiValue::String((0..len).map(|_| random_printable_byte(rng)).collect())
                }
            }
            AbiType::Bytes => {
                let byte_pool: Vec<&Vec<u8>> = pool.iter_bytes().collect();
                if !byte_pool.is_empty() && !rng.coinflip(cfg.generate_random_bytes_bias) {
                    let idx = rng.below(byte_pool.len() as u64) as usize;
                    AbiValue::Bytes(byte_pool[idx].clone())
                } else {
                    let len = random_dynamic_len(rng, cfg);
                    AbiValue::Bytes(rng.bytes(len))
                }
            }
            AbiType::FixedBytes { len } => AbiValue::FixedBytes(rng.bytes(*len as usize)),
            AbiType::FixedArray { elem, len } => {
                let mut items = Vec::with_capacity(*len);
                for _ in 0..*len {
                    items.push(self.generate(elem, rng, pool, cfg)?);
                }
                AbiValue::Array(items)
            }
            AbiType::Array { elem } => {
                let len = random_dynamic_len(rng, cfg);
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(self.generate(elem, rng, pool, cfg)?);
                }
                AbiValue::Array(items)
            }
            AbiType::Tuple { fields } => {
                let mut out = Vec::with_capacity(fields.len());
                for (name, field_ty) in fields {
                    out.push((name.clone(), self.generate(field_ty, rng, pool, cfg)?));
                }
                AbiValue::Tuple(out)
            }
        })
    }
}

fn generate_integer(
    rng: &mut RandProvider,
    pool: &ValueSet,
    cfg: &MutationConfig,
    signed: bool,
    bits: u32,
) -> Bits256 {
    let pool_empty = pool.int_count() == 0;
    if pool_empty || rng.coinflip(cfg.generate_random_integer_bias) {
        let raw_bytes = rng.bytes((bits / 8) as usize);
        let mut buf = [0u8; 32];
        buf[32 - raw_bytes.len()..].copy_from_slice(&raw_bytes);
        constrain(Bits256::from_be_bytes(buf), signed, bits)
    } else {
        pick_integer_operand(rng, pool, signed, bits)
    }
}

/// Every probability-gated per-type rate, plus the shrinking mutator that
/// only ever decreases magnitude (spec §4.2 "Shrinking mutator").
pub struct StandardMutator;

impl Generator for StandardMutator {
    fn generate(
        &self,
        ty: &AbiType,
        rng: &mut RandProvider,
        pool: &ValueSet,
        cfg: &MutationConfig,
    ) -> FuzzResult<AbiValue> {
        RandomGenerator.generate(ty, rng, pool, cfg)
    }
}

impl Mutator for StandardMutator {
    fn mutate(
        &self,
        ty: &AbiType,
        value: &AbiValue,
        rng: &mut RandProvider,
        pool: &ValueSet,
        cfg: &MutationConfig,
    ) -> FuzzResult<AbiValue> {
        Ok(match (ty, value) {
            (AbiType::Address, AbiValue::Address(_)) => {
                if rng.coinflip(cfg.mutate_address_probability) {
                    self.generate(ty, rng, pool, cfg)?
                } else {
                    value.clone()
                }
            }
            (AbiType::Bool, AbiValue::Bool(b)) => {
                if rng.coinflip(cfg.mutate_bool_probability) {
                    AbiValue::Bool(!b)
                } else {
                    value.clone()
                }
            }
            (AbiType::Int { bits }, AbiValue::Int { value: current, .. }) => AbiValue::Int {
                bits: *bits,
                value: mutate_integer(rng, pool, cfg, true, *bits as u32, *current),
            },
            (AbiType::Uint { bits }, AbiValue::Uint { value: current, .. }) => AbiValue::Uint {
                bits: *bits,
                value: mutate_integer(rng, pool, cfg, false, *bits as u32, *current),
            },
            (AbiType::Bytes, AbiValue::Bytes(bytes)) => {
                if !rng.coinflip(cfg.mutate_bytes_probability) {
                    value.clone()
                } else if rng.coinflip(cfg.mutate_bytes_generate_new_bias) {
                    self.generate(ty, rng, pool, cfg)?
                } else {
                    AbiValue::Bytes(mutate_dynamic_bytes(rng, cfg, bytes))
                }
            }
            (AbiType::FixedBytes { .. }, AbiValue::FixedBytes(bytes)) => {
                if rng.coinflip(cfg.mutate_fixed_bytes_probability) {
                    AbiValue::FixedBytes(mutate_fixed_bytes(rng, cfg, bytes))
                } else {
                    value.clone()
                }
            }
            (AbiType::String, AbiValue::String(bytes)) => {
                if !rng.coinflip(cfg.mutate_string_probability) {
                    value.clone()
                } else if rng.coinflip(cfg.mutate_string_generate_new_bias) {
                    self.generate(ty, rng, pool, cfg)?
                } else {
                    AbiValue::String(mutate_dynamic_bytes(rng, cfg, bytes))
                }
            }
            (AbiType::FixedArray { elem, .. }, AbiValue::Array(items)) => {
                let mut items = items.clone();
                if rng.coinflip(cfg.mutate_array_structure_probability) && !items.is_empty() {
                    let idx = rng.below(items.len() as u64) as usize;
                    items[idx] = self.generate(elem, rng, pool, cfg)?;
                }
                for item in items.iter_mut() {
                    *item = self.mutate(elem, item, rng, pool, cfg)?;
                }
                AbiValue::Array(items)
            }
            (AbiType::Array { elem }, AbiValue::Array(items)) => {
                let mut items = items.clone();
                if rng.coinflip(cfg.mutate_array_structure_probability) {
                    match rng.below(3) {
                        0 => {
                            let fresh = self.generate(elem, rng, pool, cfg)?;
                            let idx = rng.below(items.len() as u64 + 1) as usize;
                            items.insert(idx.min(items.len()), fresh);
                        }
                        1 if !items.is_empty() => {
                            let idx = rng.below(items.len() as u64) as usize;
                            items.remove(idx);
                        }
                        2 if items.len() >= 2 => {
                            let i = rng.below(items.len() as u64) as usize;
                            let j = rng.below(items.len() as u64) as usize;
                            items.swap(i, j);
                        }
                        _ => {}
                    }
                }
                for item in items.iter_mut() {
                    *item = self.mutate(elem, item, rng, pool, cfg)?;
                }
                AbiValue::Array(items)
            }
            (AbiType::Tuple { fields }, AbiValue::Tuple(current)) => {
                let mut out = Vec::with_capacity(fields.len());
                for ((name, field_ty), (_, field_val)) in fields.iter().zip(current.iter()) {
                    out.push((name.clone(), self.mutate(field_ty, field_val, rng, pool, cfg)?));
                }
                AbiValue::Tuple(out)
            }
            _ => {
                return Err(FuzzError::abi(
                    "mutate called with a value that does not match its declared type",
                ))
            }
        })
    }
}

fn mutate_integer(
    rng: &mut RandProvider,
    pool: &ValueSet,
    cfg: &MutationConfig,
    signed: bool,
    bits: u32,
    current: Bits256,
) -> Bits256 {
    if !rng.coinflip(cfg.mutate_integer_probability) {
        return current;
    }
    if rng.coinflip(cfg.mutate_integer_generate_new_bias) {
        return generate_integer(rng, pool, cfg, signed, bits);
    }
    let rounds = rng.between(cfg.min_mutation_rounds as u64, cfg.max_mutation_rounds as u64);
    let mut value = current;
    for _ in 0..rounds {
        let operand = pick_integer_operand(rng, pool, signed, bits);
        value = match rng.below(5) {
            0 => value.wrapping_add(operand),
            1 => value.wrapping_sub(operand),
            2 => value.wrapping_mul(operand),
            3 => {
                let divisor = if operand.is_zero() {
                    Bits256::from_u64(1)
                } else {
                    operand
                };
                if signed {
                    value.signed_div_rem(divisor).0
                } else {
                    value.div_rem_unsigned(divisor).0
                }
            }
            _ => {
                let divisor = if operand.is_zero() { value } else { operand };
                if divisor.is_zero() {
                    value
                } else if signed {
                    value.signed_div_rem(divisor).1
                } else {
                    value.div_rem_unsigned(divisor).1
                }
            }
        };
        value = constrain(value, signed, bits);
    }
    value
}

fn mutate_dynamic_bytes(rng: &mut RandProvider, cfg: &MutationConfig, bytes: &[u8]) -> Vec<u8> {
    let rounds = rng.between(cfg.min_mutation_rounds as u64, cfg.max_mutation_rounds as u64);
    let mut out = bytes.to_vec();
    for _ in 0..rounds {
        let op = if out.is_empty() { 2 } else { rng.below(4) };
        match op {
            0 => {
                let idx = rng.below(out.len() as u64) as usize;
                out[idx] = random_printable_byte(rng);
            }
            1 => {
                let idx = rng.below(out.len() as u64) as usize;
                let bit = 1u8 << rng.below(8);
                out[idx] ^= bit;
            }
            2 => {
                let idx = rng.below(out.len() as u64 + 1) as usize;
                out.insert(idx.min(out.len()), random_printable_byte(rng));
            }
            _ => {
                let idx = rng.below(out.len() as u64) as usize;
                out.remove(idx);
            }
        }
    }
    out
}

fn mutate_fixed_bytes(rng: &mut RandProvider, cfg: &MutationConfig, bytes: &[u8]) -> Vec<u8> {
    let rounds = rng.between(cfg.min_mutation_rounds as u64, cfg.max_mutation_rounds as u64);
    let mut out = bytes.to_vec();
    if out.is_empty() {
        return out;
    }
    for _ in 0..rounds {
        let idx = rng.below(out.len() as u64) as usize;
        if rng.coinflip(0.5) {
            out[idx] = random_printable_byte(rng);
        } else {
            out[idx] ^= 1u8 << rng.below(8);
        }
    }
    out
}

/// Monotonically decreasing mutator used by the shrinker (spec §4.2, §4.6,
/// §8 property 5).
pub struct ShrinkingMutator;

impl Generator for ShrinkingMutator {
    fn generate(
        &self,
        ty: &AbiType,
        rng: &mut RandProvider,
        pool: &ValueSet,
        cfg: &MutationConfig,
    ) -> FuzzResult<AbiValue> {
        RandomGenerator.generate(ty, rng, pool, cfg)
    }
}

impl Mutator for ShrinkingMutator {
    fn mutate(
        &self,
        ty: &AbiType,
        value: &AbiValue,
        rng: &mut RandProvider,
        pool: &ValueSet,
        cfg: &MutationConfig,
    ) -> FuzzResult<AbiValue> {
        Ok(match (ty, value) {
            (AbiType::Bool, AbiValue::Bool(_)) => value.clone(),
            (AbiType::Address, AbiValue::Address(_)) => value.clone(),
            (AbiType::Int { bits }, AbiValue::Int { value: current, .. }) => AbiValue::Int {
                bits: *bits,
                value: shrink_integer(pool, true, *bits as u32, *current),
            },
            (AbiType::Uint { bits }, AbiValue::Uint { value: current, .. }) => AbiValue::Uint {
                bits: *bits,
                value: shrink_integer(pool, false, *bits as u32, *current),
            },
            (AbiType::Bytes, AbiValue::Bytes(bytes)) => AbiValue::Bytes(shrink_bytes(rng, bytes, true)),
            (AbiType::String, AbiValue::String(bytes)) => {
                AbiValue::String(shrink_bytes(rng, bytes, true))
            }
            (AbiType::FixedBytes { .. }, AbiValue::FixedBytes(bytes)) => {
                AbiValue::FixedBytes(shrink_bytes(rng, bytes, false))
            }
            (AbiType::FixedArray { elem, .. }, AbiValue::Array(items))
            | (AbiType::Array { elem }, AbiValue::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.mutate(elem, item, rng, pool, cfg)?);
                }
                AbiValue::Array(out)
            }
            (AbiType::Tuple { fields }, AbiValue::Tuple(current)) => {
                let mut out = Vec::with_capacity(fields.len());
                for ((name, field_ty), (_, field_val)) in fields.iter().zip(current.iter()) {
                    out.push((name.clone(), self.mutate(field_ty, field_val, rng, pool, cfg)?));
                }
                AbiValue::Tuple(out)
            }
            _ => {
                return Err(FuzzError::abi(
                    "shrink called with a value that does not match its declared type",
                ))
            }
        })
    }
}

fn shrink_integer(pool: &ValueSet, signed: bool, bits: u32, current: Bits256) -> Bits256 {
    if current.is_zero() {
        return current;
    }
    let is_negative = signed && current.bit(bits.saturating_sub(1).min(255));
    let halved = if signed {
        current.signed_div_rem(Bits256::from_u64(2)).0
    } else {
        current.div_rem_unsigned(Bits256::from_u64(2)).0
    };
    let mut best = constrain(halved, signed, bits);
    // Also try stepping toward zero by one pool value, keep whichever is
    // closer to zero without overshooting past it.
    for pool_int in pool.iter_ints() {
        let operand = constrain(Bits256::from_pool_int(*pool_int), signed, bits);
        let candidate = if is_negative {
            constrain(current.wrapping_add(operand.to_magnitude_abs(signed)), signed, bits)
        } else {
            constrain(current.wrapping_sub(operand.to_magnitude_abs(signed)), signed, bits)
        };
        if magnitude_of(candidate, signed) < magnitude_of(best, signed)
            && !crosses_zero(current, candidate, signed)
        {
            best = candidate;
        }
    }
    best
}

impl Bits256 {
    fn to_magnitude_abs(self, signed: bool) -> Self {
        if signed && self.bit(255) {
            self.negate_wrap()
        } else {
            self
        }
    }
}

fn magnitude_of(v: Bits256, signed: bool) -> Bits256 {
    v.to_magnitude_abs(signed)
}

fn crosses_zero(original: Bits256, candidate: Bits256, signed: bool) -> bool {
    if !signed {
        return false;
    }
    let orig_neg = original.bit(255);
    let cand_neg = candidate.bit(255);
    orig_neg != cand_neg && !candidate.is_zero()
}

fn shrink_bytes(rng: &mut RandProvider, bytes: &[u8], can_remove: bool) -> Vec<u8> {
    if bytes.is_empty() {
        return bytes.to_vec();
    }
    let idx = rng.below(bytes.len() as u64) as usize;
    if can_remove && rng.coinflip(0.5) {
        let mut out = bytes.to_vec();
        out.remove(idx);
        out
    } else {
        let mut out = bytes.to_vec();
        out[idx] = 0;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MutationConfig;

    fn rng() -> RandProvider {
        RandProvider::new(42)
    }

    #[test]
    fn constrain_is_identity_within_range() {
        let v = Bits256::from_u64(100);
        assert_eq!(constrain(v, false, 8), v);
        assert_eq!(constrain(v, true, 16), v);
    }

    #[test]
    fn constrain_wraps_every_bit_width() {
        for bits in (8..=256u32).step_by(8) {
            let min_u = type_min(false, bits);
            let max_u = type_max(false, bits);
            assert!(min_u.cmp_unsigned(&max_u) != Ordering::Greater);
            let over = max_u.wrapping_add(Bits256::from_u64(1));
            let wrapped = constrain(over, false, bits);
            assert_eq!(wrapped, min_u);

            if bits > 1 {
                let min_s = type_min(true, bits);
                let max_s = type_max(true, bits);
                let over_s = max_s.wrapping_add(Bits256::from_u64(1));
                assert_eq!(constrain(over_s, true, bits), min_s);
            }
        }
    }

    #[test]
    fn decimal_round_trip_signed_and_unsigned() {
        let neg = Bits256::from_u64(12345).negate_wrap();
        let s = neg.to_decimal_string(true);
        assert_eq!(s, "-12345");
        let parsed = Bits256::parse_decimal(&s, true, 256).unwrap();
        assert_eq!(parsed, neg);

        let pos = Bits256::from_u64(999);
        assert_eq!(pos.to_decimal_string(false), "999");
    }

    #[test]
    fn int_value_json_round_trips() {
        for bits in [8u16, 16, 64, 128, 256] {
            let ty = AbiType::Uint { bits };
            let mut rand = rng();
            let pool = ValueSet::new();
            let cfg = MutationConfig::default();
            for _ in 0..5 {
                let value = RandomGenerator.generate(&ty, &mut rand, &pool, &cfg).unwrap();
                let encoded = encode_value(&value);
                let decoded = decode_value(&ty, &encoded).unwrap();
                assert_eq!(encode_value(&decoded), encoded);
            }
        }
    }

    #[test]
    fn string_round_trips_for_listed_edge_cases() {
        let cases = [
            "\u{0}",
            "\u{0}hello",
            "hello\u{0}",
            "hello\u{0}world",
            "\u{0}\u{0}\u{0}",
            "a\u{0}b\u{0}c",
            "hello world",
            "",
            "hello\u{1}\u{2}world",
            "hello\nworld\ttab",
        ];
        for case in cases {
            let value = AbiValue::String(case.as_bytes().to_vec());
            let encoded = encode_value(&value);
            let decoded = decode_value(&AbiType::String, &encoded).unwrap();
            match decoded {
                AbiValue::String(bytes) => assert_eq!(bytes, case.as_bytes()),
                _ => panic!("expected string"),
            }
        }
    }

    #[test]
    fn bytes_and_address_round_trip() {
        let value = AbiValue::Bytes(vec![0xde, 0xad, 0xbe, 0xef]);
        let encoded = encode_value(&value);
        assert_eq!(encoded, json!("0xdeadbeef"));
        assert_eq!(decode_value(&AbiType::Bytes, &encoded).unwrap(), value);

        let addr = AbiValue::Address([0xabu8; 20]);
        let encoded = encode_value(&addr);
        assert_eq!(decode_value(&AbiType::Address, &encoded).unwrap(), addr);
    }

    #[test]
    fn tuple_and_array_round_trip() {
        let ty = AbiType::Tuple {
            fields: vec![
                ("a".to_string(), AbiType::Uint { bits: 256 }),
                ("b".to_string(), AbiType::Array { elem: Box::new(AbiType::Bool) }),
            ],
        };
        let value = AbiValue::Tuple(vec![
            ("a".to_string(), AbiValue::Uint { bits: 256, value: Bits256::from_u64(7) }),
            (
                "b".to_string(),
                AbiValue::Array(vec![AbiValue::Bool(true), AbiValue::Bool(false)]),
            ),
        ]);
        let encoded = encode_value(&value);
        let decoded = decode_value(&ty, &encoded).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn shrinking_mutator_never_increases_magnitude() {
        let ty = AbiType::Int { bits: 32 };
        let pool = ValueSet::new();
        let mut rand = rng();
        let cfg = MutationConfig::default();
        let start = AbiValue::Int {
            bits: 32,
            value: Bits256::from_u64(1000),
        };
        let shrunk = ShrinkingMutator.mutate(&ty, &start, &mut rand, &pool, &cfg).unwrap();
        if let (AbiValue::Int { value: a, .. }, AbiValue::Int { value: b, .. }) = (&start, &shrunk) {
            assert!(b.cmp_unsigned(a) != Ordering::Greater);
        }
    }

    #[test]
    fn shrinking_mutator_leaves_booleans_unchanged() {
        let pool = ValueSet::new();
        let mut rand = rng();
        let cfg = MutationConfig::default();
        let v = AbiValue::Bool(true);
        let out = ShrinkingMutator.mutate(&AbiType::Bool, &v, &mut rand, &pool, &cfg).unwrap();
        assert_eq!(out, v);
    }

    #[test]
    fn encode_params_matches_known_erc20_transfer_vector() {
        // transfer(address,uint256) with a recognizable address and amount.
        let types = vec![AbiType::Address, AbiType::Uint { bits: 256 }];
        let mut addr = [0u8; 20];
        addr[19] = 0x42;
        let values = vec![
            AbiValue::Address(addr),
            AbiValue::Uint { bits: 256, value: Bits256::from_u64(1_000_000) },
        ];
        let encoded = encode_params(&types, &values).unwrap();
        assert_eq!(encoded.len(), 64);
        assert_eq!(encoded[..32], word_from_bytes_left(&addr));
        assert_eq!(encoded[32..], Bits256::from_u64(1_000_000).to_be_bytes());
    }

    #[test]
    fn encode_call_prefixes_selector() {
        let selector = [0xa9, 0x05, 0x9c, 0xbb];
        let encoded = encode_call(selector, &[AbiType::Bool], &[AbiValue::Bool(true)]).unwrap();
        assert_eq!(&encoded[..4], &selector);
        assert_eq!(encoded.len(), 4 + 32);
    }

    #[test]
    fn encode_params_places_dynamic_bytes_in_tail_with_offset() {
        let types = vec![AbiType::Uint { bits: 256 }, AbiType::Bytes];
        let values = vec![
            AbiValue::Uint { bits: 256, value: Bits256::from_u64(7) },
            AbiValue::Bytes(vec![0xde, 0xad, 0xbe, 0xef]),
        ];
        let encoded = encode_params(&types, &values).unwrap();
        // head: word(7) ++ word(offset=64)
        assert_eq!(&encoded[0..32], &Bits256::from_u64(7).to_be_bytes());
        assert_eq!(&encoded[32..64], &word_from_uint(64));
        // tail: word(len=4) ++ padded bytes
        assert_eq!(&encoded[64..96], &word_from_uint(4));
        assert_eq!(&encoded[96..100], &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(encoded.len(), 64 + 32 + 32);
    }

    #[test]
    fn encode_params_handles_dynamic_array_of_uints() {
        let elem = AbiType::Uint { bits: 256 };
        let types = vec![AbiType::Array { elem: Box::new(elem.clone()) }];
        let values = vec![AbiValue::Array(vec![
            AbiValue::Uint { bits: 256, value: Bits256::from_u64(1) },
            AbiValue::Uint { bits: 256, value: Bits256::from_u64(2) },
        ])];
        let encoded = encode_params(&types, &values).unwrap();
        // one dynamic param: head is a single offset word pointing at 32.
        assert_eq!(&encoded[0..32], &word_from_uint(32));
        // tail: length(2) ++ word(1) ++ word(2)
        assert_eq!(&encoded[32..64], &word_from_uint(2));
        assert_eq!(&encoded[64..96], &Bits256::from_u64(1).to_be_bytes());
        assert_eq!(&encoded[96..128], &Bits256::from_u64(2).to_be_bytes());
    }

    #[test]
    fn decode_return_bool_and_int256_round_trip_via_static_encode() {
        let word = encode_static(&AbiType::Bool, &AbiValue::Bool(true)).unwrap();
        assert!(decode_return_bool(&word).unwrap());

        let value = Bits256::from_u64(42).negate_wrap();
        let word = encode_static(&AbiType::Int { bits: 256 }, &AbiValue::Int { bits: 256, value }).unwrap();
        assert_eq!(decode_return_int256(&word).unwrap(), value);
    }

    #[test]
    fn cmp_signed_orders_negative_below_positive() {
        let neg = Bits256::from_u64(5).negate_wrap();
        let pos = Bits256::from_u64(5);
        assert_eq!(neg.cmp_signed(&pos), Ordering::Less);
        assert_eq!(type_min(true, 256).cmp_signed(&type_max(true, 256)), Ordering::Less);
    }

    #[test]
    fn validate_rejects_bad_bit_length() {
        assert!(AbiType::Uint { bits: 7 }.validate().is_err());
        assert!(AbiType::Int { bits: 264 }.validate().is_err());
        assert!(AbiType::FixedBytes { len: 0 }.validate().is_err());
        assert!(AbiType::Uint { bits: 256 }.validate().is_ok());
    }
}
