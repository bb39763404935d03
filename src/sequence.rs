//! Ordered, restartable call sequences and their portable JSON form (spec
//! §3 "CallSequenceElement"/"CallSequence", §6 corpus on-disk layout).

use crate::abi::{decode_value, encode_value, AbiType, AbiValue};
use crate::chain::TxRequest;
use crate::contracts::ContractCatalog;
use crate::error::{FuzzError, FuzzResult};
use crate::types::{EVMAddress, EVMU256};
use std::collections::HashMap;

/// ABI-decoded call arguments alongside the method signature used to
/// produce them, carried next to the raw calldata so persisted sequences
/// remain human-legible (spec §6 `dataAbiValues`).
#[derive(Debug, Clone)]
pub struct DataAbiValues {
    pub method_signature: String,
    pub input_values: Vec<AbiValue>,
}

/// One EVM message plus the two additive block-advance deltas applied
/// before it executes (spec §3 "CallSequenceElement").
#[derive(Debug, Clone)]
pub struct CallSequenceElement {
    pub from: EVMAddress,
    /// `None` when `to` resolves to a not-yet-deployed pseudo-address; a
    /// fully loaded sequence always has this set.
    pub to: Option<EVMAddress>,
    /// Present only for unresolved pseudo-addresses (`"DeployedContract:
    /// Name"`), resolved at load time per spec §6.
    pub to_pseudo: Option<String>,
    pub nonce: u64,
    pub value: EVMU256,
    pub gas_limit: u64,
    pub gas_price: EVMU256,
    pub data: Vec<u8>,
    pub data_abi_values: Option<DataAbiValues>,
    pub block_number_delay: u64,
    pub block_timestamp_delay: u64,
}

impl CallSequenceElement {
    pub fn to_tx_request(&self) -> FuzzResult<TxRequest> {
        let to = self
            .to
            .ok_or_else(|| FuzzError::abi("call sequence element has an unresolved pseudo-address"))?;
        Ok(TxRequest {
            from: self.from,
            to: Some(to),
            value: self.value,
            gas_limit: self.gas_limit,
            gas_price: self.gas_price,
            data: self.data.clone(),
        })
    }
}

/// Ordered, restartable list of messages (spec §3 "CallSequence").
#[derive(Debug, Clone, Default)]
pub struct CallSequence {
    pub elements: Vec<CallSequenceElement>,
}

impl CallSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn push(&mut self, element: CallSequenceElement) {
        self.elements.push(element);
    }

    /// Drop the element at `idx`, used by the shrinker's element-removal
    /// pass (spec §4.6 step 1).
    pub fn without(&self, idx: usize) -> Self {
        let mut elements = self.elements.clone();
        elements.remove(idx);
        Self { elements }
    }

    /// Replace every `"DeployedContract:Name"` pseudo-address with the
    /// concrete address it resolved to during this run's predeploy step
    /// (spec §6 "resolved against the run's deployment addresses at load
    /// time"). Entries whose name is absent from `deployed` are left
    /// unresolved so a subsequent `to_tx_request` call surfaces the error.
    pub fn resolve_pseudo_addresses(&mut self, deployed: &HashMap<String, EVMAddress>) {
        for element in &mut self.elements {
            if let Some(name) = &element.to_pseudo {
                if let Some(addr) = deployed.get(name) {
                    element.to = Some(*addr);
                }
            }
        }
    }

    pub fn to_json(&self, catalog: &ContractCatalog) -> serde_json::Value {
        serde_json::Value::Array(
            self.elements
                .iter()
                .map(|e| element_to_json(e, catalog))
                .collect(),
        )
    }

    pub fn from_json(value: &serde_json::Value, catalog: &ContractCatalog) -> FuzzResult<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| FuzzError::CorpusLoadError {
                path: "<in-memory>".to_string(),
                reason: "sequence JSON root must be an array".to_string(),
            })?;
        let elements = items
            .iter()
            .map(|item| element_from_json(item, catalog))
            .collect::<FuzzResult<Vec<_>>>()?;
        Ok(Self { elements })
    }
}

fn hex_encode_0x(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn hex_decode_0x(s: &str) -> FuzzResult<Vec<u8>> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| FuzzError::CorpusLoadError {
        path: "<in-memory>".to_string(),
        reason: e.to_string(),
    })
}

fn element_to_json(element: &CallSequenceElement, catalog: &ContractCatalog) -> serde_json::Value {
    let to_field = match (&element.to_pseudo, &element.to) {
        (Some(pseudo), _) => format!("DeployedContract:{pseudo}"),
        (None, Some(addr)) => hex_encode_0x(addr.as_slice()),
        (None, None) => hex_encode_0x(&[0u8; 20]),
    };
    let mut call = serde_json::json!({
        "from": hex_encode_0x(element.from.as_slice()),
        "to": to_field,
        "nonce": element.nonce,
        "value": hex_encode_0x(&element.value.to_be_bytes::<32>()),
        "gasLimit": element.gas_limit,
        "gasPrice": hex_encode_0x(&element.gas_price.to_be_bytes::<32>()),
        "data": hex_encode_0x(&element.data),
    });
    if let Some(values) = &element.data_abi_values {
        call["dataAbiValues"] = serde_json::json!({
            "methodSignature": values.method_signature,
            "inputValues": values.input_values.iter().map(encode_value).collect::<Vec<_>>(),
        });
    }
    let _ = catalog;
    serde_json::json!({
        "call": call,
        "blockNumberDelay": element.block_number_delay,
        "blockTimestampDelay": element.block_timestamp_delay,
    })
}

fn element_from_json(value: &serde_json::Value, catalog: &ContractCatalog) -> FuzzResult<CallSequenceElement> {
    let load_err = |reason: String| FuzzError::CorpusLoadError {
        path: "<in-memory>".to_string(),
        reason,
    };
    let call = value
        .get("call")
        .ok_or_else(|| load_err("missing \"call\" field".to_string()))?;
    let from_str = call
        .get("from")
        .and_then(|v| v.as_str())
        .ok_or_else(|| load_err("missing \"call.from\"".to_string()))?;
    let from_bytes = hex_decode_0x(from_str)?;
    if from_bytes.len() != 20 {
        return Err(load_err("\"call.from\" must decode to 20 bytes".to_string()));
    }
    let mut from = [0u8; 20];
    from.copy_from_slice(&from_bytes);

    let to_str = call
        .get("to")
        .and_then(|v| v.as_str())
        .ok_or_else(|| load_err("missing \"call.to\"".to_string()))?;
    let (to, to_pseudo) = if let Some(name) = to_str.strip_prefix("DeployedContract:") {
        match catalog.by_name(name) {
            Some(_) => (None, Some(name.to_string())),
            None => (None, Some(name.to_string())),
        }
    } else {
        let bytes = hex_decode_0x(to_str)?;
        if bytes.len() != 20 {
            return Err(load_err("\"call.to\" must decode to 20 bytes".to_string()));
        }
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&bytes);
        (Some(EVMAddress::from(addr)), None)
    };

    let nonce = call
        .get("nonce")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| load_err("missing \"call.nonce\"".to_string()))?;
    let value = parse_u256_hex(call.get("value"), &load_err)?;
    let gas_limit = call
        .get("gasLimit")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| load_err("missing \"call.gasLimit\"".to_string()))?;
    let gas_price = parse_u256_hex(call.get("gasPrice"), &load_err)?;
    let data = call
        .get("data")
        .and_then(|v| v.as_str())
        .ok_or_else(|| load_err("missing \"call.data\"".to_string()))
        .and_then(hex_decode_0x)?;

    let data_abi_values = match call.get("dataAbiValues") {
        Some(raw) => Some(parse_data_abi_values(raw, catalog, &load_err)?),
        None => None,
    };

    let block_number_delay = value_as_u64(value_field(value, "blockNumberDelay")?, &load_err)?;
    let block_timestamp_delay = value_as_u64(value_field(value, "blockTimestampDelay")?, &load_err)?;

    Ok(CallSequenceElement {
        from: EVMAddress::from(from),
        to,
        to_pseudo,
        nonce,
        value,
        gas_limit,
        gas_price,
        data,
        data_abi_values,
        block_number_delay,
        block_timestamp_delay,
    })
}

fn value_field<'a>(root: &'a serde_json::Value, name: &str) -> FuzzResult<&'a serde_json::Value> {
    root.get(name).ok_or_else(|| FuzzError::CorpusLoadError {
        path: "<in-memory>".to_string(),
        reason: format!("missing \"{name}\""),
    })
}

fn value_as_u64(v: &serde_json::Value, load_err: &impl Fn(String) -> FuzzError) -> FuzzResult<u64> {
    v.as_u64().ok_or_else(|| load_err("expected a non-negative integer".to_string()))
}

fn parse_u256_hex(
    v: Option<&serde_json::Value>,
    load_err: &impl Fn(String) -> FuzzError,
) -> FuzzResult<EVMU256> {
    let s = v
        .and_then(|v| v.as_str())
        .ok_or_else(|| load_err("expected a 0x-hex string".to_string()))?;
    let digits = s.strip_prefix("0x").unwrap_or(s);
    EVMU256::from_str_radix(digits, 16).map_err(|e| load_err(e.to_string()))
}

fn parse_data_abi_values(
    raw: &serde_json::Value,
    catalog: &ContractCatalog,
    load_err: &impl Fn(String) -> FuzzError,
) -> FuzzResult<DataAbiValues> {
    let method_signature = raw
        .get("methodSignature")
        .and_then(|v| v.as_str())
        .ok_or_else(|| load_err("missing \"dataAbiValues.methodSignature\"".to_string()))?
        .to_string();
    let input_values_json = raw
        .get("inputValues")
        .and_then(|v| v.as_array())
        .ok_or_else(|| load_err("missing \"dataAbiValues.inputValues\"".to_string()))?;
    // `methodSignature` alone carries every argument's canonical type name,
    // so any catalog method with a matching signature gives the types
    // needed to decode `inputValues` properly (spec §6 round-trip
    // stability). A signature absent from the catalog (e.g. a contract
    // since removed) falls back to an empty argument list rather than
    // failing the whole sequence load — the raw `data` field still carries
    // the real calldata, so execution is unaffected.
    let input_values = match catalog.method_by_signature(&method_signature) {
        Some(method) => rehydrate_input_values(input_values_json, &method.inputs)?,
        None => Vec::new(),
    };
    Ok(DataAbiValues {
        method_signature,
        input_values,
    })
}

/// Decode `dataAbiValues.inputValues` against a known method's input
/// types, replacing the placeholder values `parse_data_abi_values` could
/// not resolve without ABI context.
pub fn rehydrate_input_values(
    raw_json: &[serde_json::Value],
    input_types: &[(String, AbiType)],
) -> FuzzResult<Vec<AbiValue>> {
    if raw_json.len() != input_types.len() {
        return Err(FuzzError::abi(format!(
            "expected {} input values, got {}",
            input_types.len(),
            raw_json.len()
        )));
    }
    raw_json
        .iter()
        .zip(input_types.iter())
        .map(|(json, (_, ty))| decode_value(ty, json))
        .collect()
}
