//! Static-analysis tool output consumed at fuzzer startup (spec §6:
//! "Consumed from static-analysis tool. A JSON object exposing:
//! `constants_used`: contract → method → list of `{type, value}` records;
//! used to seed ValueSet.").
//!
//! No such tool ships with this crate (out of scope, spec §1); this module
//! only defines the wire shape and the parsing/flattening needed to hand
//! records to [`crate::value_set::ValueSet::seed_from_static_analysis`].

use crate::error::{FuzzError, FuzzResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The four constant kinds distinguished during seeding (spec §4.1).
/// Booleans and strings are carried as their own kinds even though, once
/// seeded, a bool collapses to the integers 0/1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstantKind {
    UnsignedInteger,
    SignedInteger,
    Bool,
    String,
    Address,
}

impl ConstantKind {
    /// Classify a Solidity ABI type name (`uint256`, `int8`, `bool`,
    /// `string`, `address`, `bytes32`, ...).
    fn from_type_name(type_name: &str) -> FuzzResult<Self> {
        if type_name == "bool" {
            Ok(ConstantKind::Bool)
        } else if type_name == "string" {
            Ok(ConstantKind::String)
        } else if type_name == "address" {
            Ok(ConstantKind::Address)
        } else if type_name.starts_with("uint") {
            Ok(ConstantKind::UnsignedInteger)
        } else if type_name.starts_with("int") {
            Ok(ConstantKind::SignedInteger)
        } else {
            Err(FuzzError::config(format!(
                "static-analysis constant has unsupported type: {type_name}"
            )))
        }
    }
}

/// One `{type, value}` record, already classified.
#[derive(Debug, Clone)]
pub struct StaticAnalysisConstant {
    pub kind: ConstantKind,
    pub value: serde_json::Value,
}

/// Wire shape of a single record before classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawConstant {
    #[serde(rename = "type")]
    type_name: String,
    value: serde_json::Value,
}

/// `contract -> method -> [{type, value}]`, matching the static-analysis
/// tool's `constants_used` field verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstantsUsed {
    #[serde(flatten)]
    contracts: HashMap<String, HashMap<String, Vec<RawConstant>>>,
}

impl ConstantsUsed {
    pub fn from_json(value: &serde_json::Value) -> FuzzResult<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| FuzzError::CompilationUnavailable(format!("constants_used: {e}")))
    }

    /// Flatten every contract/method's records into one classified list,
    /// suitable for [`crate::value_set::ValueSet::seed_from_static_analysis`].
    /// Records with an unrecognized type are dropped, not fatal.
    pub fn flatten(&self) -> Vec<StaticAnalysisConstant> {
        let mut out = Vec::new();
        for methods in self.contracts.values() {
            for records in methods.values() {
                for record in records {
                    if let Ok(kind) = ConstantKind::from_type_name(&record.type_name) {
                        out.push(StaticAnalysisConstant {
                            kind,
                            value: record.value.clone(),
                        });
                    }
                }
            }
        }
        out
    }

    pub fn contract_names(&self) -> impl Iterator<Item = &String> {
        self.contracts.keys()
    }

    pub fn methods_for(&self, contract: &str) -> impl Iterator<Item = &String> {
        self.contracts
            .get(contract)
            .into_iter()
            .flat_map(|m| m.keys())
    }
}
