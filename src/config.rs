//! Fuzzer-wide and mutation configuration (spec §4.2, §4.5, §4.7, §7).
//!
//! Loading these structs from a file/CLI is an external collaborator's job
//! (spec §1); this module only defines the shapes and validates them.

use crate::error::{FuzzError, FuzzResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Every field is an independently tunable probability in `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationConfig {
    pub generate_random_address_bias: f64,
    pub generate_random_integer_bias: f64,
    pub generate_random_string_bias: f64,
    pub generate_random_bytes_bias: f64,

    pub mutate_address_probability: f64,
    pub mutate_bool_probability: f64,
    pub mutate_bytes_probability: f64,
    pub mutate_fixed_bytes_probability: f64,
    pub mutate_string_probability: f64,
    pub mutate_integer_probability: f64,
    pub mutate_array_structure_probability: f64,

    pub mutate_bytes_generate_new_bias: f64,
    pub mutate_string_generate_new_bias: f64,
    pub mutate_integer_generate_new_bias: f64,

    pub min_mutation_rounds: u32,
    pub max_mutation_rounds: u32,

    /// `[min, max]` length drawn for freshly generated dynamic
    /// arrays/bytes/strings.
    pub min_dynamic_len: usize,
    pub max_dynamic_len: usize,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            generate_random_address_bias: 0.1,
            generate_random_integer_bias: 0.2,
            generate_random_string_bias: 0.2,
            generate_random_bytes_bias: 0.2,
            mutate_address_probability: 0.5,
            mutate_bool_probability: 0.5,
            mutate_bytes_probability: 0.6,
            mutate_fixed_bytes_probability: 0.6,
            mutate_string_probability: 0.6,
            mutate_integer_probability: 0.6,
            mutate_array_structure_probability: 0.3,
            mutate_bytes_generate_new_bias: 0.2,
            mutate_string_generate_new_bias: 0.2,
            mutate_integer_generate_new_bias: 0.1,
            min_mutation_rounds: 1,
            max_mutation_rounds: 3,
            min_dynamic_len: 0,
            max_dynamic_len: 256,
        }
    }
}

impl MutationConfig {
    pub fn validate(&self) -> FuzzResult<()> {
        let probs = [
            ("generate_random_address_bias", self.generate_random_address_bias),
            ("generate_random_integer_bias", self.generate_random_integer_bias),
            ("generate_random_string_bias", self.generate_random_string_bias),
            ("generate_random_bytes_bias", self.generate_random_bytes_bias),
            ("mutate_address_probability", self.mutate_address_probability),
            ("mutate_bool_probability", self.mutate_bool_probability),
            ("mutate_bytes_probability", self.mutate_bytes_probability),
            ("mutate_fixed_bytes_probability", self.mutate_fixed_bytes_probability),
            ("mutate_string_probability", self.mutate_string_probability),
            ("mutate_integer_probability", self.mutate_integer_probability),
            ("mutate_array_structure_probability", self.mutate_array_structure_probability),
            ("mutate_bytes_generate_new_bias", self.mutate_bytes_generate_new_bias),
            ("mutate_string_generate_new_bias", self.mutate_string_generate_new_bias),
            ("mutate_integer_generate_new_bias", self.mutate_integer_generate_new_bias),
        ];
        for (name, v) in probs {
            if !(0.0..=1.0).contains(&v) {
                return Err(FuzzError::config(format!(
                    "{name} must be in [0, 1], got {v}"
                )));
            }
        }
        if self.min_mutation_rounds > self.max_mutation_rounds {
            return Err(FuzzError::config(
                "min_mutation_rounds must be <= max_mutation_rounds",
            ));
        }
        if self.min_dynamic_len > self.max_dynamic_len {
            return Err(FuzzError::config(
                "min_dynamic_len must be <= max_dynamic_len",
            ));
        }
        Ok(())
    }
}

/// Solidity panic selector codes (spec GLOSSARY: "Panic code").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PanicCode {
    Generic = 0x00,
    Assertion = 0x01,
    ArithmeticOverflow = 0x11,
    DivisionByZero = 0x12,
    InvalidEnumConversion = 0x21,
    InvalidStorageEncoding = 0x22,
    EmptyArrayPop = 0x31,
    OutOfBoundsIndex = 0x32,
    OutOfMemory = 0x41,
    InvalidInternalFunction = 0x51,
}

impl PanicCode {
    pub fn from_name(name: &str) -> FuzzResult<Self> {
        Ok(match name {
            "generic" => PanicCode::Generic,
            "assertion" => PanicCode::Assertion,
            "arithmetic-overflow" => PanicCode::ArithmeticOverflow,
            "division-by-zero" => PanicCode::DivisionByZero,
            "invalid-enum-conversion" => PanicCode::InvalidEnumConversion,
            "invalid-storage-encoding" => PanicCode::InvalidStorageEncoding,
            "empty-array-pop" => PanicCode::EmptyArrayPop,
            "out-of-bounds-index" => PanicCode::OutOfBoundsIndex,
            "out-of-memory" => PanicCode::OutOfMemory,
            "invalid-internal-function" => PanicCode::InvalidInternalFunction,
            other => return Err(FuzzError::config(format!("unknown panic-code name: {other}"))),
        })
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x00 => PanicCode::Generic,
            0x01 => PanicCode::Assertion,
            0x11 => PanicCode::ArithmeticOverflow,
            0x12 => PanicCode::DivisionByZero,
            0x21 => PanicCode::InvalidEnumConversion,
            0x22 => PanicCode::InvalidStorageEncoding,
            0x31 => PanicCode::EmptyArrayPop,
            0x32 => PanicCode::OutOfBoundsIndex,
            0x41 => PanicCode::OutOfMemory,
            0x51 => PanicCode::InvalidInternalFunction,
            _ => return None,
        })
    }
}

/// Relative weights for the three sequence-growth strategies (spec §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyWeights {
    pub empty_new_sequence: f64,
    pub mutate_corpus_entry: f64,
    pub splice_corpus_entries: f64,
}

impl Default for StrategyWeights {
    fn default() -> Self {
        Self {
            empty_new_sequence: 0.1,
            mutate_corpus_entry: 0.7,
            splice_corpus_entries: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzerConfig {
    pub worker_count: usize,
    pub sequence_length_max: usize,
    pub sequences_per_worker_reset: usize,
    pub shrink_round_budget: usize,
    pub property_test_prefix: String,
    pub optimization_test_prefix: String,
    pub enabled_panic_codes: HashSet<PanicCode>,
    pub stop_on_first_failure: bool,
    pub strategy_weights: StrategyWeights,
    pub immutable_pool_bias: f64,
    pub deadline: Option<std::time::Duration>,
    pub test_limit: Option<u64>,
    pub failure_exit_code: i32,
    pub root_seed: u64,
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        let mut enabled_panic_codes = HashSet::new();
        enabled_panic_codes.insert(PanicCode::Assertion);
        enabled_panic_codes.insert(PanicCode::ArithmeticOverflow);
        enabled_panic_codes.insert(PanicCode::DivisionByZero);
        enabled_panic_codes.insert(PanicCode::OutOfBoundsIndex);
        Self {
            worker_count: num_cpus_fallback(),
            sequence_length_max: 100,
            sequences_per_worker_reset: 1000,
            shrink_round_budget: 250,
            property_test_prefix: "property_".to_string(),
            optimization_test_prefix: "optimize_".to_string(),
            enabled_panic_codes,
            stop_on_first_failure: false,
            strategy_weights: StrategyWeights::default(),
            immutable_pool_bias: 0.05,
            deadline: None,
            test_limit: None,
            failure_exit_code: 1,
            root_seed: 0,
        }
    }
}

impl FuzzerConfig {
    pub fn validate(&self) -> FuzzResult<()> {
        if self.worker_count == 0 {
            return Err(FuzzError::config("worker_count must be >= 1"));
        }
        if self.sequence_length_max == 0 {
            return Err(FuzzError::config("sequence_length_max must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.immutable_pool_bias) {
            return Err(FuzzError::config("immutable_pool_bias must be in [0, 1]"));
        }
        let w = &self.strategy_weights;
        if w.empty_new_sequence < 0.0 || w.mutate_corpus_entry < 0.0 || w.splice_corpus_entries < 0.0
        {
            return Err(FuzzError::config("strategy weights must be non-negative"));
        }
        if w.empty_new_sequence + w.mutate_corpus_entry + w.splice_corpus_entries <= 0.0 {
            return Err(FuzzError::config("at least one strategy weight must be positive"));
        }
        Ok(())
    }
}

fn num_cpus_fallback() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configs_validate() {
        MutationConfig::default().validate().unwrap();
        FuzzerConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_out_of_range_probability() {
        let mut cfg = MutationConfig::default();
        cfg.mutate_bool_probability = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_unknown_panic_code_name() {
        assert!(PanicCode::from_name("not-a-real-code").is_err());
    }

    #[test]
    fn rejects_zero_workers() {
        let mut cfg = FuzzerConfig::default();
        cfg.worker_count = 0;
        assert!(cfg.validate().is_err());
    }
}
