//! Core of a coverage-guided, property-based fuzzer for EVM smart contracts.
//!
//! This crate implements the four tightly-coupled subsystems described in
//! the project design: the fuzzing engine (worker pool + coordinator), the
//! ABI value generation/mutation layer, the execution tracer, and the
//! corpus/coverage model. Compilation of Solidity sources, an HTTP/WS API,
//! structured logging configuration, and CLI/project layout are treated as
//! external collaborators and are not part of this crate.

pub mod abi;
pub mod chain;
pub mod config;
pub mod contracts;
pub mod coordinator;
pub mod corpus;
pub mod coverage;
pub mod error;
pub mod event;
pub mod logger;
pub mod rand_provider;
pub mod sequence;
pub mod shrinker;
pub mod static_analysis;
pub mod testcase;
pub mod tracer;
pub mod types;
pub mod value_set;
pub mod worker;

pub use error::{FuzzError, FuzzResult};
