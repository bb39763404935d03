//! Error kinds surfaced to callers of this crate (spec §7).
//!
//! Inside a worker loop, ABI and chain errors for a single call abort that
//! sequence only; the worker continues. Shrinking errors abort the shrink
//! but preserve the original failing sequence. Fuzzer-wide errors
//! (compilation, config) surface through the coordinator's return value.

use thiserror::Error;

pub type FuzzResult<T> = Result<T, FuzzError>;

#[derive(Debug, Error)]
pub enum FuzzError {
    /// Invalid probability, bit-length not a multiple of 8, unknown
    /// panic-code name, etc.
    #[error("invalid configuration: {0}")]
    ConfigError(String),

    /// Target contracts missing or their ABI is malformed.
    #[error("compilation output unavailable: {0}")]
    CompilationUnavailable(String),

    /// Value/type mismatch during generation, mutation, or serialization.
    #[error("ABI encoding error: {0}")]
    AbiEncodingError(String),

    /// Underlying EVM reported a non-revert fatal error.
    #[error("chain execution error: {0}")]
    ChainExecutionError(String),

    /// Verification predicate never holds even on the original sequence,
    /// which indicates non-determinism somewhere in the execution path.
    #[error("shrink failed: verification predicate never held, even on the original sequence ({0})")]
    ShrinkFailed(String),

    /// A persisted sequence could not be decoded. Logged and skipped by the
    /// corpus loader, never fatal to the fuzzer as a whole.
    #[error("corpus load error for {path}: {reason}")]
    CorpusLoadError { path: String, reason: String },
}

impl FuzzError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        FuzzError::ConfigError(msg.into())
    }

    pub fn abi<S: Into<String>>(msg: S) -> Self {
        FuzzError::AbiEncodingError(msg.into())
    }
}
