//! Error types for the authenticity ledger.

use kd_ledger_chain::{ChainInvalid, LinkageError, MiningError};
use kd_ledger_core::CoreError;
use thiserror::Error;

/// Errors that can occur during ledger operations.
///
/// An empty queue and an unknown content hash are outcomes, not errors; see
/// `MineOutcome::NoWork` and `Authentication::NotFound`.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Encoding, decoding or signing error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// A block did not link onto the tail.
    #[error("linkage error: {0}")]
    Linkage(#[from] LinkageError),

    /// The chain failed validation.
    #[error("{0}")]
    ChainInvalid(#[from] ChainInvalid),

    /// Proof-of-work stopped without a block.
    #[error("mining error: {0}")]
    Mining(#[from] MiningError),

    /// The background mining task panicked or was aborted.
    #[error("mining task failed: {0}")]
    TaskFailed(String),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, AuthError>;
