//! Error types for the ledger and proof-of-work.

use thiserror::Error;

use kd_ledger_core::{CoreError, Digest};

/// Why a block was refused by [`crate::Ledger::append`] or replay.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkageError {
    #[error("index mismatch: expected {expected}, got {got}")]
    IndexMismatch { expected: u64, got: u64 },

    #[error("previous hash mismatch at index {index}: expected {expected}, got {got}")]
    PreviousHashMismatch {
        index: u64,
        expected: Digest,
        got: Digest,
    },

    #[error("stored hash does not match contents at index {index}")]
    HashMismatch { index: u64 },

    #[error("first block is not the canonical genesis")]
    GenesisMismatch,

    #[error("block decoding failed: {0}")]
    Decode(#[from] CoreError),
}

/// The kind of corruption found by validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainFault {
    #[error("stored hash does not match contents")]
    HashMismatch,

    #[error("previous_hash does not match predecessor")]
    BrokenLink,

    #[error("index gap: expected {expected}, got {got}")]
    IndexGap { expected: u64, got: u64 },

    #[error("genesis block does not match")]
    GenesisMismatch,

    #[error("payload unreadable: {0}")]
    UnreadablePayload(String),
}

/// The chain failed validation at `index`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("chain invalid at block {index}: {fault}")]
pub struct ChainInvalid {
    pub index: u64,
    pub fault: ChainFault,
}

/// Why a proof-of-work search stopped without a block.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MiningError {
    #[error("mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },

    #[error("mining gave up after {attempts} attempts")]
    Exhausted { attempts: u64 },

    #[error("difficulty {difficulty} exceeds maximum of {max}")]
    DifficultyOutOfRange { difficulty: u32, max: u32 },
}

/// Result type for ledger mutations.
pub type Result<T, E = LinkageError> = std::result::Result<T, E>;
