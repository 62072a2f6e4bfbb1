//! Error types for the KD ledger core.

use thiserror::Error;

/// Core errors that can occur while encoding, decoding or signing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("signing key unavailable")]
    KeyUnavailable,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("malformed block: {0}")]
    MalformedBlock(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("non-canonical encoding: {0}")]
    NonCanonical(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
