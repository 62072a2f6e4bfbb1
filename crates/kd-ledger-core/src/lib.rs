//! # KD Ledger Core
//!
//! Pure primitives for the KD ledger: digests, blocks, verification records,
//! canonical encoding and the signature service.
//!
//! This crate contains no I/O, no locking and no async. It is pure computation
//! over the data structures the ledger is built from.
//!
//! ## Key Types
//!
//! - [`Digest`] - SHA-256 output, used for content hashes and block hashes
//! - [`Block`] - The sealed unit of the ledger
//! - [`VerificationRecord`] - An authenticity claim awaiting or embedded in a block
//! - [`BatchPayload`] - The canonical batch of records a block carries
//! - [`SignatureService`] - Key-pair owner providing sign/verify
//!
//! ## Canonicalization
//!
//! Block headers and batch payloads are encoded as deterministic CBOR. See the
//! [`canonical`] module.

pub mod block;
pub mod canonical;
pub mod crypto;
pub mod error;
pub mod record;
pub mod signing;
pub mod types;

pub use block::{Block, BLOCK_VERSION, GENESIS_PAYLOAD};
pub use canonical::{canonical_block_bytes, canonical_header_bytes, BlockHasher, BLOCK_DOMAIN};
pub use crypto::{Keypair, PublicKey, Signature};
pub use error::{CoreError, Result};
pub use record::{BatchPayload, Metadata, MetadataValue, VerificationRecord, BATCH_VERSION};
pub use signing::{SignatureService, SIGN_DOMAIN};
pub use types::Digest;

/// Current time in Unix milliseconds.
///
/// Falls back to 0 if the system clock reads earlier than the Unix epoch.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
