//! # KD Ledger
//!
//! An append-only, hash-chained authenticity ledger sealed by proof-of-work,
//! with Ed25519 signing for attestations.
//!
//! ## Overview
//!
//! - **Register**: content is hashed (SHA-256) and queued as a verification record
//! - **Mine**: the queue is sealed into one block in the background; records
//!   registered meanwhile wait for the next block
//! - **Authenticate**: look up which block embedded a content hash
//! - **Attest**: sign a statement binding a content hash to its block
//!
//! ## Usage
//!
//! ```rust
//! use kd_ledger::{Authenticator, LedgerConfig, Metadata, MineOutcome};
//!
//! # async fn example() -> kd_ledger::Result<()> {
//! let auth = Authenticator::with_config(LedgerConfig::default().with_difficulty(2));
//!
//! let registration = auth.register(b"Hello", Metadata::new());
//! let outcome = auth.mine("miner-a").await?;
//! assert!(matches!(outcome, MineOutcome::Success { block_index: 1, .. }));
//!
//! let answer = auth.authenticate(&registration.content_hash);
//! assert_eq!(answer.block_index(), Some(1));
//! assert!(auth.is_chain_valid());
//! # Ok(())
//! # }
//! ```
//!
//! ## Re-exports
//!
//! - `kd_ledger::core` - Digests, blocks, records, canonical encoding, signing
//! - `kd_ledger::chain` - The ledger and proof-of-work

pub mod authenticator;
pub mod config;
pub mod error;
pub mod events;
pub mod registry;
pub mod shared;

// Re-export component crates
pub use kd_ledger_chain as chain;
pub use kd_ledger_core as core;

// Re-export main types for convenience
pub use authenticator::{
    Attestation, Authentication, AuthenticatorBuilder, AuthenticityProof, Authenticator,
    HistoryEntry, Registration, RegistrationStatus,
};
pub use config::LedgerConfig;
pub use error::{AuthError, Result};
pub use events::{EventBus, EventSink, LedgerEvent, NoopSink};
pub use registry::{MineOutcome, MiningHandle, VerificationRegistry};
pub use shared::SharedLedger;

// Re-export commonly used core and chain types
pub use kd_ledger_chain::{ChainFault, ChainInvalid, Ledger, LinkageError, MiningError, ProofOfWork};
pub use kd_ledger_core::{
    Block, Digest, Metadata, MetadataValue, PublicKey, Signature, SignatureService,
    VerificationRecord,
};
