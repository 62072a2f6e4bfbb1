//! # KD Ledger Chain
//!
//! The append-only ledger and the proof-of-work that seals its blocks.
//!
//! ## Overview
//!
//! - [`Ledger`] - Ordered blocks from genesis to tail, with linkage checks on
//!   every append and a full-chain audit via [`Ledger::validate`]
//! - [`ProofOfWork`] - Bounded, cancellable nonce search
//!
//! ## Usage
//!
//! ```rust
//! use kd_ledger_chain::{Ledger, ProofOfWork};
//! use kd_ledger_core::{BatchPayload, Block};
//! use tokio_util::sync::CancellationToken;
//!
//! let mut ledger = Ledger::new();
//! let tail = ledger.tail();
//! let payload = BatchPayload::new("miner", 1, vec![]).to_bytes();
//! let candidate = Block::candidate(tail.index + 1, 0, payload, tail.hash);
//!
//! let block = ProofOfWork::new(1)
//!     .seal(candidate, &CancellationToken::new())
//!     .unwrap();
//! ledger.append(block).unwrap();
//! assert!(ledger.is_valid());
//! ```
//!
//! The ledger itself is not synchronized; see `kd-ledger` for the shared
//! handle used by the registry.

pub mod error;
pub mod ledger;
pub mod pow;
pub mod validation;

pub use error::{ChainFault, ChainInvalid, LinkageError, MiningError, Result};
pub use ledger::{EmbeddedRecord, Ledger};
pub use pow::{ProofOfWork, DEFAULT_CHECK_INTERVAL, MAX_DIFFICULTY};
pub use validation::{check_link, validate_chain};
