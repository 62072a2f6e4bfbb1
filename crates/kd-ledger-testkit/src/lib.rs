//! # KD Ledger Testkit
//!
//! Testing utilities for the KD ledger.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known blocks and batches with their expected encodings and hashes
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Helpers for building sealed ledgers and seeded authenticators
//!
//! ## Golden Vectors
//!
//! ```rust
//! use kd_ledger_core::Block;
//! use kd_ledger_testkit::vectors::GENESIS_HASH;
//!
//! assert_eq!(Block::genesis().hash.to_hex(), GENESIS_HASH);
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use kd_ledger_testkit::generators::batch;
//!
//! proptest! {
//!     #[test]
//!     fn batch_encoding_is_deterministic(b in batch(4)) {
//!         prop_assert_eq!(b.to_bytes(), b.clone().to_bytes());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use kd_ledger_testkit::fixtures::TestLedger;
//!
//! let mut fixture = TestLedger::new();
//! fixture.push_contents(&[b"Hello"]);
//! assert!(fixture.ledger.is_valid());
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{multi_party_authenticators, test_authenticator, TestLedger};
pub use vectors::{batch_from_vector, candidate_from_vector, hello_block_vector, SealedBlockVector};
