//! Block: the sealed unit of the ledger.
//!
//! A block binds a batch payload to its predecessor by hash. Blocks are never
//! edited once appended; the ledger only ever grows.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::canonical::{canonical_block_bytes, canonical_header_bytes, decode_block, BLOCK_DOMAIN};
use crate::error::Result;
use crate::record::BatchPayload;
use crate::types::Digest;

/// The current block schema version.
pub const BLOCK_VERSION: u8 = 0;

/// Payload carried by the genesis block.
pub const GENESIS_PAYLOAD: &[u8] = b"kd-ledger/genesis/v1";

/// A block in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Schema version (currently 0).
    pub version: u8,

    /// Position in the chain. Genesis is 0.
    pub index: u64,

    /// Creation time (Unix milliseconds).
    pub timestamp: i64,

    /// Canonical batch encoding. Opaque to the ledger.
    pub payload: Bytes,

    /// Hash of the preceding block (all zeros for genesis).
    pub previous_hash: Digest,

    /// Proof-of-work counter.
    pub nonce: u64,

    /// Hash over every other field.
    pub hash: Digest,
}

impl Block {
    /// The genesis block.
    ///
    /// All fields are fixed, so every ledger starts from the same hash. Genesis
    /// carries no proof-of-work.
    pub fn genesis() -> Self {
        let mut block = Self::candidate(0, 0, Bytes::from_static(GENESIS_PAYLOAD), Digest::ZERO);
        block.hash = block.compute_hash();
        block
    }

    /// An unsealed block: nonce 0 and no hash yet.
    pub fn candidate(
        index: u64,
        timestamp: i64,
        payload: impl Into<Bytes>,
        previous_hash: Digest,
    ) -> Self {
        Self {
            version: BLOCK_VERSION,
            index,
            timestamp,
            payload: payload.into(),
            previous_hash,
            nonce: 0,
            hash: Digest::ZERO,
        }
    }

    /// Recompute the hash from the header fields.
    pub fn compute_hash(&self) -> Digest {
        let header = canonical_header_bytes(self);
        let mut preimage = Vec::with_capacity(BLOCK_DOMAIN.len() + header.len());
        preimage.extend_from_slice(BLOCK_DOMAIN);
        preimage.extend_from_slice(&header);
        Digest::sha256(&preimage)
    }

    /// Whether the stored hash matches the recomputed one.
    pub fn has_valid_hash(&self) -> bool {
        self.hash == self.compute_hash()
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    /// Canonical bytes for storage: header followed by the 32-byte hash.
    pub fn to_bytes(&self) -> Vec<u8> {
        canonical_block_bytes(self)
    }

    /// Decode from [`Block::to_bytes`] output. The hash is not checked here.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode_block(bytes)
    }

    /// Interpret the payload as a batch of verification records.
    pub fn decode_batch(&self) -> Result<BatchPayload> {
        BatchPayload::from_bytes(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::VerificationRecord;

    #[test]
    fn test_genesis_is_fixed() {
        let a = Block::genesis();
        let b = Block::genesis();
        assert_eq!(a, b);
        assert!(a.is_genesis());
        assert!(a.has_valid_hash());
        assert_eq!(a.previous_hash, Digest::ZERO);
        assert_eq!(&a.payload[..], GENESIS_PAYLOAD);
    }

    #[test]
    fn test_hash_covers_every_field() {
        let mut block = Block::candidate(1, 1000, b"p".to_vec(), Block::genesis().hash);
        block.hash = block.compute_hash();
        let original = block.hash;

        let mut changed = block.clone();
        changed.nonce += 1;
        assert_ne!(changed.compute_hash(), original);

        let mut changed = block.clone();
        changed.timestamp += 1;
        assert_ne!(changed.compute_hash(), original);

        let mut changed = block.clone();
        changed.payload = Bytes::from_static(b"q");
        assert_ne!(changed.compute_hash(), original);

        let mut changed = block.clone();
        changed.previous_hash = Digest::ZERO;
        assert_ne!(changed.compute_hash(), original);

        let mut changed = block;
        changed.index = 2;
        assert_ne!(changed.compute_hash(), original);
    }

    #[test]
    fn test_bytes_roundtrip() {
        let mut block = Block::candidate(3, 42, b"payload".to_vec(), Digest::sha256(b"prev"));
        block.nonce = 991;
        block.hash = block.compute_hash();

        let decoded = Block::from_bytes(&block.to_bytes()).unwrap();
        assert_eq!(decoded, block);
        assert!(decoded.has_valid_hash());
    }

    #[test]
    fn test_decode_batch() {
        let record = VerificationRecord::with_timestamp(Digest::sha256(b"Hello"), "alice", 5);
        let batch = BatchPayload::new("miner", 1, vec![record.clone()]);
        let block = Block::candidate(1, 10, batch.to_bytes(), Block::genesis().hash);

        let decoded = block.decode_batch().unwrap();
        assert_eq!(decoded.records, vec![record]);

        assert!(Block::genesis().decode_batch().is_err());
    }
}
