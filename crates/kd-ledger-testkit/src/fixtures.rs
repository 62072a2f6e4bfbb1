//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use tokio_util::sync::CancellationToken;

use kd_ledger::{Authenticator, LedgerConfig};
use kd_ledger_chain::{Ledger, ProofOfWork};
use kd_ledger_core::{
    now_millis, BatchPayload, Block, Digest, Metadata, SignatureService, VerificationRecord,
};

/// Difficulty used by fixtures. Low enough to seal in a few hundred attempts.
pub const FIXTURE_DIFFICULTY: u32 = 1;

/// A ledger that seals batches synchronously.
pub struct TestLedger {
    pub ledger: Ledger,
    pub pow: ProofOfWork,
    pub miner: String,
}

impl TestLedger {
    /// Create a ledger at [`FIXTURE_DIFFICULTY`].
    pub fn new() -> Self {
        Self::with_difficulty(FIXTURE_DIFFICULTY)
    }

    pub fn with_difficulty(difficulty: u32) -> Self {
        Self {
            ledger: Ledger::new(),
            pow: ProofOfWork::new(difficulty),
            miner: "test-miner".to_string(),
        }
    }

    /// Seal `records` into a block on top of the tail and append it.
    pub fn push_batch(&mut self, records: Vec<VerificationRecord>) -> Block {
        let payload = BatchPayload::new(self.miner.clone(), 1, records).to_bytes();
        self.push_payload(payload)
    }

    /// Seal raw payload bytes into a block and append it.
    pub fn push_payload(&mut self, payload: Vec<u8>) -> Block {
        let tail = self.ledger.tail();
        let candidate = Block::candidate(tail.index + 1, now_millis(), payload, tail.hash);
        let block = self
            .pow
            .seal(candidate, &CancellationToken::new())
            .expect("fixture difficulty seals without limit");
        self.ledger
            .append(block.clone())
            .expect("sealed block links to tail");
        block
    }

    /// Register each content as its own single-record block.
    pub fn push_contents(&mut self, contents: &[&[u8]]) -> Vec<Block> {
        contents
            .iter()
            .map(|content| self.push_batch(vec![make_record(content)]))
            .collect()
    }

    /// Encoded blocks in append order, as a persistence layer would hold them.
    pub fn export(&self) -> Vec<Vec<u8>> {
        self.ledger.blocks().iter().map(Block::to_bytes).collect()
    }
}

impl Default for TestLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// A record for `content` from the `system` submitter.
pub fn make_record(content: &[u8]) -> VerificationRecord {
    VerificationRecord::new(Digest::sha256(content), "system")
}

/// A record carrying metadata.
pub fn make_record_with(content: &[u8], submitter: &str, metadata: Metadata) -> VerificationRecord {
    VerificationRecord::new(Digest::sha256(content), submitter).with_metadata(metadata)
}

/// A signature service with a key derived from `seed`.
pub fn seeded_signer(seed: u8) -> SignatureService {
    SignatureService::from_seed(&[seed; 32])
}

/// An authenticator at [`FIXTURE_DIFFICULTY`] with a seeded signer.
pub fn test_authenticator(seed: u8) -> Authenticator {
    Authenticator::builder()
        .config(LedgerConfig::default().with_difficulty(FIXTURE_DIFFICULTY))
        .signer(seeded_signer(seed))
        .build()
}

/// Create multiple authenticators, each with a distinct key.
pub fn multi_party_authenticators(count: usize) -> Vec<Authenticator> {
    (0..count).map(|i| test_authenticator(i as u8)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pushed_blocks_meet_difficulty() {
        let mut fixture = TestLedger::with_difficulty(2);
        let blocks = fixture.push_contents(&[b"a", b"b", b"c"]);

        assert_eq!(fixture.ledger.len(), 4);
        for block in &blocks {
            assert!(block.hash.meets_difficulty(2));
        }
        assert!(fixture.ledger.is_valid());
    }

    #[test]
    fn test_export_replays() {
        let mut fixture = TestLedger::new();
        fixture.push_contents(&[b"x"]);

        let replayed = Ledger::replay(fixture.export()).unwrap();
        assert_eq!(replayed.blocks(), fixture.ledger.blocks());
    }

    #[test]
    fn test_found_after_push() {
        let mut fixture = TestLedger::new();
        fixture.push_contents(&[b"Hello"]);

        let hash = Digest::sha256(b"Hello");
        let found = fixture.ledger.find(|r| r.content_hash == hash).next();
        assert_eq!(found.map(|(index, _)| index), Some(1));
    }

    #[test]
    fn test_multi_party_keys_differ() {
        let parties = multi_party_authenticators(3);
        let keys: Vec<_> = parties.iter().map(|a| a.public_key()).collect();
        assert_ne!(keys[0], keys[1]);
        assert_ne!(keys[1], keys[2]);
    }
}
