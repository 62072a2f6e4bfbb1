//! Golden test vectors for deterministic verification.
//!
//! These pin the block and batch encodings. Any change to them changes
//! every hash in every existing ledger.

use kd_ledger_core::{BatchPayload, Block, Digest, VerificationRecord};

/// Hash of the genesis block shared by every ledger.
pub const GENESIS_HASH: &str = "2334753827ce05848143955202b38c9d403ce2d9aa22782814d205ab4ebcb568";

/// SHA-256 of the bytes `Hello`.
pub const HELLO_CONTENT_HASH: &str =
    "185f8db32271fe25f561a6fc938b2e264306ec304eda518007d1764826381969";

/// Canonical encoding of an empty batch mined by `m` with reward 0.
pub const EMPTY_BATCH_BYTES: &str =
    "a4656d696e6572616d66726577617264006d766572696669636174696f6e73806776657273696f6e00";

/// A block sealed at a known difficulty.
#[derive(Debug, Clone)]
pub struct SealedBlockVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub index: u64,
    pub timestamp: i64,
    pub miner: &'static str,
    pub reward: u64,
    /// Content registered in the batch.
    pub content: &'static [u8],
    pub submitter: &'static str,
    pub created_at: i64,
    pub difficulty: u32,
    /// Expected outputs (hex).
    pub expected_payload: &'static str,
    pub expected_nonce: u64,
    pub expected_hash: &'static str,
    pub expected_block_bytes: &'static str,
}

/// "Hello" registered by `system`, mined by `minerA` at difficulty 2 on top of genesis.
pub fn hello_block_vector() -> SealedBlockVector {
    SealedBlockVector {
        name: "Hello sealed at difficulty 2",
        index: 1,
        timestamp: 1736870401000,
        miner: "minerA",
        reward: 1,
        content: b"Hello",
        submitter: "system",
        created_at: 1736870400000, // 2025-01-14T16:00:00Z
        difficulty: 2,
        expected_payload: "a4656d696e6572666d696e65724166726577617264016d766572696669636174696f6e7381a46c636f6e74656e745f686173685820185f8db32271fe25f561a6fc938b2e264306ec304eda518007d17648263819696a637265617465645f61741b00000194658b1000686d65746164617461a0697375626d69747465726673797374656d6776657273696f6e00",
        expected_nonce: 111,
        expected_hash: "00a87b6c73af662983143325ccfa83eac73eee88f5c39745a40ff0ceb3beda18",
        expected_block_bytes: "a600000101021b00000194658b13e803588da4656d696e6572666d696e65724166726577617264016d766572696669636174696f6e7381a46c636f6e74656e745f686173685820185f8db32271fe25f561a6fc938b2e264306ec304eda518007d17648263819696a637265617465645f61741b00000194658b1000686d65746164617461a0697375626d69747465726673797374656d6776657273696f6e000458202334753827ce05848143955202b38c9d403ce2d9aa22782814d205ab4ebcb56805186f00a87b6c73af662983143325ccfa83eac73eee88f5c39745a40ff0ceb3beda18",
    }
}

/// The batch described by a vector.
pub fn batch_from_vector(vector: &SealedBlockVector) -> BatchPayload {
    let record = VerificationRecord::with_timestamp(
        Digest::sha256(vector.content),
        vector.submitter,
        vector.created_at,
    );
    BatchPayload::new(vector.miner, vector.reward, vec![record])
}

/// The unsealed candidate described by a vector, linked to genesis.
pub fn candidate_from_vector(vector: &SealedBlockVector) -> Block {
    Block::candidate(
        vector.index,
        vector.timestamp,
        batch_from_vector(vector).to_bytes(),
        Block::genesis().hash,
    )
}
