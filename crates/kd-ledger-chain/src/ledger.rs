//! The ledger: an ordered, append-only sequence of blocks starting at genesis.
//!
//! The ledger does no locking of its own. Callers that share it across tasks
//! wrap it (see `kd-ledger`'s `SharedLedger`).

use serde::Serialize;
use tracing::warn;

use kd_ledger_core::{Block, Digest, VerificationRecord};

use crate::error::{ChainInvalid, LinkageError, Result};
use crate::validation::{check_link, validate_chain};

/// A record found inside a sealed block, with the block facts it came with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbeddedRecord {
    pub block_index: u64,
    pub block_hash: Digest,
    pub block_timestamp: i64,
    pub miner: String,
    pub record: VerificationRecord,
}

/// An append-only chain of blocks.
///
/// Always holds at least the genesis block.
#[derive(Debug, Clone)]
pub struct Ledger {
    blocks: Vec<Block>,
}

impl Ledger {
    /// Create a ledger containing only genesis.
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::genesis()],
        }
    }

    /// Rebuild a ledger from canonical block bytes in append order.
    ///
    /// The first block must be the canonical genesis. Every later block goes
    /// through [`Ledger::append`], so a replayed ledger satisfies the same
    /// linkage rules as one built in-process.
    pub fn replay<I, B>(encoded: I) -> Result<Self>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut encoded = encoded.into_iter();

        let genesis = match encoded.next() {
            Some(bytes) => Block::from_bytes(bytes.as_ref())?,
            None => return Err(LinkageError::GenesisMismatch),
        };
        if genesis != Block::genesis() {
            return Err(LinkageError::GenesisMismatch);
        }

        let mut ledger = Self::new();
        for bytes in encoded {
            ledger.append(Block::from_bytes(bytes.as_ref())?)?;
        }
        Ok(ledger)
    }

    /// Append a block to the tail.
    ///
    /// Nothing is modified unless every check passes.
    pub fn append(&mut self, block: Block) -> Result<()> {
        check_link(self.tail(), &block)?;
        self.blocks.push(block);
        Ok(())
    }

    /// The most recent block.
    pub fn tail(&self) -> &Block {
        // Never empty: constructed with genesis and only ever grows.
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn get(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Index of the tail block.
    pub fn height(&self) -> u64 {
        self.tail().index
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Audit the whole chain.
    pub fn validate(&self) -> Result<(), ChainInvalid> {
        validate_chain(&self.blocks)
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Every embedded record in chain order.
    ///
    /// Lazy: payloads are decoded one block at a time. Blocks whose payload
    /// cannot be decoded are skipped with a warning.
    pub fn scan(&self) -> impl Iterator<Item = EmbeddedRecord> + '_ {
        self.blocks
            .iter()
            .filter(|block| !block.is_genesis())
            .flat_map(|block| match block.decode_batch() {
                Ok(batch) => {
                    let miner = batch.miner;
                    batch
                        .records
                        .into_iter()
                        .map(|record| EmbeddedRecord {
                            block_index: block.index,
                            block_hash: block.hash,
                            block_timestamp: block.timestamp,
                            miner: miner.clone(),
                            record,
                        })
                        .collect::<Vec<_>>()
                }
                Err(e) => {
                    warn!(index = block.index, error = %e, "skipping block with unreadable payload");
                    Vec::new()
                }
            })
    }

    /// Records matching `predicate`, paired with the index of the block holding them.
    ///
    /// Each call starts a fresh scan from genesis.
    pub fn find<'a, P>(
        &'a self,
        mut predicate: P,
    ) -> impl Iterator<Item = (u64, VerificationRecord)> + 'a
    where
        P: FnMut(&VerificationRecord) -> bool + 'a,
    {
        self.scan()
            .filter(move |embedded| predicate(&embedded.record))
            .map(|embedded| (embedded.block_index, embedded.record))
    }

    /// Mutate a stored block in place, bypassing every check.
    ///
    /// Returns `false` if no block has that index.
    #[cfg(any(test, feature = "test-util"))]
    pub fn tamper<F>(&mut self, index: u64, f: F) -> bool
    where
        F: FnOnce(&mut Block),
    {
        match usize::try_from(index).ok().and_then(|i| self.blocks.get_mut(i)) {
            Some(block) => {
                f(block);
                true
            }
            None => false,
        }
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}
