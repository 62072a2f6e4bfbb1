//! Chain validation: linkage checks for append and full-chain audits.

use kd_ledger_core::Block;

use crate::error::{ChainFault, ChainInvalid, LinkageError};

/// Check that `block` may follow `tail`.
///
/// This performs:
/// - Index continuity
/// - Previous-hash linkage
/// - Stored hash against recomputed hash
pub fn check_link(tail: &Block, block: &Block) -> Result<(), LinkageError> {
    let expected = tail.index + 1;
    if block.index != expected {
        return Err(LinkageError::IndexMismatch {
            expected,
            got: block.index,
        });
    }

    if block.previous_hash != tail.hash {
        return Err(LinkageError::PreviousHashMismatch {
            index: block.index,
            expected: tail.hash,
            got: block.previous_hash,
        });
    }

    if !block.has_valid_hash() {
        return Err(LinkageError::HashMismatch { index: block.index });
    }

    Ok(())
}

/// Validate a whole chain from genesis to tail.
///
/// Returns the first offending position. Proof-of-work difficulty is not
/// re-checked.
pub fn validate_chain(blocks: &[Block]) -> Result<(), ChainInvalid> {
    let Some(first) = blocks.first() else {
        return Err(ChainInvalid {
            index: 0,
            fault: ChainFault::GenesisMismatch,
        });
    };

    if *first != Block::genesis() {
        let fault = if first.has_valid_hash() {
            ChainFault::GenesisMismatch
        } else {
            ChainFault::HashMismatch
        };
        return Err(ChainInvalid { index: 0, fault });
    }

    for (position, pair) in blocks.windows(2).enumerate() {
        let (prev, block) = (&pair[0], &pair[1]);
        let position = position as u64 + 1;

        let fault = if block.index != position {
            Some(ChainFault::IndexGap {
                expected: position,
                got: block.index,
            })
        } else if !block.has_valid_hash() {
            Some(ChainFault::HashMismatch)
        } else if block.previous_hash != prev.hash {
            Some(ChainFault::BrokenLink)
        } else if let Err(e) = block.decode_batch() {
            Some(ChainFault::UnreadablePayload(e.to_string()))
        } else {
            None
        };

        if let Some(fault) = fault {
            return Err(ChainInvalid {
                index: position,
                fault,
            });
        }
    }

    Ok(())
}
