//! Proof-of-work sealing.
//!
//! A block is sealed when its hash, written in hex, starts with `difficulty`
//! zeros. The search tries nonces 0, 1, 2, ... in order, so the result is
//! deterministic for a given candidate.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use kd_ledger_core::{Block, BlockHasher};

use crate::error::MiningError;

/// Hex length of a SHA-256 digest; no difficulty above this can be met.
pub const MAX_DIFFICULTY: u32 = 64;

/// How many attempts run between cancellation checks by default.
pub const DEFAULT_CHECK_INTERVAL: u64 = 1024;

/// Sealing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofOfWork {
    /// Required leading zero hex digits.
    pub difficulty: u32,

    /// Give up after this many attempts. `None` searches the whole nonce space.
    pub max_iterations: Option<u64>,

    /// Attempts between cancellation checks.
    pub check_interval: u64,
}

impl ProofOfWork {
    pub fn new(difficulty: u32) -> Self {
        Self {
            difficulty,
            max_iterations: None,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_check_interval(mut self, check_interval: u64) -> Self {
        self.check_interval = check_interval.max(1);
        self
    }

    /// Search for a nonce that satisfies the difficulty.
    ///
    /// Returns the candidate with `nonce` and `hash` filled in. The fields
    /// feeding the hash are absorbed once; each attempt only hashes the nonce.
    pub fn seal(&self, mut candidate: Block, cancel: &CancellationToken) -> Result<Block, MiningError> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(MiningError::DifficultyOutOfRange {
                difficulty: self.difficulty,
                max: MAX_DIFFICULTY,
            });
        }

        let interval = self.check_interval.max(1);
        let mut hasher = BlockHasher::new(&candidate);
        let mut attempts: u64 = 0;
        let mut nonce: u64 = 0;

        loop {
            if let Some(max) = self.max_iterations {
                if attempts >= max {
                    return Err(MiningError::Exhausted { attempts });
                }
            }
            if attempts % interval == 0 && cancel.is_cancelled() {
                return Err(MiningError::Cancelled { attempts });
            }

            let hash = hasher.hash_with_nonce(nonce);
            attempts += 1;

            if hash.meets_difficulty(self.difficulty) {
                debug!(index = candidate.index, nonce, attempts, "block sealed");
                candidate.nonce = nonce;
                candidate.hash = hash;
                return Ok(candidate);
            }

            nonce = match nonce.checked_add(1) {
                Some(next) => next,
                None => return Err(MiningError::Exhausted { attempts }),
            };
        }
    }

    /// Whether a block carries a valid seal at this difficulty.
    pub fn verify(&self, block: &Block) -> bool {
        block.hash.meets_difficulty(self.difficulty) && block.has_valid_hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kd_ledger_core::Digest;

    fn candidate() -> Block {
        Block::candidate(1, 1_700_000_000_000, b"batch".to_vec(), Block::genesis().hash)
    }

    #[test]
    fn test_seal_meets_difficulty() {
        let pow = ProofOfWork::new(2);
        let block = pow.seal(candidate(), &CancellationToken::new()).unwrap();
        assert!(block.hash.to_hex().starts_with("00"));
        assert!(block.has_valid_hash());
        assert!(pow.verify(&block));
    }

    #[test]
    fn test_seal_is_deterministic() {
        let pow = ProofOfWork::new(2);
        let token = CancellationToken::new();
        let a = pow.seal(candidate(), &token).unwrap();
        let b = pow.seal(candidate(), &token).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_seal_finds_first_nonce() {
        let pow = ProofOfWork::new(1);
        let block = pow.seal(candidate(), &CancellationToken::new()).unwrap();

        let mut probe = candidate();
        for nonce in 0..block.nonce {
            probe.nonce = nonce;
            assert!(!probe.compute_hash().meets_difficulty(1));
        }
    }

    #[test]
    fn test_difficulty_zero_takes_nonce_zero() {
        let block = ProofOfWork::new(0)
            .seal(candidate(), &CancellationToken::new())
            .unwrap();
        assert_eq!(block.nonce, 0);
        assert_eq!(block.hash, {
            let mut c = candidate();
            c.nonce = 0;
            c.compute_hash()
        });
    }

    #[test]
    fn test_difficulty_out_of_range() {
        let result = ProofOfWork::new(65).seal(candidate(), &CancellationToken::new());
        assert_eq!(
            result,
            Err(MiningError::DifficultyOutOfRange {
                difficulty: 65,
                max: 64
            })
        );
    }

    #[test]
    fn test_exhausted() {
        let pow = ProofOfWork::new(64).with_max_iterations(500);
        let result = pow.seal(candidate(), &CancellationToken::new());
        assert_eq!(result, Err(MiningError::Exhausted { attempts: 500 }));
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let result = ProofOfWork::new(64).seal(candidate(), &token);
        assert_eq!(result, Err(MiningError::Cancelled { attempts: 0 }));
    }

    #[test]
    fn test_cancelled_mid_search() {
        let token = CancellationToken::new();
        let pow = ProofOfWork::new(64).with_check_interval(16);

        let worker = {
            let token = token.clone();
            std::thread::spawn(move || pow.seal(candidate(), &token))
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        token.cancel();

        match worker.join().unwrap() {
            Err(MiningError::Cancelled { attempts }) => assert_eq!(attempts % 16, 0),
            other => panic!("expected cancellation, got {other:?}"),
        }
    }

    #[test]
    fn test_verify_rejects_unsealed() {
        let mut block = candidate();
        block.hash = Digest::ZERO;
        assert!(!ProofOfWork::new(1).verify(&block));
    }
}
