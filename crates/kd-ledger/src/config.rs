//! Ledger configuration.

use kd_ledger_chain::{ProofOfWork, DEFAULT_CHECK_INTERVAL};

/// Default number of leading zero hex digits required of a block hash.
pub const DEFAULT_DIFFICULTY: u32 = 3;

/// Submitter recorded when the caller does not name one.
pub const DEFAULT_SUBMITTER: &str = "system";

/// Reward carried in every batch by default.
pub const DEFAULT_MINING_REWARD: u64 = 1;

/// Default broadcast capacity for [`crate::EventBus`].
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Configuration for an [`crate::Authenticator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Leading zero hex digits required of every mined block.
    pub difficulty: u32,

    /// Upper bound on nonce attempts per block. `None` is unbounded.
    pub max_iterations: Option<u64>,

    /// Nonce attempts between cancellation checks.
    pub cancel_check_interval: u64,

    /// Submitter for `register` and `register_digest`.
    pub default_submitter: String,

    /// Reward written into each batch. Never interpreted.
    pub mining_reward: u64,

    /// Capacity of the event bus built by [`crate::EventBus::from_config`].
    pub event_capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            max_iterations: None,
            cancel_check_interval: DEFAULT_CHECK_INTERVAL,
            default_submitter: DEFAULT_SUBMITTER.to_string(),
            mining_reward: DEFAULT_MINING_REWARD,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl LedgerConfig {
    pub fn with_difficulty(mut self, difficulty: u32) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_cancel_check_interval(mut self, interval: u64) -> Self {
        self.cancel_check_interval = interval.max(1);
        self
    }

    pub fn with_default_submitter(mut self, submitter: impl Into<String>) -> Self {
        self.default_submitter = submitter.into();
        self
    }

    pub fn with_mining_reward(mut self, reward: u64) -> Self {
        self.mining_reward = reward;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Sealing parameters derived from this configuration.
    pub fn proof_of_work(&self) -> ProofOfWork {
        let pow = ProofOfWork::new(self.difficulty).with_check_interval(self.cancel_check_interval);
        match self.max_iterations {
            Some(max) => pow.with_max_iterations(max),
            None => pow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.difficulty, 3);
        assert_eq!(config.default_submitter, "system");
        assert_eq!(config.mining_reward, 1);
        assert_eq!(config.max_iterations, None);
    }

    #[test]
    fn test_proof_of_work_from_config() {
        let pow = LedgerConfig::default()
            .with_difficulty(5)
            .with_max_iterations(10)
            .with_cancel_check_interval(0)
            .proof_of_work();
        assert_eq!(pow.difficulty, 5);
        assert_eq!(pow.max_iterations, Some(10));
        assert_eq!(pow.check_interval, 1);
    }
}
