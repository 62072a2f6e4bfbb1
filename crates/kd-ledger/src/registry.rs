//! The verification registry: a pending queue and the protocol that seals it
//! into blocks.
//!
//! ## Locking
//!
//! - The pending queue has its own short-lived mutex, held only to push,
//!   drain or restore. Registration never waits on mining.
//! - An async mining lock allows one mining operation per registry. Its owned
//!   guard travels into the background task and is released after the block
//!   is appended or the snapshot restored.
//! - Proof-of-work runs on the blocking pool. The ledger lock is taken only
//!   to read the tail and to append.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use kd_ledger_chain::ProofOfWork;
use kd_ledger_core::{now_millis, BatchPayload, Block, Digest, VerificationRecord};

use crate::error::{AuthError, Result};
use crate::events::{EventSink, LedgerEvent, NoopSink};
use crate::shared::SharedLedger;

/// Result of a mining call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MineOutcome {
    /// A block was sealed and appended.
    Success {
        block_index: u64,
        block_hash: Digest,
        /// Number of records embedded.
        records: usize,
        #[serde(skip)]
        block: Block,
    },

    /// The queue was empty; the ledger is unchanged.
    NoWork,
}

impl MineOutcome {
    /// The sealed block, if one was mined.
    pub fn block(&self) -> Option<&Block> {
        match self {
            Self::Success { block, .. } => Some(block),
            Self::NoWork => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// A mining operation in progress.
///
/// The batch was fixed when the handle was created: records enqueued later
/// belong to the next block. Dropping the handle detaches the operation; it
/// still appends or rolls back.
#[derive(Debug)]
pub struct MiningHandle {
    cancel: CancellationToken,
    state: HandleState,
}

#[derive(Debug)]
enum HandleState {
    Ready(MineOutcome),
    Running(JoinHandle<Result<MineOutcome>>),
}

impl MiningHandle {
    fn ready(cancel: CancellationToken, outcome: MineOutcome) -> Self {
        Self {
            cancel,
            state: HandleState::Ready(outcome),
        }
    }

    fn running(cancel: CancellationToken, task: JoinHandle<Result<MineOutcome>>) -> Self {
        Self {
            cancel,
            state: HandleState::Running(task),
        }
    }

    /// Ask the search to stop. The snapshot is restored to the front of the
    /// queue and [`MiningHandle::wait`] reports `MiningError::Cancelled`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        match &self.state {
            HandleState::Ready(_) => true,
            HandleState::Running(task) => task.is_finished(),
        }
    }

    /// Wait for the block to be appended or the snapshot restored.
    pub async fn wait(self) -> Result<MineOutcome> {
        match self.state {
            HandleState::Ready(outcome) => Ok(outcome),
            HandleState::Running(task) => match task.await {
                Ok(result) => result,
                Err(e) => Err(AuthError::TaskFailed(e.to_string())),
            },
        }
    }
}

/// Pending verification records and the mining protocol.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct VerificationRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    pending: Mutex<VecDeque<VerificationRecord>>,
    mining: Arc<AsyncMutex<()>>,
    reward: u64,
    events: Arc<dyn EventSink>,
}

impl VerificationRegistry {
    pub fn new(reward: u64, events: Arc<dyn EventSink>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                pending: Mutex::new(VecDeque::new()),
                mining: Arc::new(AsyncMutex::new(())),
                reward,
                events,
            }),
        }
    }

    /// Add a record to the tail of the pending queue.
    pub fn enqueue(&self, record: VerificationRecord) {
        let content_hash = record.content_hash;
        let submitter = record.submitter.clone();

        let depth = {
            let mut pending = self.inner.lock_pending();
            pending.push_back(record);
            pending.len()
        };
        debug!(content_hash = %content_hash, submitter = %submitter, depth, "record queued");

        self.inner.events.publish(LedgerEvent::RegistrationAccepted {
            content_hash,
            submitter,
        });
    }

    /// A copy of the pending queue, oldest first.
    pub fn pending(&self) -> Vec<VerificationRecord> {
        self.inner.lock_pending().iter().cloned().collect()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock_pending().len()
    }

    /// Mine every pending record into one block.
    pub async fn mine(
        &self,
        miner_id: impl Into<String>,
        ledger: &SharedLedger,
        pow: ProofOfWork,
    ) -> Result<MineOutcome> {
        self.begin_mine(miner_id, ledger, pow).await.wait().await
    }

    /// Start mining in the background.
    ///
    /// Waits for any mining already in flight, then snapshots and clears the
    /// queue before returning. An empty snapshot yields a finished handle
    /// reporting [`MineOutcome::NoWork`].
    pub async fn begin_mine(
        &self,
        miner_id: impl Into<String>,
        ledger: &SharedLedger,
        pow: ProofOfWork,
    ) -> MiningHandle {
        let cancel = CancellationToken::new();
        let guard = Arc::clone(&self.inner.mining).lock_owned().await;

        let snapshot: Vec<VerificationRecord> = self.inner.lock_pending().drain(..).collect();
        if snapshot.is_empty() {
            return MiningHandle::ready(cancel, MineOutcome::NoWork);
        }

        let miner = miner_id.into();
        let tail = ledger.tail();
        let payload = BatchPayload::new(miner.clone(), self.inner.reward, snapshot.clone()).to_bytes();
        let candidate = Block::candidate(tail.index + 1, now_millis(), payload, tail.hash);
        debug!(
            index = candidate.index,
            records = snapshot.len(),
            difficulty = pow.difficulty,
            "mining started"
        );

        let inner = Arc::clone(&self.inner);
        let ledger = ledger.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let _guard = guard;
            inner
                .seal_and_append(candidate, snapshot, miner, &ledger, pow, token)
                .await
        });

        MiningHandle::running(cancel, task)
    }
}

impl RegistryInner {
    fn lock_pending(&self) -> MutexGuard<'_, VecDeque<VerificationRecord>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Put a snapshot back at the front of the queue, in its original order.
    fn restore(&self, snapshot: Vec<VerificationRecord>, reason: &dyn fmt::Display) {
        warn!(records = snapshot.len(), reason = %reason, "mining failed, restoring pending records");
        let mut pending = self.lock_pending();
        for record in snapshot.into_iter().rev() {
            pending.push_front(record);
        }
    }

    async fn seal_and_append(
        &self,
        candidate: Block,
        snapshot: Vec<VerificationRecord>,
        miner: String,
        ledger: &SharedLedger,
        pow: ProofOfWork,
        cancel: CancellationToken,
    ) -> Result<MineOutcome> {
        let sealed = tokio::task::spawn_blocking(move || pow.seal(candidate, &cancel)).await;

        let block = match sealed {
            Ok(Ok(block)) => block,
            Ok(Err(e)) => {
                self.restore(snapshot, &e);
                return Err(e.into());
            }
            Err(e) => {
                self.restore(snapshot, &e);
                return Err(AuthError::TaskFailed(e.to_string()));
            }
        };

        if let Err(e) = ledger.append(block.clone()) {
            self.restore(snapshot, &e);
            return Err(e.into());
        }

        let records = snapshot.len();
        info!(
            index = block.index,
            hash = %block.hash,
            nonce = block.nonce,
            records,
            miner = %miner,
            "block mined"
        );
        self.events.publish(LedgerEvent::BlockMined {
            block_index: block.index,
            block_hash: block.hash,
            miner,
            records,
        });

        Ok(MineOutcome::Success {
            block_index: block.index,
            block_hash: block.hash,
            records,
            block,
        })
    }
}

impl Default for VerificationRegistry {
    fn default() -> Self {
        Self::new(1, Arc::new(NoopSink))
    }
}

impl fmt::Debug for VerificationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationRegistry")
            .field("pending", &self.pending_len())
            .field("reward", &self.inner.reward)
            .finish()
    }
}
