//! A ledger shared between the mining task and readers.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use kd_ledger_chain::{ChainInvalid, Ledger, LinkageError};
use kd_ledger_core::Block;

/// Cheaply cloneable handle to one ledger.
///
/// Locks are held only for the duration of a read or an append; a running
/// proof-of-work search never holds them. A poisoned lock is recovered, not
/// propagated.
#[derive(Debug, Clone, Default)]
pub struct SharedLedger {
    inner: Arc<RwLock<Ledger>>,
}

impl SharedLedger {
    /// A new ledger containing only genesis.
    pub fn new() -> Self {
        Self::default()
    }

    /// Share an existing ledger, e.g. one rebuilt with [`Ledger::replay`].
    pub fn from_ledger(ledger: Ledger) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ledger)),
        }
    }

    /// Read access. Hold the guard briefly.
    pub fn read(&self) -> RwLockReadGuard<'_, Ledger> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write access. Hold the guard briefly.
    pub fn write(&self) -> RwLockWriteGuard<'_, Ledger> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, block: Block) -> Result<(), LinkageError> {
        self.write().append(block)
    }

    /// A copy of the current tail.
    pub fn tail(&self) -> Block {
        self.read().tail().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn validate(&self) -> Result<(), ChainInvalid> {
        self.read().validate()
    }

    /// A point-in-time copy of the whole ledger.
    pub fn snapshot(&self) -> Ledger {
        self.read().clone()
    }
}
