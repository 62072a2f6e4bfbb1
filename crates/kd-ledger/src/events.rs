//! Ledger events for downstream subscribers.
//!
//! The ledger only publishes; delivery beyond the process (webhooks and the
//! like) belongs to whoever subscribes.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use kd_ledger_core::Digest;

use crate::config::{LedgerConfig, DEFAULT_EVENT_CAPACITY};

/// Something observable happened in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// A record entered the pending queue.
    RegistrationAccepted {
        content_hash: Digest,
        submitter: String,
    },

    /// A block was sealed and appended.
    BlockMined {
        block_index: u64,
        block_hash: Digest,
        miner: String,
        records: usize,
    },
}

impl LedgerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RegistrationAccepted { .. } => "registration_accepted",
            Self::BlockMined { .. } => "block_mined",
        }
    }
}

/// Receives ledger events.
///
/// Called inline on the publishing path; implementations must not block.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: LedgerEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn publish(&self, _event: LedgerEvent) {}
}

/// Broadcasts events to any number of async subscribers.
///
/// Slow subscribers lag and lose the oldest events rather than holding up
/// the ledger.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LedgerEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::with_capacity(config.event_capacity)
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for EventBus {
    fn publish(&self, event: LedgerEvent) {
        let event_type = event.event_type();
        match self.sender.send(event) {
            Ok(receivers) => trace!(event_type, receivers, "event published"),
            // No receivers - this is fine
            Err(_) => trace!(event_type, "no receivers for event"),
        }
    }
}
