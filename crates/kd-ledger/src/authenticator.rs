//! The Authenticator: register content, mine it into the ledger, and answer
//! authenticity queries.

use std::sync::Arc;
use std::time::Duration;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

use kd_ledger_chain::{ChainInvalid, Ledger, ProofOfWork};
use kd_ledger_core::canonical::attestation_bytes;
use kd_ledger_core::{
    now_millis, Block, CoreError, Digest, Metadata, PublicKey, Signature, SignatureService,
    VerificationRecord,
};

use crate::config::LedgerConfig;
use crate::error::Result;
use crate::events::{EventSink, NoopSink};
use crate::registry::{MineOutcome, MiningHandle, VerificationRegistry};
use crate::shared::SharedLedger;

/// Lifecycle state reported at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    /// Queued, waiting for the next mined block.
    Pending,
}

/// Receipt for a registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub status: RegistrationStatus,
    pub content_hash: Digest,
    pub created_at: i64,
}

/// Answer to "was this content registered and mined?".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    /// The first block embedding the content hash.
    Authentic {
        block_index: u64,
        block_hash: Digest,
        block_timestamp: i64,
        record_timestamp: i64,
        submitter: String,
        metadata: Metadata,
    },
    NotFound,
}

impl Authentication {
    pub fn is_authentic(&self) -> bool {
        matches!(self, Self::Authentic { .. })
    }

    pub fn block_index(&self) -> Option<u64> {
        match self {
            Self::Authentic { block_index, .. } => Some(*block_index),
            Self::NotFound => None,
        }
    }
}

/// Serializes as `{"valid": true, ...}` or `{"valid": false, "error": "not_found"}`.
impl Serialize for Authentication {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Authentic {
                block_index,
                block_hash,
                block_timestamp,
                record_timestamp,
                submitter,
                metadata,
            } => {
                let mut map = serializer.serialize_map(Some(7))?;
                map.serialize_entry("valid", &true)?;
                map.serialize_entry("block_index", block_index)?;
                map.serialize_entry("block_hash", block_hash)?;
                map.serialize_entry("block_timestamp", block_timestamp)?;
                map.serialize_entry("record_timestamp", record_timestamp)?;
                map.serialize_entry("submitter", submitter)?;
                map.serialize_entry("metadata", metadata)?;
                map.end()
            }
            Self::NotFound => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("valid", &false)?;
                map.serialize_entry("error", "not_found")?;
                map.end()
            }
        }
    }
}

/// One embedding of a content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub block_index: u64,
    pub block_hash: Digest,
    pub block_timestamp: i64,
    pub miner: String,
    pub submitter: String,
    pub record_timestamp: i64,
    pub metadata: Metadata,
}

/// Everything known about a content hash, plus the state of the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticityProof {
    pub authenticated: bool,
    pub content_hash: Digest,
    pub authentication: Authentication,
    pub history: Vec<HistoryEntry>,
    pub chain_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_error: Option<String>,
}

/// A signed statement that a content hash is embedded at a given block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    pub content_hash: Digest,
    pub block_index: u64,
    pub block_hash: Digest,
    pub public_key: PublicKey,
    pub signature: Signature,
}

/// Builder for an [`Authenticator`].
#[derive(Default)]
pub struct AuthenticatorBuilder {
    config: LedgerConfig,
    ledger: Option<SharedLedger>,
    signer: Option<SignatureService>,
    events: Option<Arc<dyn EventSink>>,
}

impl AuthenticatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an existing ledger, e.g. one rebuilt by replay.
    pub fn ledger(mut self, ledger: SharedLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Use a supplied key pair instead of generating one.
    pub fn signer(mut self, signer: SignatureService) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> Authenticator {
        let events = self.events.unwrap_or_else(|| Arc::new(NoopSink));
        let registry = VerificationRegistry::new(self.config.mining_reward, events);
        Authenticator {
            ledger: self.ledger.unwrap_or_default(),
            registry,
            signer: self.signer.unwrap_or_else(SignatureService::generate),
            config: self.config,
        }
    }
}

/// The authenticity ledger facade.
///
/// Owns one ledger, one registry and one signature service. Cheap to share
/// behind an `Arc`; every method takes `&self`.
#[derive(Debug)]
pub struct Authenticator {
    ledger: SharedLedger,
    registry: VerificationRegistry,
    signer: SignatureService,
    config: LedgerConfig,
}

impl Authenticator {
    /// An authenticator with default configuration and a fresh key pair.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> AuthenticatorBuilder {
        AuthenticatorBuilder::new()
    }

    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }

    pub fn registry(&self) -> &VerificationRegistry {
        &self.registry
    }

    pub fn signer(&self) -> &SignatureService {
        &self.signer
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn public_key(&self) -> Option<PublicKey> {
        self.signer.public_key()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────────

    /// Hash `content` and queue it under the default submitter.
    pub fn register(&self, content: &[u8], metadata: Metadata) -> Registration {
        self.register_digest_as(
            &self.config.default_submitter,
            Digest::sha256(content),
            metadata,
        )
    }

    /// Hash `content` and queue it under `submitter`.
    pub fn register_as(&self, submitter: &str, content: &[u8], metadata: Metadata) -> Registration {
        self.register_digest_as(submitter, Digest::sha256(content), metadata)
    }

    /// Queue a content hash computed elsewhere.
    pub fn register_digest(&self, content_hash: Digest, metadata: Metadata) -> Registration {
        self.register_digest_as(&self.config.default_submitter, content_hash, metadata)
    }

    fn register_digest_as(
        &self,
        submitter: &str,
        content_hash: Digest,
        metadata: Metadata,
    ) -> Registration {
        let created_at = now_millis();
        let record = VerificationRecord::with_timestamp(content_hash, submitter, created_at)
            .with_metadata(metadata);
        self.registry.enqueue(record);

        Registration {
            status: RegistrationStatus::Pending,
            content_hash,
            created_at,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.registry.pending_len()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mining
    // ─────────────────────────────────────────────────────────────────────────

    /// Mine every pending record at the configured difficulty.
    pub async fn mine(&self, miner_id: &str) -> Result<MineOutcome> {
        self.begin_mine(miner_id).await.wait().await
    }

    /// Start mining at the configured difficulty; see [`VerificationRegistry::begin_mine`].
    pub async fn begin_mine(&self, miner_id: &str) -> MiningHandle {
        self.begin_mine_with(miner_id, self.config.proof_of_work())
            .await
    }

    /// Start mining with explicit sealing parameters.
    pub async fn begin_mine_with(&self, miner_id: &str, pow: ProofOfWork) -> MiningHandle {
        self.registry.begin_mine(miner_id, &self.ledger, pow).await
    }

    /// Mine, cancelling the search if it runs longer than `timeout`.
    ///
    /// On timeout the records go back to the front of the queue and the call
    /// returns `MiningError::Cancelled`.
    pub async fn mine_with_timeout(&self, miner_id: &str, timeout: Duration) -> Result<MineOutcome> {
        let handle = self.begin_mine(miner_id).await;
        let token = handle.cancellation_token();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            token.cancel();
        });

        let result = handle.wait().await;
        timer.abort();
        result
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// The first block embedding `content_hash`, if any.
    pub fn authenticate(&self, content_hash: &Digest) -> Authentication {
        authenticate_in(&self.ledger.read(), content_hash)
    }

    /// Every embedding of `content_hash`, in chain order. Duplicates are kept.
    pub fn history(&self, content_hash: &Digest) -> Vec<HistoryEntry> {
        history_in(&self.ledger.read(), content_hash)
    }

    /// Authentication, history and chain validity in one answer.
    ///
    /// All three parts are read from the same state of the ledger.
    pub fn proof(&self, content_hash: &Digest) -> AuthenticityProof {
        let ledger = self.ledger.read();
        let authentication = authenticate_in(&ledger, content_hash);
        let history = if authentication.is_authentic() {
            history_in(&ledger, content_hash)
        } else {
            Vec::new()
        };
        let chain = ledger.validate();
        drop(ledger);

        AuthenticityProof {
            authenticated: authentication.is_authentic(),
            content_hash: *content_hash,
            authentication,
            history,
            chain_valid: chain.is_ok(),
            chain_error: chain.err().map(|e| e.to_string()),
        }
    }

    pub fn validate_chain(&self) -> std::result::Result<(), ChainInvalid> {
        self.ledger.validate()
    }

    pub fn is_chain_valid(&self) -> bool {
        self.validate_chain().is_ok()
    }

    /// Canonical bytes of every block, genesis first, for durable storage.
    ///
    /// Feed them back through `Ledger::replay` to restore the chain.
    pub fn export_blocks(&self) -> Vec<Vec<u8>> {
        self.ledger.read().blocks().iter().map(Block::to_bytes).collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Signing
    // ─────────────────────────────────────────────────────────────────────────

    pub fn sign(&self, payload: &[u8]) -> Result<Signature> {
        Ok(self.signer.sign(payload)?)
    }

    /// `false` for any failure; never an error.
    pub fn verify(&self, payload: &[u8], signature: &[u8]) -> bool {
        self.signer.verify(payload, signature)
    }

    /// Sign the first embedding of `content_hash`. `None` if it is not in the ledger.
    pub fn attest(&self, content_hash: &Digest) -> Result<Option<Attestation>> {
        let (block_index, block_hash) = match self.authenticate(content_hash) {
            Authentication::Authentic {
                block_index,
                block_hash,
                ..
            } => (block_index, block_hash),
            Authentication::NotFound => return Ok(None),
        };

        let message = attestation_bytes(content_hash, block_index, &block_hash);
        let signature = self.signer.sign(&message)?;
        let public_key = self
            .signer
            .public_key()
            .ok_or(CoreError::KeyUnavailable)?;
        debug!(content_hash = %content_hash, block_index, "attestation issued");

        Ok(Some(Attestation {
            content_hash: *content_hash,
            block_index,
            block_hash,
            public_key,
            signature,
        }))
    }

    /// Check an attestation issued by this authenticator.
    ///
    /// `false` unless it carries this authenticator's own key; see
    /// [`Authenticator::verify_attestation_from`] for other issuers.
    pub fn verify_attestation(&self, attestation: &Attestation) -> bool {
        match self.signer.public_key() {
            Some(key) => self.verify_attestation_from(attestation, &key),
            None => false,
        }
    }

    /// Check an attestation against a trusted issuer key, and that this
    /// ledger holds the attested record at the attested block.
    pub fn verify_attestation_from(&self, attestation: &Attestation, issuer: &PublicKey) -> bool {
        if attestation.public_key != *issuer {
            return false;
        }

        let message = attestation_bytes(
            &attestation.content_hash,
            attestation.block_index,
            &attestation.block_hash,
        );
        let verifier = SignatureService::verify_only(*issuer);
        if !verifier.verify(&message, attestation.signature.as_bytes()) {
            return false;
        }

        let ledger = self.ledger.read();
        let Some(block) = ledger.get(attestation.block_index) else {
            return false;
        };
        block.hash == attestation.block_hash
            && block.decode_batch().is_ok_and(|batch| {
                batch
                    .records
                    .iter()
                    .any(|r| r.content_hash == attestation.content_hash)
            })
    }
}

fn authenticate_in(ledger: &Ledger, content_hash: &Digest) -> Authentication {
    let found = ledger
        .scan()
        .find(|embedded| embedded.record.content_hash == *content_hash);

    match found {
        Some(embedded) => Authentication::Authentic {
            block_index: embedded.block_index,
            block_hash: embedded.block_hash,
            block_timestamp: embedded.block_timestamp,
            record_timestamp: embedded.record.created_at,
            submitter: embedded.record.submitter,
            metadata: embedded.record.metadata,
        },
        None => Authentication::NotFound,
    }
}

fn history_in(ledger: &Ledger, content_hash: &Digest) -> Vec<HistoryEntry> {
    ledger
        .scan()
        .filter(|embedded| embedded.record.content_hash == *content_hash)
        .map(|embedded| HistoryEntry {
            block_index: embedded.block_index,
            block_hash: embedded.block_hash,
            block_timestamp: embedded.block_timestamp,
            miner: embedded.miner,
            submitter: embedded.record.submitter,
            record_timestamp: embedded.record.created_at,
            metadata: embedded.record.metadata,
        })
        .collect()
}

impl Default for Authenticator {
    fn default() -> Self {
        Self::new()
    }
}
