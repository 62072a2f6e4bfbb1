//! Verification records and the batch payload a mined block carries.
//!
//! A batch is encoded as a canonical CBOR map with text keys:
//!
//! ```text
//! {
//!   "miner": text,
//!   "reward": uint,
//!   "verifications": [ { "content_hash": bytes(32), "created_at": int,
//!                        "metadata": map, "submitter": text }, ... ],
//!   "version": uint,
//! }
//! ```
//!
//! Decoding rejects anything that does not re-encode to the same bytes.

use ciborium::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::canonical::{decode_canonical, encode_canonical};
use crate::error::{CoreError, Result};
use crate::types::Digest;

/// The current batch schema version.
pub const BATCH_VERSION: u8 = 0;

mod keys {
    pub const MINER: &str = "miner";
    pub const REWARD: &str = "reward";
    pub const VERIFICATIONS: &str = "verifications";
    pub const VERSION: &str = "version";

    pub const CONTENT_HASH: &str = "content_hash";
    pub const CREATED_AT: &str = "created_at";
    pub const METADATA: &str = "metadata";
    pub const SUBMITTER: &str = "submitter";
}

/// Free-form metadata attached to a record.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A metadata value. No floats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Integer(i64),
    Text(String),
    List(Vec<MetadataValue>),
    Map(BTreeMap<String, MetadataValue>),
}

impl MetadataValue {
    fn to_cbor(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Integer(i) => Value::Integer((*i).into()),
            Self::Text(s) => Value::Text(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_cbor).collect()),
            Self::Map(map) => metadata_to_cbor(map),
        }
    }

    fn from_cbor(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::Integer(i) => i64::try_from(i128::from(*i))
                .map(Self::Integer)
                .map_err(|_| CoreError::MalformedPayload("metadata integer out of range".into())),
            Value::Text(s) => Ok(Self::Text(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(Self::from_cbor)
                .collect::<Result<Vec<_>>>()
                .map(Self::List),
            Value::Map(_) => metadata_from_cbor(value).map(Self::Map),
            _ => Err(CoreError::MalformedPayload(
                "unsupported metadata value".into(),
            )),
        }
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for MetadataValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<MetadataValue>> for MetadataValue {
    fn from(items: Vec<MetadataValue>) -> Self {
        Self::List(items)
    }
}

impl From<Metadata> for MetadataValue {
    fn from(map: Metadata) -> Self {
        Self::Map(map)
    }
}

fn metadata_to_cbor(map: &Metadata) -> Value {
    Value::Map(
        map.iter()
            .map(|(k, v)| (Value::Text(k.clone()), v.to_cbor()))
            .collect(),
    )
}

fn metadata_from_cbor(value: &Value) -> Result<Metadata> {
    let Value::Map(entries) = value else {
        return Err(CoreError::MalformedPayload("metadata must be a map".into()));
    };
    let mut map = Metadata::new();
    for (k, v) in entries {
        let Value::Text(key) = k else {
            return Err(CoreError::MalformedPayload("metadata key must be text".into()));
        };
        map.insert(key.clone(), MetadataValue::from_cbor(v)?);
    }
    Ok(map)
}

/// A claim that some content existed, awaiting or embedded in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    /// SHA-256 of the registered content.
    pub content_hash: Digest,

    /// Caller-supplied metadata.
    pub metadata: Metadata,

    /// Registration time (Unix milliseconds).
    pub created_at: i64,

    /// Who registered the content.
    pub submitter: String,
}

impl VerificationRecord {
    /// Create a record stamped with the current time.
    pub fn new(content_hash: Digest, submitter: impl Into<String>) -> Self {
        Self::with_timestamp(content_hash, submitter, crate::now_millis())
    }

    /// Create a record with an explicit timestamp.
    pub fn with_timestamp(
        content_hash: Digest,
        submitter: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            content_hash,
            metadata: Metadata::new(),
            created_at,
            submitter: submitter.into(),
        }
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    fn to_cbor(&self) -> Value {
        Value::Map(vec![
            (
                Value::Text(keys::CONTENT_HASH.into()),
                Value::Bytes(self.content_hash.0.to_vec()),
            ),
            (
                Value::Text(keys::CREATED_AT.into()),
                Value::Integer(self.created_at.into()),
            ),
            (
                Value::Text(keys::METADATA.into()),
                metadata_to_cbor(&self.metadata),
            ),
            (
                Value::Text(keys::SUBMITTER.into()),
                Value::Text(self.submitter.clone()),
            ),
        ])
    }

    fn from_cbor(value: &Value) -> Result<Self> {
        let content_hash = match field(value, keys::CONTENT_HASH)? {
            Value::Bytes(b) => Digest::try_from(b.as_slice())
                .map_err(|_| CoreError::MalformedPayload("invalid content_hash".into()))?,
            _ => return Err(CoreError::MalformedPayload("content_hash must be bytes".into())),
        };

        let created_at = match field(value, keys::CREATED_AT)? {
            Value::Integer(i) => i64::try_from(i128::from(*i))
                .map_err(|_| CoreError::MalformedPayload("created_at out of range".into()))?,
            _ => return Err(CoreError::MalformedPayload("created_at must be an integer".into())),
        };

        let metadata = metadata_from_cbor(field(value, keys::METADATA)?)?;

        let submitter = match field(value, keys::SUBMITTER)? {
            Value::Text(s) => s.clone(),
            _ => return Err(CoreError::MalformedPayload("submitter must be text".into())),
        };

        Ok(Self {
            content_hash,
            metadata,
            created_at,
            submitter,
        })
    }
}

/// The batch of records sealed into one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPayload {
    /// Schema version (currently 0).
    pub version: u8,

    /// Identifier of whoever mined the block.
    pub miner: String,

    /// Carried through unchanged; the ledger attaches no meaning to it.
    pub reward: u64,

    /// Records in queue order.
    pub records: Vec<VerificationRecord>,
}

impl BatchPayload {
    pub fn new(miner: impl Into<String>, reward: u64, records: Vec<VerificationRecord>) -> Self {
        Self {
            version: BATCH_VERSION,
            miner: miner.into(),
            reward,
            records,
        }
    }

    /// Canonical encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        let value = Value::Map(vec![
            (
                Value::Text(keys::VERSION.into()),
                Value::Integer(self.version.into()),
            ),
            (Value::Text(keys::MINER.into()), Value::Text(self.miner.clone())),
            (
                Value::Text(keys::REWARD.into()),
                Value::Integer(self.reward.into()),
            ),
            (
                Value::Text(keys::VERIFICATIONS.into()),
                Value::Array(self.records.iter().map(VerificationRecord::to_cbor).collect()),
            ),
        ]);
        encode_canonical(&value)
    }

    /// Decode canonical bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let value = decode_canonical(bytes)?;

        let version = match field(&value, keys::VERSION)? {
            Value::Integer(i) => u8::try_from(i128::from(*i))
                .map_err(|_| CoreError::MalformedPayload("version out of range".into()))?,
            _ => return Err(CoreError::MalformedPayload("version must be an integer".into())),
        };
        if version != BATCH_VERSION {
            return Err(CoreError::MalformedPayload(format!(
                "unsupported batch version {version}"
            )));
        }

        let miner = match field(&value, keys::MINER)? {
            Value::Text(s) => s.clone(),
            _ => return Err(CoreError::MalformedPayload("miner must be text".into())),
        };

        let reward = match field(&value, keys::REWARD)? {
            Value::Integer(i) => u64::try_from(i128::from(*i))
                .map_err(|_| CoreError::MalformedPayload("reward out of range".into()))?,
            _ => return Err(CoreError::MalformedPayload("reward must be an integer".into())),
        };

        let records = match field(&value, keys::VERIFICATIONS)? {
            Value::Array(items) => items
                .iter()
                .map(VerificationRecord::from_cbor)
                .collect::<Result<Vec<_>>>()?,
            _ => return Err(CoreError::MalformedPayload("verifications must be an array".into())),
        };

        Ok(Self {
            version,
            miner,
            reward,
            records,
        })
    }
}

/// Look up a required text-keyed field.
fn field<'a>(value: &'a Value, key: &str) -> Result<&'a Value> {
    let Value::Map(entries) = value else {
        return Err(CoreError::MalformedPayload("expected map".into()));
    };
    entries
        .iter()
        .find(|(k, _)| matches!(k, Value::Text(s) if s == key))
        .map(|(_, v)| v)
        .ok_or_else(|| CoreError::MalformedPayload(format!("missing {key}")))
}
