//! Canonical CBOR encoding for deterministic hashing.
//!
//! Block headers are encoded as a CBOR map with integer keys in fixed order:
//!
//! ```text
//! { 0: version, 1: index, 2: timestamp, 3: payload, 4: previous_hash, 5: nonce }
//! ```
//!
//! Rules (RFC 8949 deterministic encoding):
//! - Integers use the smallest valid encoding
//! - Definite lengths only
//! - No floats (timestamps are i64 milliseconds)
//! - Text-keyed maps are sorted by the UTF-8 bytes of their keys
//!
//! The nonce is the last field, so everything before it can be hashed once and
//! reused for every nonce attempt (see [`BlockHasher`]).
//!
//! **This encoding is frozen.** Changing it changes every block hash.

use ciborium::value::Value;
use sha2::{Digest as _, Sha256};

use crate::block::Block;
use crate::error::{CoreError, Result};
use crate::types::Digest;

/// Domain separation prefix for block hashes.
pub const BLOCK_DOMAIN: &[u8] = b"kd-ledger/block/v1";

/// Header field keys. Keys 0-23 encode as single bytes.
mod keys {
    pub const VERSION: u64 = 0;
    pub const INDEX: u64 = 1;
    pub const TIMESTAMP: u64 = 2;
    pub const PAYLOAD: u64 = 3;
    pub const PREVIOUS_HASH: u64 = 4;
    pub const NONCE: u64 = 5;

    pub const COUNT: u64 = 6;
}

/// Attestation field keys.
mod attestation_keys {
    pub const BLOCK_HASH: &str = "block_hash";
    pub const BLOCK_INDEX: &str = "block_index";
    pub const CONTENT_HASH: &str = "content_hash";
}

/// Write everything up to and including the nonce key.
fn write_header_prefix(buf: &mut Vec<u8>, block: &Block) {
    encode_uint(buf, 5, keys::COUNT);

    encode_uint(buf, 0, keys::VERSION);
    encode_uint(buf, 0, u64::from(block.version));

    encode_uint(buf, 0, keys::INDEX);
    encode_uint(buf, 0, block.index);

    encode_uint(buf, 0, keys::TIMESTAMP);
    encode_int(buf, i128::from(block.timestamp));

    encode_uint(buf, 0, keys::PAYLOAD);
    encode_bytes(buf, &block.payload);

    encode_uint(buf, 0, keys::PREVIOUS_HASH);
    encode_bytes(buf, block.previous_hash.as_bytes());

    encode_uint(buf, 0, keys::NONCE);
}

/// Encode a block header (all fields except the hash) to canonical bytes.
pub fn canonical_header_bytes(block: &Block) -> Vec<u8> {
    let mut buf = Vec::with_capacity(block.payload.len() + 64);
    write_header_prefix(&mut buf, block);
    encode_uint(&mut buf, 0, block.nonce);
    buf
}

/// Encode an entire block for hand-off to a storage collaborator.
///
/// Format: canonical_header || hash (32 bytes)
pub fn canonical_block_bytes(block: &Block) -> Vec<u8> {
    let mut buf = canonical_header_bytes(block);
    buf.extend_from_slice(block.hash.as_bytes());
    buf
}

/// Incremental block hasher.
///
/// Absorbs the domain prefix and every header field except the nonce once;
/// each call to [`BlockHasher::hash_with_nonce`] clones that state and
/// finishes it with one nonce encoding.
#[derive(Clone)]
pub struct BlockHasher {
    prefix: Sha256,
    nonce_buf: Vec<u8>,
}

impl BlockHasher {
    /// Prepare a hasher for the given block's fixed fields.
    pub fn new(block: &Block) -> Self {
        let mut header = Vec::with_capacity(block.payload.len() + 64);
        write_header_prefix(&mut header, block);

        let mut prefix = Sha256::new();
        prefix.update(BLOCK_DOMAIN);
        prefix.update(&header);

        Self {
            prefix,
            nonce_buf: Vec::with_capacity(9),
        }
    }

    /// Hash the header with the given nonce.
    pub fn hash_with_nonce(&mut self, nonce: u64) -> Digest {
        self.nonce_buf.clear();
        encode_uint(&mut self.nonce_buf, 0, nonce);

        let mut hasher = self.prefix.clone();
        hasher.update(&self.nonce_buf);
        Digest(hasher.finalize().into())
    }
}

/// Decode a block from [`canonical_block_bytes`] output.
///
/// Rejects trailing bytes, a missing hash and non-canonical header encodings.
/// The stored hash is returned as-is; checking it is the caller's job.
pub fn decode_block(bytes: &[u8]) -> Result<Block> {
    let cursor = std::io::Cursor::new(bytes);
    let value: Value =
        ciborium::from_reader(cursor).map_err(|e| CoreError::DecodingError(e.to_string()))?;

    let mut block = header_from_value(&value)?;

    let header = canonical_header_bytes(&block);
    if bytes.len() != header.len() + 32 {
        return Err(CoreError::MalformedBlock(format!(
            "expected {} bytes, got {}",
            header.len() + 32,
            bytes.len()
        )));
    }
    if bytes[..header.len()] != header[..] {
        return Err(CoreError::NonCanonical("block header".into()));
    }

    block.hash = Digest::try_from(&bytes[header.len()..])?;
    Ok(block)
}

/// Convert a CBOR value (map with integer keys) back to a block with an unset hash.
fn header_from_value(value: &Value) -> Result<Block> {
    let map = match value {
        Value::Map(m) => m,
        _ => return Err(CoreError::MalformedBlock("expected map".into())),
    };

    let get = |key: u64| -> Option<&Value> {
        map.iter()
            .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == i128::from(key)))
            .map(|(_, v)| v)
    };

    let version = match get(keys::VERSION) {
        Some(Value::Integer(i)) => u8::try_from(i128::from(*i))
            .map_err(|_| CoreError::MalformedBlock("version out of range".into()))?,
        _ => return Err(CoreError::MalformedBlock("missing version".into())),
    };

    let index = match get(keys::INDEX) {
        Some(Value::Integer(i)) => u64::try_from(i128::from(*i))
            .map_err(|_| CoreError::MalformedBlock("index out of range".into()))?,
        _ => return Err(CoreError::MalformedBlock("missing index".into())),
    };

    let timestamp = match get(keys::TIMESTAMP) {
        Some(Value::Integer(i)) => i64::try_from(i128::from(*i))
            .map_err(|_| CoreError::MalformedBlock("timestamp out of range".into()))?,
        _ => return Err(CoreError::MalformedBlock("missing timestamp".into())),
    };

    let payload = match get(keys::PAYLOAD) {
        Some(Value::Bytes(b)) => b.clone(),
        _ => return Err(CoreError::MalformedBlock("missing payload".into())),
    };

    let previous_hash = match get(keys::PREVIOUS_HASH) {
        Some(Value::Bytes(b)) => Digest::try_from(b.as_slice())
            .map_err(|_| CoreError::MalformedBlock("invalid previous_hash".into()))?,
        _ => return Err(CoreError::MalformedBlock("missing previous_hash".into())),
    };

    let nonce = match get(keys::NONCE) {
        Some(Value::Integer(i)) => u64::try_from(i128::from(*i))
            .map_err(|_| CoreError::MalformedBlock("nonce out of range".into()))?,
        _ => return Err(CoreError::MalformedBlock("missing nonce".into())),
    };

    Ok(Block {
        version,
        index,
        timestamp,
        payload: payload.into(),
        previous_hash,
        nonce,
        hash: Digest::ZERO,
    })
}

/// Canonical bytes signed by an attestation.
pub fn attestation_bytes(content_hash: &Digest, block_index: u64, block_hash: &Digest) -> Vec<u8> {
    let value = Value::Map(vec![
        (
            Value::Text(attestation_keys::CONTENT_HASH.into()),
            Value::Bytes(content_hash.0.to_vec()),
        ),
        (
            Value::Text(attestation_keys::BLOCK_INDEX.into()),
            Value::Integer(block_index.into()),
        ),
        (
            Value::Text(attestation_keys::BLOCK_HASH.into()),
            Value::Bytes(block_hash.0.to_vec()),
        ),
    ]);
    encode_canonical(&value)
}

/// Encode a CBOR value to canonical bytes.
pub fn encode_canonical(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value);
    buf
}

/// Decode a CBOR value and require that it is canonically encoded.
///
/// The value is re-encoded and compared byte-for-byte with the input, which
/// also rejects trailing data.
pub fn decode_canonical(bytes: &[u8]) -> Result<Value> {
    let cursor = std::io::Cursor::new(bytes);
    let value: Value =
        ciborium::from_reader(cursor).map_err(|e| CoreError::DecodingError(e.to_string()))?;

    if encode_canonical(&value) != bytes {
        return Err(CoreError::NonCanonical("payload".into()));
    }
    Ok(value)
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => encode_int(buf, i128::from(*i)),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item);
            }
        }
        Value::Map(entries) => encode_map_canonical(buf, entries),
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Tag(tag, inner) => {
            encode_uint(buf, 6, *tag);
            encode_value_to(buf, inner);
        }
        Value::Float(f) => {
            buf.push(0xfb);
            buf.extend_from_slice(&f.to_be_bytes());
        }
        // Nothing the ledger builds reaches this arm; emit `undefined` so the
        // encoder stays total and decoding rejects it.
        _ => buf.push(0xf7),
    }
}

/// Encode a signed CBOR integer (major types 0 and 1).
fn encode_int(buf: &mut Vec<u8>, n: i128) {
    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a byte string (major type 2).
fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Encode a text string (major type 3).
fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode a map canonically (major type 5).
///
/// Text keys are ordered by their UTF-8 bytes; any other key by its encoding.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut pairs: Vec<(Vec<u8>, Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, k);
            let order = match k {
                Value::Text(s) => s.as_bytes().to_vec(),
                _ => key_buf.clone(),
            };
            (order, key_buf, v)
        })
        .collect();

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (_, key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}
