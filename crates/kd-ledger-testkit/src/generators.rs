//! Proptest generators for property-based testing.

use proptest::prelude::*;

use kd_ledger_core::{
    BatchPayload, Block, Digest, Keypair, Metadata, MetadataValue, VerificationRecord,
};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random digest.
pub fn digest() -> impl Strategy<Value = Digest> {
    any::<[u8; 32]>().prop_map(Digest::from_bytes)
}

/// Generate a reasonable timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=i64::MAX / 2
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a submitter or miner identifier.
pub fn identifier() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,15}".prop_map(String::from)
}

/// Generate a metadata value, nested up to three levels.
pub fn metadata_value() -> impl Strategy<Value = MetadataValue> {
    let leaf = prop_oneof![
        Just(MetadataValue::Null),
        any::<bool>().prop_map(MetadataValue::Bool),
        any::<i64>().prop_map(MetadataValue::Integer),
        "\\PC{0,24}".prop_map(MetadataValue::Text),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(MetadataValue::List),
            prop::collection::btree_map("[a-z]{1,8}", inner, 0..4).prop_map(MetadataValue::Map),
        ]
    })
}

/// Generate a metadata map.
pub fn metadata() -> impl Strategy<Value = Metadata> {
    prop::collection::btree_map("\\PC{1,12}", metadata_value(), 0..6)
}

/// Generate a verification record.
pub fn record() -> impl Strategy<Value = VerificationRecord> {
    (digest(), identifier(), timestamp(), metadata()).prop_map(
        |(content_hash, submitter, created_at, metadata)| {
            VerificationRecord::with_timestamp(content_hash, submitter, created_at)
                .with_metadata(metadata)
        },
    )
}

/// Generate a batch of up to `max_records` records.
pub fn batch(max_records: usize) -> impl Strategy<Value = BatchPayload> {
    (
        identifier(),
        any::<u64>(),
        prop::collection::vec(record(), 0..=max_records),
    )
        .prop_map(|(miner, reward, records)| BatchPayload::new(miner, reward, records))
}

/// Generate an unsealed block with arbitrary header fields.
pub fn candidate() -> impl Strategy<Value = Block> {
    (any::<u64>(), timestamp(), payload(256), digest()).prop_map(
        |(index, timestamp, payload, previous_hash)| {
            Block::candidate(index, timestamp, payload, previous_hash)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_batch_encoding_deterministic(batch in batch(4)) {
            prop_assert_eq!(batch.to_bytes(), batch.clone().to_bytes());
        }

        #[test]
        fn test_batch_decodes_to_itself(batch in batch(4)) {
            let decoded = BatchPayload::from_bytes(&batch.to_bytes()).unwrap();
            prop_assert_eq!(decoded, batch);
        }

        #[test]
        fn test_block_hash_unique_with_different_payload(
            block in candidate(),
            other in payload(256),
        ) {
            prop_assume!(other != block.payload.to_vec());

            let mut changed = block.clone();
            changed.payload = other.into();
            prop_assert_ne!(block.compute_hash(), changed.compute_hash());
        }
    }
}
