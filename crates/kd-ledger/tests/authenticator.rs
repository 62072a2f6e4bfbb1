//! End-to-end behaviour of the authenticator: registration, mining,
//! authentication, tamper detection and attestations.

use std::sync::Arc;
use std::time::Duration;

use kd_ledger::{
    AuthError, Authentication, Authenticator, Block, Digest, EventBus, Ledger, LedgerConfig,
    LedgerEvent, Metadata, MetadataValue, MineOutcome, MiningError, ProofOfWork,
    RegistrationStatus, SharedLedger, SignatureService,
};

const HELLO_SHA256: &str = "185f8db32271fe25f561a6fc938b2e264306ec304eda518007d1764826381969";

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn authenticator(difficulty: u32) -> Authenticator {
    init_tracing();
    Authenticator::with_config(LedgerConfig::default().with_difficulty(difficulty))
}

fn metadata(title: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("title".into(), MetadataValue::from(title));
    metadata
}

fn records_in(block: &Block) -> Vec<Digest> {
    block
        .decode_batch()
        .unwrap()
        .records
        .into_iter()
        .map(|r| r.content_hash)
        .collect()
}

#[tokio::test]
async fn hello_is_registered_mined_and_authenticated() {
    let auth = authenticator(2);

    let registration = auth.register(b"Hello", metadata("greeting"));
    assert_eq!(registration.status, RegistrationStatus::Pending);
    assert_eq!(registration.content_hash.to_hex(), HELLO_SHA256);

    assert_eq!(
        auth.authenticate(&registration.content_hash),
        Authentication::NotFound
    );

    let outcome = auth.mine("minerA").await.unwrap();
    let MineOutcome::Success {
        block_index,
        block_hash,
        records,
        ..
    } = outcome
    else {
        panic!("expected a mined block, got {outcome:?}");
    };
    assert_eq!(block_index, 1);
    assert_eq!(records, 1);
    assert!(block_hash.to_hex().starts_with("00"));

    match auth.authenticate(&registration.content_hash) {
        Authentication::Authentic {
            block_index,
            metadata: found,
            submitter,
            record_timestamp,
            ..
        } => {
            assert_eq!(block_index, 1);
            assert_eq!(found, metadata("greeting"));
            assert_eq!(submitter, "system");
            assert_eq!(record_timestamp, registration.created_at);
        }
        Authentication::NotFound => panic!("registered content not found"),
    }
    assert!(auth.is_chain_valid());

    auth.ledger().write().tamper(1, |block| block.nonce ^= 1);
    assert!(!auth.is_chain_valid());
}

#[tokio::test]
async fn mining_empty_queue_is_no_work() {
    let auth = authenticator(1);
    let outcome = auth.mine("m").await.unwrap();
    assert_eq!(outcome, MineOutcome::NoWork);
    assert_eq!(auth.ledger().len(), 1);
    assert_eq!(
        serde_json::to_value(&outcome).unwrap(),
        serde_json::json!({ "status": "no_work" })
    );
}

#[tokio::test]
async fn batch_preserves_queue_order_and_drains_queue() {
    let auth = authenticator(2);
    let r1 = auth.register(b"first", Metadata::new());
    let r2 = auth.register(b"second", Metadata::new());
    assert_eq!(auth.pending_count(), 2);

    let outcome = auth.mine("m").await.unwrap();
    let block = outcome.block().unwrap();
    assert_eq!(records_in(block), vec![r1.content_hash, r2.content_hash]);
    assert!(block.hash.meets_difficulty(2));
    assert_eq!(auth.pending_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn registration_during_mining_goes_to_next_block() {
    let auth = authenticator(5);
    let r1 = auth.register(b"r1", Metadata::new());

    let handle = auth.begin_mine("m").await;
    let r2 = auth.register(b"r2", Metadata::new());

    let first = handle.wait().await.unwrap();
    let first_block = first.block().unwrap();
    assert_eq!(records_in(first_block), vec![r1.content_hash]);
    assert!(first_block.hash.to_hex().starts_with("00000"));
    assert_eq!(auth.pending_count(), 1);

    let second = auth
        .begin_mine_with("m", ProofOfWork::new(1))
        .await
        .wait()
        .await
        .unwrap();
    let second_block = second.block().unwrap();
    assert_eq!(second_block.index, 2);
    assert_eq!(records_in(second_block), vec![r2.content_hash]);
    assert!(auth.is_chain_valid());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_mines_on_one_ledger_take_turns() {
    let auth = Arc::new(authenticator(4));
    let r1 = auth.register(b"first miner", Metadata::new());

    // The first search is running and holds the mining lock.
    let first = auth.begin_mine("a").await;
    let r2 = auth.register(b"second miner", Metadata::new());

    let second = {
        let auth = Arc::clone(&auth);
        tokio::spawn(async move { auth.mine("b").await })
    };
    let first = tokio::spawn(first.wait());

    let (first, second) = (first.await.unwrap(), second.await.unwrap());
    let (first, second) = match (first, second) {
        (Ok(first), Ok(second)) => (first, second),
        (first, second) => panic!("a mine failed: {first:?} / {second:?}"),
    };

    let first = first.block().unwrap();
    let second = second.block().unwrap();
    assert_eq!(first.index, 1);
    assert_eq!(second.index, 2);
    assert_eq!(second.previous_hash, first.hash);
    assert_eq!(records_in(first), vec![r1.content_hash]);
    assert_eq!(records_in(second), vec![r2.content_hash]);

    assert_eq!(auth.pending_count(), 0);
    assert_eq!(auth.ledger().len(), 3);
    assert_eq!(auth.history(&r1.content_hash).len(), 1);
    assert_eq!(auth.history(&r2.content_hash).len(), 1);
    assert!(auth.is_chain_valid());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_concurrent_mines_embed_each_record_once() {
    let auth = Arc::new(authenticator(2));
    let mut hashes = Vec::new();
    let mut tasks = Vec::new();

    for i in 0..8u8 {
        hashes.push(auth.register(&[b'm', i], Metadata::new()).content_hash);
        let auth = Arc::clone(&auth);
        tasks.push(tokio::spawn(async move { auth.mine(&format!("miner-{i}")).await }));
    }

    let mut mined = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(MineOutcome::Success { .. }) => mined += 1,
            Ok(MineOutcome::NoWork) => {}
            Err(e) => panic!("concurrent mine failed: {e}"),
        }
    }

    assert!(mined >= 1);
    assert_eq!(auth.ledger().len(), mined + 1);
    assert_eq!(auth.pending_count(), 0);
    for hash in &hashes {
        assert_eq!(auth.history(hash).len(), 1);
    }
    assert!(auth.is_chain_valid());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn proof_parts_agree_while_blocks_are_appended() {
    let auth = Arc::new(authenticator(1));
    let hash = auth.register(b"consistent", Metadata::new()).content_hash;
    auth.mine("m").await.unwrap();

    let miner = {
        let auth = Arc::clone(&auth);
        tokio::spawn(async move {
            for i in 0..20u32 {
                auth.register(&i.to_be_bytes(), Metadata::new());
                auth.mine("m").await.unwrap();
            }
        })
    };

    while !miner.is_finished() {
        let proof = auth.proof(&hash);
        assert!(proof.authenticated);
        assert!(proof.chain_valid);
        assert_eq!(proof.history.len(), 1);
        assert_eq!(
            proof.authentication.block_index(),
            Some(proof.history[0].block_index)
        );
        tokio::task::yield_now().await;
    }
    miner.await.unwrap();
    assert_eq!(auth.ledger().len(), 22);
}

#[tokio::test]
async fn readers_are_not_blocked_by_a_running_search() {
    let auth = authenticator(1);
    auth.register(b"slow", Metadata::new());

    let handle = auth
        .begin_mine_with("m", ProofOfWork::new(64).with_check_interval(256))
        .await;

    // Queries answer from the last sealed state while the search runs.
    assert_eq!(auth.ledger().len(), 1);
    assert!(auth.is_chain_valid());
    assert!(!auth.authenticate(&Digest::sha256(b"slow")).is_authentic());

    handle.cancel();
    assert!(handle.wait().await.is_err());
}

#[tokio::test]
async fn timeout_cancels_and_restores_records() {
    let auth = Authenticator::with_config(
        LedgerConfig::default()
            .with_difficulty(64)
            .with_cancel_check_interval(128),
    );
    let r1 = auth.register(b"a", Metadata::new());
    let r2 = auth.register(b"b", Metadata::new());

    let err = auth
        .mine_with_timeout("m", Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Mining(MiningError::Cancelled { .. })));

    let pending: Vec<Digest> = auth
        .registry()
        .pending()
        .into_iter()
        .map(|r| r.content_hash)
        .collect();
    assert_eq!(pending, vec![r1.content_hash, r2.content_hash]);
    assert_eq!(auth.ledger().len(), 1);
}

#[tokio::test]
async fn bounded_search_reports_exhaustion() {
    let auth = Authenticator::with_config(
        LedgerConfig::default()
            .with_difficulty(64)
            .with_max_iterations(1_000),
    );
    auth.register(b"a", Metadata::new());

    let err = auth.mine("m").await.unwrap_err();
    assert!(matches!(
        err,
        AuthError::Mining(MiningError::Exhausted { attempts: 1_000 })
    ));
    assert_eq!(auth.pending_count(), 1);
}

#[tokio::test]
async fn history_keeps_duplicates_in_chain_order() {
    let auth = authenticator(1);
    let hash = auth.register_as("alice", b"dup", metadata("one")).content_hash;
    auth.mine("m1").await.unwrap();
    auth.register_as("bob", b"dup", metadata("two"));
    auth.mine("m2").await.unwrap();

    let history = auth.history(&hash);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].block_index, 1);
    assert_eq!(history[0].submitter, "alice");
    assert_eq!(history[0].miner, "m1");
    assert_eq!(history[1].block_index, 2);
    assert_eq!(history[1].submitter, "bob");
    assert_eq!(history[1].metadata, metadata("two"));

    // authenticate reports the first embedding
    assert_eq!(auth.authenticate(&hash).block_index(), Some(1));

    assert!(auth.history(&Digest::sha256(b"unknown")).is_empty());
}

#[tokio::test]
async fn register_digest_uses_supplied_hash() {
    let auth = authenticator(1);
    let hash = Digest::sha256(b"encoded elsewhere");
    let registration = auth.register_digest(hash, Metadata::new());
    assert_eq!(registration.content_hash, hash);

    auth.mine("m").await.unwrap();
    assert!(auth.authenticate(&hash).is_authentic());
}

#[tokio::test]
async fn proof_composes_authentication_history_and_validity() {
    let auth = authenticator(1);
    let hash = auth.register(b"proof me", Metadata::new()).content_hash;
    auth.mine("m").await.unwrap();

    let proof = auth.proof(&hash);
    assert!(proof.authenticated);
    assert_eq!(proof.history.len(), 1);
    assert!(proof.chain_valid);
    assert!(proof.chain_error.is_none());

    let missing = auth.proof(&Digest::sha256(b"never registered"));
    assert!(!missing.authenticated);
    assert!(missing.history.is_empty());
    assert!(missing.chain_valid);

    auth.ledger().write().tamper(1, |block| block.timestamp += 1);
    let tampered = auth.proof(&hash);
    assert!(!tampered.chain_valid);
    assert!(tampered.chain_error.is_some());
}

#[tokio::test]
async fn flipping_any_bit_of_any_block_invalidates_chain() {
    let auth = authenticator(1);
    for i in 0..3u8 {
        auth.register(&[i], Metadata::new());
        auth.mine("m").await.unwrap();
    }
    let ledger = auth.ledger().snapshot();
    assert!(ledger.is_valid());

    let flips: [fn(&mut Block); 6] = [
        |b| b.index ^= 1,
        |b| b.timestamp ^= 1 << 7,
        |b| b.nonce ^= 1,
        |b| {
            let mut payload = b.payload.to_vec();
            payload[0] ^= 0x01;
            b.payload = payload.into();
        },
        |b| b.previous_hash.0[31] ^= 0x80,
        |b| b.hash.0[0] ^= 0x01,
    ];

    for index in 0..ledger.len() as u64 {
        for flip in &flips {
            let mut copy: Ledger = ledger.clone();
            assert!(copy.tamper(index, *flip));
            assert!(!copy.is_valid(), "flip at block {index} went undetected");
        }
    }
}

#[tokio::test]
async fn sign_and_verify() {
    let auth = authenticator(1);
    let signature = auth.sign(b"payload").unwrap();
    assert!(auth.verify(b"payload", signature.as_bytes()));
    assert!(!auth.verify(b"other", signature.as_bytes()));
    assert!(!auth.verify(b"payload", b"short"));

    let unkeyed = Authenticator::builder()
        .signer(SignatureService::unkeyed())
        .build();
    assert!(matches!(
        unkeyed.sign(b"payload"),
        Err(AuthError::Core(kd_ledger::core::CoreError::KeyUnavailable))
    ));
    assert!(!unkeyed.verify(b"payload", signature.as_bytes()));
}

#[tokio::test]
async fn attestations_bind_content_to_block() {
    let auth = authenticator(1);
    let hash = auth.register(b"attest me", Metadata::new()).content_hash;
    assert!(auth.attest(&hash).unwrap().is_none());

    auth.mine("m").await.unwrap();
    let attestation = auth.attest(&hash).unwrap().unwrap();
    assert_eq!(attestation.block_index, 1);
    assert_eq!(Some(attestation.public_key), auth.public_key());
    assert!(auth.verify_attestation(&attestation));

    let json = serde_json::to_string(&attestation).unwrap();
    let parsed: kd_ledger::Attestation = serde_json::from_str(&json).unwrap();
    assert!(auth.verify_attestation(&parsed));

    let mut forged = attestation.clone();
    forged.content_hash = Digest::sha256(b"something else");
    assert!(!auth.verify_attestation(&forged));

    let mut moved = attestation;
    moved.block_index = 0;
    assert!(!auth.verify_attestation(&moved));
}

#[tokio::test]
async fn exported_blocks_replay_into_equivalent_ledger() {
    let auth = authenticator(1);
    let hash = auth.register(b"durable", Metadata::new()).content_hash;
    auth.mine("m").await.unwrap();
    auth.register(b"more", Metadata::new());
    auth.mine("m").await.unwrap();

    let exported = auth.export_blocks();
    assert_eq!(exported.len(), 3);

    let replayed = Ledger::replay(&exported).unwrap();
    let restored = Authenticator::builder()
        .config(LedgerConfig::default().with_difficulty(1))
        .ledger(SharedLedger::from_ledger(replayed))
        .build();
    assert_eq!(restored.authenticate(&hash).block_index(), Some(1));
    assert!(restored.is_chain_valid());

    // The restored ledger keeps growing from the same tail.
    restored.register(b"after restart", Metadata::new());
    let outcome = restored.mine("m").await.unwrap();
    assert_eq!(outcome.block().unwrap().index, 3);
}

#[tokio::test]
async fn events_reach_subscribers() {
    init_tracing();
    let bus = EventBus::with_capacity(16);
    let mut events = bus.subscribe();
    let auth = Authenticator::builder()
        .config(LedgerConfig::default().with_difficulty(1))
        .events(Arc::new(bus))
        .build();

    let hash = auth.register(b"evented", Metadata::new()).content_hash;
    auth.mine("m").await.unwrap();

    assert_eq!(
        events.recv().await.unwrap(),
        LedgerEvent::RegistrationAccepted {
            content_hash: hash,
            submitter: "system".into(),
        }
    );
    assert!(matches!(
        events.recv().await.unwrap(),
        LedgerEvent::BlockMined {
            block_index: 1,
            records: 1,
            ..
        }
    ));
}

#[tokio::test]
async fn authentication_json_shape() {
    let auth = authenticator(1);
    let hash = auth.register(b"json", metadata("doc")).content_hash;

    let missing = serde_json::to_value(auth.authenticate(&hash)).unwrap();
    assert_eq!(
        missing,
        serde_json::json!({ "valid": false, "error": "not_found" })
    );

    auth.mine("m").await.unwrap();
    let found = serde_json::to_value(auth.authenticate(&hash)).unwrap();
    assert_eq!(found["valid"], true);
    assert_eq!(found["block_index"], 1);
    assert_eq!(found["metadata"]["title"], "doc");

    let registration = serde_json::to_value(auth.register(b"x", Metadata::new())).unwrap();
    assert_eq!(registration["status"], "pending");
}
