//! Integration Tests for the Confidential Submission Flow
//!
//! Exercises the full path from key generation through encryption, local
//! proof validation, submission, confirmation and typed reads.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use stash::client::{
    ClientConfig, ClientError, ContractDataPreparer, EventSink, InMemoryLedger, SongMetadata,
    StashSession, StepStatus, TransactionState, TransactionStatus, WorkflowStep,
};
use stash::contracts::ABIValue;
use stash::fhe::{
    DomainValue, EncryptedValue, EncryptionEngine, FHEConfig, FHEError, KeyPair, ProofValidator,
    ValueRange,
};
use tokio::sync::mpsc;

static KEYS: Lazy<Arc<KeyPair>> =
    Lazy::new(|| Arc::new(KeyPair::generate(&FHEConfig::insecure_testing()).unwrap()));
static OTHER_KEYS: Lazy<Arc<KeyPair>> =
    Lazy::new(|| Arc::new(KeyPair::generate(&FHEConfig::insecure_testing()).unwrap()));

fn engine() -> EncryptionEngine {
    EncryptionEngine::new(FHEConfig::insecure_testing())
}

fn encrypt(value: u64, keys: &KeyPair) -> EncryptedValue {
    engine()
        .encrypt(&DomainValue::new(value, ValueRange::FULL).unwrap(), &keys.public)
        .unwrap()
}

fn session_with(config: ClientConfig) -> (Arc<InMemoryLedger>, StashSession) {
    let ledger = Arc::new(InMemoryLedger::new(config.max_play_seconds));
    ledger.register_key(&KEYS.public);
    let session =
        StashSession::with_keys(config, Arc::clone(&KEYS), ledger.clone(), ledger.clone()).unwrap();
    (ledger, session)
}

fn session() -> (Arc<InMemoryLedger>, StashSession) {
    session_with(ClientConfig::insecure_testing())
}

// =============================================================================
// ENCRYPTION ENGINE
// =============================================================================

#[test]
fn test_round_trip() {
    for value in [0, 1, 125, 1000, 1 << 32, u64::MAX - 1, u64::MAX] {
        let encrypted = encrypt(value, &KEYS);
        assert_eq!(engine().decrypt(&encrypted, &KEYS.private), Ok(value));
    }
}

#[test]
fn test_key_isolation() {
    let encrypted = encrypt(42, &KEYS);
    let result = engine().decrypt(&encrypted, &OTHER_KEYS.private);
    assert!(matches!(result, Err(FHEError::DecryptionFailed(_))));

    // a forged key reference does not help either
    let (ciphertext, _, proof) = encrypted.into_parts();
    let forged = EncryptedValue::from_parts(ciphertext, OTHER_KEYS.id(), proof);
    assert!(matches!(
        engine().decrypt(&forged, &OTHER_KEYS.private),
        Err(FHEError::DecryptionFailed(_))
    ));
}

#[test]
fn test_homomorphic_add_wraps() {
    let engine = engine();
    let key = &KEYS.public;
    let sum = engine
        .homomorphic_add(&encrypt(1000, &KEYS), &encrypt(234, &KEYS), key)
        .unwrap();
    assert_eq!(engine.decrypt(&sum, &KEYS.private), Ok(1234));

    let wrapped = engine
        .homomorphic_add(&encrypt(u64::MAX, &KEYS), &encrypt(2, &KEYS), key)
        .unwrap();
    assert_eq!(engine.decrypt(&wrapped, &KEYS.private), Ok(1));
}

#[test]
fn test_homomorphic_multiply_wraps() {
    let engine = engine();
    let key = &KEYS.public;
    let product = engine
        .homomorphic_multiply(&encrypt(125, &KEYS), &encrypt(90, &KEYS), key)
        .unwrap();
    assert_eq!(engine.decrypt(&product, &KEYS.private), Ok(11_250));

    let (a, b) = ((1u64 << 32) + 1, (1u64 << 32) + 3);
    let wrapped = engine
        .homomorphic_multiply(&encrypt(a, &KEYS), &encrypt(b, &KEYS), key)
        .unwrap();
    assert_eq!(engine.decrypt(&wrapped, &KEYS.private), Ok(a.wrapping_mul(b)));
}

#[test]
fn test_mixed_keys_rejected() {
    let result = engine().homomorphic_add(&encrypt(1, &KEYS), &encrypt(2, &OTHER_KEYS), &KEYS.public);
    assert!(matches!(result, Err(FHEError::KeyMismatch { .. })));
}

// =============================================================================
// PROOF VALIDATION
// =============================================================================

#[test]
fn test_tamper_detection() {
    let validator = ProofValidator::with_key(&KEYS.public);
    let encrypted = engine()
        .encrypt(
            &DomainValue::new(125, ValueRange::play_duration(86_400)).unwrap(),
            &KEYS.public,
        )
        .unwrap();
    let ciphertext = encrypted.ciphertext();
    let proof = encrypted.proof().unwrap();
    assert!(validator.validate(ciphertext, proof));

    for index in (0..ciphertext.len()).step_by(7) {
        let mut tampered = ciphertext.to_vec();
        tampered[index] ^= 0x01;
        assert!(!validator.validate(&tampered, proof), "ciphertext byte {index}");
    }
    for index in (0..proof.len()).step_by(97) {
        let mut tampered = proof.to_vec();
        tampered[index] ^= 0x80;
        assert!(!validator.validate(ciphertext, &tampered), "proof byte {index}");
    }
}

#[test]
fn test_proof_does_not_transfer_between_ciphertexts() {
    let validator = ProofValidator::with_key(&KEYS.public);
    let first = encrypt(5, &KEYS);
    let second = encrypt(5, &KEYS);
    assert_ne!(first.ciphertext(), second.ciphertext());
    assert!(!validator.validate(first.ciphertext(), second.proof().unwrap()));
}

// =============================================================================
// SUBMISSION FLOW
// =============================================================================

#[tokio::test]
async fn test_royalty_rate_out_of_range_rejected_before_encryption() {
    let (ledger, session) = session();
    let err = session
        .create_song(SongMetadata::new("Song", "Artist", "QmHash").with_royalty_rate(150))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(session.state(), TransactionState::default());
    assert_eq!(ledger.pending_count(), 0);
    assert_eq!(ledger.block_number(), 0);
}

#[tokio::test]
async fn test_record_play_payload_and_confirmation() {
    let (ledger, session) = session();
    session
        .create_song(SongMetadata::new("Song", "Artist", "QmHash"))
        .await
        .unwrap();
    session.reset();

    // payload shape
    let preparer = ContractDataPreparer::for_key(&KEYS.public, session.config());
    let request = preparer.record_play(1, 125).await.unwrap();
    let names: Vec<_> = request.named_args().iter().map(|(name, _)| *name).collect();
    assert_eq!(names, ["songId", "playDuration", "inputProof"]);
    assert_eq!(request.arg("songId"), Some(&ABIValue::Uint(1)));
    let ciphertext = request.arg("playDuration").unwrap().as_bytes().unwrap();
    let proof = request.arg("inputProof").unwrap().as_bytes().unwrap();
    assert!(ProofValidator::with_key(&KEYS.public).validate(ciphertext, proof));
    assert!(ledger.with_registry(|r| r.validator().validate(ciphertext, proof)));

    // submission and confirmation
    let state = session.record_play(1, 125).await.unwrap();
    assert_eq!(state.status, TransactionStatus::Confirmed);
    assert!(state.hash.is_some());
    assert!(state.error.is_none());
    assert!(session.is_success());

    let record = session.song_info(1).await.unwrap();
    assert_eq!(session.decrypt(&record.total_plays.unwrap()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_disconnected_distribution_fails_with_account_error() {
    let (ledger, session) = session();
    ledger.disconnect();

    let err = session.distribute_royalties(1, 1000).await.unwrap_err();
    assert!(matches!(err, ClientError::Account(_)));
    assert_eq!(session.state().status, TransactionStatus::Idle);
    assert!(session.hash().is_none());
    assert_eq!(ledger.pending_count(), 0);
}

#[tokio::test]
async fn test_concurrent_submission_rejected_while_pending() {
    let mut config = ClientConfig::insecure_testing();
    config.confirmation_timeout_ms = 50;
    let (ledger, session) = session_with(config);
    ledger.set_auto_mine(false);

    let pending = session
        .create_song(SongMetadata::new("Song", "Artist", "QmHash"))
        .await
        .unwrap();
    assert_eq!(pending.status, TransactionStatus::PendingConfirmation);
    assert!(pending.hash.is_some());
    assert!(session.is_loading());

    let err = session.record_play(1, 30).await.unwrap_err();
    assert_eq!(err, ClientError::ConcurrentSubmission);
    assert_eq!(session.state(), pending);
    assert_eq!(ledger.pending_count(), 1);

    assert_eq!(ledger.mine(), 1);
    let state = session.wait_for_confirmation(Duration::from_secs(1)).await.unwrap();
    assert_eq!(state.status, TransactionStatus::Confirmed);
    assert_eq!(state.hash, pending.hash);
}

#[tokio::test]
async fn test_rejected_submission_lands_in_failed() {
    let (ledger, session) = session();
    ledger.reject_next_submission("insufficient funds for gas");
    let err = session
        .create_song(SongMetadata::new("Song", "Artist", "QmHash"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Submission(_)));
    assert_eq!(session.state().status, TransactionStatus::Failed);
    assert!(session.error().unwrap().contains("insufficient funds"));

    // Failed is a resting state, the next submission proceeds
    let state = session
        .create_song(SongMetadata::new("Song", "Artist", "QmHash"))
        .await
        .unwrap();
    assert_eq!(state.status, TransactionStatus::Confirmed);
}

#[tokio::test]
async fn test_workflow_events_cover_every_step() {
    let (tx, mut rx) = mpsc::channel(64);
    let (_ledger, session) = session();
    let session = session.with_events(EventSink::new(tx));
    session
        .create_song(SongMetadata::new("Song", "Artist", "QmHash"))
        .await
        .unwrap();
    session.reset();
    session.record_play(1, 125).await.unwrap();
    drop(session);

    let mut completed = Vec::new();
    while let Some(event) = rx.recv().await {
        assert_ne!(event.status, StepStatus::Failed);
        if event.status == StepStatus::Completed && event.operation.to_string() == "recordPlay" {
            completed.push(event.step);
        }
    }
    assert_eq!(completed, WorkflowStep::ALL);
}

#[tokio::test]
async fn test_undrained_event_observer_does_not_block_session() {
    // receiver kept alive but never read
    let (tx, _rx) = mpsc::channel(2);
    let (_ledger, session) = session();
    let session = session.with_events(EventSink::new(tx));

    let created = tokio::time::timeout(
        Duration::from_secs(30),
        session.create_song(SongMetadata::new("Song", "Artist", "QmHash")),
    )
    .await
    .expect("session stalled on a full event channel")
    .unwrap();
    assert_eq!(created.status, TransactionStatus::Confirmed);

    // the next operation is not refused as concurrent
    let state = session.record_play(1, 125).await.unwrap();
    assert_eq!(state.status, TransactionStatus::Confirmed);
}

#[tokio::test]
async fn test_song_ids_come_from_receipts() {
    let (ledger, session) = session();
    let mut ids = Vec::new();
    for title in ["First", "Second"] {
        let state = session
            .create_song(SongMetadata::new(title, "Artist", "QmHash"))
            .await
            .unwrap();
        ids.push(ledger.returned_id(&state.hash.unwrap()));
        session.reset();
    }
    assert_eq!(ids, [Some(1), Some(2)]);

    let state = session.record_play(2, 30).await.unwrap();
    assert_eq!(ledger.returned_id(&state.hash.unwrap()), Some(2));
    assert_eq!(session.song_info(2).await.unwrap().title, "Second");
}

#[tokio::test]
async fn test_aggregates_across_plays_and_distributions() {
    let (ledger, session) = session();
    session
        .create_song(SongMetadata::new("Midnight", "Nova", "QmHash").with_royalty_rate(80))
        .await
        .unwrap();
    for duration in [125, 240, 61] {
        session.reset();
        session.record_play(1, duration).await.unwrap();
    }
    for amount in [1000, 250] {
        session.reset();
        session.distribute_royalties(1, amount).await.unwrap();
    }

    let record = session.song_info(1).await.unwrap();
    assert_eq!(record.royalty_rate, 80);
    assert!(record.is_active);
    assert!(!record.is_verified);
    assert!(record.updated_at >= record.created_at);
    assert_eq!(session.decrypt(&record.total_plays.unwrap()).await.unwrap(), 3);
    assert_eq!(session.decrypt(&record.total_earnings.unwrap()).await.unwrap(), 1250);

    let listening = ledger
        .with_registry(|r| r.listening_time(1).map(|v| v.cloned()))
        .unwrap()
        .unwrap();
    assert_eq!(engine().decrypt(&listening, &KEYS.private), Ok(426));
}

#[tokio::test]
async fn test_unregistered_key_reverts() {
    let ledger = Arc::new(InMemoryLedger::new(86_400));
    // only the other key is accepted by the contract
    ledger.register_key(&OTHER_KEYS.public);
    let session = StashSession::with_keys(
        ClientConfig::insecure_testing(),
        Arc::clone(&KEYS),
        ledger.clone(),
        ledger.clone(),
    )
    .unwrap();
    session
        .create_song(SongMetadata::new("Song", "Artist", "QmHash"))
        .await
        .unwrap();
    session.reset();

    let state = session.record_play(1, 125).await.unwrap();
    assert_eq!(state.status, TransactionStatus::Failed);
    assert!(state.hash.is_some());
    assert!(state.error.unwrap().contains("reverted"));
}
