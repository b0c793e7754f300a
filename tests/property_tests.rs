//! Property-Based Tests for the Stash Primitives
//!
//! Uses proptest to generate random inputs and verify that the encryption,
//! proof and ABI properties hold. Key generation dominates the cost, so one
//! key pair is shared and case counts stay low for the encrypting tests.

use once_cell::sync::Lazy;
use proptest::prelude::*;
use stash::contracts::{ContractCall, SongInfo};
use stash::fhe::{
    DomainValue, EncryptionEngine, FHEConfig, FHEOps, KeyPair, ProofValidator, ValueRange,
};

static KEYS: Lazy<KeyPair> =
    Lazy::new(|| KeyPair::generate(&FHEConfig::insecure_testing()).unwrap());

fn engine() -> EncryptionEngine {
    EncryptionEngine::new(FHEConfig::insecure_testing())
}

// =============================================================================
// PROPTEST STRATEGIES
// =============================================================================

/// Strategy for a range and a value inside it
fn value_in_range() -> impl Strategy<Value = (u64, ValueRange)> {
    prop_oneof![
        Just(ValueRange::royalty_rate()),
        Just(ValueRange::play_duration(86_400)),
        Just(ValueRange::up_to(255)),
        Just(ValueRange::FULL),
    ]
    .prop_flat_map(|range| (0..=range.max(), Just(range)))
}

/// Strategy for metadata strings
fn text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,40}"
}

fn byte_vec(len: impl Into<prop::collection::SizeRange>) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), len)
}

// =============================================================================
// ENCRYPTION PROPERTY TESTS
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    /// Property: decrypt(encrypt(v)) == v
    #[test]
    fn encryption_round_trips((value, range) in value_in_range()) {
        let domain = DomainValue::new(value, range).unwrap();
        let encrypted = engine().encrypt(&domain, &KEYS.public).unwrap();
        prop_assert_eq!(engine().decrypt(&encrypted, &KEYS.private).unwrap(), value);
    }

    /// Property: a fresh encryption validates, and only within ranges covering its own
    #[test]
    fn fresh_proofs_validate((value, range) in value_in_range()) {
        let validator = ProofValidator::with_key(&KEYS.public);
        let encrypted = engine()
            .encrypt(&DomainValue::new(value, range).unwrap(), &KEYS.public)
            .unwrap();
        prop_assert!(validator.validate_value(&encrypted, range));
        prop_assert_eq!(
            validator.declared_range(encrypted.ciphertext(), encrypted.proof().unwrap()),
            Some(range)
        );
        if range.max() > 0 {
            let narrower = ValueRange::up_to(range.max() - 1);
            prop_assert!(!validator.validate_value(&encrypted, narrower));
        }
    }

    /// Property: Enc(a) + Enc(b) decrypts to a + b mod 2^64
    #[test]
    fn addition_is_homomorphic(a in any::<u64>(), b in any::<u64>()) {
        let engine = engine();
        let x = engine.encrypt(&DomainValue::unbounded(a), &KEYS.public).unwrap();
        let y = engine.encrypt(&DomainValue::unbounded(b), &KEYS.public).unwrap();
        let sum = FHEOps::add(&x, &y, &KEYS.public).unwrap();
        prop_assert_eq!(engine.decrypt(&sum, &KEYS.private).unwrap(), a.wrapping_add(b));
        prop_assert!(sum.proof().is_none());
    }

    /// Property: Enc(a) * Enc(b) decrypts to a * b mod 2^64
    #[test]
    fn multiplication_is_homomorphic(a in any::<u64>(), b in any::<u64>()) {
        let engine = engine();
        let x = engine.encrypt(&DomainValue::unbounded(a), &KEYS.public).unwrap();
        let y = engine.encrypt(&DomainValue::unbounded(b), &KEYS.public).unwrap();
        let product = FHEOps::mul(&x, &y, &KEYS.public).unwrap();
        prop_assert_eq!(engine.decrypt(&product, &KEYS.private).unwrap(), a.wrapping_mul(b));
    }

    /// Property: scalar operations agree with plaintext arithmetic
    #[test]
    fn scalar_operations_match(a in any::<u64>(), s in any::<u64>()) {
        let engine = engine();
        let x = engine.encrypt(&DomainValue::unbounded(a), &KEYS.public).unwrap();
        let shifted = FHEOps::add_scalar(&x, s, &KEYS.public).unwrap();
        let scaled = FHEOps::mul_scalar(&x, s, &KEYS.public).unwrap();
        prop_assert_eq!(engine.decrypt(&shifted, &KEYS.private).unwrap(), a.wrapping_add(s));
        prop_assert_eq!(engine.decrypt(&scaled, &KEYS.private).unwrap(), a.wrapping_mul(s));
    }

    /// Property: flipping any single ciphertext byte invalidates the proof
    #[test]
    fn tampered_ciphertext_rejected(value in 0u64..=100, index in any::<prop::sample::Index>(), bit in 0u8..8) {
        let validator = ProofValidator::with_key(&KEYS.public);
        let encrypted = engine()
            .encrypt(&DomainValue::new(value, ValueRange::royalty_rate()).unwrap(), &KEYS.public)
            .unwrap();
        let mut tampered = encrypted.ciphertext().to_vec();
        let position = index.index(tampered.len());
        tampered[position] ^= 1 << bit;
        prop_assert!(!validator.validate(&tampered, encrypted.proof().unwrap()));
    }

    /// Property: flipping any single proof byte invalidates the proof
    #[test]
    fn tampered_proof_rejected(value in 0u64..=100, index in any::<prop::sample::Index>(), bit in 0u8..8) {
        let validator = ProofValidator::with_key(&KEYS.public);
        let encrypted = engine()
            .encrypt(&DomainValue::new(value, ValueRange::royalty_rate()).unwrap(), &KEYS.public)
            .unwrap();
        let mut tampered = encrypted.proof().unwrap().to_vec();
        let position = index.index(tampered.len());
        tampered[position] ^= 1 << bit;
        prop_assert!(!validator.validate(encrypted.ciphertext(), &tampered));
    }
}

// =============================================================================
// DOMAIN AND ABI PROPERTY TESTS
// =============================================================================

proptest! {
    /// Property: values above the range never construct
    #[test]
    fn out_of_range_values_rejected(max in 0u64..u64::MAX, excess in 1u64..1000) {
        let range = ValueRange::up_to(max);
        let value = max.saturating_add(excess);
        prop_assume!(value > max);
        prop_assert!(!range.contains(value));
        prop_assert!(DomainValue::new(value, range).is_err());
    }

    /// Property: a range covers every range with a smaller or equal maximum
    #[test]
    fn range_cover_is_ordered(a in any::<u64>(), b in any::<u64>()) {
        let (x, y) = (ValueRange::up_to(a), ValueRange::up_to(b));
        prop_assert_eq!(x.covers(&y), a >= b);
    }

    /// Property: encoded calls decode to the same call
    #[test]
    fn contract_calls_survive_encoding(
        song_id in 1u64..u64::MAX,
        title in text(),
        artist in text(),
        rate in 0u64..=100,
        ciphertext in byte_vec(0..256),
        proof in byte_vec(0..256),
    ) {
        let calls = [
            ContractCall::create_song(&title, &artist, "QmHash", rate),
            ContractCall::record_play(song_id, ciphertext.clone(), proof.clone()),
            ContractCall::distribute_royalties(song_id, ciphertext, proof),
            ContractCall::get_info(song_id),
        ];
        for call in calls {
            let encoded = call.encode().unwrap();
            prop_assert_eq!(ContractCall::decode(&encoded).unwrap(), call);
        }
    }

    /// Property: truncated call data never decodes
    #[test]
    fn truncated_calls_rejected(song_id in 1u64..u64::MAX, cut in 1usize..16) {
        let encoded = ContractCall::get_info(song_id).encode().unwrap();
        let end = encoded.len().saturating_sub(cut);
        prop_assert!(ContractCall::decode(&encoded[..end]).is_err());
    }

    /// Property: song info returned by the contract decodes unchanged
    #[test]
    fn song_info_survives_encoding(
        title in text(),
        artist in text(),
        plays in byte_vec(0..128),
        rate in 0u8..=100,
        active in any::<bool>(),
        owner in prop::array::uniform20(any::<u8>()),
        created in any::<u64>(),
    ) {
        let info = SongInfo {
            title,
            artist,
            ipfs_hash: "QmHash".into(),
            total_plays: plays,
            total_earnings: Vec::new(),
            royalty_rate: rate,
            is_active: active,
            is_verified: false,
            owner,
            created_at: created,
            updated_at: created,
        };
        prop_assert_eq!(SongInfo::decode(&info.encode().unwrap()).unwrap(), info);
    }
}
