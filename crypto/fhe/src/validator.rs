//! Proof validation for submitted ciphertexts
//!
//! The validator keeps a keyring of public keys it accepts ciphertexts under.
//! Validation never errors: anything malformed, tampered with or produced under
//! an unknown key is simply rejected.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::ciphertext::{ciphertext_key_ref, EncryptedValue};
use crate::domain::ValueRange;
use crate::keys::{KeyRef, PublicKey};
use crate::range_proof;

/// Verifies ciphertext/proof pairs against registered public keys
#[derive(Debug, Default)]
pub struct ProofValidator {
    keys: RwLock<HashMap<KeyRef, PublicKey>>,
}

impl ProofValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validator that accepts ciphertexts under a single key
    pub fn with_key(public_key: &PublicKey) -> Self {
        let validator = Self::new();
        validator.register_key(public_key);
        validator
    }

    /// Accept ciphertexts produced under `public_key`
    pub fn register_key(&self, public_key: &PublicKey) {
        self.keys.write().insert(public_key.id(), public_key.clone());
    }

    pub fn knows_key(&self, key_ref: &KeyRef) -> bool {
        self.keys.read().contains_key(key_ref)
    }

    /// Public key registered under `key_ref`
    pub fn public_key(&self, key_ref: &KeyRef) -> Option<PublicKey> {
        self.keys.read().get(key_ref).cloned()
    }

    /// Whether `proof` attests that `ciphertext` encrypts a value inside the
    /// range declared by the proof
    pub fn validate(&self, ciphertext: &[u8], proof: &[u8]) -> bool {
        self.declared_range(ciphertext, proof).is_some()
    }

    /// Like [`ProofValidator::validate`], additionally requiring the declared
    /// range to lie inside `expected`
    pub fn validate_in_range(&self, ciphertext: &[u8], proof: &[u8], expected: ValueRange) -> bool {
        self.declared_range(ciphertext, proof)
            .map_or(false, |declared| expected.covers(&declared))
    }

    /// Validate a fresh [`EncryptedValue`]. Values without a proof, or whose
    /// key reference disagrees with the ciphertext header, are rejected.
    pub fn validate_value(&self, value: &EncryptedValue, expected: ValueRange) -> bool {
        if ciphertext_key_ref(value.ciphertext()) != Some(value.public_key_ref()) {
            return false;
        }
        match value.proof() {
            Some(proof) => self.validate_in_range(value.ciphertext(), proof, expected),
            None => false,
        }
    }

    /// The range a valid proof declares, `None` when validation fails
    pub fn declared_range(&self, ciphertext: &[u8], proof: &[u8]) -> Option<ValueRange> {
        let key_ref = ciphertext_key_ref(ciphertext)?;
        let key = self.public_key(&key_ref)?;
        let range = range_proof::verify(ciphertext, proof, &key);
        if range.is_none() {
            tracing::debug!(key_id = %key_ref, "range proof rejected");
        }
        range
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainValue;
    use crate::operations::{EncryptionEngine, FHEOps};
    use crate::test_keys::{key_pair, other_key_pair, test_config};

    fn encrypt(value: u64, range: ValueRange) -> EncryptedValue {
        EncryptionEngine::new(test_config())
            .encrypt(&DomainValue::new(value, range).unwrap(), &key_pair().public)
            .unwrap()
    }

    #[test]
    fn test_validate_fresh_value() {
        let validator = ProofValidator::with_key(&key_pair().public);
        let value = encrypt(125, ValueRange::play_duration(86_400));
        let proof = value.proof().unwrap();
        assert!(validator.validate(value.ciphertext(), proof));
        assert_eq!(
            validator.declared_range(value.ciphertext(), proof),
            Some(ValueRange::play_duration(86_400))
        );
    }

    #[test]
    fn test_validate_in_range() {
        let validator = ProofValidator::with_key(&key_pair().public);
        let rate = encrypt(90, ValueRange::royalty_rate());
        let wide = encrypt(90, ValueRange::FULL);

        assert!(validator.validate_value(&rate, ValueRange::royalty_rate()));
        assert!(validator.validate_value(&rate, ValueRange::FULL));
        // valid proof, but for a wider range than required
        assert!(validator.validate_value(&wide, ValueRange::FULL));
        assert!(!validator.validate_value(&wide, ValueRange::royalty_rate()));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let validator = ProofValidator::with_key(&other_key_pair().public);
        let value = encrypt(1, ValueRange::royalty_rate());
        assert!(!validator.validate(value.ciphertext(), value.proof().unwrap()));

        validator.register_key(&key_pair().public);
        assert!(validator.knows_key(&key_pair().id()));
        assert!(validator.validate(value.ciphertext(), value.proof().unwrap()));
    }

    #[test]
    fn test_every_ciphertext_byte_is_bound() {
        let validator = ProofValidator::with_key(&key_pair().public);
        let value = encrypt(7, ValueRange::up_to(15));
        let proof = value.proof().unwrap();
        for index in 0..value.ciphertext().len() {
            let mut tampered = value.ciphertext().to_vec();
            tampered[index] ^= 0x04;
            assert!(!validator.validate(&tampered, proof), "byte {index}");
        }
    }

    #[test]
    fn test_derived_values_rejected() {
        let validator = ProofValidator::with_key(&key_pair().public);
        let key = &key_pair().public;
        let a = encrypt(1, ValueRange::royalty_rate());
        let sum = FHEOps::add(&a, &a, key).unwrap();
        assert!(!validator.validate_value(&sum, ValueRange::FULL));
        // the proof of an operand does not transfer to the result
        assert!(!validator.validate(sum.ciphertext(), a.proof().unwrap()));
    }

    #[test]
    fn test_garbage_never_panics() {
        let validator = ProofValidator::with_key(&key_pair().public);
        assert!(!validator.validate(&[], &[]));
        assert!(!validator.validate(&[1; 3], &[1; 3]));
        let value = encrypt(3, ValueRange::royalty_rate());
        assert!(!validator.validate(value.ciphertext(), &vec![0xff; 4096]));
    }
}
