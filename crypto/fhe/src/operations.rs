//! Encryption, decryption and homomorphic evaluation
//!
//! Evaluation only needs the public key. Results of homomorphic operations
//! are derived values and never carry an input proof.

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::ciphertext::{Ciphertext, EncryptedValue, MAX_QUADRATIC_TERMS};
use crate::domain::DomainValue;
use crate::keys::{KeyRef, PrivateKey, PublicKey};
use crate::{os_seeded_rng, range_proof, FHEConfig, FHEError, FHEResult};

/// Trait for homomorphic operations
pub trait HomomorphicOps {
    /// Add two encrypted values
    fn add(&self, other: &Self, public_key: &PublicKey) -> FHEResult<Self>
    where
        Self: Sized;

    /// Multiply two encrypted values
    fn mul(&self, other: &Self, public_key: &PublicKey) -> FHEResult<Self>
    where
        Self: Sized;
}

impl HomomorphicOps for EncryptedValue {
    fn add(&self, other: &Self, public_key: &PublicKey) -> FHEResult<Self> {
        FHEOps::add(self, other, public_key)
    }

    fn mul(&self, other: &Self, public_key: &PublicKey) -> FHEResult<Self> {
        FHEOps::mul(self, other, public_key)
    }
}

/// Encrypts plaintexts with a bound range proof and decrypts results
#[derive(Clone, Debug, Default)]
pub struct EncryptionEngine {
    config: FHEConfig,
}

impl EncryptionEngine {
    pub fn new(config: FHEConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FHEConfig {
        &self.config
    }

    /// Encrypt `value` under `public_key`. The returned value carries a range
    /// proof for `value.range()` bound to the ciphertext bytes.
    pub fn encrypt(&self, value: &DomainValue, public_key: &PublicKey) -> FHEResult<EncryptedValue> {
        if public_key.modulus_bits() < self.config.modulus_bits {
            return Err(FHEError::InvalidKey(format!(
                "{}-bit modulus below configured {} bits",
                public_key.modulus_bits(),
                self.config.modulus_bits
            )));
        }
        let mut rng = os_seeded_rng().map_err(|e| FHEError::EncryptionFailed(e.to_string()))?;
        let (ciphertext, proof) = range_proof::encrypt_with_proof(value, public_key, &mut rng)?;
        tracing::trace!(
            key_id = %public_key.id(),
            range_max = value.range().max(),
            ciphertext_len = ciphertext.len(),
            proof_len = proof.len(),
            "encrypted value"
        );
        Ok(EncryptedValue::from_parts(
            ciphertext,
            public_key.id(),
            Some(proof),
        ))
    }

    /// Decrypt to a `u64`. Quadratic results are reduced mod 2^64.
    pub fn decrypt(&self, value: &EncryptedValue, private_key: &PrivateKey) -> FHEResult<u64> {
        if !private_key.corresponds_to(&value.public_key_ref()) {
            return Err(FHEError::DecryptionFailed(format!(
                "private key {} does not match value key {}",
                private_key.public_key().id(),
                value.public_key_ref()
            )));
        }
        let ciphertext = Ciphertext::decode(value.ciphertext(), private_key.public_key())
            .map_err(|e| FHEError::DecryptionFailed(e.to_string()))?;

        let raw = private_key.raw();
        let public = raw.public();
        let plaintext = match &ciphertext {
            Ciphertext::Linear { a, beta } => public.add_mod_n(a, &raw.decrypt(beta)?),
            Ciphertext::Quadratic { alpha, pairs } => {
                let mut acc = raw.decrypt(alpha)?;
                for (left, right) in pairs {
                    let product = raw.decrypt(left)? * raw.decrypt(right)?;
                    acc = public.add_mod_n(&acc, &(product % &public.n));
                }
                acc
            }
        };
        Ok(low_u64(&plaintext))
    }

    /// Homomorphic addition, see [`FHEOps::add`]
    pub fn homomorphic_add(
        &self,
        a: &EncryptedValue,
        b: &EncryptedValue,
        public_key: &PublicKey,
    ) -> FHEResult<EncryptedValue> {
        FHEOps::add(a, b, public_key)
    }

    /// Homomorphic multiplication, see [`FHEOps::mul`]
    pub fn homomorphic_multiply(
        &self,
        a: &EncryptedValue,
        b: &EncryptedValue,
        public_key: &PublicKey,
    ) -> FHEResult<EncryptedValue> {
        FHEOps::mul(a, b, public_key)
    }
}

/// Homomorphic operations over [`EncryptedValue`]s
pub struct FHEOps;

impl FHEOps {
    /// Encrypted addition
    pub fn add(
        a: &EncryptedValue,
        b: &EncryptedValue,
        public_key: &PublicKey,
    ) -> FHEResult<EncryptedValue> {
        let (x, y) = Self::operands(a, b, public_key)?;
        let raw = public_key.raw();
        let sum = match (x, y) {
            (Ciphertext::Linear { a: a1, beta: b1 }, Ciphertext::Linear { a: a2, beta: b2 }) => {
                Ciphertext::Linear {
                    a: raw.add_mod_n(&a1, &a2),
                    beta: raw.mul(&b1, &b2),
                }
            }
            (x, y) => {
                let (alpha1, mut pairs) = Self::lift(x, public_key);
                let (alpha2, more) = Self::lift(y, public_key);
                if pairs.len() + more.len() > MAX_QUADRATIC_TERMS {
                    return Err(FHEError::DegreeExceeded);
                }
                pairs.extend(more);
                Ciphertext::Quadratic {
                    alpha: raw.mul(&alpha1, &alpha2),
                    pairs,
                }
            }
        };
        EncryptedValue::derived(&sum, public_key)
    }

    /// Encrypted multiplication. Both operands must be linear.
    pub fn mul(
        a: &EncryptedValue,
        b: &EncryptedValue,
        public_key: &PublicKey,
    ) -> FHEResult<EncryptedValue> {
        let (x, y) = Self::operands(a, b, public_key)?;
        let raw = public_key.raw();
        let product = match (x, y) {
            (Ciphertext::Linear { a: a1, beta: b1 }, Ciphertext::Linear { a: a2, beta: b2 }) => {
                // alpha = Enc(a1*a2) * b1^a2 * b2^a1
                let alpha = raw.mul(
                    &raw.mul(&raw.g_pow(&(&a1 * &a2)), &raw.pow(&b1, &a2)),
                    &raw.pow(&b2, &a1),
                );
                Ciphertext::Quadratic {
                    alpha,
                    pairs: vec![(b1, b2)],
                }
            }
            _ => return Err(FHEError::DegreeExceeded),
        };
        EncryptedValue::derived(&product, public_key)
    }

    /// Add a public constant
    pub fn add_scalar(
        a: &EncryptedValue,
        scalar: u64,
        public_key: &PublicKey,
    ) -> FHEResult<EncryptedValue> {
        Self::check_key(a.public_key_ref(), public_key)?;
        let raw = public_key.raw();
        let s = BigUint::from(scalar);
        let result = match Ciphertext::decode(a.ciphertext(), public_key)? {
            Ciphertext::Linear { a, beta } => Ciphertext::Linear {
                a: raw.add_mod_n(&a, &s),
                beta,
            },
            Ciphertext::Quadratic { alpha, pairs } => Ciphertext::Quadratic {
                alpha: raw.mul(&alpha, &raw.g_pow(&s)),
                pairs,
            },
        };
        EncryptedValue::derived(&result, public_key)
    }

    /// Multiply by a public constant
    pub fn mul_scalar(
        a: &EncryptedValue,
        scalar: u64,
        public_key: &PublicKey,
    ) -> FHEResult<EncryptedValue> {
        Self::check_key(a.public_key_ref(), public_key)?;
        let raw = public_key.raw();
        let s = BigUint::from(scalar);
        let result = match Ciphertext::decode(a.ciphertext(), public_key)? {
            Ciphertext::Linear { a, beta } => Ciphertext::Linear {
                a: &a * &s % &raw.n,
                beta: raw.pow(&beta, &s),
            },
            Ciphertext::Quadratic { alpha, pairs } => Ciphertext::Quadratic {
                alpha: raw.pow(&alpha, &s),
                pairs: pairs
                    .into_iter()
                    .map(|(left, right)| (raw.pow(&left, &s), right))
                    .collect(),
            },
        };
        EncryptedValue::derived(&result, public_key)
    }

    /// Public, non-hiding encryption of zero. Used as the initial value of
    /// encrypted accumulators.
    pub fn zero(public_key: &PublicKey) -> FHEResult<EncryptedValue> {
        let zero = Ciphertext::Linear {
            a: BigUint::zero(),
            beta: BigUint::one(),
        };
        EncryptedValue::derived(&zero, public_key)
    }

    fn operands(
        a: &EncryptedValue,
        b: &EncryptedValue,
        public_key: &PublicKey,
    ) -> FHEResult<(Ciphertext, Ciphertext)> {
        if a.public_key_ref() != b.public_key_ref() {
            return Err(FHEError::KeyMismatch {
                left: a.public_key_ref().to_string(),
                right: b.public_key_ref().to_string(),
            });
        }
        Self::check_key(a.public_key_ref(), public_key)?;
        Ok((
            Ciphertext::decode(a.ciphertext(), public_key)?,
            Ciphertext::decode(b.ciphertext(), public_key)?,
        ))
    }

    fn check_key(key_ref: KeyRef, public_key: &PublicKey) -> FHEResult<()> {
        if key_ref != public_key.id() {
            return Err(FHEError::KeyMismatch {
                left: key_ref.to_string(),
                right: public_key.id().to_string(),
            });
        }
        Ok(())
    }

    /// View any ciphertext as `(alpha, pairs)`.
    fn lift(ciphertext: Ciphertext, public_key: &PublicKey) -> (BigUint, Vec<(BigUint, BigUint)>) {
        match ciphertext {
            Ciphertext::Linear { a, beta } => {
                let raw = public_key.raw();
                (raw.mul(&raw.g_pow(&a), &beta), Vec::new())
            }
            Ciphertext::Quadratic { alpha, pairs } => (alpha, pairs),
        }
    }
}

/// Low 64 bits of a plaintext
fn low_u64(value: &BigUint) -> u64 {
    value.iter_u64_digits().next().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ciphertext::CiphertextLevel;
    use crate::domain::ValueRange;
    use crate::test_keys::{key_pair, other_key_pair, test_config};

    fn engine() -> EncryptionEngine {
        EncryptionEngine::new(test_config())
    }

    fn enc(value: u64) -> EncryptedValue {
        engine()
            .encrypt(&DomainValue::unbounded(value), &key_pair().public)
            .unwrap()
    }

    fn dec(value: &EncryptedValue) -> u64 {
        engine().decrypt(value, &key_pair().private).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        for value in [0, 1, 125, 1000, u64::MAX] {
            assert_eq!(dec(&enc(value)), value);
        }
    }

    #[test]
    fn test_encryption_is_randomized() {
        assert_ne!(enc(7).ciphertext(), enc(7).ciphertext());
    }

    #[test]
    fn test_fresh_values_carry_proof() {
        let value = engine()
            .encrypt(
                &DomainValue::new(90, ValueRange::royalty_rate()).unwrap(),
                &key_pair().public,
            )
            .unwrap();
        assert!(value.proof().is_some());
        assert_eq!(value.public_key_ref(), key_pair().id());
        assert_eq!(value.level(), Some(CiphertextLevel::Linear));
    }

    #[test]
    fn test_decrypt_with_wrong_key() {
        let value = enc(42);
        let result = engine().decrypt(&value, &other_key_pair().private);
        assert!(matches!(result, Err(FHEError::DecryptionFailed(_))));
    }

    #[test]
    fn test_decrypt_malformed_ciphertext() {
        let value = enc(42);
        let (mut bytes, key_ref, proof) = value.into_parts();
        bytes.truncate(bytes.len() - 3);
        let broken = EncryptedValue::from_parts(bytes, key_ref, proof);
        assert!(matches!(
            engine().decrypt(&broken, &key_pair().private),
            Err(FHEError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_add() {
        let key = &key_pair().public;
        let sum = FHEOps::add(&enc(1000), &enc(234), key).unwrap();
        assert_eq!(dec(&sum), 1234);
        assert!(sum.proof().is_none());
    }

    #[test]
    fn test_add_wraps_at_domain_modulus() {
        let key = &key_pair().public;
        let sum = FHEOps::add(&enc(u64::MAX), &enc(2), key).unwrap();
        assert_eq!(dec(&sum), 1);
    }

    #[test]
    fn test_multiply() {
        let key = &key_pair().public;
        let product = FHEOps::mul(&enc(125), &enc(90), key).unwrap();
        assert_eq!(product.level(), Some(CiphertextLevel::Quadratic));
        assert_eq!(dec(&product), 11_250);
    }

    #[test]
    fn test_multiply_wraps_at_domain_modulus() {
        let key = &key_pair().public;
        let product = FHEOps::mul(&enc(u64::MAX), &enc(u64::MAX), key).unwrap();
        assert_eq!(dec(&product), 1);
    }

    #[test]
    fn test_quadratic_sums() {
        let key = &key_pair().public;
        let p1 = FHEOps::mul(&enc(3), &enc(4), key).unwrap();
        let p2 = FHEOps::mul(&enc(5), &enc(6), key).unwrap();
        let total = FHEOps::add(&p1, &p2, key).unwrap();
        assert_eq!(dec(&total), 42);

        let mixed = FHEOps::add(&total, &enc(8), key).unwrap();
        assert_eq!(dec(&mixed), 50);
        let mixed = FHEOps::add(&enc(8), &total, key).unwrap();
        assert_eq!(dec(&mixed), 50);
    }

    #[test]
    fn test_second_multiplication_rejected() {
        let key = &key_pair().public;
        let product = FHEOps::mul(&enc(3), &enc(4), key).unwrap();
        assert_eq!(
            FHEOps::mul(&product, &enc(2), key),
            Err(FHEError::DegreeExceeded)
        );
        assert_eq!(
            FHEOps::mul(&enc(2), &product, key),
            Err(FHEError::DegreeExceeded)
        );
    }

    #[test]
    fn test_scalar_operations() {
        let key = &key_pair().public;
        assert_eq!(dec(&FHEOps::add_scalar(&enc(41), 1, key).unwrap()), 42);
        assert_eq!(dec(&FHEOps::mul_scalar(&enc(21), 2, key).unwrap()), 42);

        let product = FHEOps::mul(&enc(6), &enc(7), key).unwrap();
        assert_eq!(dec(&FHEOps::add_scalar(&product, 8, key).unwrap()), 50);
        assert_eq!(dec(&FHEOps::mul_scalar(&product, 3, key).unwrap()), 126);
    }

    #[test]
    fn test_zero_accumulator() {
        let key = &key_pair().public;
        let mut acc = FHEOps::zero(key).unwrap();
        assert_eq!(dec(&acc), 0);
        for value in [10, 20, 30] {
            acc = acc.add(&enc(value), key).unwrap();
        }
        assert_eq!(dec(&acc), 60);
    }

    #[test]
    fn test_key_mismatch() {
        let other = &other_key_pair().public;
        let foreign = engine()
            .encrypt(&DomainValue::unbounded(1), other)
            .unwrap();
        let result = FHEOps::add(&enc(1), &foreign, &key_pair().public);
        assert!(matches!(result, Err(FHEError::KeyMismatch { .. })));
        let result = FHEOps::mul(&enc(1), &enc(2), other);
        assert!(matches!(result, Err(FHEError::KeyMismatch { .. })));
        let result = FHEOps::add_scalar(&enc(1), 1, other);
        assert!(matches!(result, Err(FHEError::KeyMismatch { .. })));
    }

    #[test]
    fn test_engine_rejects_undersized_key() {
        let config = FHEConfig {
            modulus_bits: 1024,
            ..test_config()
        };
        let result = EncryptionEngine::new(config).encrypt(&DomainValue::unbounded(1), &key_pair().public);
        assert!(matches!(result, Err(FHEError::InvalidKey(_))));
    }

    #[test]
    fn test_engine_wrappers() {
        let key = &key_pair().public;
        let engine = engine();
        let sum = engine.homomorphic_add(&enc(2), &enc(3), key).unwrap();
        let product = engine.homomorphic_multiply(&sum, &enc(4), key).unwrap();
        assert_eq!(dec(&product), 20);
    }
}
