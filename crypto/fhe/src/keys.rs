//! Key generation and management
//!
//! - PublicKey: the Paillier modulus `n`, shareable, used for encryption,
//!   homomorphic evaluation and proof verification
//! - PrivateKey: the factorisation `p || q`, held by the session owner only
//! - KeyRef: blake3 identifier of the public key bytes, carried by every ciphertext

use std::sync::Arc;

use num_bigint::BigUint;
use num_integer::Integer;
use rand::rngs::OsRng;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use crate::codec::{put_fixed, ByteReader};
use crate::paillier::{generate_prime, RawPrivateKey, RawPublicKey};
use crate::{FHEConfig, FHEError, FHEResult, MIN_MODULUS_BITS};

/// Size of a key reference in bytes
pub const KEY_REF_SIZE: usize = 32;

const KEY_REF_DOMAIN: &[u8] = b"stash-fhe/public-key/v1";

/// Identifies the public key a ciphertext was produced under
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyRef([u8; KEY_REF_SIZE]);

impl KeyRef {
    pub fn from_bytes(bytes: [u8; KEY_REF_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_REF_SIZE] {
        &self.0
    }

    /// Short hex prefix, safe for logs
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..8])
    }

    fn of_public_key(bytes: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(KEY_REF_DOMAIN);
        hasher.update(bytes);
        Self(*hasher.finalize().as_bytes())
    }
}

impl std::fmt::Debug for KeyRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyRef({})", self.short_hex())
    }
}

impl std::fmt::Display for KeyRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.short_hex())
    }
}

/// Public key for encryption and homomorphic evaluation
/// Can be published for anyone to encrypt values for this owner
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    raw: RawPublicKey,
    modulus_bits: u32,
    bytes: Vec<u8>,
    id: KeyRef,
}

impl PublicKey {
    fn from_raw(raw: RawPublicKey, modulus_bits: u32) -> FHEResult<Self> {
        let mut bytes = Vec::with_capacity(modulus_bits as usize / 8);
        put_fixed(&mut bytes, &raw.n, modulus_bits as usize / 8)?;
        let id = KeyRef::of_public_key(&bytes);
        Ok(Self {
            raw,
            modulus_bits,
            bytes,
            id,
        })
    }

    /// Get a compact identifier for this public key
    pub fn id(&self) -> KeyRef {
        self.id
    }

    /// Modulus size in bits
    pub fn modulus_bits(&self) -> u32 {
        self.modulus_bits
    }

    /// Length in bytes of an element of Z_n
    pub fn modulus_len(&self) -> usize {
        self.modulus_bits as usize / 8
    }

    /// Length in bytes of an element of Z_{n^2}
    pub fn ciphertext_component_len(&self) -> usize {
        self.modulus_len() * 2
    }

    pub(crate) fn raw(&self) -> &RawPublicKey {
        &self.raw
    }

    /// Serialize to fixed-length big-endian bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    /// Deserialize from bytes produced by [`PublicKey::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> FHEResult<Self> {
        let modulus_bits = checked_modulus_bits(bytes.len())?;
        let n = BigUint::from_bytes_be(bytes);
        if n.bits() != u64::from(modulus_bits) || n.is_even() {
            return Err(FHEError::InvalidKey(
                "modulus must be odd and use its full width".into(),
            ));
        }
        Self::from_raw(RawPublicKey::new(n), modulus_bits)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKey")
            .field("id", &self.id)
            .field("modulus_bits", &self.modulus_bits)
            .finish()
    }
}

/// Private key for decryption
/// Must be kept secret by the session owner
#[derive(Clone)]
pub struct PrivateKey {
    raw: RawPrivateKey,
    public: PublicKey,
}

impl PrivateKey {
    fn from_primes(p: BigUint, q: BigUint, modulus_bits: u32) -> FHEResult<Self> {
        let raw = RawPrivateKey::from_primes(p, q)?;
        if raw.public().n.bits() != u64::from(modulus_bits) {
            return Err(FHEError::InvalidKey("modulus width mismatch".into()));
        }
        let public = PublicKey::from_raw(raw.public().clone(), modulus_bits)?;
        Ok(Self { raw, public })
    }

    /// Public half of this key
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Whether this key decrypts values produced under `key_ref`
    pub fn corresponds_to(&self, key_ref: &KeyRef) -> bool {
        self.public.id() == *key_ref
    }

    pub(crate) fn raw(&self) -> &RawPrivateKey {
        &self.raw
    }

    /// Serialize as `p || q`, each padded to half the modulus length
    pub fn to_bytes(&self) -> FHEResult<Zeroizing<Vec<u8>>> {
        let half = self.public.modulus_len() / 2;
        let mut out = Zeroizing::new(Vec::with_capacity(half * 2));
        put_fixed(&mut out, &self.raw.p, half)?;
        put_fixed(&mut out, &self.raw.q, half)?;
        Ok(out)
    }

    /// Deserialize from bytes produced by [`PrivateKey::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> FHEResult<Self> {
        let modulus_bits = checked_modulus_bits(bytes.len())?;
        let half = bytes.len() / 2;
        let mut reader = ByteReader::new(bytes);
        let (p, q) = match (reader.big(half), reader.big(half)) {
            (Some(p), Some(q)) => (p, q),
            _ => return Err(FHEError::InvalidKey("truncated private key".into())),
        };
        Self::from_primes(p, q, modulus_bits)
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public_id", &self.public.id())
            .finish_non_exhaustive()
    }
}

/// Key pair owned by one client session
#[derive(Clone, Debug)]
pub struct KeyPair {
    pub public: PublicKey,
    pub private: PrivateKey,
}

impl KeyPair {
    /// Generate a new key pair from the operating system CSPRNG
    pub fn generate(config: &FHEConfig) -> FHEResult<Self> {
        config.validate()?;

        let mut seed = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|e| FHEError::KeyGenerationFailed(e.to_string()))?;
        let mut rng = ChaCha20Rng::from_seed(seed);
        seed.zeroize();

        Self::generate_with_rng(config, &mut rng)
    }

    /// Generate a key pair from a caller supplied CSPRNG
    pub fn generate_with_rng<R: RngCore + rand::CryptoRng>(
        config: &FHEConfig,
        rng: &mut R,
    ) -> FHEResult<Self> {
        config.validate()?;
        let prime_bits = u64::from(config.modulus_bits / 2);
        loop {
            let p = generate_prime(prime_bits, rng)?;
            let q = generate_prime(prime_bits, rng)?;
            if p == q {
                continue;
            }
            let private = PrivateKey::from_primes(p, q, config.modulus_bits)?;
            tracing::debug!(key_id = %private.public_key().id(), "generated key pair");
            return Ok(Self {
                public: private.public_key().clone(),
                private,
            });
        }
    }

    /// Identifier of the public half
    pub fn id(&self) -> KeyRef {
        self.public.id()
    }
}

/// Holds the key pair of the current session
///
/// Keys are created on demand and dropped when the session ends.
#[derive(Debug)]
pub struct KeyManager {
    config: FHEConfig,
    current: Option<Arc<KeyPair>>,
}

impl KeyManager {
    pub fn new(config: FHEConfig) -> Self {
        Self {
            config,
            current: None,
        }
    }

    pub fn config(&self) -> &FHEConfig {
        &self.config
    }

    /// Generate a fresh key pair and make it the session key
    pub fn generate_key_pair(&mut self) -> FHEResult<Arc<KeyPair>> {
        let pair = Arc::new(KeyPair::generate(&self.config)?);
        self.current = Some(Arc::clone(&pair));
        Ok(pair)
    }

    /// Install an existing key pair as the session key
    pub fn install(&mut self, pair: KeyPair) -> Arc<KeyPair> {
        let pair = Arc::new(pair);
        self.current = Some(Arc::clone(&pair));
        pair
    }

    /// The session key pair, generating one on first use
    pub fn get_or_generate(&mut self) -> FHEResult<Arc<KeyPair>> {
        match &self.current {
            Some(pair) => Ok(Arc::clone(pair)),
            None => self.generate_key_pair(),
        }
    }

    pub fn current(&self) -> Option<Arc<KeyPair>> {
        self.current.clone()
    }

    pub fn public_key(&self) -> Option<&PublicKey> {
        self.current.as_deref().map(|pair| &pair.public)
    }

    /// Drop the session key
    pub fn clear(&mut self) {
        self.current = None;
    }
}

fn checked_modulus_bits(len: usize) -> FHEResult<u32> {
    let bits = u32::try_from(len.saturating_mul(8))
        .map_err(|_| FHEError::InvalidKey("key too large".into()))?;
    if bits < MIN_MODULUS_BITS || bits % 16 != 0 {
        return Err(FHEError::InvalidKey(format!(
            "unsupported modulus size: {} bits",
            bits
        )));
    }
    Ok(bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_keys::{key_pair, other_key_pair};

    #[test]
    fn test_key_sizes() {
        let pair = key_pair();
        let config = FHEConfig::insecure_testing();
        assert_eq!(pair.public.modulus_bits(), config.modulus_bits);
        assert_eq!(pair.public.to_bytes().len(), config.modulus_bits as usize / 8);
        assert_eq!(
            pair.private.to_bytes().unwrap().len(),
            config.modulus_bits as usize / 8
        );
    }

    #[test]
    fn test_public_key_roundtrip() {
        let pair = key_pair();
        let restored = PublicKey::from_bytes(&pair.public.to_bytes()).unwrap();
        assert_eq!(restored, pair.public);
        assert_eq!(restored.id(), pair.id());
    }

    #[test]
    fn test_private_key_roundtrip() {
        let pair = key_pair();
        let bytes = pair.private.to_bytes().unwrap();
        let restored = PrivateKey::from_bytes(&bytes).unwrap();
        assert!(restored.corresponds_to(&pair.id()));
        assert_eq!(restored.public_key(), &pair.public);
    }

    #[test]
    fn test_distinct_keys_have_distinct_refs() {
        assert_ne!(key_pair().id(), other_key_pair().id());
        assert!(!key_pair().private.corresponds_to(&other_key_pair().id()));
    }

    #[test]
    fn test_invalid_public_key_bytes() {
        assert!(PublicKey::from_bytes(&[]).is_err());
        assert!(PublicKey::from_bytes(&[0xff; 10]).is_err());
        // even modulus
        assert!(PublicKey::from_bytes(&[0xfe; 64]).is_err());
        // leading zero byte
        let mut bytes = vec![0xff; 64];
        bytes[0] = 0;
        assert!(PublicKey::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_debug_hides_factors() {
        let pair = key_pair();
        let debug = format!("{:?}", pair.private);
        assert!(debug.contains(&pair.id().short_hex()));
        assert!(!debug.contains(&pair.private.raw().p.to_string()));
    }

    #[test]
    fn test_key_manager_lifecycle() {
        let mut manager = KeyManager::new(FHEConfig::insecure_testing());
        assert!(manager.current().is_none());

        let first = manager.get_or_generate().unwrap();
        let again = manager.get_or_generate().unwrap();
        assert_eq!(first.id(), again.id());
        assert_eq!(manager.public_key().map(|k| k.id()), Some(first.id()));

        manager.clear();
        assert!(manager.public_key().is_none());
    }

    #[test]
    fn test_generate_rejects_weak_config() {
        let config = FHEConfig {
            modulus_bits: 256,
            ..FHEConfig::insecure_testing()
        };
        assert!(matches!(
            KeyPair::generate(&config),
            Err(FHEError::ConfigError(_))
        ));
    }

    #[test]
    fn test_public_key_bytes_are_fixed_width_modulus() {
        let pair = key_pair();
        let bytes = pair.public.to_bytes();
        assert_eq!(bytes.len(), pair.public.modulus_len());
        assert_eq!(BigUint::from_bytes_be(&bytes), pair.public.raw().n);
        assert_eq!(KeyRef::of_public_key(&bytes), pair.id());
    }
}
