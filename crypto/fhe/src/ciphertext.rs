//! Encrypted values and their wire layout
//!
//! Ciphertexts use the Catalano-Fiore construction on top of Paillier:
//! - Linear: `(a, beta)` with `beta = Enc(b)` and `a = m - b mod n`
//! - Quadratic: `(alpha, [(beta1, beta2), ...])`, decrypting to
//!   `Dec(alpha) + sum(Dec(beta1) * Dec(beta2)) mod n`
//!
//! Layout: `version || level || key_ref || body`. Linear bodies are
//! `a (|n|) || beta (|n^2|)`; quadratic bodies are
//! `count (u32) || alpha (|n^2|) || count * (beta1 || beta2)`.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::codec::{put_fixed, ByteReader};
use crate::keys::{KeyRef, PublicKey, KEY_REF_SIZE};
use crate::{FHEError, FHEResult};

/// Current ciphertext format version
pub const CIPHERTEXT_VERSION: u8 = 1;

/// Version byte, level byte and key reference
pub const CIPHERTEXT_HEADER_SIZE: usize = 2 + KEY_REF_SIZE;

/// Upper bound on the number of product terms in a quadratic ciphertext
pub const MAX_QUADRATIC_TERMS: usize = 4096;

const LEVEL_LINEAR: u8 = 1;
const LEVEL_QUADRATIC: u8 = 2;

/// Multiplicative depth of a ciphertext
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CiphertextLevel {
    /// Fresh or affine combination of fresh ciphertexts
    Linear,
    /// Result of one ciphertext-ciphertext multiplication
    Quadratic,
}

impl CiphertextLevel {
    fn tag(self) -> u8 {
        match self {
            CiphertextLevel::Linear => LEVEL_LINEAR,
            CiphertextLevel::Quadratic => LEVEL_QUADRATIC,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            LEVEL_LINEAR => Some(CiphertextLevel::Linear),
            LEVEL_QUADRATIC => Some(CiphertextLevel::Quadratic),
            _ => None,
        }
    }
}

/// Parsed ciphertext components
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Ciphertext {
    Linear {
        a: BigUint,
        beta: BigUint,
    },
    Quadratic {
        alpha: BigUint,
        pairs: Vec<(BigUint, BigUint)>,
    },
}

impl Ciphertext {
    pub(crate) fn level(&self) -> CiphertextLevel {
        match self {
            Ciphertext::Linear { .. } => CiphertextLevel::Linear,
            Ciphertext::Quadratic { .. } => CiphertextLevel::Quadratic,
        }
    }

    /// Plain Paillier encryption of the whole plaintext, `g^a * beta`.
    /// Only defined for linear ciphertexts.
    pub(crate) fn combined(&self, key: &PublicKey) -> Option<BigUint> {
        match self {
            Ciphertext::Linear { a, beta } => Some(key.raw().mul(&key.raw().g_pow(a), beta)),
            Ciphertext::Quadratic { .. } => None,
        }
    }

    pub(crate) fn encode(&self, key: &PublicKey) -> FHEResult<Vec<u8>> {
        let n_len = key.modulus_len();
        let c_len = key.ciphertext_component_len();

        let mut out = Vec::with_capacity(CIPHERTEXT_HEADER_SIZE + n_len + c_len);
        out.push(CIPHERTEXT_VERSION);
        out.push(self.level().tag());
        out.extend_from_slice(key.id().as_bytes());

        match self {
            Ciphertext::Linear { a, beta } => {
                put_fixed(&mut out, a, n_len)?;
                put_fixed(&mut out, beta, c_len)?;
            }
            Ciphertext::Quadratic { alpha, pairs } => {
                if pairs.len() > MAX_QUADRATIC_TERMS {
                    return Err(FHEError::DegreeExceeded);
                }
                out.extend_from_slice(&(pairs.len() as u32).to_be_bytes());
                put_fixed(&mut out, alpha, c_len)?;
                for (left, right) in pairs {
                    put_fixed(&mut out, left, c_len)?;
                    put_fixed(&mut out, right, c_len)?;
                }
            }
        }
        Ok(out)
    }

    /// Parse and validate ciphertext bytes produced under `key`.
    pub(crate) fn decode(bytes: &[u8], key: &PublicKey) -> FHEResult<Self> {
        let invalid = |reason: &str| FHEError::InvalidCiphertext(reason.to_string());
        let raw = key.raw();
        let n_len = key.modulus_len();
        let c_len = key.ciphertext_component_len();

        let mut reader = ByteReader::new(bytes);
        let (level, key_ref) = read_header(&mut reader).ok_or_else(|| invalid("bad header"))?;
        if key_ref != key.id() {
            return Err(FHEError::KeyMismatch {
                left: key_ref.to_string(),
                right: key.id().to_string(),
            });
        }

        let parsed = match level {
            CiphertextLevel::Linear => {
                let a = reader.big(n_len).ok_or_else(|| invalid("truncated"))?;
                let beta = reader.big(c_len).ok_or_else(|| invalid("truncated"))?;
                if a >= raw.n || !raw.is_ciphertext(&beta) {
                    return Err(invalid("component out of range"));
                }
                Ciphertext::Linear { a, beta }
            }
            CiphertextLevel::Quadratic => {
                let count = reader.u32().ok_or_else(|| invalid("truncated"))? as usize;
                if count > MAX_QUADRATIC_TERMS {
                    return Err(invalid("too many product terms"));
                }
                if reader.remaining() != c_len * (1 + 2 * count) {
                    return Err(invalid("length does not match term count"));
                }
                let alpha = reader.big(c_len).ok_or_else(|| invalid("truncated"))?;
                let mut pairs = Vec::with_capacity(count);
                for _ in 0..count {
                    let left = reader.big(c_len).ok_or_else(|| invalid("truncated"))?;
                    let right = reader.big(c_len).ok_or_else(|| invalid("truncated"))?;
                    pairs.push((left, right));
                }
                let all_valid = raw.is_ciphertext(&alpha)
                    && pairs
                        .iter()
                        .all(|(l, r)| raw.is_ciphertext(l) && raw.is_ciphertext(r));
                if !all_valid {
                    return Err(invalid("component out of range"));
                }
                Ciphertext::Quadratic { alpha, pairs }
            }
        };

        if !reader.is_empty() {
            return Err(invalid("trailing bytes"));
        }
        Ok(parsed)
    }
}

fn read_header(reader: &mut ByteReader<'_>) -> Option<(CiphertextLevel, KeyRef)> {
    if reader.u8()? != CIPHERTEXT_VERSION {
        return None;
    }
    let level = CiphertextLevel::from_tag(reader.u8()?)?;
    let key_ref: [u8; KEY_REF_SIZE] = reader.take(KEY_REF_SIZE)?.try_into().ok()?;
    Some((level, KeyRef::from_bytes(key_ref)))
}

/// Read the key reference embedded in serialized ciphertext bytes
pub fn ciphertext_key_ref(bytes: &[u8]) -> Option<KeyRef> {
    read_header(&mut ByteReader::new(bytes)).map(|(_, key_ref)| key_ref)
}

/// Read the level embedded in serialized ciphertext bytes
pub fn ciphertext_level(bytes: &[u8]) -> Option<CiphertextLevel> {
    read_header(&mut ByteReader::new(bytes)).map(|(level, _)| level)
}

/// Ciphertext bytes plus the key they were produced under and, for fresh
/// inputs, the range proof bound to them
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedValue {
    ciphertext: Vec<u8>,
    public_key_ref: KeyRef,
    proof: Option<Vec<u8>>,
}

impl EncryptedValue {
    /// Wrap bytes received from elsewhere (for example a ledger read)
    pub fn from_parts(ciphertext: Vec<u8>, public_key_ref: KeyRef, proof: Option<Vec<u8>>) -> Self {
        Self {
            ciphertext,
            public_key_ref,
            proof,
        }
    }

    /// Wrap ciphertext bytes, taking the key reference from their header
    pub fn from_ciphertext(ciphertext: Vec<u8>) -> FHEResult<Self> {
        let public_key_ref = ciphertext_key_ref(&ciphertext)
            .ok_or_else(|| FHEError::InvalidCiphertext("bad header".into()))?;
        Ok(Self {
            ciphertext,
            public_key_ref,
            proof: None,
        })
    }

    pub(crate) fn derived(ciphertext: &Ciphertext, key: &PublicKey) -> FHEResult<Self> {
        Ok(Self {
            ciphertext: ciphertext.encode(key)?,
            public_key_ref: key.id(),
            proof: None,
        })
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn public_key_ref(&self) -> KeyRef {
        self.public_key_ref
    }

    /// Range proof; only fresh encryptions carry one
    pub fn proof(&self) -> Option<&[u8]> {
        self.proof.as_deref()
    }

    pub fn level(&self) -> Option<CiphertextLevel> {
        ciphertext_level(&self.ciphertext)
    }

    pub fn into_parts(self) -> (Vec<u8>, KeyRef, Option<Vec<u8>>) {
        (self.ciphertext, self.public_key_ref, self.proof)
    }
}

impl std::fmt::Debug for EncryptedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedValue")
            .field("key", &self.public_key_ref)
            .field("ciphertext_len", &self.ciphertext.len())
            .field("proof_len", &self.proof.as_ref().map(Vec::len))
            .finish()
    }
}
