//! Non-interactive range proofs for fresh input ciphertexts.
//!
//! The plaintext `m` is written in binary and every bit is encrypted separately as
//! `c_i = g^{m_i} * r_i^n`. An OR-proof of n-th residuosity shows that either `c_i`
//! or `c_i / g` is an n-th residue, i.e. that `c_i` encrypts 0 or 1. The bit
//! randomness is chosen so that `prod(c_i^{2^i}) = g^a * beta` holds exactly, which
//! ties the decomposition to the submitted ciphertext without a separate equality
//! proof. When the upper bound is not `2^k - 1` a second decomposition of
//! `max - m` is proven the same way, with randomness that multiplies out to the
//! inverse of the input randomness.
//!
//! All OR-proofs share one Fiat-Shamir challenge drawn from a merlin transcript
//! that binds the key, the ciphertext bytes and the declared range.
//!
//! Layout: `version || max (u64) || challenge (u128) || bits`, where each bit is
//! `c (|n^2|) || e0 (u128) || z0 (|n|) || z1 (|n|)`.

use merlin::Transcript;
use num_bigint::BigUint;
use num_traits::One;
use rand::{CryptoRng, RngCore};

use crate::ciphertext::Ciphertext;
use crate::codec::{fixed_bytes, put_fixed, ByteReader};
use crate::domain::{DomainValue, ValueRange};
use crate::keys::PublicKey;
use crate::paillier::RawPublicKey;
use crate::{FHEError, FHEResult};

/// Current proof format version
pub const PROOF_VERSION: u8 = 1;

const CHALLENGE_SIZE: usize = 16;
const PROOF_HEADER_SIZE: usize = 1 + 8 + CHALLENGE_SIZE;

mod labels {
    pub const PROTOCOL: &[u8] = b"stash-fhe/range-proof/v1";
    pub const KEY: &[u8] = b"key_ref";
    pub const CIPHERTEXT: &[u8] = b"ciphertext";
    pub const RANGE_MAX: &[u8] = b"range_max";
    pub const BIT_COUNT: &[u8] = b"bit_count";
    pub const BIT_CIPHERTEXT: &[u8] = b"bit_ciphertext";
    pub const COMMIT_ZERO: &[u8] = b"commit_zero";
    pub const COMMIT_ONE: &[u8] = b"commit_one";
    pub const CHALLENGE: &[u8] = b"challenge";
}

/// Encrypt `value` and produce a range proof bound to the resulting bytes.
pub(crate) fn encrypt_with_proof<R: RngCore + CryptoRng>(
    value: &DomainValue,
    key: &PublicKey,
    rng: &mut R,
) -> FHEResult<(Vec<u8>, Vec<u8>)> {
    let range = value.range();
    range.check(value.value())?;

    let raw = key.raw();
    let bits = range.bit_width() as usize;

    let lower_randomness: Vec<BigUint> = (0..bits).map(|_| raw.random_unit(rng)).collect();
    let input_randomness = weighted_product(&lower_randomness, &raw.n);

    // Catalano-Fiore mask: beta = Enc(b; R), a = m - b
    let m = BigUint::from(value.value());
    let b = raw.random_residue(rng);
    let ciphertext = Ciphertext::Linear {
        a: raw.sub_mod_n(&m, &b),
        beta: raw.encrypt_with(&b, &input_randomness),
    };
    let ciphertext_bytes = ciphertext.encode(key)?;

    let mut witnesses = vec![BitWitness::commit(
        value.value(),
        lower_randomness,
        raw,
        rng,
    )?];
    if !range.is_power_of_two_span() {
        let inverse = input_randomness.modinv(&raw.n).ok_or_else(|| {
            FHEError::ProofGenerationFailed("input randomness is not invertible".into())
        })?;
        let randomness = randomness_with_product(&inverse, bits, raw, rng)?;
        witnesses.push(BitWitness::commit(
            range.max() - value.value(),
            randomness,
            raw,
            rng,
        )?);
    }

    let mut transcript = proof_transcript(key, &ciphertext_bytes, range, bits);
    for witness in &witnesses {
        for bit in &witness.bits {
            append_element(&mut transcript, labels::BIT_CIPHERTEXT, &bit.c, key)?;
        }
    }
    for witness in &witnesses {
        for bit in &witness.bits {
            append_element(&mut transcript, labels::COMMIT_ZERO, &bit.commitments[0], key)?;
            append_element(&mut transcript, labels::COMMIT_ONE, &bit.commitments[1], key)?;
        }
    }
    let challenge = draw_challenge(&mut transcript);

    let n_len = key.modulus_len();
    let c_len = key.ciphertext_component_len();
    let bit_len = c_len + CHALLENGE_SIZE + 2 * n_len;
    let total_bits: usize = witnesses.iter().map(|w| w.bits.len()).sum();

    let mut proof = Vec::with_capacity(PROOF_HEADER_SIZE + total_bits * bit_len);
    proof.push(PROOF_VERSION);
    proof.extend_from_slice(&range.max().to_be_bytes());
    proof.extend_from_slice(&challenge.to_be_bytes());
    for witness in &witnesses {
        for (bit, r) in witness.bits.iter().zip(&witness.randomness) {
            let response = bit.respond(challenge, r, raw);
            put_fixed(&mut proof, &bit.c, c_len)?;
            proof.extend_from_slice(&response.e0.to_be_bytes());
            put_fixed(&mut proof, &response.z0, n_len)?;
            put_fixed(&mut proof, &response.z1, n_len)?;
        }
    }

    Ok((ciphertext_bytes, proof))
}

/// Verify `proof` against `ciphertext_bytes`. Returns the declared range on
/// success and `None` on any malformed input or failed check.
pub(crate) fn verify(ciphertext_bytes: &[u8], proof: &[u8], key: &PublicKey) -> Option<ValueRange> {
    let raw = key.raw();
    let target = Ciphertext::decode(ciphertext_bytes, key).ok()?.combined(key)?;

    let mut reader = ByteReader::new(proof);
    if reader.u8()? != PROOF_VERSION {
        return None;
    }
    let range = ValueRange::up_to(reader.u64()?);
    let challenge = reader.u128()?;
    let bits = range.bit_width() as usize;
    let sections = if range.is_power_of_two_span() { 1 } else { 2 };

    let n_len = key.modulus_len();
    let c_len = key.ciphertext_component_len();
    let bit_len = c_len + CHALLENGE_SIZE + 2 * n_len;
    if reader.remaining() != sections * bits * bit_len {
        return None;
    }

    let mut parsed: Vec<Vec<BitResponse>> = Vec::with_capacity(sections);
    for _ in 0..sections {
        let mut section = Vec::with_capacity(bits);
        for _ in 0..bits {
            let c = reader.big(c_len)?;
            let e0 = reader.u128()?;
            let z0 = reader.big(n_len)?;
            let z1 = reader.big(n_len)?;
            if !raw.is_ciphertext(&c) || !raw.is_response(&z0) || !raw.is_response(&z1) {
                return None;
            }
            section.push(BitResponse { c, e0, z0, z1 });
        }
        parsed.push(section);
    }

    // The lower decomposition must multiply out to the input ciphertext.
    let lower = weighted_ciphertext(&parsed[0], raw);
    if lower != target {
        return None;
    }
    // The upper decomposition times the input must encrypt exactly `max`.
    if let Some(upper) = parsed.get(1) {
        let upper = weighted_ciphertext(upper, raw);
        if raw.mul(&upper, &target) != raw.g_pow(&BigUint::from(range.max())) {
            return None;
        }
    }

    let mut transcript = proof_transcript(key, ciphertext_bytes, range, bits);
    for bit in parsed.iter().flatten() {
        append_element(&mut transcript, labels::BIT_CIPHERTEXT, &bit.c, key).ok()?;
    }
    for bit in parsed.iter().flatten() {
        let [a0, a1] = bit.recompute_commitments(challenge, raw)?;
        append_element(&mut transcript, labels::COMMIT_ZERO, &a0, key).ok()?;
        append_element(&mut transcript, labels::COMMIT_ONE, &a1, key).ok()?;
    }

    (draw_challenge(&mut transcript) == challenge).then_some(range)
}

/// Prover state for one binary decomposition.
struct BitWitness {
    bits: Vec<BitCommitment>,
    randomness: Vec<BigUint>,
}

impl BitWitness {
    fn commit<R: RngCore + CryptoRng>(
        value: u64,
        randomness: Vec<BigUint>,
        raw: &RawPublicKey,
        rng: &mut R,
    ) -> FHEResult<Self> {
        let bits = randomness
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let bit = i < 64 && (value >> i) & 1 == 1;
                BitCommitment::new(bit, r, raw, rng)
            })
            .collect::<FHEResult<Vec<_>>>()?;
        Ok(Self { bits, randomness })
    }
}

/// First move of one OR-proof: the real branch is committed honestly, the
/// other branch is simulated with a random challenge and response.
struct BitCommitment {
    bit: bool,
    c: BigUint,
    rho: BigUint,
    simulated_challenge: u128,
    simulated_response: BigUint,
    commitments: [BigUint; 2],
}

impl BitCommitment {
    fn new<R: RngCore + CryptoRng>(
        bit: bool,
        r: &BigUint,
        raw: &RawPublicKey,
        rng: &mut R,
    ) -> FHEResult<Self> {
        let c = raw.encrypt_with(&BigUint::from(u8::from(bit)), r);
        let rho = raw.random_unit(rng);
        let simulated_challenge = (u128::from(rng.next_u64()) << 64) | u128::from(rng.next_u64());
        let simulated_response = raw.random_unit(rng);

        let real = raw.pow(&rho, &raw.n);
        let other = if bit { c.clone() } else { raw.mul(&c, &raw.g_inverse()) };
        let simulated = simulate_commitment(&other, simulated_challenge, &simulated_response, raw)
            .ok_or_else(|| {
                FHEError::ProofGenerationFailed("bit ciphertext is not invertible".into())
            })?;

        let commitments = if bit { [simulated, real] } else { [real, simulated] };
        Ok(Self {
            bit,
            c,
            rho,
            simulated_challenge,
            simulated_response,
            commitments,
        })
    }

    fn respond(&self, challenge: u128, r: &BigUint, raw: &RawPublicKey) -> BitResponse {
        let real_challenge = challenge.wrapping_sub(self.simulated_challenge);
        let real_response =
            &self.rho * r.modpow(&BigUint::from(real_challenge), &raw.n) % &raw.n;
        let (e0, z0, z1) = if self.bit {
            (
                self.simulated_challenge,
                self.simulated_response.clone(),
                real_response,
            )
        } else {
            (real_challenge, real_response, self.simulated_response.clone())
        };
        BitResponse {
            c: self.c.clone(),
            e0,
            z0,
            z1,
        }
    }
}

/// Serialized part of one OR-proof.
struct BitResponse {
    c: BigUint,
    e0: u128,
    z0: BigUint,
    z1: BigUint,
}

impl BitResponse {
    /// Commitments implied by the responses: `a_j = z_j^n * u_j^{-e_j}` with
    /// `u_0 = c` and `u_1 = c / g`.
    fn recompute_commitments(&self, challenge: u128, raw: &RawPublicKey) -> Option<[BigUint; 2]> {
        let e1 = challenge.wrapping_sub(self.e0);
        let u1 = raw.mul(&self.c, &raw.g_inverse());
        let a0 = simulate_commitment(&self.c, self.e0, &self.z0, raw)?;
        let a1 = simulate_commitment(&u1, e1, &self.z1, raw)?;
        Some([a0, a1])
    }
}

/// `z^n * u^{-e} mod n^2`
fn simulate_commitment(u: &BigUint, e: u128, z: &BigUint, raw: &RawPublicKey) -> Option<BigUint> {
    let u_inv = raw.inverse(u)?;
    let masked = raw.pow(&u_inv, &BigUint::from(e));
    Some(raw.mul(&raw.pow(z, &raw.n), &masked))
}

/// `prod(values[i]^{2^i}) mod modulus`, evaluated from the top bit down.
fn weighted_product(values: &[BigUint], modulus: &BigUint) -> BigUint {
    values
        .iter()
        .rev()
        .fold(BigUint::one(), |acc, v| &acc * &acc * v % modulus)
}

fn weighted_ciphertext(bits: &[BitResponse], raw: &RawPublicKey) -> BigUint {
    bits.iter()
        .rev()
        .fold(BigUint::one(), |acc, bit| &acc * &acc * &bit.c % &raw.n_squared)
}

/// Random units `r_0..r_{k-1}` with `prod(r_i^{2^i}) = target mod n`.
fn randomness_with_product<R: RngCore + CryptoRng>(
    target: &BigUint,
    bits: usize,
    raw: &RawPublicKey,
    rng: &mut R,
) -> FHEResult<Vec<BigUint>> {
    let mut randomness: Vec<BigUint> = (0..bits).map(|_| raw.random_unit(rng)).collect();
    // weighted product of r_1.. with r_0 set to 1
    randomness[0] = BigUint::one();
    let rest = weighted_product(&randomness, &raw.n);
    let rest_inv = rest.modinv(&raw.n).ok_or_else(|| {
        FHEError::ProofGenerationFailed("decomposition randomness is not invertible".into())
    })?;
    randomness[0] = target * rest_inv % &raw.n;
    Ok(randomness)
}

fn proof_transcript(key: &PublicKey, ciphertext: &[u8], range: ValueRange, bits: usize) -> Transcript {
    let mut transcript = Transcript::new(labels::PROTOCOL);
    transcript.append_message(labels::KEY, key.id().as_bytes());
    transcript.append_message(labels::CIPHERTEXT, ciphertext);
    transcript.append_u64(labels::RANGE_MAX, range.max());
    transcript.append_u64(labels::BIT_COUNT, bits as u64);
    transcript
}

fn append_element(
    transcript: &mut Transcript,
    label: &'static [u8],
    value: &BigUint,
    key: &PublicKey,
) -> FHEResult<()> {
    let bytes = fixed_bytes(value, key.ciphertext_component_len())?;
    transcript.append_message(label, &bytes);
    Ok(())
}

fn draw_challenge(transcript: &mut Transcript) -> u128 {
    let mut buf = [0u8; CHALLENGE_SIZE];
    transcript.challenge_bytes(labels::CHALLENGE, &mut buf);
    u128::from_be_bytes(buf)
}
