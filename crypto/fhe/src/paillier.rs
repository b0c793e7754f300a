//! Paillier arithmetic over Z*_{n^2} with generator g = n + 1.
//!
//! This module only knows about big integers. Byte layouts, key identifiers and
//! the boosted ciphertext format live in [`crate::keys`] and [`crate::ciphertext`].

use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::{CryptoRng, RngCore};

use crate::{FHEError, FHEResult};

/// Public modulus and its square.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct RawPublicKey {
    pub(crate) n: BigUint,
    pub(crate) n_squared: BigUint,
}

impl RawPublicKey {
    pub(crate) fn new(n: BigUint) -> Self {
        let n_squared = &n * &n;
        Self { n, n_squared }
    }

    /// g^m mod n^2, which for g = n + 1 collapses to 1 + m*n.
    pub(crate) fn g_pow(&self, m: &BigUint) -> BigUint {
        (BigUint::one() + (m % &self.n) * &self.n) % &self.n_squared
    }

    /// g^{-1} mod n^2 = 1 - n.
    pub(crate) fn g_inverse(&self) -> BigUint {
        &self.n_squared - &self.n + BigUint::one()
    }

    /// Enc(m; r) = g^m * r^n mod n^2.
    pub(crate) fn encrypt_with(&self, m: &BigUint, r: &BigUint) -> BigUint {
        self.g_pow(m) * r.modpow(&self.n, &self.n_squared) % &self.n_squared
    }

    /// Uniform element of Z*_n.
    pub(crate) fn random_unit<R: RngCore + CryptoRng>(&self, rng: &mut R) -> BigUint {
        loop {
            let r = rng.gen_biguint_range(&BigUint::one(), &self.n);
            if r.gcd(&self.n).is_one() {
                return r;
            }
        }
    }

    /// Uniform element of Z_n.
    pub(crate) fn random_residue<R: RngCore + CryptoRng>(&self, rng: &mut R) -> BigUint {
        rng.gen_biguint_below(&self.n)
    }

    pub(crate) fn mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        a * b % &self.n_squared
    }

    pub(crate) fn pow(&self, base: &BigUint, exponent: &BigUint) -> BigUint {
        base.modpow(exponent, &self.n_squared)
    }

    pub(crate) fn inverse(&self, value: &BigUint) -> Option<BigUint> {
        value.modinv(&self.n_squared)
    }

    /// (a + b) mod n
    pub(crate) fn add_mod_n(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a + b) % &self.n
    }

    /// (a - b) mod n for a, b < n
    pub(crate) fn sub_mod_n(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a + &self.n - b % &self.n) % &self.n
    }

    /// Whether `value` is a non-zero residue mod n^2.
    pub(crate) fn is_ciphertext(&self, value: &BigUint) -> bool {
        !value.is_zero() && value < &self.n_squared
    }

    /// Whether `value` lies in [1, n).
    pub(crate) fn is_response(&self, value: &BigUint) -> bool {
        !value.is_zero() && value < &self.n
    }
}

/// Factorisation of the modulus together with the decryption constants.
#[derive(Clone)]
pub(crate) struct RawPrivateKey {
    pub(crate) p: BigUint,
    pub(crate) q: BigUint,
    public: RawPublicKey,
    phi: BigUint,
    mu: BigUint,
}

impl RawPrivateKey {
    pub(crate) fn from_primes(p: BigUint, q: BigUint) -> FHEResult<Self> {
        if p == q || p.is_zero() || q.is_zero() {
            return Err(FHEError::InvalidKey("prime factors must be distinct".into()));
        }
        let public = RawPublicKey::new(&p * &q);
        let phi = (&p - 1u32) * (&q - 1u32);
        let mu = phi
            .modinv(&public.n)
            .ok_or_else(|| FHEError::InvalidKey("phi(n) is not invertible mod n".into()))?;
        Ok(Self {
            p,
            q,
            public,
            phi,
            mu,
        })
    }

    pub(crate) fn public(&self) -> &RawPublicKey {
        &self.public
    }

    /// Dec(c) = L(c^phi mod n^2) * phi^{-1} mod n, with L(u) = (u - 1) / n.
    pub(crate) fn decrypt(&self, c: &BigUint) -> FHEResult<BigUint> {
        if !self.public.is_ciphertext(c) {
            return Err(FHEError::DecryptionFailed(
                "component outside of Z_{n^2}".into(),
            ));
        }
        let u = c.modpow(&self.phi, &self.public.n_squared);
        if u.is_zero() {
            return Err(FHEError::DecryptionFailed("component is not a unit".into()));
        }
        let l = (u - 1u32) / &self.public.n;
        Ok(l * &self.mu % &self.public.n)
    }
}

/// Random probable prime of exactly `bits` bits with the top two bits set,
/// so that the product of two such primes has exactly `2 * bits` bits.
pub(crate) fn generate_prime<R: RngCore + CryptoRng>(bits: u64, rng: &mut R) -> FHEResult<BigUint> {
    let width = usize::try_from(bits)
        .map_err(|_| FHEError::KeyGenerationFailed(format!("prime width {} too large", bits)))?;
    loop {
        let candidate = glass_pumpkin::prime::from_rng(width, rng)
            .map_err(|e| FHEError::KeyGenerationFailed(e.to_string()))?;
        if candidate.bits() == bits && candidate.bit(bits - 2) {
            return Ok(candidate);
        }
    }
}
