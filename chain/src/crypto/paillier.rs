//! The Paillier public-key cryptosystem.
//!
//! Ballots are encrypted selection-by-selection under the election's
//! Paillier public key. The scheme is additively homomorphic: the product
//! of two ciphertexts modulo n² decrypts to the sum of the plaintexts
//! modulo n (see [`crate::crypto::homomorphic`]), which is what makes a
//! tally possible without ever opening an individual ballot.
//!
//! Key generation follows the simplified variant: with n = pq and
//! gcd(pq, (p−1)(q−1)) = 1, the generator is g = n + 1, the private
//! exponent is λ = (p−1)(q−1), and μ = λ⁻¹ mod n.

use num_bigint::{BigInt, BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};

use super::CryptoError;
use super::bigint::hex_big;

/// Public half of a Paillier keypair.
///
/// `n_squared` is carried alongside `n` because every encryption and
/// every homomorphic addition reduces modulo n².
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    #[serde(with = "hex_big")]
    pub n: BigUint,
    #[serde(with = "hex_big")]
    pub n_squared: BigUint,
    #[serde(with = "hex_big")]
    pub generator: BigUint,
}

/// Full Paillier keypair.
///
/// In a running election, every node holds the election [`PublicKey`] but
/// only a reconstructed key (see [`crate::tally`]) has non-zero `lambda`
/// and `mu`. [`PrivateKey::validate`] distinguishes the two states.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateKey {
    #[serde(with = "hex_big")]
    pub lambda: BigUint,
    #[serde(with = "hex_big")]
    pub mu: BigUint,
    pub public: PublicKey,
}

impl PublicKey {
    /// Checks that no component of the key is zero.
    pub fn validate(&self) -> Result<(), CryptoError> {
        if self.n.is_zero() || self.n_squared.is_zero() || self.generator.is_zero() {
            return Err(CryptoError::InvalidEncryptionKey);
        }
        Ok(())
    }

    /// Encrypts `m` under this key: c = gᵐ · rⁿ mod n², with r drawn
    /// uniformly from [1, n).
    ///
    /// Encryption is randomised; two encryptions of the same plaintext
    /// differ with overwhelming probability. A negative plaintext
    /// exponentiates to the identity and therefore decrypts as zero.
    pub fn encrypt(&self, m: &BigInt) -> Result<BigUint, CryptoError> {
        self.validate()?;

        let mut rng = rand::thread_rng();
        let r = rng.gen_biguint_range(&BigUint::one(), &self.n);

        let g_m = match m.to_biguint() {
            Some(m) => self.generator.modpow(&m, &self.n_squared),
            None => BigUint::one(),
        };
        let r_n = r.modpow(&self.n, &self.n_squared);

        Ok((g_m * r_n) % &self.n_squared)
    }
}

impl PrivateKey {
    /// Checks that neither half of the keypair has a zero component.
    pub fn validate(&self) -> Result<(), CryptoError> {
        self.public.validate()?;
        if self.lambda.is_zero() || self.mu.is_zero() {
            return Err(CryptoError::InvalidDecryptionKey);
        }
        Ok(())
    }

    /// Encrypts under the embedded public key.
    pub fn encrypt(&self, m: &BigInt) -> Result<BigUint, CryptoError> {
        self.public.encrypt(m)
    }

    /// Decrypts `c`: m = L(cᴸ mod n²) · μ mod n, where L(x) = (x−1)/n.
    pub fn decrypt(&self, c: &BigUint) -> Result<BigUint, CryptoError> {
        self.validate()?;

        let n = &self.public.n;
        let x = c.modpow(&self.lambda, &self.public.n_squared);
        let l = (x - BigUint::one()) / n;
        Ok((l * &self.mu) % n)
    }
}

/// Generates a fresh Paillier keypair from two `bits`-wide primes.
///
/// Prime pairs are redrawn until gcd(pq, (p−1)(q−1)) = 1, which also
/// guarantees that λ is invertible modulo n.
pub fn generate_keypair(bits: usize) -> Result<PrivateKey, CryptoError> {
    let (n, lambda) = generate_prime_pair(bits)?;

    let mu = lambda
        .modinv(&n)
        .ok_or_else(|| CryptoError::ParameterGeneration("lambda not invertible".to_string()))?;
    let generator = &n + BigUint::one();
    let n_squared = &n * &n;

    Ok(PrivateKey {
        lambda,
        mu,
        public: PublicKey {
            n,
            n_squared,
            generator,
        },
    })
}

fn generate_prime_pair(bits: usize) -> Result<(BigUint, BigUint), CryptoError> {
    loop {
        let p = glass_pumpkin::prime::new(bits)
            .map_err(|e| CryptoError::ParameterGeneration(e.to_string()))?;
        let q = glass_pumpkin::prime::new(bits)
            .map_err(|e| CryptoError::ParameterGeneration(e.to_string()))?;

        let n = &p * &q;
        let phi = (&p - BigUint::one()) * (&q - BigUint::one());

        if n.gcd(&phi).is_one() {
            return Ok((n, phi));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = generate_keypair(512).expect("keypair");
        let m = BigInt::from(23);

        let c = key.encrypt(&m).expect("encrypt");
        let back = key.decrypt(&c).expect("decrypt");

        assert_eq!(back, BigUint::from(23_u32));
    }

    #[test]
    fn encryption_is_randomised() {
        let key = generate_keypair(512).expect("keypair");
        let m = BigInt::from(23);

        let a = key.encrypt(&m).expect("encrypt a");
        let b = key.encrypt(&m).expect("encrypt b");

        assert_ne!(a, b, "two encryptions of the same plaintext must differ");
        assert_eq!(key.decrypt(&a).unwrap(), key.decrypt(&b).unwrap());
    }

    #[test]
    fn roundtrips_various_plaintexts() {
        let key = generate_keypair(256).expect("keypair");

        for m in [0_i64, 1, 2, 1_000_000, i64::MAX] {
            let c = key.encrypt(&BigInt::from(m)).expect("encrypt");
            assert_eq!(key.decrypt(&c).unwrap(), BigUint::from(m as u64));
        }
    }

    #[test]
    fn negative_plaintext_decrypts_to_zero() {
        let key = generate_keypair(256).expect("keypair");
        let c = key.encrypt(&BigInt::from(-123_422)).expect("encrypt");
        assert_eq!(key.decrypt(&c).unwrap(), BigUint::zero());
    }

    #[test]
    fn zeroed_keys_fail_validation() {
        let mut key = generate_keypair(256).expect("keypair");
        key.lambda = BigUint::zero();

        assert!(matches!(
            key.decrypt(&BigUint::from(5_u32)),
            Err(CryptoError::InvalidDecryptionKey)
        ));

        let mut public = key.public.clone();
        public.n = BigUint::zero();
        assert!(matches!(
            public.encrypt(&BigInt::from(1)),
            Err(CryptoError::InvalidEncryptionKey)
        ));
    }

    #[test]
    fn keypair_serializes_as_hex_json() {
        let key = generate_keypair(256).expect("keypair");
        let json = serde_json::to_string(&key).expect("serialize");
        let back: PrivateKey = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(key, back);
    }
}
