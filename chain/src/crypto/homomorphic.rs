//! Homomorphic addition of Paillier ciphertexts.
//!
//! D(E(m₁, r₁) · E(m₂, r₂) mod n²) = m₁ + m₂ mod n. The running total is
//! seeded with a fresh encryption of zero so the result is re-randomised
//! even when a single ciphertext is summed.

use num_bigint::{BigInt, BigUint};

use super::CryptoError;
use super::paillier::{PrivateKey, PublicKey};

impl PublicKey {
    /// Homomorphically sums one or more ciphertexts.
    pub fn add_ciphertexts(&self, ciphertexts: &[BigUint]) -> Result<BigUint, CryptoError> {
        self.validate()?;

        let mut total = self.encrypt(&BigInt::from(0))?;
        for ciphertext in ciphertexts {
            total = (total * ciphertext) % &self.n_squared;
        }
        Ok(total)
    }
}

impl PrivateKey {
    /// Homomorphically sums one or more ciphertexts under the embedded
    /// public key.
    pub fn add_ciphertexts(&self, ciphertexts: &[BigUint]) -> Result<BigUint, CryptoError> {
        self.public.add_ciphertexts(ciphertexts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::paillier::generate_keypair;
    use num_bigint::BigInt;
    use num_traits::Zero;

    fn check_sum(key: &PrivateKey, plaintexts: &[i64]) -> BigUint {
        let ciphertexts: Vec<BigUint> = plaintexts
            .iter()
            .map(|m| key.encrypt(&BigInt::from(*m)).expect("encrypt"))
            .collect();

        let total = key.add_ciphertexts(&ciphertexts).expect("add");
        key.decrypt(&total).expect("decrypt")
    }

    #[test]
    fn sums_match_plaintext_addition() {
        let key = generate_keypair(512).expect("keypair");

        let cases: &[(&[i64], u64)] = &[
            (&[1, 1, -123_422, -2_341_317], 2),
            (&[0, 0, 1, 0], 1),
            (&[1, 1, 1, 1], 4),
            (&[0, 0, 0, 0], 0),
            (&[799, 0, 201, 2], 1_002),
        ];

        for (inputs, expected) in cases {
            assert_eq!(
                check_sum(&key, inputs),
                BigUint::from(*expected),
                "homomorphic sum of {inputs:?}"
            );
        }
    }

    #[test]
    fn empty_sum_is_an_encryption_of_zero() {
        let key = generate_keypair(256).expect("keypair");
        let total = key.add_ciphertexts(&[]).expect("add");
        assert_eq!(key.decrypt(&total).unwrap(), BigUint::zero());
    }

    #[test]
    fn addition_requires_a_complete_public_key() {
        let mut key = generate_keypair(256).expect("keypair");
        key.public.generator = BigUint::zero();
        assert!(matches!(
            key.add_ciphertexts(&[]),
            Err(CryptoError::InvalidEncryptionKey)
        ));
    }
}
