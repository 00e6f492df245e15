//! DSA signatures binding ballots to vote tokens.
//!
//! Each voter holds a DSA keypair; the roster maps vote tokens to the
//! corresponding public keys. A transaction is admissible only if the
//! signature over its ballot hash verifies against the key registered for
//! its token, so a token cannot be used by anyone but the voter it was
//! provisioned to.
//!
//! Parameters follow the classic (p, q, g) construction with q | p − 1
//! and g of order q; signatures are the usual (r, s) pair.

use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};

use super::CryptoError;
use super::bigint::hex_big;

/// Default modulus width, matching the 2048/256 parameter set.
pub const DEFAULT_P_BITS: u64 = 2048;
/// Default subgroup order width.
pub const DEFAULT_Q_BITS: u64 = 256;

/// Domain parameters (p, q, g) shared by a keypair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DsaParameters {
    #[serde(with = "hex_big")]
    pub p: BigUint,
    #[serde(with = "hex_big")]
    pub q: BigUint,
    #[serde(with = "hex_big")]
    pub g: BigUint,
}

/// Public verification key y = gˣ mod p.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DsaPublicKey {
    pub params: DsaParameters,
    #[serde(with = "hex_big")]
    pub y: BigUint,
}

/// Signing key; `x` never leaves the voter's own config.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DsaPrivateKey {
    pub public: DsaPublicKey,
    #[serde(with = "hex_big")]
    x: BigUint,
}

/// A DSA signature as the (r, s) pair of arbitrary-precision integers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DsaSignature {
    #[serde(with = "hex_big")]
    pub r: BigUint,
    #[serde(with = "hex_big")]
    pub s: BigUint,
}

/// Generates a keypair with the default 2048/256 parameter sizes.
pub fn create_key() -> Result<DsaPrivateKey, CryptoError> {
    create_key_with_sizes(DEFAULT_P_BITS, DEFAULT_Q_BITS)
}

/// Generates a keypair with explicit parameter sizes.
///
/// Smaller sizes keep test suites fast; production keys use
/// [`create_key`]. `p_bits` must leave room for the subgroup order.
pub fn create_key_with_sizes(p_bits: u64, q_bits: u64) -> Result<DsaPrivateKey, CryptoError> {
    if q_bits + 8 > p_bits {
        return Err(CryptoError::ParameterGeneration(format!(
            "modulus of {p_bits} bits cannot hold a {q_bits}-bit subgroup"
        )));
    }

    let params = generate_parameters(p_bits, q_bits)?;

    let mut rng = rand::thread_rng();
    let x = rng.gen_biguint_range(&BigUint::one(), &params.q);
    let y = params.g.modpow(&x, &params.p);

    Ok(DsaPrivateKey {
        public: DsaPublicKey { params, y },
        x,
    })
}

fn generate_parameters(p_bits: u64, q_bits: u64) -> Result<DsaParameters, CryptoError> {
    let q = glass_pumpkin::prime::new(q_bits as usize)
        .map_err(|e| CryptoError::ParameterGeneration(e.to_string()))?;

    // Search for p = q·m + 1 of exactly p_bits. m is kept even so that p
    // stays odd.
    let mut rng = rand::thread_rng();
    let p = loop {
        let mut m = rng.gen_biguint(p_bits - q_bits);
        m.set_bit(p_bits - q_bits - 1, true);
        m.set_bit(0, false);
        let candidate = &q * &m + BigUint::one();
        if candidate.bits() == p_bits && glass_pumpkin::prime::check(&candidate) {
            break candidate;
        }
    };

    // g = h^((p−1)/q) mod p for the first h that yields a non-trivial
    // generator of the order-q subgroup.
    let exponent = (&p - BigUint::one()) / &q;
    let g = loop {
        let h = rng.gen_biguint_range(&BigUint::from(2_u32), &(&p - BigUint::one()));
        let g = h.modpow(&exponent, &p);
        if g > BigUint::one() {
            break g;
        }
    };

    Ok(DsaParameters { p, q, g })
}

/// Reduces a 32-byte digest to the leftmost min(|q|, 256) bits, as the
/// signing equation requires.
fn digest_to_int(hash: &[u8; 32], q: &BigUint) -> BigUint {
    let take = usize::min(32, q.bits().div_ceil(8) as usize);
    BigUint::from_bytes_be(&hash[..take])
}

impl DsaPrivateKey {
    /// Signs a 32-byte hash, redrawing the nonce until both halves of the
    /// signature are non-zero.
    pub fn sign_hash(&self, hash: &[u8; 32]) -> Result<DsaSignature, CryptoError> {
        let params = &self.public.params;
        let z = digest_to_int(hash, &params.q);
        let mut rng = rand::thread_rng();

        for _ in 0..128 {
            let k = rng.gen_biguint_range(&BigUint::one(), &params.q);
            let r = params.g.modpow(&k, &params.p) % &params.q;
            if r.is_zero() {
                continue;
            }
            let Some(k_inv) = k.modinv(&params.q) else {
                continue;
            };
            let s = (k_inv * (&z + &self.x * &r)) % &params.q;
            if s.is_zero() {
                continue;
            }
            return Ok(DsaSignature { r, s });
        }

        Err(CryptoError::Signing)
    }
}

impl DsaPublicKey {
    /// Verifies an (r, s) signature over a 32-byte hash.
    pub fn verify(&self, hash: &[u8; 32], signature: &DsaSignature) -> bool {
        let params = &self.params;
        let DsaSignature { r, s } = signature;

        if r.is_zero() || s.is_zero() || r >= &params.q || s >= &params.q {
            return false;
        }
        let Some(w) = s.modinv(&params.q) else {
            return false;
        };

        let z = digest_to_int(hash, &params.q);
        let u1 = (z * &w) % &params.q;
        let u2 = (r * &w) % &params.q;
        let v = (params.g.modpow(&u1, &params.p) * self.y.modpow(&u2, &params.p)) % &params.p
            % &params.q;

        &v == r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    fn test_key() -> DsaPrivateKey {
        create_key_with_sizes(512, 160).expect("keypair")
    }

    fn hash_of(data: &[u8]) -> [u8; 32] {
        Sha256::digest(data).into()
    }

    #[test]
    fn sign_verify_roundtrip() {
        let key = test_key();
        let hash = hash_of(b"a filled ballot");

        let sig = key.sign_hash(&hash).expect("sign");
        assert!(key.public.verify(&hash, &sig));
    }

    #[test]
    fn tampering_falsifies_verification() {
        let key = test_key();
        let hash = hash_of(b"a filled ballot");
        let sig = key.sign_hash(&hash).expect("sign");

        let mut other_hash = hash;
        other_hash[7] ^= 0x01;
        assert!(!key.public.verify(&other_hash, &sig));

        let bad_r = DsaSignature {
            r: &sig.r ^ BigUint::one(),
            s: sig.s.clone(),
        };
        assert!(!key.public.verify(&hash, &bad_r));

        let bad_s = DsaSignature {
            r: sig.r.clone(),
            s: &sig.s ^ BigUint::one(),
        };
        assert!(!key.public.verify(&hash, &bad_s));
    }

    #[test]
    fn signatures_do_not_transfer_between_keys() {
        let alice = test_key();
        let bob = test_key();
        let hash = hash_of(b"whose ballot is this");

        let sig = alice.sign_hash(&hash).expect("sign");
        assert!(!bob.public.verify(&hash, &sig));
    }

    #[test]
    fn out_of_range_signature_components_are_rejected() {
        let key = test_key();
        let hash = hash_of(b"bounds");
        let sig = key.sign_hash(&hash).expect("sign");

        let oversized = DsaSignature {
            r: &sig.r + &key.public.params.q,
            s: sig.s.clone(),
        };
        assert!(!key.public.verify(&hash, &oversized));

        let zeroed = DsaSignature {
            r: BigUint::zero(),
            s: sig.s.clone(),
        };
        assert!(!key.public.verify(&hash, &zeroed));
    }

    #[test]
    fn parameters_have_the_requested_shape() {
        let key = test_key();
        let params = &key.public.params;

        assert_eq!(params.p.bits(), 512);
        assert_eq!(params.q.bits(), 160);
        // q divides p − 1.
        assert!(((&params.p - BigUint::one()) % &params.q).is_zero());
        // g generates the order-q subgroup.
        assert!(params.g.modpow(&params.q, &params.p).is_one());
    }

    #[test]
    fn private_key_roundtrips_through_json() {
        let key = test_key();
        let json = serde_json::to_string(&key).expect("serialize");
        let back: DsaPrivateKey = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(key, back);

        let hash = hash_of(b"serialized signer");
        let sig = back.sign_hash(&hash).expect("sign");
        assert!(key.public.verify(&hash, &sig));
    }
}
