//! Shamir secret sharing over a prime field.
//!
//! The election private key is never handed to any single voter. Instead
//! its λ and μ components are each split into shares: a random polynomial
//! f of degree k−1 is built with the secret as its constant term, and
//! voter i receives the point (i, f(i) mod P). Any k shares reconstruct
//! the secret exactly via Lagrange interpolation; fewer than k reveal
//! nothing about it.

use num_bigint::{BigInt, BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::One;
use serde::{Deserialize, Serialize};

use super::CryptoError;
use super::bigint::hex_big;

/// One point (x, y) on a secret-hiding polynomial.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    pub x: u64,
    #[serde(with = "hex_big")]
    pub y: BigUint,
}

/// Splits `secret` into `shares` points of which any `threshold`
/// reconstruct it.
///
/// Returns the shares together with the prime modulus P of the field the
/// polynomial was evaluated in; P is one bit wider than the secret, so
/// P > secret always holds. The modulus is public and must accompany the
/// shares for reconstruction.
pub fn divide_secret(
    secret: &BigUint,
    threshold: usize,
    shares: usize,
) -> Result<(Vec<Share>, BigUint), CryptoError> {
    if threshold == 0 || shares < threshold {
        return Err(CryptoError::InvalidShareCount { threshold, shares });
    }

    let prime = prime_above(secret)?;

    // f(x) = secret + a₁x + … + a_{k−1}x^{k−1}, coefficients uniform in [0, P).
    let mut rng = rand::thread_rng();
    let mut coefficients = Vec::with_capacity(threshold);
    coefficients.push(secret.clone());
    for _ in 1..threshold {
        coefficients.push(rng.gen_biguint_below(&prime));
    }

    let points = (1..=shares as u64)
        .map(|x| Share {
            x,
            y: evaluate(&coefficients, x, &prime),
        })
        .collect();

    Ok((points, prime))
}

/// Reconstructs the secret from `points` over the field of integers
/// modulo `prime`.
///
/// Computes Σⱼ yⱼ · Πₘ≠ⱼ (−xₘ) · (xⱼ − xₘ)⁻¹ (mod P). The result equals
/// the original secret only when at least the threshold number of
/// distinct points is supplied; duplicate x-coordinates are rejected.
pub fn interpolate(points: &[Share], prime: &BigUint) -> Result<BigUint, CryptoError> {
    if points.is_empty() {
        return Err(CryptoError::Interpolation);
    }
    let mut seen_xs = std::collections::HashSet::new();
    if !points.iter().all(|p| seen_xs.insert(p.x)) {
        return Err(CryptoError::Interpolation);
    }

    let prime = BigInt::from(prime.clone());
    let mut secret = BigInt::from(0);

    for j in points {
        let mut product = BigInt::one();
        for m in points {
            if m.x == j.x {
                continue;
            }
            let numerator = -BigInt::from(m.x);
            let denominator = (BigInt::from(j.x) - BigInt::from(m.x))
                .mod_floor(&prime)
                .modinv(&prime)
                .ok_or(CryptoError::Interpolation)?;
            product = (product * numerator * denominator).mod_floor(&prime);
        }
        secret += BigInt::from(j.y.clone()) * product;
    }

    let secret = secret.mod_floor(&prime);
    Ok(secret.to_biguint().expect("mod_floor yields a non-negative value"))
}

/// Horner evaluation of the polynomial at x, reduced modulo P.
fn evaluate(coefficients: &[BigUint], x: u64, prime: &BigUint) -> BigUint {
    let x = BigUint::from(x);
    let mut y = BigUint::from(0_u32);
    for coefficient in coefficients.iter().rev() {
        y = (y * &x + coefficient) % prime;
    }
    y
}

/// Draws a random prime one bit wider than `secret`.
///
/// Candidates are sampled with the top and bottom bits forced so the
/// width is exact, then sieved with a primality check. This also covers
/// widths below what a bulk prime generator will produce.
fn prime_above(secret: &BigUint) -> Result<BigUint, CryptoError> {
    let bits = secret.bits().max(1) + 1;
    let mut rng = rand::thread_rng();

    for _ in 0..100_000 {
        let mut candidate = rng.gen_biguint(bits);
        candidate.set_bit(bits - 1, true);
        candidate.set_bit(0, true);
        if glass_pumpkin::prime::check(&candidate) {
            return Ok(candidate);
        }
    }

    Err(CryptoError::ParameterGeneration(format!(
        "no {bits}-bit prime found"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_shares_interpolate_to_the_secret() {
        // f over GF(1613) with f(0) = 1234.
        let prime = BigUint::from(1613_u32);
        let points: Vec<Share> = [
            (1, 1494_u32),
            (2, 329),
            (3, 965),
            (4, 176),
            (5, 1188),
            (6, 775),
        ]
        .iter()
        .map(|(x, y)| Share {
            x: *x,
            y: BigUint::from(*y),
        })
        .collect();

        let secret = interpolate(&points, &prime).expect("interpolate");
        assert_eq!(secret, BigUint::from(1234_u32));

        // The polynomial has degree 2: any three shares are enough, two
        // are not.
        assert_eq!(
            interpolate(&points[3..], &prime).unwrap(),
            BigUint::from(1234_u32)
        );
        assert_ne!(
            interpolate(&points[..2], &prime).unwrap(),
            BigUint::from(1234_u32)
        );
    }

    #[test]
    fn divide_and_reconstruct_roundtrip() {
        let secret = BigUint::parse_bytes(b"3bf6a82f90cd1ab34478", 16).unwrap();
        let (shares, prime) = divide_secret(&secret, 5, 10).expect("divide");

        assert_eq!(shares.len(), 10);
        assert!(prime > secret);

        // Any k-subset reconstructs.
        assert_eq!(interpolate(&shares[..5], &prime).unwrap(), secret);
        assert_eq!(interpolate(&shares[5..], &prime).unwrap(), secret);
        assert_eq!(interpolate(&shares, &prime).unwrap(), secret);
    }

    #[test]
    fn below_threshold_subsets_miss_the_secret() {
        let secret = BigUint::from(987_654_321_u64);
        let (shares, prime) = divide_secret(&secret, 4, 8).expect("divide");

        for take in 1..4 {
            let partial = interpolate(&shares[..take], &prime).expect("interpolate");
            assert_ne!(partial, secret, "{take} shares recovered the secret");
        }
    }

    #[test]
    fn interpolation_counts_by_distinct_coordinates() {
        let secret = BigUint::from(424_242_u64);
        let (shares, prime) = divide_secret(&secret, 3, 6).expect("divide");

        let duplicated = vec![shares[0].clone(), shares[0].clone(), shares[1].clone()];
        assert!(interpolate(&duplicated, &prime).is_err());
    }

    #[test]
    fn rejects_impossible_splits() {
        let secret = BigUint::from(7_u32);
        assert!(matches!(
            divide_secret(&secret, 5, 3),
            Err(CryptoError::InvalidShareCount { .. })
        ));
        assert!(divide_secret(&secret, 0, 3).is_err());
    }

    #[test]
    fn threshold_of_one_is_the_secret_everywhere() {
        let secret = BigUint::from(99_u32);
        let (shares, prime) = divide_secret(&secret, 1, 4).expect("divide");
        for share in &shares {
            assert_eq!(
                interpolate(std::slice::from_ref(share), &prime).unwrap(),
                secret
            );
        }
    }
}
