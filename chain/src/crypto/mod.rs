//! Cryptographic primitives for the voting chain.
//!
//! This module implements the three primitives the election protocol is
//! built from:
//!
//! - [`paillier`]: the Paillier public-key cryptosystem, whose additive
//!   homomorphism lets ciphertext ballots be summed without decrypting
//!   any individual vote (see [`homomorphic`]),
//! - [`shamir`]: Shamir secret sharing with Lagrange interpolation, used
//!   to split the election private key across the voter roster so that
//!   only a threshold of voters can reconstruct it, and
//! - [`dsa`]: classic DSA signatures binding each ballot to the vote
//!   token that authorised it.
//!
//! All arithmetic is done on `num-bigint` integers; primes come from
//! `glass_pumpkin`. Values that travel over the wire or live in config
//! files serialize as lowercase hex strings via [`bigint`].

use std::fmt;

pub mod bigint;
pub mod dsa;
pub mod homomorphic;
pub mod paillier;
pub mod shamir;

pub use dsa::{DsaParameters, DsaPrivateKey, DsaPublicKey, DsaSignature};
pub use paillier::{PrivateKey, PublicKey};
pub use shamir::{Share, divide_secret, interpolate};

/// Errors produced by the cryptographic primitives.
#[derive(Debug)]
pub enum CryptoError {
    /// A key with a zero component was supplied where a complete key is
    /// required (e.g. decrypting before the election key is reconstructed).
    InvalidEncryptionKey,
    /// The private key is incomplete or malformed.
    InvalidDecryptionKey,
    /// Prime or parameter generation failed.
    ParameterGeneration(String),
    /// Secret sharing was asked for an impossible split.
    InvalidShareCount { threshold: usize, shares: usize },
    /// Interpolation could not invert a denominator (duplicate or
    /// degenerate share coordinates).
    Interpolation,
    /// Fewer shares are pooled than the reconstruction threshold.
    BelowThreshold { have: usize, need: usize },
    /// Signing could not complete (degenerate nonce space).
    Signing,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::InvalidEncryptionKey => write!(f, "invalid encryption key"),
            CryptoError::InvalidDecryptionKey => write!(f, "invalid decryption key"),
            CryptoError::ParameterGeneration(msg) => {
                write!(f, "parameter generation failed: {msg}")
            }
            CryptoError::InvalidShareCount { threshold, shares } => write!(
                f,
                "cannot split a secret into {shares} shares with threshold {threshold}"
            ),
            CryptoError::Interpolation => write!(f, "interpolation over degenerate shares"),
            CryptoError::BelowThreshold { have, need } => {
                write!(f, "have {have} key shares, need {need} to reconstruct")
            }
            CryptoError::Signing => write!(f, "signing failed"),
        }
    }
}

impl std::error::Error for CryptoError {}
