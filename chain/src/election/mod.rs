//! Ballot model for the election.
//!
//! A [`BallotFormat`] describes what the ballot paper looks like (how
//! many selections, and their names); a [`Ballot`] is one voter's filled
//! copy. Ballots start out with plaintext 0/1 votes and are sealed with
//! [`Ballot::encrypt`] before they ever leave the node: afterwards each
//! selection carries a Paillier ciphertext of the vote.

use std::fmt;

use num_bigint::{BigInt, BigUint};
use serde::{Deserialize, Serialize};

use crate::crypto::CryptoError;
use crate::crypto::bigint::hex_big;
use crate::crypto::paillier::PublicKey;
use crate::crypto::shamir::Share;
use crate::types::Hash256;

/// Errors raised while building or filling ballots.
#[derive(Debug)]
pub enum ElectionError {
    /// The format's declared selection count disagrees with its list.
    InvalidFormat,
    /// The supplied votes do not line up with the ballot format.
    VoteCount { expected: usize, got: usize },
}

impl fmt::Display for ElectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElectionError::InvalidFormat => {
                write!(f, "invalid format was supplied; bad number of selections")
            }
            ElectionError::VoteCount { expected, got } => {
                write!(f, "expected {expected} votes, got {got}")
            }
        }
    }
}

impl std::error::Error for ElectionError {}

/// One voter's shares of the election private key.
///
/// The λ and μ components of the Paillier private key are Shamir-split
/// separately; a voter contributes both points at once. The two shares
/// always carry the same x-coordinate, which keys the share pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSecret {
    pub lambda: Share,
    pub mu: Share,
}

/// One selection on a ballot.
///
/// Before sealing, `vote` holds the plaintext 0/1 value; afterwards it is
/// a Paillier ciphertext modulo n². `proof` is reserved for a
/// zero-knowledge proof of well-formedness and travels as opaque bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub name: String,
    #[serde(with = "hex_big")]
    pub vote: BigUint,
    pub proof: Vec<u8>,
}

/// The shape of the election's ballot paper.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotFormat {
    pub num_selections: usize,
    pub selections: Vec<String>,
}

impl BallotFormat {
    /// Builds a format from a list of selection names.
    pub fn new(selections: Vec<String>) -> Self {
        BallotFormat {
            num_selections: selections.len(),
            selections,
        }
    }

    /// Checks that the declared count matches the selection list.
    pub fn validate(&self) -> Result<(), ElectionError> {
        if self.selections.len() != self.num_selections {
            return Err(ElectionError::InvalidFormat);
        }
        Ok(())
    }
}

/// A voter's filled ballot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    /// Vote token of the voter who owns this ballot.
    pub vote_token: String,
    /// Ordered list of selections, one per entry in the ballot format.
    pub selections: Vec<Selection>,
}

impl Ballot {
    /// Fills a plaintext ballot: one vote value per selection in the
    /// format, in format order.
    pub fn fill(format: &BallotFormat, token: &str, votes: &[u64]) -> Result<Ballot, ElectionError> {
        format.validate()?;
        if votes.len() != format.num_selections {
            return Err(ElectionError::VoteCount {
                expected: format.num_selections,
                got: votes.len(),
            });
        }

        let selections = format
            .selections
            .iter()
            .zip(votes)
            .map(|(name, vote)| Selection {
                name: name.clone(),
                vote: BigUint::from(*vote),
                proof: Vec::new(),
            })
            .collect();

        Ok(Ballot {
            vote_token: token.to_string(),
            selections,
        })
    }

    /// Seals the ballot by replacing every plaintext vote with its
    /// Paillier encryption under the election public key.
    pub fn encrypt(mut self, key: &PublicKey) -> Result<Ballot, CryptoError> {
        for selection in &mut self.selections {
            let plaintext = BigInt::from(selection.vote.clone());
            selection.vote = key.encrypt(&plaintext)?;
        }
        Ok(self)
    }

    /// Canonical bytes of the ballot: the bincode encoding with the
    /// standard configuration, fixed field order, hex-string integers.
    ///
    /// # Panics
    ///
    /// Panics if encoding fails, which would be a programming error:
    /// every field is serializable.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let cfg = bincode::config::standard();
        bincode::serde::encode_to_vec(self, cfg)
            .expect("ballot should always be serializable with bincode 2 + serde")
    }

    /// SHA-256 of the canonical ballot bytes; this is what gets signed.
    pub fn hash(&self) -> Hash256 {
        Hash256::compute(&self.canonical_bytes())
    }
}
