//! Core domain types used by the chain.
//!
//! This module defines the strongly-typed hash wrapper shared across the
//! implementation, plus the transaction and block structures that make up
//! the ledger. The goal is to avoid "naked" byte buffers in public APIs
//! and instead use domain-specific newtypes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub mod block;
pub mod merkle;
pub mod transaction;

pub use block::{Block, BlockHeader, BlockUpdate};
pub use merkle::merkle_root;
pub use transaction::{Transaction, TransactionHeader};

/// Length in bytes of all 256-bit hash types used in this module.
pub const HASH_LEN: usize = 32;

/// Strongly-typed 256-bit hash wrapper (SHA-256).
///
/// This type is the backing representation for every fixed-size hash in
/// the chain: ballot hashes, Merkle nodes, block proofs, and parent
/// links. It is always exactly [`HASH_LEN`] bytes long.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// Computes a new [`Hash256`] as the SHA-256 digest of `data`.
    pub fn compute(data: &[u8]) -> Self {
        Hash256(Sha256::digest(data).into())
    }

    /// The all-zero hash, used as the parent link of a genesis block.
    pub fn zero() -> Self {
        Hash256([0_u8; HASH_LEN])
    }

    /// Returns the underlying 32-byte hash as a borrowed array.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Lowercase hex rendering, as used in logs and the difficulty check.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}
