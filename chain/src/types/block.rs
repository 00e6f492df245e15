//! Block types, canonical header bytes, and the proof-of-work predicate.
//!
//! A block seals a fixed-size batch of transactions under a proof-of-work
//! hash. The proof commits to the Merkle root of the batch and, through
//! the parent hash in the header, to the entire chain before it.
//!
//! Serialization is done with **bincode 2** using the `serde` integration
//! (`bincode::serde::encode_to_vec`) and an explicit `standard()` config.
//! The bytes hashed for the proof are exactly the 32-byte Merkle root
//! followed by the canonical header encoding; miner and verifier must
//! agree on them byte for byte.

use serde::{Deserialize, Serialize};

use crate::types::{Hash256, Transaction, merkle_root};

/// Block header: the fields the proof-of-work hash commits to.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Merkle root over the ballot hashes of the block's transactions.
    pub merkle_root: Hash256,
    /// Proof of the previous block, or all zeroes for the genesis block.
    pub parent_hash: Hash256,
    /// Seconds since the Unix epoch, stamped when the nonce search began.
    pub timestamp: u32,
    /// Nonce found by the proof-of-work search.
    pub nonce: u32,
}

impl BlockHeader {
    /// Returns the canonical byte representation of this header.
    ///
    /// # Panics
    ///
    /// Panics if encoding fails. This is considered a programming error,
    /// because all fields are required to be serializable.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        // Explicit config to avoid relying on any implicit defaults.
        let cfg = bincode::config::standard();
        bincode::serde::encode_to_vec(self, cfg)
            .expect("header should always be serializable with bincode 2 + serde")
    }

    /// Computes the proof hash for this header:
    /// SHA-256(merkle_root ‖ canonical header bytes).
    pub fn compute_proof(&self) -> Hash256 {
        let header_bytes = self.canonical_bytes();
        let mut data = Vec::with_capacity(crate::types::HASH_LEN + header_bytes.len());
        data.extend_from_slice(self.merkle_root.as_bytes());
        data.extend_from_slice(&header_bytes);
        Hash256::compute(&data)
    }
}

/// Returns `true` when the hex form of `proof` starts with `difficulty`
/// zero characters.
pub fn meets_difficulty(proof: &Hash256, difficulty: usize) -> bool {
    proof.to_hex().bytes().take(difficulty).all(|b| b == b'0')
}

/// An ordered batch of transactions sealed under a proof-of-work.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub transactions: Vec<Transaction>,
    pub header: BlockHeader,
    pub proof: Hash256,
}

impl Block {
    /// Merkle root over the ballot hashes of `transactions`, in order.
    pub fn merkle_root_of(transactions: &[Transaction]) -> Hash256 {
        let leaves: Vec<Hash256> = transactions
            .iter()
            .map(|tx| tx.header.ballot_hash)
            .collect();
        merkle_root(&leaves)
    }

    /// Mines a block over `transactions` by scanning nonces until the
    /// difficulty predicate holds.
    ///
    /// This is the synchronous search used by tests and tools; the miner
    /// task runs its own loop so it can poll for a stop signal between
    /// attempts.
    pub fn mine(
        transactions: Vec<Transaction>,
        parent_hash: Hash256,
        timestamp: u32,
        difficulty: usize,
    ) -> Block {
        let mut header = BlockHeader {
            merkle_root: Self::merkle_root_of(&transactions),
            parent_hash,
            timestamp,
            nonce: 0,
        };

        loop {
            let proof = header.compute_proof();
            if meets_difficulty(&proof, difficulty) {
                return Block {
                    transactions,
                    header,
                    proof,
                };
            }
            header.nonce = header.nonce.wrapping_add(1);
        }
    }
}

/// Announcement of a freshly mined or adopted block, as gossiped between
/// peers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockUpdate {
    /// The newest block of the announcing peer's chain.
    pub latest_block: Block,
    /// Endpoint of the announcing peer, used to fetch its full chain
    /// when the single block does not extend ours.
    pub peer: String,
    /// Length of the announcing peer's chain.
    pub chain_length: u32,
}
