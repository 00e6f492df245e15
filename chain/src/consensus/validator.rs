//! Block and chain validity predicates.
//!
//! Validation is deterministic and side-effect free. A block is checked
//! against the proof of the block before it; a chain is checked from its
//! genesis with a running seen-set, so the one-vote-per-token invariant
//! holds across the whole walk, not just within a block.

use std::collections::{HashMap, HashSet};

use crate::crypto::dsa::DsaPublicKey;
use crate::types::{Block, BlockHeader, Hash256, block::meets_difficulty};

use super::config::ConsensusConfig;
use super::error::ValidationError;

/// Validity predicate for blocks and chains, configured with the
/// protocol constants.
#[derive(Clone, Debug)]
pub struct BlockValidator {
    block_size: usize,
    proof_difficulty: usize,
}

impl BlockValidator {
    /// Constructs a validator from the consensus configuration.
    pub fn new(cfg: &ConsensusConfig) -> Self {
        Self {
            block_size: cfg.block_size,
            proof_difficulty: cfg.proof_difficulty,
        }
    }

    /// Validates one block against the proof of its asserted parent.
    ///
    /// Recomputes the Merkle root from the block's transactions, rebuilds
    /// the header with that root and the asserted parent, hashes it, and
    /// requires both the difficulty predicate and bit-equality with the
    /// stored proof. Transaction signatures are checked separately by
    /// [`BlockValidator::validate_chain`].
    pub fn validate_block(&self, block: &Block, parent: &Hash256) -> Result<(), ValidationError> {
        if block.transactions.len() != self.block_size {
            return Err(ValidationError::WrongTransactionCount {
                expected: self.block_size,
                got: block.transactions.len(),
            });
        }

        let merkle_root = Block::merkle_root_of(&block.transactions);
        if block.header.merkle_root != merkle_root {
            return Err(ValidationError::MerkleMismatch);
        }
        if &block.header.parent_hash != parent {
            return Err(ValidationError::WrongParent);
        }

        let header = BlockHeader {
            merkle_root,
            parent_hash: *parent,
            timestamp: block.header.timestamp,
            nonce: block.header.nonce,
        };
        let proof = header.compute_proof();

        if !meets_difficulty(&proof, self.proof_difficulty) {
            return Err(ValidationError::BelowDifficulty {
                required: self.proof_difficulty,
            });
        }
        if proof != block.proof {
            return Err(ValidationError::ProofMismatch);
        }

        Ok(())
    }

    /// Validates an entire chain from its genesis.
    ///
    /// Starting with a zero parent, every block is checked in order:
    /// each transaction must carry a valid signature from a roster token
    /// not seen earlier in the walk, and the block itself must satisfy
    /// [`BlockValidator::validate_block`]. On success the accumulated
    /// seen-set of vote tokens is returned.
    pub fn validate_chain(
        &self,
        blocks: &[Block],
        roster: &HashMap<String, DsaPublicKey>,
    ) -> Result<HashSet<String>, ValidationError> {
        let mut parent = Hash256::zero();
        let mut seen = HashSet::new();

        for block in blocks {
            for tx in &block.transactions {
                if !tx.verify_signature(roster) {
                    return Err(ValidationError::BadSignature {
                        token: tx.header.vote_token.clone(),
                    });
                }
                if !seen.insert(tx.header.vote_token.clone()) {
                    return Err(ValidationError::DuplicateToken {
                        token: tx.header.vote_token.clone(),
                    });
                }
            }

            self.validate_block(block, &parent)?;
            parent = block.proof;
        }

        Ok(seen)
    }
}
