//! Merkle root over transaction ballot hashes.

use super::Hash256;

/// Computes the Merkle root of a non-empty sequence of leaves.
///
/// A single leaf is its own root; otherwise the sequence is split at
/// ⌊len/2⌋ and the root is SHA-256(root(left) ‖ root(right)). Both the
/// miner and the verifier must use this exact recursion or proofs will
/// not line up.
///
/// # Panics
///
/// Panics on an empty slice. Blocks always carry a fixed, non-zero
/// number of transactions, so an empty leaf set is a programming error.
pub fn merkle_root(leaves: &[Hash256]) -> Hash256 {
    assert!(!leaves.is_empty(), "merkle root of an empty leaf set");

    if leaves.len() == 1 {
        return leaves[0];
    }

    let (left, right) = leaves.split_at(leaves.len() / 2);
    let mut data = [0_u8; super::HASH_LEN * 2];
    data[..super::HASH_LEN].copy_from_slice(merkle_root(left).as_bytes());
    data[super::HASH_LEN..].copy_from_slice(merkle_root(right).as_bytes());
    Hash256::compute(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(byte: u8) -> Hash256 {
        Hash256([byte; super::super::HASH_LEN])
    }

    #[test]
    fn single_leaf_is_its_own_root() {
        let l = leaf(7);
        assert_eq!(merkle_root(&[l]), l);
    }

    #[test]
    fn two_leaves_hash_as_a_pair() {
        let a = leaf(1);
        let b = leaf(2);

        let mut data = Vec::new();
        data.extend_from_slice(a.as_bytes());
        data.extend_from_slice(b.as_bytes());

        assert_eq!(merkle_root(&[a, b]), Hash256::compute(&data));
    }

    #[test]
    fn root_depends_on_leaf_order() {
        let a = leaf(1);
        let b = leaf(2);
        assert_ne!(merkle_root(&[a, b]), merkle_root(&[b, a]));
    }

    #[test]
    fn odd_counts_split_below_the_midpoint() {
        // For three leaves the split is [a] / [b, c].
        let (a, b, c) = (leaf(1), leaf(2), leaf(3));

        let right = merkle_root(&[b, c]);
        let mut data = Vec::new();
        data.extend_from_slice(a.as_bytes());
        data.extend_from_slice(right.as_bytes());

        assert_eq!(merkle_root(&[a, b, c]), Hash256::compute(&data));
    }

    #[test]
    fn power_of_two_counts_are_balanced() {
        let leaves: Vec<Hash256> = (0..8).map(leaf).collect();
        let left = merkle_root(&leaves[..4]);
        let right = merkle_root(&leaves[4..]);

        let mut data = Vec::new();
        data.extend_from_slice(left.as_bytes());
        data.extend_from_slice(right.as_bytes());

        assert_eq!(merkle_root(&leaves), Hash256::compute(&data));
    }

    #[test]
    #[should_panic(expected = "empty leaf set")]
    fn empty_leaf_set_panics() {
        merkle_root(&[]);
    }
}
