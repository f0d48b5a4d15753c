//! 64-bit FNV-1a digest of a tree's raw encoding.
//!
//! The digest covers the exact bytes of [`QuartetTree::encode`], so it only
//! identifies a *topology* once the tree has been put in canonical form with
//! [`crate::normalize::normalize_tree`]. Hashing never normalizes on its own:
//! callers comparing topologies must normalize first.

use crate::tree::QuartetTree;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a over the little-endian bytes of `[leaf_count, slots...]`.
pub fn tree_hash(tree: &QuartetTree) -> u64 {
    tree.encode()
        .iter()
        .flat_map(|cell| cell.to_le_bytes())
        .fold(FNV_OFFSET_BASIS, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME))
}

/// [`tree_hash`] as 16 lowercase hex digits, most significant first.
///
/// # Example
/// ```
/// # use quartet_search::{hash::tree_hash_hex, normalize::normalize_tree, tree::QuartetTree};
/// let mut tree = QuartetTree::fixed_starting_tree(6).unwrap();
/// normalize_tree(&mut tree).unwrap();
/// let hex = tree_hash_hex(&tree);
/// assert_eq!(hex.len(), 16);
/// assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
/// ```
pub fn tree_hash_hex(tree: &QuartetTree) -> String {
    format!("{:016x}", tree_hash(tree))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_tree;

    #[test]
    fn test_fnv_reference_values() {
        // FNV-1a of the empty input is the offset basis; of "a" a published vector
        let fold = |bytes: &[u8]| {
            bytes
                .iter()
                .fold(FNV_OFFSET_BASIS, |h, &b| (h ^ u64::from(b)).wrapping_mul(FNV_PRIME))
        };
        assert_eq!(fold(b""), 0xcbf29ce484222325);
        assert_eq!(fold(b"a"), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn test_hash_depends_on_layout() {
        let start = QuartetTree::fixed_starting_tree(5).unwrap();
        let mut normalized = start.clone();
        normalize_tree(&mut normalized).unwrap();
        assert_eq!(tree_hash(&start), tree_hash(&start.clone()));
        // same topology, different slot order: digests differ until normalized
        assert_ne!(start.encode(), normalized.encode());
        assert_ne!(tree_hash(&start), tree_hash(&normalized));
    }

    #[test]
    fn test_hex_is_sixteen_digits() {
        let tree = QuartetTree::allocate(4).unwrap();
        let hex = tree_hash_hex(&tree);
        assert_eq!(hex.len(), 16);
        assert_eq!(u64::from_str_radix(&hex, 16).unwrap(), tree_hash(&tree));
    }
}
