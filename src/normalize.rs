//! Canonical labelling of internal nodes.
//!
//! Two encodings of the same unrooted topology can differ in which id each
//! internal node carries and in the order of each node's slots. Normalizing
//! removes both freedoms:
//!
//! 1. Hang the tree from leaf 0.
//! 2. Order the children of every internal node by the smallest leaf id in
//!    their subtree.
//! 3. Number internal nodes `n, n+1, ...` in the resulting preorder.
//! 4. Sort every internal node's slots ascending.
//!
//! Every step depends only on the topology and the leaf ids, so trees with
//! the same splits end up byte-identical, and a normalized tree is a fixed
//! point.

use crate::error::VerifyError;
use crate::tree::{NodeId, QuartetTree};
use crate::verify::verify_tree;

/// Relabels `tree` into canonical form in place.
///
/// # Errors
/// The tree must be complete; a failing [`verify_tree`] check is returned and
/// the tree is left untouched.
pub fn normalize_tree(tree: &mut QuartetTree) -> Result<(), VerifyError> {
    verify_tree(tree)?;
    let n = tree.leaf_count();
    let v = tree.node_count();

    // Orient every edge away from leaf 0.
    let mut parent = vec![usize::MAX; v];
    let mut order = Vec::with_capacity(v);
    let mut stack = vec![0];
    parent[0] = 0;
    while let Some(node) = stack.pop() {
        order.push(node);
        for next in tree.neighbors(node) {
            if parent[next] == usize::MAX {
                parent[next] = node;
                stack.push(next);
            }
        }
    }

    // Smallest leaf below each node (children come after parents in `order`).
    let mut min_leaf: Vec<NodeId> = (0..v).collect();
    for &node in order.iter().rev().filter(|&&node| node != 0) {
        let p = parent[node];
        if p != 0 && min_leaf[node] < min_leaf[p] {
            min_leaf[p] = min_leaf[node];
        }
    }
    // internal nodes were seeded with their own id (>= n), always beaten by a leaf
    debug_assert!(tree.internal_nodes().all(|node| min_leaf[node] < n));

    let children = |node: NodeId| {
        let mut kids: Vec<NodeId> = tree.neighbors(node).filter(|&k| k != parent[node]).collect();
        kids.sort_unstable_by_key(|&k| min_leaf[k]);
        kids
    };

    // Preorder relabelling, smallest subtree first.
    let mut new_id: Vec<NodeId> = (0..v).collect();
    let mut next_internal = n;
    let mut stack: Vec<NodeId> = tree.neighbors(0).collect();
    while let Some(node) = stack.pop() {
        if tree.is_leaf(node) {
            continue;
        }
        new_id[node] = next_internal;
        next_internal += 1;
        stack.extend(children(node).into_iter().rev());
    }

    let mut slots = vec![None; tree.slots().len()];
    for old in 0..v {
        let id = new_id[old];
        let mut neighbors: Vec<u16> = tree.neighbors(old).map(|k| new_id[k] as u16).collect();
        neighbors.sort_unstable();
        let base = tree.slot_base(id);
        for (offset, neighbor) in neighbors.into_iter().enumerate() {
            slots[base + offset] = Some(neighbor);
        }
    }
    tree.replace_slots(slots);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::tree_hash_hex;
    use crate::mutation::{Neighborhood, new_random_tree};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    /// Relabels internal nodes by `perm` and rotates every slot list, giving
    /// another encoding of the same topology.
    fn scramble(tree: &QuartetTree, perm: &[NodeId]) -> QuartetTree {
        let n = tree.leaf_count();
        let map = |node: NodeId| if node < n { node } else { perm[node - n] };
        let mut out = QuartetTree::allocate(n).unwrap();
        let mut edges: Vec<_> = tree.edges().map(|(a, b)| (map(a), map(b))).collect();
        edges.reverse();
        for (a, b) in edges {
            out.connect_both(a, b).unwrap();
        }
        out
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for n in 4..=12 {
            let mut tree = QuartetTree::fixed_starting_tree(n).unwrap();
            normalize_tree(&mut tree).unwrap();
            let once = tree.clone();
            normalize_tree(&mut tree).unwrap();
            assert_eq!(tree, once);
            assert_eq!(verify_tree(&tree), Ok(()));
        }
    }

    #[test]
    fn test_relabelled_trees_normalize_identically() {
        let base = QuartetTree::fixed_starting_tree(7).unwrap();
        // internal ids 7..=11 shuffled
        let scrambled = scramble(&base, &[11, 9, 7, 10, 8]);
        assert_ne!(scrambled, base);

        let (mut a, mut b) = (base.clone(), scrambled);
        normalize_tree(&mut a).unwrap();
        normalize_tree(&mut b).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.encode(), b.encode());
        assert_eq!(tree_hash_hex(&a), tree_hash_hex(&b));
    }

    #[test]
    fn test_relabelled_random_trees_normalize_back() {
        let mut rng = StdRng::seed_from_u64(31);
        for n in 4..=12 {
            let tree = new_random_tree(n, Neighborhood::Extended, &mut rng).unwrap();
            // reverse the internal ids
            let perm: Vec<NodeId> = tree.internal_nodes().rev().collect();
            let mut scrambled = scramble(&tree, &perm);
            assert_eq!(verify_tree(&scrambled), Ok(()));
            normalize_tree(&mut scrambled).unwrap();
            assert_eq!(scrambled, tree, "n = {n}");
            assert_eq!(tree_hash_hex(&scrambled), tree_hash_hex(&tree));
        }
    }

    #[test]
    fn test_normalized_layout_n4() {
        let mut tree = QuartetTree::fixed_starting_tree(4).unwrap();
        normalize_tree(&mut tree).unwrap();
        // 0 and 2 share node 4, 1 and 3 share node 5
        assert_eq!(tree.encode(), vec![4, 4, 5, 4, 5, 0, 2, 5, 1, 3, 4]);
    }

    #[test]
    fn test_incomplete_tree_is_rejected_untouched() {
        let mut tree = QuartetTree::allocate(5).unwrap();
        tree.connect_both(0, 5).unwrap();
        let before = tree.clone();
        assert!(normalize_tree(&mut tree).is_err());
        assert_eq!(tree, before);
    }
}
