//! Bipartitions of a tree and the Robinson-Foulds distance.
//!
//! # Overview
//! Removing an internal edge splits the leaves into two groups. A
//! [`SplitSet`] holds every such split of a tree, which identifies the
//! topology independently of how internal nodes are numbered.
//!
//! # Canonicalization
//! A split `{A,B}|{C,D}` can be written from either side. Only the side
//! *without* leaf 0 is stored, which is the same as hanging the tree from
//! leaf 0 and recording the leaves below every internal edge:
//!
//! ```text
//!   0 -- u -- w -- 2        edge u-w:  below w = {2, 3}  -> stored 0b1100
//!        |    |
//!        1    3
//! ```

use std::collections::HashSet;

use rayon::prelude::*;

use crate::bitset::Bitset;
use crate::error::TreeError;
use crate::tree::{NodeId, QuartetTree};

/// The non-trivial splits of one tree, canonicalized.
///
/// # Fields
/// - `parts`: one [`Bitset`] per internal edge, the side without leaf 0
/// - `leaf_count`: leaves the bitsets range over
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSet {
    pub parts: HashSet<Bitset>,
    pub leaf_count: usize,
}

impl SplitSet {
    /// Collects the `n - 3` splits of a complete tree.
    ///
    /// Walks the tree from leaf 0 and ORs leaf sets bottom-up; every
    /// internal node other than the one next to leaf 0 closes the edge to its
    /// parent with the leaves below it.
    pub fn from_tree(tree: &QuartetTree) -> Self {
        let n = tree.leaf_count();
        let v = tree.node_count();

        let mut parent = vec![usize::MAX; v];
        let mut order: Vec<NodeId> = Vec::with_capacity(v);
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

        let mut below: Vec<Bitset> = vec![Bitset::for_leaves(n); v];
        for &node in order.iter().rev() {
            if tree.is_leaf(node) {
                below[node].insert(node);
            }
            if node != 0 && parent[node] != 0 {
                let child = below[node].clone();
                below[parent[node]].union_with(&child);
            }
        }

        let parts = order
            .iter()
            .filter(|&&node| !tree.is_leaf(node) && parent[node] != 0)
            .map(|&node| below[node].clone())
            .filter(|part| (2..=n - 2).contains(&part.len()))
            .collect();
        SplitSet { parts, leaf_count: n }
    }

    /// Whether the tree has the split with `side` on one side. Either side
    /// may be given.
    pub fn contains(&self, side: &Bitset) -> bool {
        if side.contains(0) {
            self.parts.contains(&side.complement(self.leaf_count))
        } else {
            self.parts.contains(side)
        }
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// `|A| + |B| - 2|A ∩ B|` over the splits of two trees on the same leaves.
///
/// ```text
/// ((0,1),(2,3))  splits {2,3}
/// ((0,2),(1,3))  splits {1,3}
/// shared: none   -> RF = 1 + 1 - 0 = 2
/// ```
pub fn rf_distance(a: &SplitSet, b: &SplitSet) -> Result<usize, TreeError> {
    if a.leaf_count != b.leaf_count {
        return Err(TreeError::SizeMismatch { expected: a.leaf_count, found: b.leaf_count });
    }
    let shared = a.parts.intersection(&b.parts).count();
    Ok(a.len() + b.len() - 2 * shared)
}

/// RF distance between two trees.
pub fn robinson_foulds(a: &QuartetTree, b: &QuartetTree) -> Result<usize, TreeError> {
    rf_distance(&SplitSet::from_tree(a), &SplitSet::from_tree(b))
}

/// Symmetric RF matrix over `trees`, pairs computed in parallel.
pub fn pairwise_rf(trees: &[QuartetTree]) -> Result<Vec<Vec<usize>>, TreeError> {
    let splits: Vec<SplitSet> = trees.par_iter().map(SplitSet::from_tree).collect();
    let n = splits.len();
    let pairs = (0..n)
        .into_par_iter()
        .flat_map_iter(|i| (i + 1..n).map(move |j| (i, j)))
        .map(|(i, j)| rf_distance(&splits[i], &splits[j]).map(|d| (i, j, d)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut matrix = vec![vec![0usize; n]; n];
    for (i, j, d) in pairs {
        matrix[i][j] = d;
        matrix[j][i] = d;
    }
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::{Neighborhood, new_random_tree};
    use crate::normalize::normalize_tree;
    use itertools::Itertools;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn bits(leaves: &[usize], n: usize) -> Bitset {
        let mut b = Bitset::for_leaves(n);
        leaves.iter().for_each(|&l| b.insert(l));
        b
    }

    #[test]
    fn test_splits_of_starting_tree() {
        // n = 4: 0 and 2 share a node, 1 and 3 the other
        let tree = QuartetTree::fixed_starting_tree(4).unwrap();
        let splits = SplitSet::from_tree(&tree);
        assert_eq!(splits.parts, HashSet::from([bits(&[1, 3], 4)]));

        // n = 6 caterpillar: 4 - 6 - 7 - 8 - 9 - 5 with leaves 0..4 hanging off
        let tree = QuartetTree::fixed_starting_tree(6).unwrap();
        let splits = SplitSet::from_tree(&tree);
        assert_eq!(splits.len(), 3);
        assert!(splits.parts.contains(&bits(&[2, 3, 5], 6)));
        assert!(splits.parts.contains(&bits(&[3, 5], 6)));
        assert!(splits.contains(&bits(&[0, 1, 2, 4], 6)));
        assert!(!splits.contains(&bits(&[0, 5], 6)));
        for part in &splits.parts {
            assert!(!part.contains(0));
        }
    }

    #[test]
    fn test_rf_ignores_labelling() {
        let mut a = QuartetTree::fixed_starting_tree(9).unwrap();
        let b = a.clone();
        normalize_tree(&mut a).unwrap();
        assert_eq!(robinson_foulds(&a, &b), Ok(0));
    }

    #[test]
    fn test_rf_of_distinct_topologies() {
        let mut rng = StdRng::seed_from_u64(17);
        let trees: Vec<QuartetTree> =
            (0..4).map(|_| new_random_tree(8, Neighborhood::Nni, &mut rng).unwrap()).collect();
        let matrix = pairwise_rf(&trees).unwrap();
        for (i, j) in (0..trees.len()).tuple_combinations() {
            assert_eq!(matrix[i][j], matrix[j][i]);
            assert_eq!(matrix[i][j] == 0, trees[i] == trees[j]);
            assert!(matrix[i][j] <= 2 * (8 - 3));
            assert_eq!(matrix[i][j] % 2, 0);
        }
    }

    #[test]
    fn test_rf_size_mismatch() {
        let a = QuartetTree::fixed_starting_tree(5).unwrap();
        let b = QuartetTree::fixed_starting_tree(6).unwrap();
        assert_eq!(
            robinson_foulds(&a, &b),
            Err(TreeError::SizeMismatch { expected: 5, found: 6 })
        );
    }
}
