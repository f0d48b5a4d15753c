//! Quartet-consistency fit between a tree and a distance matrix.
//!
//! For every quartet the three pairings are costed by the input distances
//! (`d(x, y) + d(z, w)`). The tree picks one pairing; the score measures how
//! close the tree's picks are, in total, to the cheapest possible picks:
//!
//! ```text
//! score = 1 - (C_tree - C_min) / (C_max - C_min)
//! ```
//!
//! where `C_tree`, `C_min` and `C_max` sum the tree's, the cheapest and the
//! most expensive pairing cost over all quartets. A score of 1 means every
//! quartet is resolved the way the distances prefer.

use crate::distance::DistanceMatrix;
use crate::error::{MatrixError, Result, TreeError};
use crate::path::TruncatedPathMatrix;
use crate::quartet::{QuartetTopology, quartets};
use crate::tree::QuartetTree;

#[derive(Default)]
struct Totals {
    current: f64,
    min: f64,
    max: f64,
}

/// Fit of `tree` to `distances`, in `[0, 1]`.
///
/// `paths` must be the truncated path matrix of `tree`. When every quartet's
/// pairings cost the same (`C_max == C_min`) no tree can do better than any
/// other and the score is 1.
///
/// # Errors
/// Size mismatches between the tree, the path matrix and the distances.
pub fn score_tree(
    tree: &QuartetTree,
    paths: &TruncatedPathMatrix,
    distances: &DistanceMatrix,
) -> Result<f64> {
    let n = tree.leaf_count();
    if paths.leaf_count() != n {
        return Err(TreeError::SizeMismatch { expected: n, found: paths.leaf_count() }.into());
    }
    if distances.size() != n {
        return Err(MatrixError::LeafCountMismatch { expected: n, found: distances.size() }.into());
    }

    let mut totals = Totals::default();
    for (_, quartet) in quartets(tree) {
        let cost = |t: QuartetTopology| {
            let [(x, y), (z, w)] = quartet.pairs(t);
            distances.get(x, y) + distances.get(z, w)
        };
        let costs = QuartetTopology::ALL.map(cost);
        totals.current += cost(quartet.topology(paths));
        totals.min += costs.iter().copied().fold(f64::INFINITY, f64::min);
        totals.max += costs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    }

    let spread = totals.max - totals.min;
    if spread <= 0.0 {
        return Ok(1.0);
    }
    Ok((1.0 - (totals.current - totals.min) / spread).clamp(0.0, 1.0))
}

/// Convenience wrapper computing the path matrix first.
pub fn score_tree_with_distances(tree: &QuartetTree, distances: &DistanceMatrix) -> Result<f64> {
    score_tree(tree, &TruncatedPathMatrix::from_tree(tree), distances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::{Neighborhood, new_random_tree};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_own_path_matrix_scores_one() {
        for n in 4..=10 {
            let tree = QuartetTree::fixed_starting_tree(n).unwrap();
            let paths = TruncatedPathMatrix::from_tree(&tree);
            let dm = DistanceMatrix::from_path_matrix(&paths);
            assert_eq!(score_tree(&tree, &paths, &dm).unwrap(), 1.0, "n = {n}");
        }
    }

    #[test]
    fn test_scores_stay_in_unit_interval() {
        let mut rng = StdRng::seed_from_u64(7);
        let dm = DistanceMatrix::synthetic(9).unwrap();
        for _ in 0..20 {
            let tree = new_random_tree(9, Neighborhood::Nni, &mut rng).unwrap();
            let score = score_tree_with_distances(&tree, &dm).unwrap();
            assert!((0.0..=1.0).contains(&score), "score {score}");
        }
    }

    #[test]
    fn test_wrong_topology_scores_below_one() {
        // n = 4: the starting tree pairs 0-2 and 1-3; distances favour 0-1 and 2-3
        let tree = QuartetTree::fixed_starting_tree(4).unwrap();
        let rows = vec![
            vec![0.0, 1.0, 3.0, 3.0],
            vec![1.0, 0.0, 3.0, 3.0],
            vec![3.0, 3.0, 0.0, 1.0],
            vec![3.0, 3.0, 1.0, 0.0],
        ];
        let dm = DistanceMatrix::from_rows(&rows).unwrap();
        assert_eq!(score_tree_with_distances(&tree, &dm).unwrap(), 0.0);
    }

    #[test]
    fn test_flat_distances_score_one() {
        let rows: Vec<Vec<f64>> =
            (0..5).map(|i| (0..5).map(|j| if i == j { 0.0 } else { 1.0 }).collect()).collect();
        let dm = DistanceMatrix::from_rows(&rows).unwrap();
        let tree = QuartetTree::fixed_starting_tree(5).unwrap();
        assert_eq!(score_tree_with_distances(&tree, &dm).unwrap(), 1.0);
    }

    #[test]
    fn test_size_mismatch() {
        let tree = QuartetTree::fixed_starting_tree(5).unwrap();
        let dm = DistanceMatrix::synthetic(4).unwrap();
        assert!(score_tree_with_distances(&tree, &dm).is_err());
    }
}
