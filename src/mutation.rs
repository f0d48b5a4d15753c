//! Local rearrangements of a tree and the neighborhood they span.
//!
//! # Move families
//!
//! | Kind | Move | Lanes `[kind, a, b, c]` |
//! |------|------|-------------------------|
//! | 0 | leaf swap: two leaves exchange attachment points | `[0, leaf, leaf, 0]` |
//! | 1 | subtree transfer: prune the subtree behind `a`, regraft on edge `b - c` | `[1, a, b, c]` |
//! | 2 | subtree interchange: swap the subtrees behind the ends of an internal path | `[2, a, b, 0]` |
//! | 3 | nearest-neighbor interchange: interchange across a single internal edge | `[3, a, b, 0]` |
//!
//! A [`Mutation`] packs into a `u64` ([`Mutation::code`]) as four
//! little-endian `u16` lanes, so a code identifies the move uniquely within
//! one tree.
//!
//! ```text
//!   NNI across edge u - w:
//!
//!   a1       b1          a1       b1         b2       b1
//!     \     /              \     /             \     /
//!      u---w       =>       u---w      or       u---w
//!     /     \              /     \             /     \
//!   a2       b2          b2       a2         a2       a1
//! ```
//!
//! [`Neighborhood::Nni`] uses kind 3 only and yields `2(n - 3)` trees;
//! [`Neighborhood::Extended`] uses kinds 0 to 2. Every produced tree is
//! normalized, and candidates topologically equal to the current tree or to
//! an earlier candidate are skipped.

use std::collections::HashSet;

use log::warn;
use rand::Rng;

use crate::error::{MutationError, Result, TreeError};
use crate::hash::tree_hash;
use crate::normalize::normalize_tree;
use crate::path::{PathMatrix, path_from_to};
use crate::tree::{NodeId, QuartetTree};
use crate::verify::verify_tree;

/// One rearrangement, addressed by node ids of the tree it applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mutation {
    /// Leaves `a` and `b` (path length > 2) trade their neighbors.
    LeafSwap { a: NodeId, b: NodeId },
    /// The subtree hanging from `node` moves, together with its attachment
    /// node, onto the edge `target - via`.
    SubtreeTransfer { node: NodeId, target: NodeId, via: NodeId },
    /// The subtrees behind internal nodes `a` and `b` (path length > 2)
    /// trade places.
    SubtreeInterchange { a: NodeId, b: NodeId },
    /// Nodes `a` and `b` at path length exactly 3 trade places across the
    /// internal edge between them.
    Nni { a: NodeId, b: NodeId },
}

impl Mutation {
    pub fn kind(&self) -> u16 {
        match self {
            Mutation::LeafSwap { .. } => 0,
            Mutation::SubtreeTransfer { .. } => 1,
            Mutation::SubtreeInterchange { .. } => 2,
            Mutation::Nni { .. } => 3,
        }
    }

    fn operands(&self) -> [NodeId; 3] {
        match *self {
            Mutation::LeafSwap { a, b }
            | Mutation::SubtreeInterchange { a, b }
            | Mutation::Nni { a, b } => [a, b, 0],
            Mutation::SubtreeTransfer { node, target, via } => [node, target, via],
        }
    }

    /// Packs the move as `kind | a << 16 | b << 32 | c << 48`.
    pub fn code(&self) -> u64 {
        let [a, b, c] = self.operands();
        [self.kind() as u64, a as u64, b as u64, c as u64]
            .iter()
            .enumerate()
            .fold(0, |acc, (lane, &value)| acc | ((value & 0xffff) << (16 * lane)))
    }

    /// Inverse of [`Mutation::code`].
    pub fn from_code(code: u64) -> std::result::Result<Self, MutationError> {
        let lane = |i: u32| ((code >> (16 * i)) & 0xffff) as NodeId;
        let (a, b, c) = (lane(1), lane(2), lane(3));
        match lane(0) {
            0 => Ok(Mutation::LeafSwap { a, b }),
            1 => Ok(Mutation::SubtreeTransfer { node: a, target: b, via: c }),
            2 => Ok(Mutation::SubtreeInterchange { a, b }),
            3 => Ok(Mutation::Nni { a, b }),
            kind => Err(MutationError::UnknownKind(kind as u16)),
        }
    }
}

/// Which move families make up a tree's neighborhood.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Neighborhood {
    /// Nearest-neighbor interchanges only.
    #[default]
    Nni,
    /// Leaf swaps, subtree transfers and subtree interchanges.
    Extended,
}

/// A neighboring tree together with the move that produced it.
#[derive(Clone, Debug)]
pub struct MutationCandidate {
    /// The rearranged, normalized tree.
    pub tree: QuartetTree,
    pub mutation: Mutation,
    /// Position among the distinct candidates of one enumeration.
    pub sequence: usize,
}

/// Every move of `neighborhood` that is structurally applicable to `tree`,
/// in enumeration order. Moves may still produce duplicate topologies.
///
/// `paths` must be the path matrix of `tree`; a stale one is rejected with
/// [`TreeError::InconsistentPathMatrix`].
pub fn candidate_moves(
    tree: &QuartetTree,
    paths: &PathMatrix,
    neighborhood: Neighborhood,
) -> std::result::Result<Vec<Mutation>, TreeError> {
    paths.ensure_describes(tree)?;
    let n = tree.leaf_count();
    let v = tree.node_count();
    let mut moves = Vec::new();

    match neighborhood {
        Neighborhood::Nni => {
            for (u, w) in tree.edges().filter(|&(u, w)| !tree.is_leaf(u) && !tree.is_leaf(w)) {
                let Some(a1) = tree.neighbors(u).filter(|&x| x != w).min() else {
                    continue;
                };
                let mut far: Vec<NodeId> = tree.neighbors(w).filter(|&x| x != u).collect();
                far.sort_unstable();
                for b in far {
                    moves.push(Mutation::Nni { a: a1.min(b), b: a1.max(b) });
                }
            }
        }
        Neighborhood::Extended => {
            for a in 0..n {
                for b in a + 1..n {
                    if paths.get(a, b) > 2 {
                        moves.push(Mutation::LeafSwap { a, b });
                    }
                }
            }
            for node in 0..v {
                for target in n..v {
                    if node == target || paths.get(node, target) <= 2 {
                        continue;
                    }
                    let path = path_from_to(tree, paths, node, target)?;
                    let (first, last) = (path[1], path[path.len() - 2]);
                    for via in tree.neighbors(target).filter(|&m| m != first && m != last) {
                        moves.push(Mutation::SubtreeTransfer { node, target, via });
                    }
                }
            }
            for a in n..v {
                for b in a + 1..v {
                    if paths.get(a, b) > 2 {
                        moves.push(Mutation::SubtreeInterchange { a, b });
                    }
                }
            }
        }
    }
    Ok(moves)
}

/// Lazily applies candidate moves, skipping repeated topologies.
///
/// Created by [`mutations`]. Dropping the iterator stops the enumeration.
pub struct MutationIter<'a> {
    tree: &'a QuartetTree,
    paths: &'a PathMatrix,
    moves: std::vec::IntoIter<Mutation>,
    seen: HashSet<u64>,
    sequence: usize,
}

impl Iterator for MutationIter<'_> {
    type Item = MutationCandidate;

    fn next(&mut self) -> Option<Self::Item> {
        for mutation in self.moves.by_ref() {
            let tree = match rearranged(self.tree, self.paths, mutation) {
                Ok(tree) => tree,
                Err(e) => {
                    warn!("skipping mutation {:#018x}: {e}", mutation.code());
                    continue;
                }
            };
            if self.seen.insert(tree_hash(&tree)) {
                let sequence = self.sequence;
                self.sequence += 1;
                return Some(MutationCandidate { tree, mutation, sequence });
            }
        }
        None
    }
}

/// The distinct neighbors of `tree`, in deterministic order.
///
/// # Errors
/// `tree` must pass [`verify_tree`] and `paths` must have its size.
pub fn mutations<'a>(
    tree: &'a QuartetTree,
    paths: &'a PathMatrix,
    neighborhood: Neighborhood,
) -> Result<MutationIter<'a>> {
    verify_tree(tree)?;
    let moves = candidate_moves(tree, paths, neighborhood)?;
    let mut current = tree.clone();
    normalize_tree(&mut current)?;
    let seen = HashSet::from([tree_hash(&current)]);
    Ok(MutationIter { tree, paths, moves: moves.into_iter(), seen, sequence: 0 })
}

/// Applies `mutation` to `tree` in place and normalizes the result.
///
/// `paths` must be the path matrix of `tree` before the move. On error the
/// tree is left untouched.
pub fn apply_mutation(tree: &mut QuartetTree, paths: &PathMatrix, mutation: Mutation) -> Result<()> {
    *tree = rearranged(tree, paths, mutation)?;
    Ok(())
}

fn rearranged(tree: &QuartetTree, paths: &PathMatrix, mutation: Mutation) -> Result<QuartetTree> {
    paths.ensure_describes(tree)?;
    let v = tree.node_count();
    let code = mutation.code();
    let fail = |reason: &'static str| MutationError::NotApplicable { code, reason };
    if mutation.operands().iter().any(|&x| x >= v) {
        return Err(fail("node out of range").into());
    }

    let mut out = tree.clone();
    match mutation {
        Mutation::LeafSwap { a, b } => {
            if !tree.is_leaf(a) || !tree.is_leaf(b) {
                return Err(fail("leaf swap needs two leaves").into());
            }
            if paths.get(a, b) <= 2 {
                return Err(fail("leaves share an attachment point").into());
            }
            let na = tree.slot(a, 0).ok_or(fail("leaf is detached"))?;
            let nb = tree.slot(b, 0).ok_or(fail("leaf is detached"))?;
            out.remove_from_both(a, na)?;
            out.remove_from_both(b, nb)?;
            out.connect_both(a, nb)?;
            out.connect_both(b, na)?;
        }
        Mutation::SubtreeTransfer { node, target, via } => {
            if tree.is_leaf(target) {
                return Err(fail("regraft target must be internal").into());
            }
            if paths.get(node, target) <= 2 {
                return Err(fail("subtree is already next to the target").into());
            }
            let path = path_from_to(tree, paths, node, target)?;
            let attach = path[1];
            if via == path[path.len() - 2] || !tree.is_connected(target, via) {
                return Err(fail("regraft edge must leave the path").into());
            }
            out.remove_from_both(node, attach)?;
            let rest: Vec<NodeId> = out.neighbors(attach).collect();
            let &[m1, m2] = rest.as_slice() else {
                return Err(fail("attachment node is not binary").into());
            };
            out.remove_from_both(m1, attach)?;
            out.remove_from_both(m2, attach)?;
            out.remove_from_both(via, target)?;
            out.connect_both(m1, m2)?;
            out.connect_both(target, attach)?;
            out.connect_both(via, attach)?;
            out.connect_both(node, attach)?;
        }
        Mutation::SubtreeInterchange { a, b } | Mutation::Nni { a, b } => {
            let distance = paths.get(a, b);
            if let Mutation::Nni { .. } = mutation {
                if distance != 3 {
                    return Err(fail("nearest-neighbor interchange needs path length 3").into());
                }
            } else if tree.is_leaf(a) || tree.is_leaf(b) || distance <= 2 {
                return Err(fail("interchange needs internal nodes at path length > 2").into());
            }
            let path = path_from_to(tree, paths, a, b)?;
            let (na, nb) = (path[1], path[path.len() - 2]);
            out.remove_from_both(na, a)?;
            out.remove_from_both(nb, b)?;
            out.connect_both(na, b)?;
            out.connect_both(nb, a)?;
        }
    }
    normalize_tree(&mut out)?;
    Ok(out)
}

/// Draws one neighbor of `tree` uniformly at random.
///
/// # Errors
/// [`MutationError::EmptyNeighborhood`] if `tree` has no distinct neighbor,
/// or any error of [`mutations`].
pub fn random_mutation<R: Rng + ?Sized>(
    tree: &QuartetTree,
    neighborhood: Neighborhood,
    rng: &mut R,
) -> Result<MutationCandidate> {
    let paths = PathMatrix::from_tree(tree);
    match neighborhood {
        // every NNI move yields a distinct topology, no dedup pass needed
        Neighborhood::Nni => {
            verify_tree(tree)?;
            let moves = candidate_moves(tree, &paths, neighborhood)?;
            if moves.is_empty() {
                return Err(MutationError::EmptyNeighborhood.into());
            }
            let sequence = rng.random_range(0..moves.len());
            let mutation = moves[sequence];
            let tree = rearranged(tree, &paths, mutation)?;
            Ok(MutationCandidate { tree, mutation, sequence })
        }
        Neighborhood::Extended => {
            let mut candidates: Vec<MutationCandidate> = mutations(tree, &paths, neighborhood)?.collect();
            if candidates.is_empty() {
                return Err(MutationError::EmptyNeighborhood.into());
            }
            let pick = rng.random_range(0..candidates.len());
            Ok(candidates.swap_remove(pick))
        }
    }
}

/// Replaces `tree` by a random neighbor and returns the move taken.
pub fn apply_random_mutation<R: Rng + ?Sized>(
    tree: &mut QuartetTree,
    neighborhood: Neighborhood,
    rng: &mut R,
) -> Result<Mutation> {
    let candidate = random_mutation(tree, neighborhood, rng)?;
    *tree = candidate.tree;
    Ok(candidate.mutation)
}

/// The normalized starting tree followed by `10 * n` random moves.
pub fn new_random_tree<R: Rng + ?Sized>(
    leaf_count: usize,
    neighborhood: Neighborhood,
    rng: &mut R,
) -> Result<QuartetTree> {
    let mut tree = QuartetTree::fixed_starting_tree(leaf_count)?;
    normalize_tree(&mut tree)?;
    for _ in 0..10 * leaf_count {
        apply_random_mutation(&mut tree, neighborhood, rng)?;
    }
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QuartetError;
    use crate::hash::tree_hash_hex;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn start(n: usize) -> QuartetTree {
        let mut tree = QuartetTree::fixed_starting_tree(n).unwrap();
        normalize_tree(&mut tree).unwrap();
        tree
    }

    #[test]
    fn test_nni_neighborhood_size() {
        for n in 4..=10 {
            let tree = start(n);
            let paths = PathMatrix::from_tree(&tree);
            let count = mutations(&tree, &paths, Neighborhood::Nni).unwrap().count();
            assert_eq!(count, 2 * (n - 3), "n = {n}");
        }
    }

    #[test]
    fn test_four_leaves_have_two_neighbors() {
        // three unrooted topologies exist on four leaves
        let tree = start(4);
        let paths = PathMatrix::from_tree(&tree);
        for neighborhood in [Neighborhood::Nni, Neighborhood::Extended] {
            assert_eq!(mutations(&tree, &paths, neighborhood).unwrap().count(), 2);
        }
    }

    #[test]
    fn test_candidates_are_valid_and_distinct() {
        let tree = start(7);
        let paths = PathMatrix::from_tree(&tree);
        let mut digests = HashSet::from([tree_hash_hex(&tree)]);
        for (i, candidate) in mutations(&tree, &paths, Neighborhood::Extended).unwrap().enumerate() {
            assert_eq!(candidate.sequence, i);
            assert_eq!(verify_tree(&candidate.tree), Ok(()));
            assert!(digests.insert(tree_hash_hex(&candidate.tree)));

            // replaying the code on the original tree gives the same candidate
            let mut replay = tree.clone();
            let mutation = Mutation::from_code(candidate.mutation.code()).unwrap();
            apply_mutation(&mut replay, &paths, mutation).unwrap();
            assert_eq!(replay, candidate.tree);
        }
        assert!(digests.len() > 2 * (7 - 3));
    }

    #[test]
    fn test_enumeration_is_deterministic_and_stoppable() {
        let tree = start(8);
        let paths = PathMatrix::from_tree(&tree);
        let codes = |nb| {
            mutations(&tree, &paths, nb)
                .unwrap()
                .map(|c| c.mutation.code())
                .collect::<Vec<_>>()
        };
        assert_eq!(codes(Neighborhood::Extended), codes(Neighborhood::Extended));

        let first: Vec<usize> = mutations(&tree, &paths, Neighborhood::Nni)
            .unwrap()
            .take(3)
            .map(|c| c.sequence)
            .collect();
        assert_eq!(first, vec![0, 1, 2]);
    }

    #[test]
    fn test_code_lanes() {
        let transfer = Mutation::SubtreeTransfer { node: 3, target: 9, via: 11 };
        assert_eq!(transfer.code(), 1 | (3 << 16) | (9 << 32) | (11 << 48));
        assert_eq!(Mutation::from_code(transfer.code()), Ok(transfer));
        assert_eq!(Mutation::from_code(7), Err(MutationError::UnknownKind(7)));
    }

    #[test]
    fn test_inapplicable_moves_are_rejected() {
        // n = 4 normalized: leaves 0 and 2 share node 4
        let mut tree = start(4);
        let before = tree.clone();
        let paths = PathMatrix::from_tree(&tree);
        for mutation in [
            Mutation::LeafSwap { a: 0, b: 2 },
            Mutation::LeafSwap { a: 0, b: 4 },
            Mutation::Nni { a: 0, b: 2 },
            Mutation::SubtreeInterchange { a: 4, b: 5 },
            Mutation::LeafSwap { a: 0, b: 40 },
        ] {
            let err = apply_mutation(&mut tree, &paths, mutation).unwrap_err();
            assert!(matches!(err, QuartetError::Mutation(MutationError::NotApplicable { .. })));
            assert_eq!(tree, before);
        }
    }

    #[test]
    fn test_stale_path_matrix_is_rejected() {
        let tree = start(6);
        let paths = PathMatrix::from_tree(&tree);
        let neighbor = mutations(&tree, &paths, Neighborhood::Nni).unwrap().next().unwrap().tree;
        for neighborhood in [Neighborhood::Nni, Neighborhood::Extended] {
            assert!(matches!(
                mutations(&neighbor, &paths, neighborhood).map(|_| ()),
                Err(QuartetError::Tree(TreeError::InconsistentPathMatrix(_)))
            ));
        }
        let mut moved = neighbor.clone();
        let err = apply_mutation(&mut moved, &paths, Mutation::LeafSwap { a: 0, b: 1 }).unwrap_err();
        assert!(matches!(err, QuartetError::Tree(TreeError::InconsistentPathMatrix(_))));
        assert_eq!(moved, neighbor);
    }

    #[test]
    fn test_random_extended_pick_is_an_enumerated_candidate() {
        let mut rng = StdRng::seed_from_u64(8);
        let tree = new_random_tree(7, Neighborhood::Extended, &mut rng).unwrap();
        let paths = PathMatrix::from_tree(&tree);
        let all: Vec<MutationCandidate> =
            mutations(&tree, &paths, Neighborhood::Extended).unwrap().collect();
        for _ in 0..10 {
            let picked = random_mutation(&tree, Neighborhood::Extended, &mut rng).unwrap();
            let listed = &all[picked.sequence];
            assert_eq!(listed.tree, picked.tree);
            assert_eq!(listed.mutation, picked.mutation);
        }
    }

    #[test]
    fn test_random_trees_are_valid_and_reproducible() {
        for neighborhood in [Neighborhood::Nni, Neighborhood::Extended] {
            let a = new_random_tree(9, neighborhood, &mut StdRng::seed_from_u64(42)).unwrap();
            let b = new_random_tree(9, neighborhood, &mut StdRng::seed_from_u64(42)).unwrap();
            assert_eq!(a, b);
            assert_eq!(verify_tree(&a), Ok(()));
            let mut again = a.clone();
            normalize_tree(&mut again).unwrap();
            assert_eq!(again, a);
        }
    }

    #[test]
    fn test_apply_random_mutation_changes_topology() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut tree = start(6);
        for _ in 0..25 {
            let before = tree.clone();
            apply_random_mutation(&mut tree, Neighborhood::Extended, &mut rng).unwrap();
            assert_eq!(verify_tree(&tree), Ok(()));
            assert_ne!(tree, before);
        }
    }
}
