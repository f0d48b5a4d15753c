//! All-pairs path lengths over a tree snapshot.
//!
//! # Overview
//! [`PathMatrix`] holds the number of edges on the unique path between every
//! ordered pair of nodes (`V x V`). [`TruncatedPathMatrix`] keeps only the
//! leaf block (`n x n`), which is what scoring compares against the input
//! distances.
//!
//! Both are snapshots: once the tree's edges change they must be rebuilt.
//! [`PathMatrix::rewrite`] refills an existing matrix so search loops can keep
//! one scratch buffer around instead of allocating every step.

use std::collections::VecDeque;

use crate::error::TreeError;
use crate::tree::{NodeId, QuartetTree};

/// `V x V` path lengths (edge counts) of one tree snapshot.
///
/// Pairs that are not joined by any path (only possible while a tree is
/// being assembled) hold `node_count`, which is longer than any real path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathMatrix {
    node_count: usize,
    lengths: Vec<u16>,
}

impl PathMatrix {
    /// Breadth-first search from every node; `O(V^2)` overall.
    pub fn from_tree(tree: &QuartetTree) -> Self {
        let mut matrix = PathMatrix { node_count: tree.node_count(), lengths: Vec::new() };
        matrix.rewrite(tree);
        matrix
    }

    /// Recomputes this matrix for `tree`, reusing the buffer when the size
    /// already matches.
    pub fn rewrite(&mut self, tree: &QuartetTree) {
        let v = tree.node_count();
        let unreachable = v as u16;
        self.node_count = v;
        self.lengths.clear();
        self.lengths.resize(v * v, unreachable);

        let mut queue = VecDeque::with_capacity(v);
        for source in 0..v {
            let row = &mut self.lengths[source * v..(source + 1) * v];
            row[source] = 0;
            queue.clear();
            queue.push_back(source);
            while let Some(node) = queue.pop_front() {
                let next = row[node] + 1;
                for neighbor in tree.neighbors(node) {
                    // visited check: a neighbor's slot also lists `node`
                    if neighbor < v && row[neighbor] == unreachable {
                        row[neighbor] = next;
                        queue.push_back(neighbor);
                    }
                }
            }
        }
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Path length between `a` and `b`.
    ///
    /// # Panics
    /// Panics if either id is `>= node_count`.
    #[inline]
    pub fn get(&self, a: NodeId, b: NodeId) -> usize {
        self.lengths[a * self.node_count + b] as usize
    }

    /// Whether `a` and `b` are joined by a path.
    pub fn is_reachable(&self, a: NodeId, b: NodeId) -> bool {
        self.get(a, b) < self.node_count
    }

    /// Checks that this matrix was built for `tree` as it is now: same size,
    /// and every edge of `tree` has length 1. A complete tree is determined
    /// by its edge set, so a matrix of any other tree fails on some edge.
    pub fn ensure_describes(&self, tree: &QuartetTree) -> Result<(), TreeError> {
        let v = tree.node_count();
        if self.node_count != v {
            return Err(TreeError::SizeMismatch { expected: v, found: self.node_count });
        }
        match tree.edges().find(|&(a, b)| self.get(a, b) != 1) {
            Some((a, _)) => Err(TreeError::InconsistentPathMatrix(a)),
            None => Ok(()),
        }
    }

    pub fn row(&self, node: NodeId) -> &[u16] {
        &self.lengths[node * self.node_count..(node + 1) * self.node_count]
    }

    /// Copies the leaf block `[0, n) x [0, n)`.
    pub fn truncate(&self, leaf_count: usize) -> TruncatedPathMatrix {
        let mut lengths = Vec::with_capacity(leaf_count * leaf_count);
        for leaf in 0..leaf_count {
            lengths.extend_from_slice(&self.row(leaf)[..leaf_count]);
        }
        TruncatedPathMatrix { leaf_count, lengths }
    }
}

/// Leaf-to-leaf path lengths (`n x n`), symmetric with a zero diagonal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TruncatedPathMatrix {
    leaf_count: usize,
    lengths: Vec<u16>,
}

impl TruncatedPathMatrix {
    /// Shortcut for `PathMatrix::from_tree(tree).truncate(n)`.
    pub fn from_tree(tree: &QuartetTree) -> Self {
        PathMatrix::from_tree(tree).truncate(tree.leaf_count())
    }

    #[inline]
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    #[inline]
    pub fn get(&self, a: NodeId, b: NodeId) -> usize {
        self.lengths[a * self.leaf_count + b] as usize
    }

    /// Rows as `f64`, e.g. to use a tree's own path lengths as distances.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.lengths
            .chunks(self.leaf_count)
            .map(|row| row.iter().map(|&d| d as f64).collect())
            .collect()
    }
}

/// Reconstructs the unique simple path from `src` to `dest`, both included.
///
/// # Algorithm
/// Starting at `src`, repeatedly step to the neighbor `u` of the current node
/// with `path[u][dest] == path[current][dest] - 1`. In a tree exactly one
/// neighbor qualifies, so the result has `path[src][dest] + 1` nodes and
/// consecutive entries are always adjacent.
///
/// # Errors
/// - [`TreeError::SizeMismatch`] if `matrix` was built for another tree size
/// - [`TreeError::Unreachable`] if no path joins the nodes
/// - [`TreeError::InconsistentPathMatrix`] if the matrix does not match `tree`
pub fn path_from_to(
    tree: &QuartetTree,
    matrix: &PathMatrix,
    src: NodeId,
    dest: NodeId,
) -> Result<Vec<NodeId>, TreeError> {
    let v = tree.node_count();
    if matrix.node_count() != v {
        return Err(TreeError::SizeMismatch { expected: v, found: matrix.node_count() });
    }
    for node in [src, dest] {
        if node >= v {
            return Err(TreeError::NodeOutOfRange { node, node_count: v });
        }
    }
    if !matrix.is_reachable(src, dest) {
        return Err(TreeError::Unreachable { from: src, to: dest });
    }

    let mut path = Vec::with_capacity(matrix.get(src, dest) + 1);
    let mut current = src;
    path.push(current);
    while current != dest {
        let remaining = matrix.get(current, dest);
        current = tree
            .neighbors(current)
            .find(|&u| u < v && matrix.get(u, dest) + 1 == remaining)
            .ok_or(TreeError::InconsistentPathMatrix(current))?;
        path.push(current);
    }
    Ok(path)
}
