//! Enumeration of the 4-leaf subsets of a tree.
//!
//! Every set of four leaves `{a, b, c, d}` is split by the tree into two
//! pairs; which pairing depends on where the internal path runs:
//!
//! ```text
//!   a       c        a       b        a       b
//!    \     /          \     /          \     /
//!     *---*            *---*            *---*
//!    /     \          /     \          /     \
//!   b       d        c       d        d       c
//!
//!    ab|cd            ac|bd            ad|bc
//! ```
//!
//! [`quartets`] only delivers the leaf ids; [`Quartet::topology`] reads the
//! pairing off a [`TruncatedPathMatrix`] when the caller needs it.

use itertools::Itertools;

use crate::path::TruncatedPathMatrix;
use crate::tree::{NodeId, QuartetTree};

/// Four leaf ids with `a < b < c < d`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Quartet {
    pub a: NodeId,
    pub b: NodeId,
    pub c: NodeId,
    pub d: NodeId,
}

/// The three ways to split a quartet into two pairs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QuartetTopology {
    AbCd,
    AcBd,
    AdBc,
}

impl QuartetTopology {
    pub const ALL: [QuartetTopology; 3] =
        [QuartetTopology::AbCd, QuartetTopology::AcBd, QuartetTopology::AdBc];
}

impl Quartet {
    /// The two pairs of `topology`, as `[(x, y), (z, w)]`.
    pub fn pairs(&self, topology: QuartetTopology) -> [(NodeId, NodeId); 2] {
        let Quartet { a, b, c, d } = *self;
        match topology {
            QuartetTopology::AbCd => [(a, b), (c, d)],
            QuartetTopology::AcBd => [(a, c), (b, d)],
            QuartetTopology::AdBc => [(a, d), (b, c)],
        }
    }

    /// The pairing the tree induces on this quartet.
    ///
    /// Four-point condition: the induced pairing is the one whose two
    /// within-pair path lengths have the strictly smallest sum.
    pub fn topology(&self, paths: &TruncatedPathMatrix) -> QuartetTopology {
        let cost = |t: QuartetTopology| {
            let [(x, y), (z, w)] = self.pairs(t);
            paths.get(x, y) + paths.get(z, w)
        };
        QuartetTopology::ALL
            .into_iter()
            .min_by_key(|&t| cost(t))
            .unwrap_or(QuartetTopology::AbCd)
    }
}

/// Number of quartets `C(n, 4)` over `leaf_count` leaves.
pub fn quartet_count(leaf_count: usize) -> usize {
    if leaf_count < 4 {
        return 0;
    }
    let n = leaf_count as u128;
    (n * (n - 1) * (n - 2) * (n - 3) / 24) as usize
}

/// Every 4-leaf subset of `tree` in lexicographic order, paired with its
/// sequence index.
///
/// Exactly [`quartet_count`] items are produced; stop pulling to stop early.
pub fn quartets(tree: &QuartetTree) -> impl Iterator<Item = (usize, Quartet)> + use<> {
    tree.leaves()
        .combinations(4)
        .map(|ids| Quartet { a: ids[0], b: ids[1], c: ids[2], d: ids[3] })
        .enumerate()
}
