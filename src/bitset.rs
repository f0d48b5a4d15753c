//! Fixed-width sets of leaf ids.
//!
//! Bit `i` stands for leaf `i`. Words are `u64`, so a tree over `n` leaves
//! needs `n.div_ceil(64)` words:
//!
//! ```text
//! leaves {0, 2}    -> 0b0101
//! leaves {1, 2, 3} -> 0b1110
//! ```

/// A set of leaf ids stored as packed `u64` words.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Bitset(pub Vec<u64>);

impl Bitset {
    /// Empty set sized for `leaf_count` leaves.
    ///
    /// # Example
    /// ```
    /// # use quartet_search::bitset::Bitset;
    /// let leaves = Bitset::for_leaves(70);
    /// assert_eq!(leaves.0.len(), 2);
    /// assert!(leaves.is_empty());
    /// ```
    pub fn for_leaves(leaf_count: usize) -> Self {
        Bitset(vec![0; leaf_count.div_ceil(64)])
    }

    #[inline]
    pub fn insert(&mut self, leaf: usize) {
        self.0[leaf / 64] |= 1 << (leaf % 64);
    }

    #[inline]
    pub fn contains(&self, leaf: usize) -> bool {
        self.0.get(leaf / 64).is_some_and(|word| (word >> (leaf % 64)) & 1 == 1)
    }

    /// Adds every leaf of `other`.
    ///
    /// # Example
    /// ```
    /// # use quartet_search::bitset::Bitset;
    /// let mut below = Bitset::for_leaves(4);
    /// below.insert(0);
    /// let mut sibling = Bitset::for_leaves(4);
    /// sibling.insert(3);
    /// below.union_with(&sibling);
    /// assert_eq!(below.0[0], 0b1001);
    /// ```
    pub fn union_with(&mut self, other: &Bitset) {
        self.0.iter_mut().zip(&other.0).for_each(|(mine, theirs)| *mine |= theirs);
    }

    /// Number of leaves in the set.
    pub fn len(&self) -> usize {
        self.0.iter().map(|word| word.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&word| word == 0)
    }

    /// The leaves in `0..leaf_count` missing from this set.
    pub fn complement(&self, leaf_count: usize) -> Bitset {
        let words = self.0.iter().enumerate().map(|(i, &word)| {
            let used = leaf_count.saturating_sub(i * 64).min(64);
            let mask = if used == 64 { u64::MAX } else { (1 << used) - 1 };
            !word & mask
        });
        Bitset(words.collect())
    }
}
