//! Compact array encoding of unrooted binary ("quartet") trees.
//!
//! # Overview
//! A tree over `n` leaves has `V = 2n - 2` nodes and `V - 1 = 2n - 3` edges.
//! Leaves use ids `0..n`, internal nodes use ids `n..2n-2`. Every node owns a
//! fixed number of neighbor slots:
//!
//! - a leaf owns **one** slot,
//! - an internal node owns **three** slots.
//!
//! All slots live in one flat vector, leaves first:
//!
//! ```text
//! n = 4, V = 6
//!
//!  slot index:  0   1   2   3 | 4   5   6 | 7   8   9
//!  owner:       L0  L1  L2  L3| ---- 4 ---| ---- 5 ---|
//!
//!  0       1
//!   \     /
//!    4 - 5
//!   /     \
//!  2       3
//! ```
//!
//! A slot is either `Some(neighbor)` or `None` (empty). In a *complete* tree
//! every slot is occupied, connections are reciprocal, and the graph is a
//! tree; see [`crate::verify`] for the full list of checks.
//!
//! # Raw layout
//! [`QuartetTree::encode`] produces the flat `u16` buffer shared with code
//! that does not go through this API: one metadata cell holding the leaf
//! count, followed by the slots with [`EMPTY_SLOT`] marking empty ones. Its
//! length is [`allocation_size`].

use std::ops::Range;

use crate::error::TreeError;

/// Node identifier. Leaves are `0..n`, internal nodes `n..2n-2`.
pub type NodeId = usize;

/// Smallest tree with an internal edge.
pub const MIN_LEAF_COUNT: usize = 4;

/// Largest tree whose node ids fit the `u16` slot encoding.
pub const MAX_LEAF_COUNT: usize = 16000;

/// Sentinel for an empty slot in the raw encoding.
pub const EMPTY_SLOT: u16 = u16::MAX;

/// Number of nodes (`2n - 2`) of a tree with `leaf_count` leaves.
#[inline]
pub fn node_count(leaf_count: usize) -> usize {
    2 * leaf_count - 2
}

/// Number of neighbor slots (`n + 3(n - 2)`) of a tree with `leaf_count` leaves.
#[inline]
pub fn slot_count(leaf_count: usize) -> usize {
    4 * leaf_count - 6
}

/// Size of the raw encoding in `u16` cells: one metadata cell plus every slot.
///
/// # Example
/// ```
/// # use quartet_search::tree::allocation_size;
/// // 1 + 4 leaf slots + 3 * 2 internal slots
/// assert_eq!(allocation_size(4), 11);
/// ```
#[inline]
pub fn allocation_size(leaf_count: usize) -> usize {
    1 + slot_count(leaf_count)
}

fn check_leaf_count(leaf_count: usize) -> Result<(), TreeError> {
    if (MIN_LEAF_COUNT..=MAX_LEAF_COUNT).contains(&leaf_count) {
        Ok(())
    } else {
        Err(TreeError::LeafCountOutOfRange(leaf_count))
    }
}

/// An unrooted binary tree stored as fixed-capacity neighbor slots.
///
/// # Fields
/// - `leaf_count`: the leaf-count tag; determines the slot layout
/// - `slots`: all neighbor slots, leaves first, then three per internal node
///
/// Nothing derived from the edges is cached here. Path matrices and scores
/// computed from a tree go stale as soon as its edges change.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QuartetTree {
    leaf_count: usize,
    slots: Vec<Option<u16>>,
}

impl QuartetTree {
    /// Allocates a disintegrated tree: every slot empty, tag set to `leaf_count`.
    ///
    /// # Errors
    /// - [`TreeError::LeafCountOutOfRange`] unless `4 <= leaf_count <= 16000`
    /// - [`TreeError::Allocation`] if the slot storage cannot be reserved
    pub fn allocate(leaf_count: usize) -> Result<Self, TreeError> {
        check_leaf_count(leaf_count)?;
        let wanted = slot_count(leaf_count);
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(wanted)
            .map_err(|_| TreeError::Allocation(leaf_count))?;
        slots.resize(wanted, None);
        Ok(QuartetTree { leaf_count, slots })
    }

    /// Builds the deterministic caterpillar used as the starting point of
    /// every search.
    ///
    /// Leaf `i` hangs off internal node `n + i` for `i < n - 2`, the internal
    /// nodes form a chain `n - (n+1) - ... - (2n-3)`, and the last two leaves
    /// close both ends of the chain.
    ///
    /// ```text
    /// n = 6:   0   1   2   3
    ///          |   |   |   |
    ///      4 - 6 - 7 - 8 - 9 - 5
    /// ```
    pub fn fixed_starting_tree(leaf_count: usize) -> Result<Self, TreeError> {
        let mut tree = Self::allocate(leaf_count)?;
        let n = leaf_count;
        for i in 0..n - 2 {
            tree.connect_both(i, n + i)?;
            if i > 0 {
                tree.connect_both(n + i - 1, n + i)?;
            }
        }
        tree.connect_both(n - 2, n)?;
        tree.connect_both(n - 1, 2 * n - 3)?;
        Ok(tree)
    }

    /// Wraps caller-provided slots without structural validation.
    ///
    /// The slot vector is taken as-is so that a buffer produced elsewhere can
    /// be checked with [`crate::verify::verify_tree`]; only the leaf count and
    /// the id width are validated here.
    pub fn from_slots(leaf_count: usize, slots: Vec<Option<NodeId>>) -> Result<Self, TreeError> {
        check_leaf_count(leaf_count)?;
        let slots = slots
            .into_iter()
            .map(|slot| match slot {
                Some(id) if id >= EMPTY_SLOT as usize => Err(TreeError::NodeOutOfRange {
                    node: id,
                    node_count: node_count(leaf_count),
                }),
                Some(id) => Ok(Some(id as u16)),
                None => Ok(None),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(QuartetTree { leaf_count, slots })
    }

    /// Rebuilds a tree from the raw layout produced by [`QuartetTree::encode`].
    ///
    /// # Errors
    /// Returns [`TreeError::BadEncoding`] when the buffer length does not match
    /// `allocation_size(buffer[0])`.
    pub fn from_encoded(buffer: &[u16]) -> Result<Self, TreeError> {
        let Some((&tag, cells)) = buffer.split_first() else {
            return Err(TreeError::BadEncoding { expected: 1, found: 0 });
        };
        let leaf_count = tag as usize;
        check_leaf_count(leaf_count)?;
        if buffer.len() != allocation_size(leaf_count) {
            return Err(TreeError::BadEncoding {
                expected: allocation_size(leaf_count),
                found: buffer.len(),
            });
        }
        let slots = cells
            .iter()
            .map(|&c| if c == EMPTY_SLOT { None } else { Some(c) })
            .collect();
        Ok(QuartetTree { leaf_count, slots })
    }

    /// Encodes the tree as `[leaf_count, slot_0, slot_1, ...]`.
    ///
    /// # Example
    /// ```
    /// # use quartet_search::tree::{QuartetTree, EMPTY_SLOT};
    /// let tree = QuartetTree::allocate(4).unwrap();
    /// let raw = tree.encode();
    /// assert_eq!(raw.len(), 11);
    /// assert_eq!(raw[0], 4);
    /// assert!(raw[1..].iter().all(|&c| c == EMPTY_SLOT));
    /// ```
    pub fn encode(&self) -> Vec<u16> {
        let mut out = Vec::with_capacity(1 + self.slots.len());
        out.push(self.leaf_count as u16);
        out.extend(self.slots.iter().map(|s| s.unwrap_or(EMPTY_SLOT)));
        out
    }

    #[inline]
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        node_count(self.leaf_count)
    }

    /// Number of undirected edges of a complete tree (`V - 1`).
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.node_count() - 1
    }

    #[inline]
    pub fn is_leaf(&self, node: NodeId) -> bool {
        node < self.leaf_count
    }

    pub fn leaves(&self) -> Range<NodeId> {
        0..self.leaf_count
    }

    pub fn internal_nodes(&self) -> Range<NodeId> {
        self.leaf_count..self.node_count()
    }

    /// Number of slots owned by `node`: 1 for a leaf, 3 otherwise.
    #[inline]
    pub fn capacity(&self, node: NodeId) -> usize {
        if self.is_leaf(node) { 1 } else { 3 }
    }

    /// Index of `node`'s first slot in the flat slot vector.
    #[inline]
    pub fn slot_base(&self, node: NodeId) -> usize {
        if self.is_leaf(node) {
            node
        } else {
            self.leaf_count + 3 * (node - self.leaf_count)
        }
    }

    /// Raw slots owned by `node`. Empty if `node` does not exist.
    pub fn node_slots(&self, node: NodeId) -> &[Option<u16>] {
        if node >= self.node_count() {
            return &[];
        }
        let base = self.slot_base(node);
        self.slots.get(base..base + self.capacity(node)).unwrap_or(&[])
    }

    /// Content of slot `index` of `node`, if occupied.
    pub fn slot(&self, node: NodeId, index: usize) -> Option<NodeId> {
        self.node_slots(node).get(index).copied().flatten().map(NodeId::from)
    }

    /// All slots of the tree, in layout order.
    pub fn slots(&self) -> &[Option<u16>] {
        &self.slots
    }

    /// Occupied neighbors of `node`, in slot order.
    pub fn neighbors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.node_slots(node).iter().filter_map(|s| s.map(NodeId::from))
    }

    pub fn degree(&self, node: NodeId) -> usize {
        self.node_slots(node).iter().filter(|s| s.is_some()).count()
    }

    /// Every undirected edge once, as `(a, b)` with `a < b`.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        (0..self.node_count())
            .flat_map(move |a| self.neighbors(a).filter(move |&b| a < b).map(move |b| (a, b)))
    }

    /// Clears every slot, keeping the leaf-count tag.
    pub fn disintegrate(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
    }

    /// Whether `b` occupies one of `a`'s slots. `O(degree(a))`.
    pub fn is_connected(&self, a: NodeId, b: NodeId) -> bool {
        a != b && b < self.node_count() && self.node_slots(a).contains(&Some(b as u16))
    }

    fn ensure_node(&self, node: NodeId) -> Result<(), TreeError> {
        if node < self.node_count() {
            Ok(())
        } else {
            Err(TreeError::NodeOutOfRange { node, node_count: self.node_count() })
        }
    }

    fn free_slot(&self, node: NodeId) -> Option<usize> {
        let base = self.slot_base(node);
        self.node_slots(node).iter().position(Option::is_none).map(|i| base + i)
    }

    fn slot_holding(&self, node: NodeId, target: NodeId) -> Option<usize> {
        if target >= self.node_count() {
            return None;
        }
        let base = self.slot_base(node);
        self.node_slots(node)
            .iter()
            .position(|s| *s == Some(target as u16))
            .map(|i| base + i)
    }

    /// Writes `b` into the first empty slot of `a` and `a` into the first
    /// empty slot of `b`.
    ///
    /// Nothing is written unless both sides have room.
    ///
    /// # Errors
    /// - [`TreeError::SelfLoop`] if `a == b`
    /// - [`TreeError::AlreadyConnected`] if the edge exists
    /// - [`TreeError::Saturated`] if either node has no empty slot
    pub fn connect_both(&mut self, a: NodeId, b: NodeId) -> Result<(), TreeError> {
        self.ensure_node(a)?;
        self.ensure_node(b)?;
        if a == b {
            return Err(TreeError::SelfLoop(a));
        }
        if self.is_connected(a, b) || self.is_connected(b, a) {
            return Err(TreeError::AlreadyConnected(a, b));
        }
        let slot_a = self.free_slot(a).ok_or(TreeError::Saturated(a))?;
        let slot_b = self.free_slot(b).ok_or(TreeError::Saturated(b))?;
        self.slots[slot_a] = Some(b as u16);
        self.slots[slot_b] = Some(a as u16);
        Ok(())
    }

    /// Clears the slot of `a` holding `b` and the slot of `b` holding `a`.
    ///
    /// # Errors
    /// Returns [`TreeError::NotConnected`] (leaving the slots untouched) unless
    /// both directions of the edge are present. Callers wanting idempotent
    /// disconnects can discard this error.
    pub fn remove_from_both(&mut self, a: NodeId, b: NodeId) -> Result<(), TreeError> {
        self.ensure_node(a)?;
        self.ensure_node(b)?;
        match (self.slot_holding(a, b), self.slot_holding(b, a)) {
            (Some(slot_a), Some(slot_b)) if a != b => {
                self.slots[slot_a] = None;
                self.slots[slot_b] = None;
                Ok(())
            }
            _ => Err(TreeError::NotConnected(a, b)),
        }
    }

    /// Overwrites this tree with `source`, reusing the allocation.
    pub fn copy_from(&mut self, source: &QuartetTree) -> Result<(), TreeError> {
        if source.leaf_count != self.leaf_count {
            return Err(TreeError::SizeMismatch {
                expected: self.leaf_count,
                found: source.leaf_count,
            });
        }
        self.slots.clone_from(&source.slots);
        Ok(())
    }

    /// Replaces the whole slot vector. Used by normalization, which rebuilds
    /// the layout wholesale.
    pub(crate) fn replace_slots(&mut self, slots: Vec<Option<u16>>) {
        debug_assert_eq!(slots.len(), self.slots.len());
        self.slots = slots;
    }
}
