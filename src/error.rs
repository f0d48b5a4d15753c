//! Error types shared across the crate.
//!
//! Every fallible operation reports to its immediate caller; nothing in the
//! library aborts the process. Verification failures in particular are
//! returned as values so the search driver or test harness decides whether
//! they are fatal.

use thiserror::Error;

use crate::tree::NodeId;

/// Errors raised by the low-level tree store and path algorithms.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Leaf count outside `MIN_LEAF_COUNT..=MAX_LEAF_COUNT`.
    #[error("leaf count {0} is out of range (must be 4 <= leaf_count <= 16000)")]
    LeafCountOutOfRange(usize),
    /// Storage for the tree could not be reserved.
    #[error("could not allocate storage for a tree with {0} leaves")]
    Allocation(usize),
    /// A node id does not exist in a tree of this size.
    #[error("node {node} does not exist in a tree with {node_count} nodes")]
    NodeOutOfRange { node: NodeId, node_count: usize },
    /// Attempted to connect a node to itself.
    #[error("cannot connect node {0} to itself")]
    SelfLoop(NodeId),
    /// Every neighbor slot of the node is already occupied.
    #[error("node {0} has no empty neighbor slot")]
    Saturated(NodeId),
    /// The two nodes are already adjacent.
    #[error("nodes {0} and {1} are already connected")]
    AlreadyConnected(NodeId, NodeId),
    /// Disconnect requested for two nodes that are not adjacent.
    #[error("nodes {0} and {1} are not connected")]
    NotConnected(NodeId, NodeId),
    /// Two trees or matrices of different sizes were combined.
    #[error("size mismatch: expected {expected}, found {found}")]
    SizeMismatch { expected: usize, found: usize },
    /// An encoded buffer does not follow the slot layout.
    #[error("encoded tree buffer has length {found}, expected {expected}")]
    BadEncoding { expected: usize, found: usize },
    /// No path joins the two nodes (the tree is not connected).
    #[error("no path from node {from} to node {to}")]
    Unreachable { from: NodeId, to: NodeId },
    /// The path matrix does not describe the tree it was paired with.
    #[error("path matrix is inconsistent with the tree at node {0}")]
    InconsistentPathMatrix(NodeId),
}

/// Structural-invalidity errors found by [`crate::verify::verify_tree`].
///
/// Each variant belongs to one check; [`VerifyError::code`] maps them to the
/// distinct nonzero codes callers may log or compare.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("leaf count {leaf_count} needs {expected} slots, tree holds {found}")]
    LeafCountMismatch { leaf_count: usize, expected: usize, found: usize },
    #[error("slot {slot} of node {node} refers to missing node {target}")]
    InvalidSlot { node: NodeId, slot: usize, target: NodeId },
    #[error("node {0} refers to itself")]
    SelfReference(NodeId),
    #[error("node {from} lists {to} as neighbor but not vice versa")]
    NotReciprocal { from: NodeId, to: NodeId },
    #[error("node {node} has degree {degree}, expected {expected}")]
    BadDegree { node: NodeId, degree: usize, expected: usize },
    #[error("only {reached} of {total} nodes are reachable from node 0")]
    Disconnected { reached: usize, total: usize },
    #[error("tree has {edges} edges, expected {expected}")]
    EdgeCount { edges: usize, expected: usize },
}

impl VerifyError {
    /// Nonzero code of the failing check (1 = leaf count, 2 = slot range,
    /// 3 = reciprocity, 4 = degree, 5 = connectivity, 6 = edge count).
    pub fn code(&self) -> u32 {
        match self {
            VerifyError::LeafCountMismatch { .. } => 1,
            VerifyError::InvalidSlot { .. } | VerifyError::SelfReference(_) => 2,
            VerifyError::NotReciprocal { .. } => 3,
            VerifyError::BadDegree { .. } => 4,
            VerifyError::Disconnected { .. } => 5,
            VerifyError::EdgeCount { .. } => 6,
        }
    }
}

/// Input-contract errors for caller-supplied distance matrices.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatrixError {
    #[error("distance matrix must cover at least 4 leaves, got {0}")]
    TooSmall(usize),
    #[error("distance matrix of size {size} needs {expected} entries, got {found}")]
    WrongDimension { size: usize, expected: usize, found: usize },
    #[error("row {row} has {found} entries, expected {expected}")]
    RaggedRow { row: usize, expected: usize, found: usize },
    #[error("entry ({0}, {1}) is negative or not finite")]
    InvalidEntry(usize, usize),
    #[error("diagonal entry ({0}, {0}) is not zero")]
    NonZeroDiagonal(usize),
    #[error("entries ({0}, {1}) and ({1}, {0}) differ")]
    Asymmetric(usize, usize),
    #[error("distance matrix covers {found} leaves, tree has {expected}")]
    LeafCountMismatch { expected: usize, found: usize },
}

/// Errors raised when decoding or applying a rearrangement.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    #[error("unknown mutation kind {0}")]
    UnknownKind(u16),
    #[error("mutation {code:#018x} does not apply to this tree: {reason}")]
    NotApplicable { code: u64, reason: &'static str },
    #[error("tree has no neighboring topologies")]
    EmptyNeighborhood,
}

/// Umbrella error for the high-level operations (scoring, search, interop).
#[derive(Error, Debug)]
pub enum QuartetError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("tree failed verification: {0}")]
    Verify(#[from] VerifyError),
    #[error(transparent)]
    Matrix(#[from] MatrixError),
    #[error(transparent)]
    Mutation(#[from] MutationError),
    /// Error from the `phylotree` crate while building or reading a tree.
    #[error("phylotree error: {0}")]
    Phylo(#[from] phylotree::tree::TreeError),
    #[error("could not parse newick string: {0}")]
    Newick(String),
    #[error("tree is not binary: node has {0} children")]
    NotBinary(usize),
    #[error("leaf labels: {0}")]
    Labels(String),
    #[error("nothing to search: no chains or seeds were given")]
    NothingToSearch,
}

pub type Result<T> = std::result::Result<T, QuartetError>;
