//! Crate root: module orchestration and public re-exports.
//!
//! Modules:
//! - `tree`: unrooted binary tree store (leaf and internal neighbor slots).
//! - `path`: all-pairs path lengths and shortest-path queries.
//! - `quartet`: four-leaf subsets and their topologies.
//! - `verify`: structural validity checks with stable error codes.
//! - `normalize`: canonical relabelling of internal nodes.
//! - `hash`: FNV-1a fingerprint of a tree.
//! - `mutation`: rearrangement moves and neighborhood enumeration.
//! - `distance`: validated leaf distance matrices.
//! - `score`: quartet agreement score of a tree against distances.
//! - `mcmc`: annealed MCMC and hill-climb search drivers.
//! - `bitset` / `splits`: bipartitions and Robinson-Foulds distance.
//! - `phylo`: Newick import/export.
//! - `io`: TSV and text files, optionally gzip-compressed.
//! - `api`: Python bindings via `pyo3` (gated behind "python" feature).

pub mod error;
pub mod tree;
pub mod path;
pub mod quartet;
pub mod verify;
pub mod normalize;
pub mod hash;
pub mod mutation;
pub mod distance;
pub mod score;
pub mod mcmc;
pub mod bitset;
pub mod splits;
pub mod phylo;
pub mod io;

#[cfg(feature = "python")]
pub mod api;

// Re-export frequently used types & functions
pub use error::{QuartetError, Result, TreeError, VerifyError};
pub use tree::{NodeId, QuartetTree};
pub use distance::DistanceMatrix;
pub use mcmc::{SearchMethod, SolveResult, SolverConfig, solve, solve_parallel};
pub use mutation::{Mutation, Neighborhood};
pub use normalize::normalize_tree;
pub use verify::verify_tree;
pub use hash::tree_hash;
pub use score::score_tree;
