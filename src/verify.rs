//! Structural checks for complete trees.
//!
//! Checks run cheapest first and stop at the first failure:
//!
//! | Code | Check |
//! |------|-------|
//! | 1 | slot vector length matches the leaf-count tag |
//! | 2 | every slot is empty or names an existing node other than its owner |
//! | 3 | every connection is reciprocal |
//! | 4 | leaves have degree 1, internal nodes degree 3 |
//! | 5 | every node is reachable from node 0 |
//! | 6 | the tree has exactly `V - 1` edges (no cycles) |
//!
//! A failure is returned, never acted upon: whether it is fatal is the
//! caller's decision.

use std::collections::VecDeque;

use crate::error::VerifyError;
use crate::tree::{QuartetTree, slot_count};

/// Returns `Ok(())` for a complete, valid tree, otherwise the first failing
/// check. Use [`VerifyError::code`] for the numeric code.
pub fn verify_tree(tree: &QuartetTree) -> Result<(), VerifyError> {
    let n = tree.leaf_count();
    let v = tree.node_count();

    let expected = slot_count(n);
    if tree.slots().len() != expected {
        return Err(VerifyError::LeafCountMismatch {
            leaf_count: n,
            expected,
            found: tree.slots().len(),
        });
    }

    for node in 0..v {
        for (slot, target) in tree.node_slots(node).iter().enumerate() {
            match target.map(usize::from) {
                Some(t) if t >= v => {
                    return Err(VerifyError::InvalidSlot { node, slot, target: t });
                }
                Some(t) if t == node => return Err(VerifyError::SelfReference(node)),
                _ => {}
            }
        }
    }

    for node in 0..v {
        for neighbor in tree.neighbors(node) {
            if !tree.is_connected(neighbor, node) {
                return Err(VerifyError::NotReciprocal { from: node, to: neighbor });
            }
        }
    }

    for node in 0..v {
        let degree = tree.degree(node);
        let wanted = tree.capacity(node);
        if degree != wanted {
            return Err(VerifyError::BadDegree { node, degree, expected: wanted });
        }
    }

    let mut seen = vec![false; v];
    let mut queue = VecDeque::from([0]);
    seen[0] = true;
    let mut reached = 1;
    while let Some(node) = queue.pop_front() {
        for neighbor in tree.neighbors(node) {
            if !seen[neighbor] {
                seen[neighbor] = true;
                reached += 1;
                queue.push_back(neighbor);
            }
        }
    }
    if reached != v {
        return Err(VerifyError::Disconnected { reached, total: v });
    }

    let edges = tree.edges().count();
    if edges != tree.edge_count() {
        return Err(VerifyError::EdgeCount { edges, expected: tree.edge_count() });
    }

    Ok(())
}
