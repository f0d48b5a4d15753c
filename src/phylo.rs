//! Newick interop.
//!
//! Export writes the unrooted tree hung from the internal node next to leaf
//! 0, so the outermost group has three members:
//!
//! ```text
//! n = 4:   (A,(B,D),C);
//! ```
//!
//! Import goes through `phylotree`. Leaves are numbered by sorted name, so
//! the same taxa always get the same ids regardless of their order in the
//! file. A binary root (two children) is suppressed; every other internal
//! node must have exactly two children.

use std::collections::{HashMap, HashSet, VecDeque};

use phylotree::tree::Tree as PhyloTree;

use crate::error::{QuartetError, Result};
use crate::normalize::normalize_tree;
use crate::tree::{MAX_LEAF_COUNT, MIN_LEAF_COUNT, NodeId, QuartetTree};
use crate::verify::verify_tree;

/// Default labels: the leaf ids themselves.
pub fn default_labels(leaf_count: usize) -> Vec<String> {
    (0..leaf_count).map(|i| i.to_string()).collect()
}

fn escape_label(label: &str) -> String {
    if label.chars().any(|c| "()[]':;, \t".contains(c)) {
        format!("'{}'", label.replace('\'', "''"))
    } else {
        label.to_string()
    }
}

/// Newick string of a complete tree. `labels[i]` names leaf `i`; ids are
/// used when `labels` is `None`.
///
/// # Errors
/// The tree must pass verification, and `labels` must name every leaf.
pub fn to_newick(tree: &QuartetTree, labels: Option<&[String]>) -> Result<String> {
    verify_tree(tree)?;
    let n = tree.leaf_count();
    let owned;
    let labels: &[String] = match labels {
        Some(labels) if labels.len() == n => labels,
        Some(labels) => {
            return Err(QuartetError::Labels(format!(
                "{} labels for {n} leaves",
                labels.len()
            )));
        }
        None => {
            owned = default_labels(n);
            &owned
        }
    };

    enum Visit {
        Enter { node: NodeId, from: NodeId },
        Text(&'static str),
    }

    // iterative so deep caterpillars do not exhaust the call stack
    let mut newick = String::with_capacity(n * 8);
    let mut stack = vec![Visit::Enter { node: tree.slot(0, 0).unwrap_or(n), from: 0 }];
    let mut first = true;
    while let Some(visit) = stack.pop() {
        match visit {
            Visit::Text(text) => newick.push_str(text),
            Visit::Enter { node, .. } if tree.is_leaf(node) => {
                newick.push_str(&escape_label(&labels[node]));
            }
            Visit::Enter { node, from } => {
                newick.push('(');
                let mut members: Vec<NodeId> = tree.neighbors(node).filter(|&m| m != from).collect();
                if first {
                    members.insert(0, from);
                    first = false;
                }
                stack.push(Visit::Text(")"));
                for (i, &member) in members.iter().enumerate().rev() {
                    stack.push(Visit::Enter { node: member, from: node });
                    if i > 0 {
                        stack.push(Visit::Text(","));
                    }
                }
            }
        }
    }
    newick.push(';');
    Ok(newick)
}

/// Converts a binary `phylotree` tree. Returns the tree (normalized) and the
/// leaf labels indexed by leaf id.
pub fn from_phylo_tree(phylo: &PhyloTree) -> Result<(QuartetTree, Vec<String>)> {
    let mut leaves: Vec<(String, usize)> = Vec::new();
    for id in phylo.get_leaves() {
        let name = phylo
            .get(&id)?
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| QuartetError::Labels(format!("leaf node {id} has no name")))?;
        leaves.push((name, id));
    }
    leaves.sort();
    let n = leaves.len();
    if !(MIN_LEAF_COUNT..=MAX_LEAF_COUNT).contains(&n) {
        return Err(QuartetError::Labels(format!("{n} leaves, need 4 to 16000")));
    }
    let mut unique = HashSet::with_capacity(n);
    if let Some((dup, _)) = leaves.iter().find(|(name, _)| !unique.insert(name.as_str())) {
        return Err(QuartetError::Labels(format!("duplicate leaf name {dup:?}")));
    }

    let mut ids: HashMap<usize, NodeId> =
        leaves.iter().enumerate().map(|(leaf, &(_, node))| (node, leaf)).collect();
    let root = phylo.get_root()?;
    let root_children = phylo.get(&root)?.children.clone();
    let suppress_root = root_children.len() == 2;

    // number internal nodes breadth-first, collect parent-child edges
    let mut edges: Vec<(usize, usize)> = Vec::with_capacity(2 * n);
    let mut next_internal = n;
    let mut queue = VecDeque::from([root]);
    while let Some(node) = queue.pop_front() {
        let children = phylo.get(&node)?.children.clone();
        if children.is_empty() {
            continue;
        }
        let is_root = node == root;
        match (is_root, children.len()) {
            (true, 2) => {}
            (true, 3) | (false, 2) => {
                ids.insert(node, next_internal);
                next_internal += 1;
            }
            (_, k) => return Err(QuartetError::NotBinary(k)),
        }
        for &child in &children {
            if !(is_root && suppress_root) {
                edges.push((node, child));
            }
            queue.push_back(child);
        }
    }
    if suppress_root {
        edges.push((root_children[0], root_children[1]));
    }

    let mut tree = QuartetTree::allocate(n)?;
    for (a, b) in edges {
        let (Some(&a), Some(&b)) = (ids.get(&a), ids.get(&b)) else {
            return Err(QuartetError::Labels(format!("unmapped node in edge {a}-{b}")));
        };
        tree.connect_both(a, b)?;
    }
    normalize_tree(&mut tree)?;
    Ok((tree, leaves.into_iter().map(|(name, _)| name).collect()))
}

/// Parses a Newick string; see [`from_phylo_tree`].
pub fn from_newick(newick: &str) -> Result<(QuartetTree, Vec<String>)> {
    let phylo = PhyloTree::from_newick(newick.trim())
        .map_err(|e| QuartetError::Newick(e.to_string()))?;
    from_phylo_tree(&phylo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splits::robinson_foulds;

    #[test]
    fn test_export_four_leaves() {
        let tree = QuartetTree::fixed_starting_tree(4).unwrap();
        let labels: Vec<String> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
        // node 4 holds [0, 5, 2]; node 5 holds [1, 4, 3]
        assert_eq!(to_newick(&tree, Some(labels.as_slice())).unwrap(), "(A,(B,D),C);");
        assert_eq!(to_newick(&tree, None).unwrap(), "(0,(1,3),2);");
    }

    #[test]
    fn test_export_rejects_label_mismatch() {
        let tree = QuartetTree::fixed_starting_tree(5).unwrap();
        let labels = default_labels(4);
        assert!(matches!(to_newick(&tree, Some(labels.as_slice())), Err(QuartetError::Labels(_))));
    }

    #[test]
    fn test_escape_label() {
        assert_eq!(escape_label("plain"), "plain");
        assert_eq!(escape_label("two words"), "'two words'");
        assert_eq!(escape_label("it's"), "'it''s'");
    }

    #[test]
    fn test_import_rooted_and_unrooted() {
        let (rooted, names) = from_newick("((A,B),((C,D),E));").unwrap();
        assert_eq!(names, vec!["A", "B", "C", "D", "E"]);
        assert_eq!(verify_tree(&rooted), Ok(()));

        // same topology written with a trifurcating root and shuffled taxa
        let (unrooted, names2) = from_newick("(E,(D,C),(B,A));").unwrap();
        assert_eq!(names2, names);
        assert_eq!(unrooted, rooted);
        assert_eq!(robinson_foulds(&rooted, &unrooted), Ok(0));
    }

    #[test]
    fn test_round_trip_through_newick() {
        let mut tree = QuartetTree::fixed_starting_tree(9).unwrap();
        normalize_tree(&mut tree).unwrap();
        // zero-padded so sorted names keep the id order
        let labels: Vec<String> = (0..9).map(|i| format!("t{i:02}")).collect();
        let newick = to_newick(&tree, Some(labels.as_slice())).unwrap();
        let (back, names) = from_newick(&newick).unwrap();
        assert_eq!(names, labels);
        assert_eq!(back, tree);
    }

    #[test]
    fn test_import_rejects_polytomy() {
        assert!(matches!(
            from_newick("((A,B,C),(D,E));"),
            Err(QuartetError::NotBinary(3))
        ));
        assert!(matches!(from_newick("((A,B),(C,D));").map(|_| ()), Ok(())));
        assert!(from_newick("((A,B),C);").is_err());
    }
}
