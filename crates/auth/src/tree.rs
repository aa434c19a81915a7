//! Permission forest assembly.
//!
//! The builder is a pure function over a flat, `sort`-ordered list of
//! permission rows. Children are assembled as owned lists from a single
//! grouping pass, so the resulting forest can contain neither cycles nor
//! dangling references.

use std::collections::{HashMap, HashSet};

use saaskit_core::PermissionId;

use crate::permission::PermissionNode;

/// Build a forest from flat rows.
///
/// Input order is preserved: a list already ordered by `sort` yields roots
/// and child lists in `sort` order. Any `children` carried on the input rows
/// are discarded and rebuilt from `parent_id` links.
///
/// A node whose parent id is set (non-nil) but not present in the input is
/// dropped, along with everything beneath it. It does not become a root.
pub fn build_tree(flat: Vec<PermissionNode>) -> Vec<PermissionNode> {
    let known: HashSet<PermissionId> = flat.iter().map(|n| n.id).collect();

    let mut roots: Vec<PermissionNode> = Vec::new();
    let mut pending: HashMap<PermissionId, Vec<PermissionNode>> = HashMap::new();

    for mut node in flat {
        node.children.clear();
        if node.is_root() {
            roots.push(node);
        } else {
            // is_root() returned false, so parent_id is a non-nil Some.
            let parent = node.parent_id.unwrap_or_default();
            if known.contains(&parent) {
                pending.entry(parent).or_default().push(node);
            }
            // Unknown parent: dropped silently.
        }
    }

    for root in &mut roots {
        attach(root, &mut pending);
    }
    // Anything still pending hangs under a node that was itself dropped (or
    // under a parent cycle disconnected from every root); it vanishes with
    // its parent.
    roots
}

fn attach(node: &mut PermissionNode, pending: &mut HashMap<PermissionId, Vec<PermissionNode>>) {
    if let Some(mut children) = pending.remove(&node.id) {
        for child in &mut children {
            attach(child, pending);
        }
        node.children = children;
    }
}

/// Flatten a forest back into rows, pre-order, with `children` cleared.
///
/// `build_tree(flatten(forest))` reproduces `forest` structurally.
pub fn flatten(forest: &[PermissionNode]) -> Vec<PermissionNode> {
    let mut rows = Vec::new();
    for node in forest {
        push_rows(node, &mut rows);
    }
    rows
}

fn push_rows(node: &PermissionNode, rows: &mut Vec<PermissionNode>) {
    let mut row = node.clone();
    row.children = Vec::new();
    rows.push(row);
    for child in &node.children {
        push_rows(child, rows);
    }
}

/// Drop nodes marked invisible, together with their subtrees.
///
/// Used when serving the forest as a navigation menu; authorization always
/// evaluates the unpruned forest.
pub fn prune_hidden(forest: Vec<PermissionNode>) -> Vec<PermissionNode> {
    forest
        .into_iter()
        .filter(|n| n.visible)
        .map(|mut n| {
            n.children = prune_hidden(std::mem::take(&mut n.children));
            n
        })
        .collect()
}
