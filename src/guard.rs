//! Structural acyclicity check
//!
//! Candidates are handed out as deep owned copies, so an aliased node can no
//! longer be spliced into two positions of one tree. The guard stays wired
//! into validation as a defensive invariant check: it walks the tree
//! depth-first, tracking the `(kind, address)` pairs on the current path,
//! and reports a repeat or a path deeper than the ceiling as a suspected
//! cycle. The answer is a boolean, never an error, so validation can simply
//! reject the candidate and try the next one.

use std::collections::HashSet;

use crate::ast::{Node, NodeKind};

/// Path-depth ceiling for the cycle walk
///
/// Guards against pathological but finite deep trees consuming unbounded
/// time; a tree this deep is treated as diverging.
pub const GUARD_DEPTH_LIMIT: usize = 512;

/// Whether the same node is reachable twice along one root-to-leaf path, or
/// the tree is deeper than [`GUARD_DEPTH_LIMIT`]
#[must_use]
pub fn is_cyclic(root: &Node) -> bool {
    let mut on_path = HashSet::new();
    walk(root, &mut on_path, 0)
}

fn walk(node: &Node, on_path: &mut HashSet<(NodeKind, usize)>, depth: usize) -> bool {
    if depth >= GUARD_DEPTH_LIMIT {
        return true;
    }
    let identity = (node.kind(), std::ptr::from_ref(node) as usize);
    if !on_path.insert(identity) {
        return true;
    }
    let cyclic = node.children().iter().any(|c| walk(c, on_path, depth + 1));
    on_path.remove(&identity);
    cyclic
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Literal;

    fn name(id: &str) -> Node {
        Node::Name { id: id.to_string() }
    }

    #[test]
    fn test_owned_trees_are_acyclic() {
        let node = Node::Module {
            body: vec![Node::Assign {
                targets: vec![name("x")],
                value: Box::new(Node::Constant {
                    value: Literal::Int(1),
                }),
            }],
        };
        assert!(!is_cyclic(&node));
    }

    #[test]
    fn test_repeated_equal_values_are_not_cycles() {
        // Two structurally identical subtrees at sibling positions are
        // distinct allocations, not a shared node.
        let shared_shape = Node::List {
            elts: vec![name("x"), name("x")],
        };
        assert!(!is_cyclic(&shared_shape));
    }

    #[test]
    fn test_depth_ceiling_reports_divergence() {
        let mut node = name("x");
        for _ in 0..(GUARD_DEPTH_LIMIT + 8) {
            node = Node::UnaryOp {
                op: crate::ast::UnaryOpKind::USub,
                operand: Box::new(node),
            };
        }
        assert!(is_cyclic(&node));
    }
}
