use std::collections::BTreeMap;

use crate::tree::{Branch, DecisionNode};

/// Replaces every branch that has a default arm but no concrete arms with
/// that default. Such a branch sends every value to the same place, so
/// removing it never changes which leaf an instruction reaches.
pub fn collapse(node: DecisionNode) -> DecisionNode {
    match node {
        DecisionNode::Leaf(leaf) => DecisionNode::Leaf(leaf),
        DecisionNode::Branch(Branch { field, children, default }) => {
            let children: BTreeMap<_, _> =
                children.into_iter().map(|(value, child)| (value, collapse(child))).collect();
            let default = default.map(|d| Box::new(collapse(*d)));

            match default {
                Some(default) if children.is_empty() => *default,
                default => DecisionNode::Branch(Branch { field, children, default }),
            }
        }
    }
}
