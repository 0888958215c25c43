//! Lowers a collapsed decision tree into dispatch arms.
//!
//! The output is still abstract: [`Dispatch`] says which field to match,
//! which arms exist and in what order, and what happens when nothing
//! matches. Turning it into source text is left to [`crate::render`].

use crate::record::TableName;
use crate::schema::{Field, Literal};
use crate::tree::{DecisionNode, Leaf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Match(Match),
    /// Return this handler and its cost.
    Handler(HandlerRef),
    /// Hand the instruction to another table's dispatch function.
    Delegate(TableName),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub field: Field,
    /// Ascending by value.
    pub arms: Vec<(Literal, Dispatch)>,
    /// `None` means an unmatched value is a decode failure.
    pub fallback: Option<Box<Dispatch>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerRef {
    pub name: String,
    pub cycles: u32,
    pub layout_index: i64,
}

/// Everything the emitter learned about one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    pub table: TableName,
    pub body: Dispatch,
    /// Non-proxy leaves in the order the arms visit them.
    pub handlers: Vec<HandlerRef>,
    /// Tables delegated to, first occurrence order, no duplicates.
    pub delegates: Vec<TableName>,
}

impl Emission {
    /// The handlers in declared layout order. Ties keep visitation order.
    pub fn handler_layout(&self) -> Vec<HandlerRef> {
        let mut handlers = self.handlers.clone();
        handlers.sort_by_key(|h| h.layout_index);
        handlers
    }
}

pub fn emit(table: &TableName, tree: &DecisionNode) -> Emission {
    let mut emitter = Emitter::default();
    let body = emitter.node(tree);
    Emission {
        table: table.clone(),
        body,
        handlers: emitter.handlers,
        delegates: emitter.delegates,
    }
}

#[derive(Default)]
struct Emitter {
    handlers: Vec<HandlerRef>,
    delegates: Vec<TableName>,
}

impl Emitter {
    fn node(&mut self, node: &DecisionNode) -> Dispatch {
        match node {
            DecisionNode::Leaf(leaf) => self.leaf(leaf),
            DecisionNode::Branch(branch) => {
                // BTreeMap iteration already yields ascending values
                let arms = branch
                    .children
                    .iter()
                    .map(|(value, child)| (*value, self.node(child)))
                    .collect();
                let fallback = branch.default.as_deref().map(|d| Box::new(self.node(d)));
                Dispatch::Match(Match {
                    field: branch.field.clone(),
                    arms,
                    fallback,
                })
            }
        }
    }

    fn leaf(&mut self, leaf: &Leaf) -> Dispatch {
        match &leaf.delegate {
            Some(table) => {
                if !self.delegates.contains(table) {
                    self.delegates.push(table.clone());
                }
                Dispatch::Delegate(table.clone())
            }
            None => {
                let handler = HandlerRef {
                    name: leaf.handler.clone(),
                    cycles: leaf.cycles,
                    layout_index: leaf.layout_index,
                };
                self.handlers.push(handler.clone());
                Dispatch::Handler(handler)
            }
        }
    }
}
