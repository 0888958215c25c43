//! Decision tree construction.
//!
//! A table is turned into a tree by partitioning its records on the value of
//! one field at a time, always in schema order. Records that leave a field
//! blank fall into the default arm of that branch. Fields which are blank for
//! every record of a group are skipped for that group, so a subtree only ever
//! tests the columns that actually separate its instructions.

use std::collections::BTreeMap;

use crate::error::{Ambiguity, Error, Result};
use crate::record::{Record, RecordSet, TableName};
use crate::schema::{Field, FieldValue, Literal};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionNode {
    Branch(Branch),
    Leaf(Leaf),
}

/// Tests one field. Values without an arm go to `default`, or fail to decode
/// if there is none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub field: Field,
    pub children: BTreeMap<Literal, DecisionNode>,
    pub default: Option<Box<DecisionNode>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub handler: String,
    pub cycles: u32,
    pub layout_index: i64,
    pub delegate: Option<TableName>,
}

impl Leaf {
    pub fn is_proxy(&self) -> bool {
        self.delegate.is_some()
    }
}

impl From<&Record> for Leaf {
    fn from(record: &Record) -> Self {
        Leaf {
            handler: record.handler.clone(),
            cycles: record.cycles,
            layout_index: record.layout_index,
            delegate: record.delegate.clone(),
        }
    }
}

impl DecisionNode {
    /// Follows the tree using `value_of` to read each tested field.
    ///
    /// On failure returns the field whose value had no arm.
    pub fn resolve<F>(&self, mut value_of: F) -> std::result::Result<&Leaf, &Field>
    where
        F: FnMut(&Field) -> Option<Literal>,
    {
        let mut node = self;
        loop {
            match node {
                DecisionNode::Leaf(leaf) => return Ok(leaf),
                DecisionNode::Branch(branch) => {
                    let arm = value_of(&branch.field).and_then(|v| branch.children.get(&v));
                    node = match (arm, &branch.default) {
                        (Some(child), _) => child,
                        (None, Some(default)) => &**default,
                        (None, None) => return Err(&branch.field),
                    };
                }
            }
        }
    }

    /// Resolves a vector holding one concrete value per schema field.
    pub fn query(&self, values: &[Literal]) -> Option<&Leaf> {
        self.resolve(|field| values.get(field.index).copied()).ok()
    }

    pub fn leaves(&self) -> Vec<&Leaf> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                DecisionNode::Leaf(leaf) => out.push(leaf),
                DecisionNode::Branch(branch) => {
                    stack.extend(branch.default.as_deref());
                    stack.extend(branch.children.values().rev());
                }
            }
        }
        out
    }

    pub fn depth(&self) -> usize {
        match self {
            DecisionNode::Leaf(_) => 0,
            DecisionNode::Branch(branch) => {
                let deepest = branch.children.values().chain(branch.default.as_deref()).map(|c| c.depth()).max();
                1 + deepest.unwrap_or(0)
            }
        }
    }
}

/// Builds the (uncollapsed) decision tree for a whole table.
pub fn build(set: &RecordSet) -> Result<DecisionNode> {
    let records: Vec<&Record> = set.records.iter().collect();
    if records.is_empty() {
        log::warn!("table {} has no records, every instruction will fail to decode", set.table);
        return Ok(DecisionNode::Branch(Branch {
            field: set.schema.field(0).clone(),
            children: BTreeMap::new(),
            default: None,
        }));
    }
    Builder { set }.group(records, 0)
}

struct Builder<'a> {
    set: &'a RecordSet,
}

impl<'a> Builder<'a> {
    /// Builds the subtree for records that agree on every field before `from`.
    fn group(&self, records: Vec<&'a Record>, from: usize) -> Result<DecisionNode> {
        if let [record] = records.as_slice() {
            return Ok(DecisionNode::Leaf(Leaf::from(*record)));
        }

        let next = (from..self.set.schema.len())
            .find(|&i| records.iter().any(|r| r.value(i).is_exact()));

        match next {
            Some(field) => self.branch(records, field),
            None => Err(self.ambiguous(from.checked_sub(1), Ambiguity::Exhausted, &records)),
        }
    }

    fn branch(&self, records: Vec<&'a Record>, field: usize) -> Result<DecisionNode> {
        let mut groups: BTreeMap<Literal, Vec<&Record>> = BTreeMap::new();
        let mut defaults = Vec::new();
        for record in records {
            match record.value(field) {
                FieldValue::Exact(value) => groups.entry(value).or_default().push(record),
                FieldValue::Wildcard => defaults.push(record),
            }
        }

        if defaults.len() > 1 {
            return Err(self.ambiguous(Some(field), Ambiguity::MultipleDefaults, &defaults));
        }

        let mut children = BTreeMap::new();
        for (value, group) in groups {
            children.insert(value, self.group(group, field + 1)?);
        }
        let default = defaults.pop().map(|record| Box::new(DecisionNode::Leaf(record.into())));

        Ok(DecisionNode::Branch(Branch {
            field: self.set.schema.field(field).clone(),
            children,
            default,
        }))
    }

    fn ambiguous(&self, field: Option<usize>, reason: Ambiguity, records: &[&Record]) -> Error {
        Error::Ambiguous {
            table: self.set.table.clone(),
            field: field.map(|i| self.set.schema.field(i).name.clone()),
            reason,
            records: records.iter().map(|r| r.reference()).collect(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::schema::FieldSchema;

    pub(crate) fn row(row: usize, values: &[Option<u32>], handler: &str) -> Record {
        Record {
            row,
            values: values
                .iter()
                .map(|v| v.map_or(FieldValue::Wildcard, |n| Literal::Int(n).into()))
                .collect(),
            handler: handler.into(),
            cycles: 1,
            layout_index: row as i64,
            delegate: None,
        }
    }

    pub(crate) fn proxy(row_no: usize, values: &[Option<u32>], table: &str) -> Record {
        Record {
            delegate: Some(table.into()),
            cycles: 0,
            ..row(row_no, values, table)
        }
    }

    pub(crate) fn set(fields: &[&str], records: Vec<Record>) -> RecordSet {
        RecordSet::new(TableName::root(), FieldSchema::new(fields.iter().copied()).unwrap(), records).unwrap()
    }

    fn handler_at(tree: &DecisionNode, values: &[u32]) -> Option<String> {
        let values: Vec<Literal> = values.iter().map(|&v| Literal::Int(v)).collect();
        tree.query(&values).map(|leaf| leaf.handler.clone())
    }

    #[test]
    fn two_opcodes() {
        let set = set(&["opcode"], vec![row(4, &[Some(0)], "add"), row(5, &[Some(1)], "sub")]);
        let tree = build(&set).unwrap();
        let DecisionNode::Branch(branch) = &tree else { panic!("expected a branch") };
        assert_eq!(branch.field.name, "opcode");
        assert_eq!(branch.children.len(), 2);
        assert!(branch.default.is_none());
        assert_eq!(handler_at(&tree, &[0]).as_deref(), Some("add"));
        assert_eq!(handler_at(&tree, &[1]).as_deref(), Some("sub"));
        assert_eq!(handler_at(&tree, &[2]), None);
    }

    #[test]
    fn wildcard_becomes_default_arm() {
        let set = set(
            &["opcode"],
            vec![row(4, &[Some(0)], "add"), row(5, &[Some(1)], "sub"), row(6, &[None], "unknown")],
        );
        let tree = build(&set).unwrap();
        let DecisionNode::Branch(branch) = &tree else { panic!("expected a branch") };
        assert_eq!(branch.children.len(), 2);
        assert_eq!(handler_at(&tree, &[63]).as_deref(), Some("unknown"));
        assert_eq!(handler_at(&tree, &[1]).as_deref(), Some("sub"));
    }

    #[test]
    fn blank_columns_are_skipped() {
        // rs and rt are never set inside opcode 0, so that subtree goes straight to funct
        let set = set(
            &["opcode", "rs", "rt", "funct"],
            vec![
                row(4, &[Some(0), None, None, Some(32)], "add"),
                row(5, &[Some(0), None, None, Some(33)], "addu"),
                row(6, &[Some(1), None, Some(0), None], "bltz"),
                row(7, &[Some(1), None, Some(1), None], "bgez"),
                row(8, &[Some(8), None, None, None], "addi"),
            ],
        );
        let tree = build(&set).unwrap();
        let DecisionNode::Branch(root) = &tree else { panic!("expected a branch") };
        let DecisionNode::Branch(special) = &root.children[&Literal::Int(0)] else { panic!() };
        assert_eq!(special.field.name, "funct");
        let DecisionNode::Branch(regimm) = &root.children[&Literal::Int(1)] else { panic!() };
        assert_eq!(regimm.field.name, "rt");
        assert_eq!(handler_at(&tree, &[0, 9, 9, 33]).as_deref(), Some("addu"));
        assert_eq!(handler_at(&tree, &[1, 0, 1, 0]).as_deref(), Some("bgez"));
        assert_eq!(handler_at(&tree, &[8, 1, 2, 3]).as_deref(), Some("addi"));
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn leading_blank_columns_are_skipped_at_the_root() {
        let set = set(
            &["opcode", "funct"],
            vec![row(4, &[None, Some(1)], "rtps"), row(5, &[None, Some(6)], "nclip")],
        );
        let tree = build(&set).unwrap();
        let DecisionNode::Branch(root) = &tree else { panic!("expected a branch") };
        assert_eq!(root.field.name, "funct");
    }

    #[test]
    fn identical_records_are_ambiguous() {
        let set = set(
            &["opcode", "funct"],
            vec![row(4, &[Some(0), Some(32)], "add"), row(9, &[Some(0), Some(32)], "add2")],
        );
        match build(&set).unwrap_err() {
            Error::Ambiguous { field, reason, records, .. } => {
                assert_eq!(reason, Ambiguity::Exhausted);
                assert_eq!(field.as_deref(), Some("funct"));
                let rows: Vec<_> = records.iter().map(|r| r.row).collect();
                assert_eq!(rows, [4, 9]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn two_wildcards_at_one_branch_are_ambiguous() {
        let set = set(
            &["opcode", "funct"],
            vec![
                row(4, &[Some(0), Some(1)], "a"),
                row(5, &[None, Some(2)], "b"),
                row(6, &[None, Some(3)], "c"),
            ],
        );
        match build(&set).unwrap_err() {
            Error::Ambiguous { field, reason, .. } => {
                assert_eq!(reason, Ambiguity::MultipleDefaults);
                assert_eq!(field.as_deref(), Some("opcode"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn every_record_reaches_its_own_leaf() {
        let records = vec![
            row(4, &[Some(0), None, Some(0)], "sll"),
            row(5, &[Some(0), None, Some(2)], "srl"),
            row(6, &[Some(16), Some(0), None], "mfc0"),
            row(7, &[Some(16), Some(4), None], "mtc0"),
            row(8, &[Some(16), None, None], "cop0"),
            row(9, &[Some(2), None, None], "j"),
        ];
        let set = set(&["opcode", "rs", "funct"], records.clone());
        let tree = build(&set).unwrap();
        for record in &records {
            // pick 7 for blank columns, which no record uses
            let values: Vec<u32> = record
                .values
                .iter()
                .map(|v| match v {
                    FieldValue::Exact(Literal::Int(n)) => *n,
                    _ => 7,
                })
                .collect();
            assert_eq!(handler_at(&tree, &values).as_deref(), Some(record.handler.as_str()));
        }
        assert_eq!(tree.leaves().len(), records.len());
    }

    #[test]
    fn single_record_table_is_a_leaf() {
        let set = set(&["opcode"], vec![row(4, &[None], "nop")]);
        assert!(matches!(build(&set).unwrap(), DecisionNode::Leaf(_)));
    }

    #[test]
    fn empty_table_never_decodes() {
        let set = set(&["opcode"], vec![]);
        let tree = build(&set).unwrap();
        assert_eq!(handler_at(&tree, &[0]), None);
    }
}
