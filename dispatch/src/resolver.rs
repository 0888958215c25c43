//! Drives table processing.
//!
//! Sub-tables are only discovered while their parent is emitted, so the set
//! of tables is a worklist rather than something known up front. Every name
//! goes through the queue at most once.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::collapse::collapse;
use crate::emit::{emit, Emission};
use crate::error::{Error, Result};
use crate::record::{RecordSet, TableName};
use crate::tree::{build, DecisionNode};

/// Where table contents come from.
pub trait TableSource {
    /// Loads one table. `Ok(None)` means no such table exists.
    fn load(&mut self, table: &TableName) -> Result<Option<RecordSet>>;

    /// Human readable location of a table, for logs and errors.
    fn locate(&self, _table: &TableName) -> Option<std::path::PathBuf> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedTable {
    pub name: TableName,
    pub tree: DecisionNode,
    pub emission: Emission,
}

/// Every table reachable from the root, in processing order.
#[derive(Debug, Clone)]
pub struct Program {
    pub tables: Vec<GeneratedTable>,
}

impl Program {
    pub fn table(&self, name: &TableName) -> Option<&GeneratedTable> {
        self.tables.iter().find(|t| &t.name == name)
    }

    /// The root table is always processed first. Panics on an empty program.
    pub fn root(&self) -> &GeneratedTable {
        &self.tables[0]
    }
}

struct Pending {
    name: TableName,
    referenced_by: Option<TableName>,
}

/// Owns the queue and the set of names already seen during one run.
pub struct Resolver<'s, S: TableSource> {
    source: &'s mut S,
    queue: VecDeque<Pending>,
    seen: HashSet<TableName>,
}

impl<'s, S: TableSource> Resolver<'s, S> {
    pub fn new(source: &'s mut S) -> Self {
        let mut resolver = Resolver {
            source,
            queue: VecDeque::new(),
            seen: HashSet::new(),
        };
        resolver.enqueue(TableName::root(), None);
        resolver
    }

    fn enqueue(&mut self, name: TableName, referenced_by: Option<TableName>) {
        if self.seen.insert(name.clone()) {
            self.queue.push_back(Pending { name, referenced_by });
        }
    }

    pub fn run(mut self) -> Result<Program> {
        let mut tables = Vec::new();

        while let Some(Pending { name, referenced_by }) = self.queue.pop_front() {
            let table = self.process(&name, referenced_by)?;
            for delegate in &table.emission.delegates {
                log::debug!("{} delegates to {}", name, delegate);
                self.enqueue(delegate.clone(), Some(name.clone()));
            }
            tables.push(table);
        }

        check_cycles(&tables)?;
        Ok(Program { tables })
    }

    fn process(&mut self, name: &TableName, referenced_by: Option<TableName>) -> Result<GeneratedTable> {
        match self.source.locate(name) {
            Some(path) => log::info!("Parsing {}", path.display()),
            None => log::info!("Parsing table {}", name),
        }

        let set = self.source.load(name)?.ok_or_else(|| Error::UnresolvableDelegate {
            table: name.clone(),
            referenced_by,
            path: self.source.locate(name),
        })?;

        let tree = collapse(build(&set)?);
        let emission = emit(name, &tree);
        log::debug!(
            "{}: {} records, {} handlers, depth {}",
            name,
            set.records.len(),
            emission.handlers.len(),
            tree.depth()
        );

        Ok(GeneratedTable {
            name: name.clone(),
            tree,
            emission,
        })
    }
}

/// Runs the whole pipeline starting from the root table.
pub fn resolve<S: TableSource>(source: &mut S) -> Result<Program> {
    Resolver::new(source).run()
}

/// A delegation cycle would make the generated lookup recurse forever, so it
/// is rejected here even though generation itself terminates.
fn check_cycles(tables: &[GeneratedTable]) -> Result<()> {
    let edges: HashMap<&TableName, &[TableName]> = tables
        .iter()
        .map(|t| (&t.name, t.emission.delegates.as_slice()))
        .collect();

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Active,
        Done,
    }

    fn visit<'a>(
        name: &'a TableName,
        edges: &HashMap<&'a TableName, &'a [TableName]>,
        marks: &mut HashMap<&'a TableName, Mark>,
        path: &mut Vec<&'a TableName>,
    ) -> Option<Vec<TableName>> {
        match marks.get(name) {
            Some(Mark::Done) => return None,
            Some(Mark::Active) => {
                let start = path.iter().position(|n| *n == name).unwrap_or(0);
                let mut cycle: Vec<TableName> = path[start..].iter().map(|n| (*n).clone()).collect();
                cycle.push(name.clone());
                return Some(cycle);
            }
            None => {}
        }

        marks.insert(name, Mark::Active);
        path.push(name);
        for next in edges.get(name).copied().unwrap_or_default() {
            if let Some(cycle) = visit(next, edges, marks, path) {
                return Some(cycle);
            }
        }
        path.pop();
        marks.insert(name, Mark::Done);
        None
    }

    let mut marks = HashMap::new();
    for table in tables {
        let mut path = Vec::new();
        if let Some(cycle) = visit(&table.name, &edges, &mut marks, &mut path) {
            return Err(Error::DelegationCycle { path: cycle });
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::record::Record;
    use crate::schema::{FieldSchema, Literal};
    use crate::tree::tests::{proxy, row};

    /// Serves tables from memory and counts how often each was loaded.
    #[derive(Default)]
    pub(crate) struct MemorySource {
        pub(crate) tables: HashMap<TableName, (Vec<&'static str>, Vec<Record>)>,
        pub(crate) loads: HashMap<TableName, usize>,
    }

    impl MemorySource {
        pub(crate) fn with(mut self, name: &str, fields: &[&'static str], records: Vec<Record>) -> Self {
            self.tables.insert(name.into(), (fields.to_vec(), records));
            self
        }
    }

    impl TableSource for MemorySource {
        fn load(&mut self, table: &TableName) -> Result<Option<RecordSet>> {
            *self.loads.entry(table.clone()).or_default() += 1;
            let Some((fields, records)) = self.tables.get(table) else {
                return Ok(None);
            };
            let schema = FieldSchema::new(fields.iter().copied()).map_err(|issue| Error::Schema {
                table: table.clone(),
                issue,
            })?;
            RecordSet::new(table.clone(), schema, records.clone()).map(Some)
        }
    }

    fn names(program: &Program) -> Vec<String> {
        program.tables.iter().map(|t| t.name.as_str().to_owned()).collect()
    }

    #[test]
    fn shared_delegate_is_processed_once() {
        let mut source = MemorySource::default()
            .with(
                "",
                &["opcode", "rs"],
                vec![
                    proxy(4, &[Some(0), None], "special"),
                    proxy(5, &[Some(16), None], "cop0"),
                    row(6, &[Some(2), None], "j"),
                ],
            )
            .with(
                "special",
                &["opcode", "funct"],
                vec![row(4, &[Some(0), Some(32)], "add"), proxy(5, &[Some(0), Some(63)], "cop0")],
            )
            .with("cop0", &["opcode", "rs"], vec![row(4, &[Some(16), Some(0)], "mfc0")]);

        let program = resolve(&mut source).unwrap();
        assert_eq!(names(&program), ["", "special", "cop0"]);
        assert_eq!(source.loads[&TableName::new("cop0")], 1);
        assert!(source.loads.values().all(|&n| n == 1));
    }

    #[test]
    fn unreferenced_tables_are_not_loaded() {
        let mut source = MemorySource::default()
            .with("", &["opcode"], vec![row(4, &[Some(2)], "j")])
            .with("orphan", &["opcode"], vec![row(4, &[Some(2)], "k")]);
        let program = resolve(&mut source).unwrap();
        assert_eq!(names(&program), [""]);
        assert!(!source.loads.contains_key(&TableName::new("orphan")));
    }

    #[test]
    fn missing_delegate_names_its_referrer() {
        let mut source = MemorySource::default().with(
            "",
            &["opcode"],
            vec![proxy(4, &[Some(18)], "cop2"), row(5, &[Some(2)], "j")],
        );
        match resolve(&mut source).unwrap_err() {
            Error::UnresolvableDelegate { table, referenced_by, .. } => {
                assert_eq!(table, TableName::new("cop2"));
                assert_eq!(referenced_by, Some(TableName::root()));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn delegation_cycle_is_rejected() {
        let mut source = MemorySource::default()
            .with("", &["opcode"], vec![proxy(4, &[Some(0)], "a")])
            .with("a", &["opcode"], vec![proxy(4, &[Some(0)], "b")])
            .with("b", &["opcode"], vec![proxy(4, &[Some(0)], "a")]);
        match resolve(&mut source).unwrap_err() {
            Error::DelegationCycle { path } => {
                let path: Vec<_> = path.iter().map(|t| t.as_str()).collect();
                assert_eq!(path, ["a", "b", "a"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn self_delegation_is_a_cycle() {
        let mut source = MemorySource::default()
            .with("", &["opcode"], vec![proxy(4, &[Some(0)], "a")])
            .with("a", &["opcode", "rs"], vec![proxy(4, &[Some(0), Some(1)], "a"), row(5, &[Some(0), Some(2)], "x")]);
        assert!(matches!(resolve(&mut source), Err(Error::DelegationCycle { .. })));
    }

    #[test]
    fn error_in_a_sub_table_aborts_the_run() {
        let mut source = MemorySource::default()
            .with("", &["opcode"], vec![proxy(4, &[Some(0)], "special")])
            .with(
                "special",
                &["opcode", "funct"],
                vec![row(4, &[Some(0), Some(1)], "a"), row(5, &[Some(0), Some(1)], "b")],
            );
        assert!(matches!(resolve(&mut source), Err(Error::Ambiguous { .. })));
    }

    #[test]
    fn processed_set_is_the_closure_from_root() {
        let mut source = MemorySource::default()
            .with(
                "",
                &["opcode"],
                vec![proxy(4, &[Some(0)], "x"), proxy(5, &[Some(1)], "y")],
            )
            .with("x", &["opcode"], vec![proxy(4, &[Some(0)], "z")])
            .with("y", &["opcode"], vec![proxy(4, &[Some(1)], "z")])
            .with("z", &["opcode"], vec![row(4, &[None], "leaf")]);
        let program = resolve(&mut source).unwrap();
        let mut emitted = names(&program);
        emitted.sort();
        assert_eq!(emitted, ["", "x", "y", "z"]);
        let root = program.root();
        assert!(root.tree.query(&[Literal::Int(0)]).is_some_and(|l| l.is_proxy()));
    }
}
