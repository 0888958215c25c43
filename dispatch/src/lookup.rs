//! Interprets a [`Program`] directly, without generating any code.
//!
//! This is what `lookup-gen query` runs, and it is also the reference the
//! generated functions are checked against in tests.

use std::fmt;

use crate::record::TableName;
use crate::resolver::Program;
use crate::schema::Literal;
use crate::tree::Leaf;

/// Anything that can report the value of a named instruction field.
pub trait FieldSource {
    fn field(&self, name: &str) -> Option<Literal>;
}

impl FieldSource for [(&str, Literal)] {
    fn field(&self, name: &str) -> Option<Literal> {
        self.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }
}

/// The instruction matched no arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeFailure {
    pub table: TableName,
    pub field: String,
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown instruction (table {}, using field {})", self.table, self.field)
    }
}

impl std::error::Error for DecodeFailure {}

impl Program {
    /// Decodes one instruction starting at the root table, following
    /// delegations until a handler is reached.
    pub fn lookup<I>(&self, instruction: &I) -> Result<(&TableName, &Leaf), DecodeFailure>
    where
        I: FieldSource + ?Sized,
    {
        let mut table = self.root();
        // every hop enters a distinct table once cycles are rejected
        for _ in 0..=self.tables.len() {
            let leaf = table
                .tree
                .resolve(|field| instruction.field(&field.name))
                .map_err(|field| DecodeFailure {
                    table: table.name.clone(),
                    field: field.name.clone(),
                })?;

            match &leaf.delegate {
                None => return Ok((&table.name, leaf)),
                Some(next) => {
                    log::trace!("{} -> {}", table.name, next);
                    table = self.table(next).ok_or_else(|| DecodeFailure {
                        table: next.clone(),
                        field: String::new(),
                    })?;
                }
            }
        }

        Err(DecodeFailure {
            table: table.name.clone(),
            field: String::new(),
        })
    }
}
