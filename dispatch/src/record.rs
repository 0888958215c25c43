use std::fmt;

use crate::error::{Error, Result};
use crate::schema::{FieldSchema, FieldValue, LiteralKind, SchemaIssue};

/// Name of an instruction table. The root table has the empty name.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableName(String);

impl TableName {
    pub fn root() -> TableName {
        TableName(String::new())
    }

    pub fn new(name: impl Into<String>) -> TableName {
        TableName(name.into())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `""` for the root table, `"_<name>"` for every other one.
    pub fn suffix(&self) -> String {
        if self.is_root() {
            String::new()
        } else {
            format!("_{}", self.0)
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for TableName {
    fn from(name: &str) -> Self {
        TableName::new(name)
    }
}

/// One instruction variant: a value per schema field plus its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Source row (1-based) for diagnostics.
    pub row: usize,
    /// One entry per schema field, in schema order.
    pub values: Vec<FieldValue>,
    pub handler: String,
    pub cycles: u32,
    pub layout_index: i64,
    /// Set when this row forwards to another table instead of naming a handler.
    pub delegate: Option<TableName>,
}

impl Record {
    pub fn is_proxy(&self) -> bool {
        self.delegate.is_some()
    }

    pub fn value(&self, field: usize) -> FieldValue {
        self.values[field]
    }

    pub fn reference(&self) -> RecordRef {
        RecordRef {
            row: self.row,
            handler: self.handler.clone(),
        }
    }
}

/// Short handle used in error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRef {
    pub row: usize,
    pub handler: String,
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {} ({})", self.row, self.handler)
    }
}

/// The parsed contents of one table.
#[derive(Debug, Clone)]
pub struct RecordSet {
    pub table: TableName,
    pub schema: FieldSchema,
    pub records: Vec<Record>,
}

impl RecordSet {
    /// Checks that every record has one value per field and that no field
    /// mixes boolean and integer literals.
    pub fn new(table: TableName, schema: FieldSchema, records: Vec<Record>) -> Result<RecordSet> {
        for record in &records {
            if record.values.len() != schema.len() {
                return Err(Error::Schema {
                    table,
                    issue: SchemaIssue::Arity {
                        row: record.row,
                        found: record.values.len(),
                        expected: schema.len(),
                    },
                });
            }
        }

        for field in schema.iter() {
            let mut kind: Option<LiteralKind> = None;
            for record in &records {
                if let FieldValue::Exact(literal) = record.value(field.index) {
                    match kind {
                        None => kind = Some(literal.kind()),
                        Some(k) if k != literal.kind() => {
                            return Err(Error::MalformedRecord {
                                table,
                                record: record.reference(),
                                column: field.name.clone(),
                                value: literal.to_string(),
                                reason: "field mixes boolean and integer values",
                            });
                        }
                        Some(_) => {}
                    }
                }
            }
        }

        Ok(RecordSet { table, schema, records })
    }
}
