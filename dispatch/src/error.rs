use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::record::{RecordRef, TableName};
use crate::schema::SchemaIssue;

pub type Result<T> = std::result::Result<T, Error>;

/// Why a group of records could not be told apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ambiguity {
    /// Every field of the schema was tried.
    Exhausted,
    /// More than one record leaves the deciding field blank.
    MultipleDefaults,
}

impl fmt::Display for Ambiguity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ambiguity::Exhausted => f.write_str("no remaining field distinguishes"),
            Ambiguity::MultipleDefaults => f.write_str("more than one wildcard for the deciding field among"),
        }
    }
}

/// Every way a generator run can fail. Any of these aborts the whole run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("table {table}: {issue}")]
    Schema { table: TableName, issue: SchemaIssue },

    #[error("table {table}: ambiguous records at field `{}`: {reason} {}",
        .field.as_deref().unwrap_or("-"), join(.records))]
    Ambiguous {
        table: TableName,
        field: Option<String>,
        reason: Ambiguity,
        records: Vec<RecordRef>,
    },

    #[error("table `{table}` referenced by {} could not be found{}",
        .referenced_by.as_ref().map(|t| t.to_string()).unwrap_or_else(|| "the command line".into()),
        .path.as_ref().map(|p| format!(" (looked for {})", p.display())).unwrap_or_default())]
    UnresolvableDelegate {
        table: TableName,
        referenced_by: Option<TableName>,
        path: Option<PathBuf>,
    },

    #[error("table {table}, {record}: malformed `{column}` value `{value}`: {reason}")]
    MalformedRecord {
        table: TableName,
        record: RecordRef,
        column: String,
        value: String,
        reason: &'static str,
    },

    #[error("tables delegate to each other in a cycle: {}", join(.path))]
    DelegationCycle { path: Vec<TableName> },

    #[error("invalid `{option}` setting `{value}`")]
    InvalidOption { option: &'static str, value: String },

    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}
