//! Loading instruction tables from CSV files.
//!
//! A file starts with a few free-form title rows, then a header row naming
//! the columns, then one instruction per row. Columns that are neither a
//! schema field nor one of the metadata columns are ignored.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::record::{Record, RecordRef, RecordSet, TableName};
use crate::resolver::TableSource;
use crate::schema::{is_identifier, FieldSchema, FieldValue, Literal, SchemaIssue};

pub const DEFAULT_BASE_NAME: &str = "Instruction List.csv";

/// Names that are identifiers but can't be used even as raw identifiers.
const RESERVED: [&str; 4] = ["self", "Self", "super", "crate"];

/// Where the header is and what the metadata columns are called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvLayout {
    /// Number of title rows before the header row.
    pub header_row: usize,
    pub mnemonic: String,
    pub cpi: String,
    pub proxy: String,
    pub index: String,
}

impl Default for CsvLayout {
    fn default() -> Self {
        CsvLayout {
            header_row: 3,
            mnemonic: "Mnemonic".into(),
            cpi: "CPI".into(),
            proxy: "Proxy".into(),
            index: "Index".into(),
        }
    }
}

struct Columns {
    fields: Vec<usize>,
    mnemonic: usize,
    cpi: usize,
    proxy: usize,
    index: usize,
}

/// Reads one table.
///
/// With `fields` set to `None` the schema is every column left of the
/// mnemonic column, in file order.
pub fn read_table<R: Read>(
    table: &TableName,
    reader: R,
    fields: Option<&[String]>,
    layout: &CsvLayout,
    path: &Path,
) -> Result<RecordSet> {
    let schema_error = |issue| Error::Schema {
        table: table.clone(),
        issue,
    };
    let csv_error = |source| Error::Csv {
        path: path.to_owned(),
        source,
    };

    let mut rows = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader)
        .into_records();

    let header = rows
        .nth(layout.header_row)
        .transpose()
        .map_err(csv_error)?
        .ok_or(schema_error(SchemaIssue::MissingHeader { row: layout.header_row + 1 }))?;
    let header: Vec<&str> = header.iter().map(str::trim).collect();

    let column = |name: &str| {
        header
            .iter()
            .position(|h| *h == name)
            .ok_or_else(|| schema_error(SchemaIssue::MissingColumn(name.to_owned())))
    };

    let mnemonic = column(&layout.mnemonic)?;
    let schema = match fields {
        Some(names) => FieldSchema::new(names.iter().cloned()),
        None => FieldSchema::new(header[..mnemonic].iter().copied()),
    }
    .map_err(&schema_error)?;

    let columns = Columns {
        fields: schema.iter().map(|f| column(&f.name)).collect::<Result<_>>()?,
        mnemonic,
        cpi: column(&layout.cpi)?,
        proxy: column(&layout.proxy)?,
        index: column(&layout.index)?,
    };

    let mut records = Vec::new();
    for (offset, row) in rows.enumerate() {
        let row = row.map_err(csv_error)?;
        let row_number = row
            .position()
            .map_or(layout.header_row + 2 + offset, |p| p.line() as usize);
        let cell = |i: usize| row.get(i).map(str::trim).unwrap_or("");

        let parsed = RowParser {
            table,
            row: row_number,
            schema: &schema,
            layout,
        }
        .parse(&cell, &columns)?;

        match parsed {
            Some(record) => records.push(record),
            None => log::trace!("{}: skipping blank row {}", table, row_number),
        }
    }

    RecordSet::new(table.clone(), schema, records)
}

struct RowParser<'a> {
    table: &'a TableName,
    row: usize,
    schema: &'a FieldSchema,
    layout: &'a CsvLayout,
}

impl RowParser<'_> {
    fn malformed(&self, handler: &str, column: &str, value: &str, reason: &'static str) -> Error {
        Error::MalformedRecord {
            table: self.table.clone(),
            record: RecordRef {
                row: self.row,
                handler: handler.to_owned(),
            },
            column: column.to_owned(),
            value: value.to_owned(),
            reason,
        }
    }

    fn parse<'c, F>(&self, cell: &F, columns: &Columns) -> Result<Option<Record>>
    where
        F: Fn(usize) -> &'c str,
    {
        let mnemonic = cell(columns.mnemonic);

        let mut values = Vec::with_capacity(self.schema.len());
        for (field, &col) in self.schema.iter().zip(&columns.fields) {
            let text = cell(col);
            let value = if text.is_empty() {
                FieldValue::Wildcard
            } else {
                text.parse::<Literal>()
                    .map(FieldValue::Exact)
                    .map_err(|reason| self.malformed(mnemonic, &field.name, text, reason))?
            };
            values.push(value);
        }

        if mnemonic.is_empty() {
            if values.iter().all(|v| !v.is_exact()) {
                return Ok(None);
            }
            return Err(self.malformed(mnemonic, &self.layout.mnemonic, mnemonic, "row has field values but no mnemonic"));
        }
        if !is_identifier(mnemonic) || RESERVED.contains(&mnemonic) {
            return Err(self.malformed(mnemonic, &self.layout.mnemonic, mnemonic, "not a usable identifier"));
        }

        let proxy_text = cell(columns.proxy);
        let is_proxy = if proxy_text.is_empty() || proxy_text.eq_ignore_ascii_case("false") {
            false
        } else if proxy_text.eq_ignore_ascii_case("true") {
            true
        } else {
            return Err(self.malformed(mnemonic, &self.layout.proxy, proxy_text, "expected TRUE or FALSE"));
        };

        let cycles = self.number(mnemonic, is_proxy, &self.layout.cpi, cell(columns.cpi), "expected a non-negative integer")?;
        let layout_index = self.number(mnemonic, is_proxy, &self.layout.index, cell(columns.index), "expected an integer")?;

        Ok(Some(Record {
            row: self.row,
            values,
            handler: mnemonic.to_owned(),
            cycles,
            layout_index,
            delegate: is_proxy.then(|| TableName::new(mnemonic)),
        }))
    }

    /// Metadata numbers may only be left blank on proxy rows.
    fn number<T>(&self, mnemonic: &str, is_proxy: bool, column: &str, text: &str, reason: &'static str) -> Result<T>
    where
        T: std::str::FromStr + Default,
    {
        if text.is_empty() {
            return if is_proxy {
                Ok(T::default())
            } else {
                Err(self.malformed(mnemonic, column, text, "required on non-proxy rows"))
            };
        }
        text.parse().map_err(|_| self.malformed(mnemonic, column, text, reason))
    }
}

/// Tables stored as CSV files side by side in one directory.
#[derive(Debug, Clone)]
pub struct CsvSource {
    pub directory: PathBuf,
    pub base_name: String,
    pub layout: CsvLayout,
    /// Schema used by every table without an override. `None` takes the
    /// columns left of the mnemonic.
    pub fields: Option<Vec<String>>,
    pub overrides: HashMap<String, Vec<String>>,
}

impl CsvSource {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        CsvSource {
            directory: directory.into(),
            base_name: DEFAULT_BASE_NAME.into(),
            layout: CsvLayout::default(),
            fields: None,
            overrides: HashMap::new(),
        }
    }

    /// `Instruction List.csv` for the root, `COP0 Instruction List.csv` for
    /// table `cop0`.
    pub fn path_for(&self, table: &TableName) -> PathBuf {
        if table.is_root() {
            self.directory.join(&self.base_name)
        } else {
            self.directory
                .join(format!("{} {}", table.as_str().to_uppercase(), self.base_name))
        }
    }

    fn fields_for(&self, table: &TableName) -> Option<&[String]> {
        self.overrides
            .get(table.as_str())
            .or(self.fields.as_ref())
            .map(Vec::as_slice)
    }
}

impl TableSource for CsvSource {
    fn load(&mut self, table: &TableName) -> Result<Option<RecordSet>> {
        let path = self.path_for(table);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(Error::Io { path, source }),
        };
        read_table(table, file, self.fields_for(table), &self.layout, &path).map(Some)
    }

    fn locate(&self, table: &TableName) -> Option<PathBuf> {
        Some(self.path_for(table))
    }
}
