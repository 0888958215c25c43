use std::fmt;
use std::str::FromStr;

/// A single column of the field schema.
///
/// The name doubles as the accessor method the generated code calls on the
/// instruction value, so it must be a plain Rust identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub index: usize,
    pub name: String,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Ordered list of fields for one table. Earlier fields are always tested first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaIssue {
    Empty,
    Duplicate(String),
    InvalidName(String),
    MissingColumn(String),
    MissingHeader { row: usize },
    Arity { row: usize, found: usize, expected: usize },
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaIssue::Empty => write!(f, "the field schema is empty"),
            SchemaIssue::Duplicate(name) => write!(f, "field `{name}` appears twice in the schema"),
            SchemaIssue::InvalidName(name) => write!(f, "`{name}` is not a valid field identifier"),
            SchemaIssue::MissingColumn(name) => write!(f, "no column named `{name}` in the header row"),
            SchemaIssue::MissingHeader { row } => write!(f, "expected a header row at row {row}"),
            SchemaIssue::Arity { row, found, expected } => {
                write!(f, "row {row} has {found} field values, the schema has {expected}")
            }
        }
    }
}

impl FieldSchema {
    pub fn new<I, S>(names: I) -> Result<FieldSchema, SchemaIssue>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fields: Vec<Field> = Vec::new();
        for name in names {
            let name = name.into();
            if !is_identifier(&name) {
                return Err(SchemaIssue::InvalidName(name));
            }
            if fields.iter().any(|f| f.name == name) {
                return Err(SchemaIssue::Duplicate(name));
            }
            fields.push(Field { index: fields.len(), name });
        }
        if fields.is_empty() {
            return Err(SchemaIssue::Empty);
        }
        Ok(FieldSchema { fields })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, index: usize) -> &Field {
        &self.fields[index]
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }
}

/// A concrete value a field can be matched against.
///
/// Booleans exist because single-bit fields (the coprocessor `c` bit, say)
/// read more naturally as `true`/`false` arms. Within one table a field only
/// ever holds one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Literal {
    Bool(bool),
    Int(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Bool,
    Int,
}

impl Literal {
    pub fn kind(self) -> LiteralKind {
        match self {
            Literal::Bool(_) => LiteralKind::Bool,
            Literal::Int(_) => LiteralKind::Int,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int(n) => write!(f, "{n}"),
        }
    }
}

impl From<u32> for Literal {
    fn from(value: u32) -> Self {
        Literal::Int(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

impl FromStr for Literal {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("true") {
            return Ok(Literal::Bool(true));
        }
        if s.eq_ignore_ascii_case("false") {
            return Ok(Literal::Bool(false));
        }
        let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            u32::from_str_radix(&hex.replace('_', ""), 16)
        } else if let Some(bin) = s.strip_prefix("0b").or_else(|| s.strip_prefix("0B")) {
            u32::from_str_radix(&bin.replace('_', ""), 2)
        } else {
            s.parse::<u32>()
        };
        parsed.map(Literal::Int).map_err(|_| "expected an unsigned integer or TRUE/FALSE")
    }
}

/// The value a record holds for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldValue {
    /// The record does not constrain this field.
    Wildcard,
    Exact(Literal),
}

impl FieldValue {
    pub fn is_exact(&self) -> bool {
        matches!(self, FieldValue::Exact(_))
    }
}

impl From<Literal> for FieldValue {
    fn from(value: Literal) -> Self {
        FieldValue::Exact(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Wildcard => f.write_str("_"),
            FieldValue::Exact(literal) => literal.fmt(f),
        }
    }
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    name != "_" && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}
