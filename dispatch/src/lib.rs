//! Compiles tabular instruction set descriptions into decision-tree dispatch
//! functions.
//!
//! The pipeline for a single table is [`tree::build`], then
//! [`collapse::collapse`], then [`emit::emit`]. [`resolver::resolve`] drives it
//! over the root table and every sub-table a proxy row delegates to.
//! [`render::render`] turns the result into Rust source.

pub mod collapse;
pub mod emit;
pub mod error;
pub mod lookup;
pub mod record;
pub mod render;
pub mod resolver;
pub mod schema;
pub mod source;
pub mod tree;

pub use error::{Error, Result};
pub use lookup::{DecodeFailure, FieldSource};
pub use record::{Record, RecordSet, TableName};
pub use render::{render, render_stubs, RenderOptions, Unmatched};
pub use resolver::{resolve, GeneratedTable, Program, TableSource};
pub use schema::{FieldSchema, FieldValue, Literal};
pub use source::{CsvLayout, CsvSource};
pub use tree::{DecisionNode, Leaf};
