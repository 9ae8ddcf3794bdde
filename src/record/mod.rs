//! Advertisement records and the extraction schema
//!
//! A page parse produces loose [`RawFields`]; the [`ExtractionSchema`] turns
//! those into an [`AdRecord`] whose cells line up with one fixed column list.

mod schema;

pub use schema::{ExtractionSchema, PRICE_COLUMN, URL_COLUMN};

use std::collections::HashMap;
use std::fmt;

/// Loose key/value output of a single page parse, before whitelisting
pub type RawFields = HashMap<String, FieldValue>;

/// A scraped cell value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Free text from a specification table
    Text(String),

    /// Numeric value: parsed price, or `1` for an equipment presence flag
    Int(i64),
}

impl FieldValue {
    /// Presence flag used for equipment list items
    pub const PRESENT: FieldValue = FieldValue::Int(1);
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// One accepted advertisement
///
/// Only [`ExtractionSchema::make_record`] builds these, so `cells` always has
/// exactly one entry per schema column. Records are never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdRecord {
    cells: Vec<Option<FieldValue>>,
    price: i64,
    url: String,
}

impl AdRecord {
    pub fn price(&self) -> i64 {
        self.price
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Cells in schema column order; `None` marks a field the page did not expose
    pub fn cells(&self) -> &[Option<FieldValue>] {
        &self.cells
    }

    /// Looks up a cell by column name
    pub fn get(&self, schema: &ExtractionSchema, column: &str) -> Option<&FieldValue> {
        schema
            .column_index(column)
            .and_then(|index| self.cells.get(index))
            .and_then(|cell| cell.as_ref())
    }

    /// Renders the record as CSV fields; absent cells become empty fields
    pub fn to_csv_row(&self) -> Vec<String> {
        self.cells
            .iter()
            .map(|cell| cell.as_ref().map(ToString::to_string).unwrap_or_default())
            .collect()
    }
}
