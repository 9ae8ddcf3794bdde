use crate::record::{AdRecord, FieldValue, RawFields};
use std::collections::HashSet;
use std::path::Path;

/// Column holding the parsed numeric price
pub const PRICE_COLUMN: &str = "Price";

/// Column holding the advertisement's source link
pub const URL_COLUMN: &str = "Url";

/// Whitelist of feature columns the harvester persists
///
/// Column order is the whitelist order followed by `Price` and `Url` (unless
/// the whitelist already names them, in which case they keep their position).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionSchema {
    columns: Vec<String>,
}

impl ExtractionSchema {
    /// Builds a schema from feature names; blank and duplicate names are skipped
    pub fn new<I, S>(features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut columns: Vec<String> = features
            .into_iter()
            .map(|name| name.as_ref().trim().to_string())
            .filter(|name| !name.is_empty())
            .filter(|name| seen.insert(name.clone()))
            .collect();

        for derived in [PRICE_COLUMN, URL_COLUMN] {
            if !columns.iter().any(|c| c == derived) {
                columns.push(derived.to_string());
            }
        }

        Self { columns }
    }

    /// Parses a newline-delimited feature list
    pub fn from_text(text: &str) -> Self {
        Self::new(text.lines())
    }

    /// Reads a newline-delimited feature list from disk
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_text(&text))
    }

    /// Every persisted column, in output order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn contains(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Whitelists `raw` into a record
    ///
    /// Keys outside the schema are dropped; schema columns the page did not
    /// expose are left empty. `Price` and `Url` always come from the
    /// arguments, never from `raw`.
    pub fn make_record(&self, mut raw: RawFields, price: i64, url: &str) -> AdRecord {
        let cells = self
            .columns
            .iter()
            .map(|column| match column.as_str() {
                PRICE_COLUMN => Some(FieldValue::Int(price)),
                URL_COLUMN => Some(FieldValue::Text(url.to_string())),
                other => raw.remove(other),
            })
            .collect();

        AdRecord {
            cells,
            price,
            url: url.to_string(),
        }
    }
}
