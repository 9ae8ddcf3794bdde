//! CSV tables
//!
//! Per-target files and the combined file share one representation: a header
//! row plus string rows, where an empty field stands for an absent value.

use crate::record::{AdRecord, ExtractionSchema, PRICE_COLUMN};
use crate::HarvestError;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

/// In-memory CSV table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Price summary of a table's `Price` column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceStats {
    pub count: usize,
    pub min: i64,
    pub max: i64,
    pub mean: f64,
    pub median: f64,
}

impl Table {
    /// Reads a CSV document with a header row
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, HarvestError> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = reader.headers()?.iter().map(str::to_string).collect::<Vec<_>>();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    pub fn read_path(path: &Path) -> Result<Self, HarvestError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Writes the table, creating parent directories as needed
    pub fn write_path(&self, path: &Path) -> Result<(), HarvestError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(path)?;
        if !self.headers.is_empty() {
            writer.write_record(&self.headers)?;
        }
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    /// Cell value, `None` when the column is unknown or the cell is empty
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows
            .get(row)
            .and_then(|r| r.get(index))
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Concatenates tables over the outer union of their columns
    ///
    /// Columns appear in first-seen order; cells a source table lacks are empty.
    pub fn union<'a, I>(tables: I) -> Self
    where
        I: IntoIterator<Item = &'a Table>,
    {
        let tables: Vec<&Table> = tables.into_iter().collect();

        let mut headers: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for table in &tables {
            for header in &table.headers {
                if !positions.contains_key(header) {
                    positions.insert(header.clone(), headers.len());
                    headers.push(header.clone());
                }
            }
        }

        let mut rows = Vec::new();
        for table in &tables {
            let mapping: Vec<usize> = table.headers.iter().map(|h| positions[h]).collect();
            for source in &table.rows {
                let mut row = vec![String::new(); headers.len()];
                for (value, &target) in source.iter().zip(&mapping) {
                    row[target] = value.clone();
                }
                rows.push(row);
            }
        }

        Self { headers, rows }
    }

    /// Summarizes the `Price` column; `None` when no row has a numeric price
    pub fn price_stats(&self) -> Option<PriceStats> {
        let index = self.column_index(PRICE_COLUMN)?;
        let mut prices: Vec<i64> = self
            .rows
            .iter()
            .filter_map(|row| row.get(index))
            .filter_map(|value| value.trim().parse().ok())
            .collect();

        if prices.is_empty() {
            return None;
        }

        prices.sort_unstable();
        let count = prices.len();
        let mean = prices.iter().map(|&p| p as f64).sum::<f64>() / count as f64;
        let median = if count % 2 == 0 {
            (prices[count / 2 - 1] as f64 + prices[count / 2] as f64) / 2.0
        } else {
            prices[count / 2] as f64
        };

        Some(PriceStats {
            count,
            min: prices[0],
            max: prices[count - 1],
            mean,
            median,
        })
    }
}

/// Writes accepted records under the schema's column list
pub fn write_records(
    path: &Path,
    schema: &ExtractionSchema,
    records: &[AdRecord],
) -> Result<(), HarvestError> {
    let table = Table {
        headers: schema.columns().to_vec(),
        rows: records.iter().map(AdRecord::to_csv_row).collect(),
    };
    table.write_path(path)
}

/// Result of a `combine_data` run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombineReport {
    pub path: PathBuf,
    pub files: usize,
    pub rows: usize,
    pub columns: usize,
}

/// Concatenates every per-target CSV in `data_dir` into `data_dir/filename`
///
/// Files are read in name order. The output file itself is never an input.
pub fn combine_data(data_dir: &Path, filename: &str) -> Result<CombineReport, HarvestError> {
    tracing::info!("Combining data in {}", data_dir.display());

    let mut inputs: Vec<PathBuf> = std::fs::read_dir(data_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.extension().is_some_and(|ext| ext == "csv"))
        .filter(|path| path.file_name().is_some_and(|name| name != filename))
        .collect();
    inputs.sort();

    let mut tables = Vec::with_capacity(inputs.len());
    for input in &inputs {
        tracing::debug!("Reading {}", input.display());
        tables.push(Table::read_path(input)?);
    }

    let combined = Table::union(&tables);
    let path = data_dir.join(filename);
    combined.write_path(&path)?;

    tracing::info!(
        "Combined {} files ({} rows, {} columns) into {}",
        inputs.len(),
        combined.rows.len(),
        combined.headers.len(),
        path.display()
    );

    Ok(CombineReport {
        path,
        files: inputs.len(),
        rows: combined.rows.len(),
        columns: combined.headers.len(),
    })
}
