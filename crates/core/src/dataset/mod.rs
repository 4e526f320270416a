//! Tabular dataset decoded from its row-record interchange form.
//!
//! Runs carry the dataset as a JSON array of objects. [`Table`] decodes that
//! form (and the CSV or JSON Lines files users provision from), enforces a
//! fixed column set, and computes the column profile and preview that
//! table-scoped prompts include.

use serde_json::Map;
use serde_json::Number;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("Dataset is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Dataset is not valid CSV: {0}")]
    InvalidCsv(String),

    #[error("Dataset must be an array of row objects")]
    NotRecords,

    #[error("Dataset has no rows")]
    Empty,

    #[error("Row {row} has columns {found:?}, expected {expected:?}")]
    SchemaMismatch {
        row: usize,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Column '{0}' not found in dataset")]
    UnknownColumn(String),

    #[error("Failed to read dataset {path}: {message}")]
    Io { path: String, message: String },
}

/// CSV cells read as null, following the usual dataframe defaults.
const CSV_NULLS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    Text,
    Mixed,
    Empty,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Text => "text",
            ColumnType::Mixed => "mixed",
            ColumnType::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnProfile {
    pub name: String,
    pub dtype: ColumnType,
    pub non_null: usize,
    pub nulls: usize,
    pub distinct: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Decodes a JSON array of row objects.
    ///
    /// The first row fixes the column set; later rows may omit a column
    /// (read as null) but may not introduce new ones.
    pub fn from_records_json(json: &str) -> Result<Self, TableError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| TableError::InvalidJson(e.to_string()))?;
        let Value::Array(records) = value else {
            return Err(TableError::NotRecords);
        };
        let objects = records
            .into_iter()
            .map(|record| match record {
                Value::Object(map) => Ok(map),
                _ => Err(TableError::NotRecords),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_objects(objects)
    }

    /// Reads a dataset file holding CSV, a JSON array or JSON Lines.
    ///
    /// A `.csv` extension selects CSV. Otherwise content starting with `[`
    /// is a JSON array, with `{` JSON Lines, and anything else CSV.
    pub fn from_path(path: &Path) -> Result<Self, TableError> {
        let content = std::fs::read_to_string(path).map_err(|e| TableError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let is_csv = path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| extension.eq_ignore_ascii_case("csv"));
        let head = content.trim_start();
        if is_csv || !(head.starts_with('[') || head.starts_with('{')) {
            return Self::from_csv(&content);
        }
        if head.starts_with('[') {
            return Self::from_records_json(&content);
        }

        let objects = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| match serde_json::from_str::<Value>(line) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(_) => Err(TableError::NotRecords),
                Err(e) => Err(TableError::InvalidJson(e.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_objects(objects)
    }

    /// Decodes CSV with a header row.
    ///
    /// Cells are typed as integer, float, boolean or text; the entries of
    /// `CSV_NULLS` become null. Every row must have as many cells as the
    /// header.
    pub fn from_csv(content: &str) -> Result<Self, TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| TableError::InvalidCsv(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut seen = HashSet::new();
        if let Some(duplicate) = columns.iter().find(|column| !seen.insert(column.as_str())) {
            return Err(TableError::InvalidCsv(format!(
                "duplicate column '{duplicate}'"
            )));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| TableError::InvalidCsv(e.to_string()))?;
            rows.push(record.iter().map(csv_cell).collect());
        }
        if rows.is_empty() {
            return Err(TableError::Empty);
        }
        Ok(Self { columns, rows })
    }

    fn from_objects(objects: Vec<Map<String, Value>>) -> Result<Self, TableError> {
        let Some(first) = objects.first() else {
            return Err(TableError::Empty);
        };
        let columns: Vec<String> = first.keys().cloned().collect();
        let known: HashSet<&str> = columns.iter().map(String::as_str).collect();

        let mut rows = Vec::with_capacity(objects.len());
        for (index, object) in objects.iter().enumerate() {
            if object.keys().any(|key| !known.contains(key.as_str())) {
                return Err(TableError::SchemaMismatch {
                    row: index,
                    expected: columns.clone(),
                    found: object.keys().cloned().collect(),
                });
            }
            rows.push(
                columns
                    .iter()
                    .map(|column| object.get(column).cloned().unwrap_or(Value::Null))
                    .collect(),
            );
        }
        Ok(Self { columns, rows })
    }

    /// Encodes the table back into row records.
    pub fn to_records_json(&self) -> String {
        Value::Array(self.records(self.rows.len())).to_string()
    }

    fn records(&self, limit: usize) -> Vec<Value> {
        self.rows
            .iter()
            .take(limit)
            .map(|row| {
                let map: Map<String, Value> = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect();
                Value::Object(map)
            })
            .collect()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column == name)
    }

    pub fn require_column(&self, name: &str) -> Result<(), TableError> {
        if self.has_column(name) {
            Ok(())
        } else {
            Err(TableError::UnknownColumn(name.to_string()))
        }
    }

    pub fn profile(&self) -> Vec<ColumnProfile> {
        self.columns
            .iter()
            .enumerate()
            .map(|(index, name)| self.profile_column(index, name))
            .collect()
    }

    fn profile_column(&self, index: usize, name: &str) -> ColumnProfile {
        let values: Vec<&Value> = self
            .rows
            .iter()
            .filter_map(|row| row.get(index))
            .filter(|value| !value.is_null())
            .collect();

        let mut dtype = ColumnType::Empty;
        for value in &values {
            let kind = match value {
                Value::Bool(_) => ColumnType::Boolean,
                Value::Number(n) if n.is_i64() || n.is_u64() => ColumnType::Integer,
                Value::Number(_) => ColumnType::Float,
                _ => ColumnType::Text,
            };
            dtype = match (dtype, kind) {
                (ColumnType::Empty, kind) => kind,
                (current, kind) if current == kind => current,
                (ColumnType::Integer, ColumnType::Float) | (ColumnType::Float, ColumnType::Integer) => {
                    ColumnType::Float
                }
                _ => ColumnType::Mixed,
            };
        }

        let distinct: HashSet<String> = values.iter().map(|value| value.to_string()).collect();
        let numbers: Vec<f64> = values.iter().filter_map(|value| value.as_f64()).collect();
        let numeric = matches!(dtype, ColumnType::Integer | ColumnType::Float);
        let (min, max, mean) = if numeric && !numbers.is_empty() {
            let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
            let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
            (Some(min), Some(max), Some(mean))
        } else {
            (None, None, None)
        };

        ColumnProfile {
            name: name.to_string(),
            dtype,
            non_null: values.len(),
            nulls: self.rows.len() - values.len(),
            distinct: distinct.len(),
            min,
            max,
            mean,
        }
    }

    /// First `rows` records as pretty JSON.
    pub fn preview(&self, rows: usize) -> String {
        serde_json::to_string_pretty(&self.records(rows)).unwrap_or_default()
    }

    /// Shape, column profile and head rows, formatted for a prompt.
    pub fn describe(&self, preview_rows: usize) -> String {
        let mut out = format!(
            "The table has {} rows and {} columns.\n\nColumns:\n",
            self.rows.len(),
            self.columns.len()
        );
        for column in self.profile() {
            let _ = write!(
                out,
                "- {} ({}): {} non-null, {} null, {} distinct",
                column.name,
                column.dtype.as_str(),
                column.non_null,
                column.nulls,
                column.distinct
            );
            if let (Some(min), Some(max), Some(mean)) = (column.min, column.max, column.mean) {
                let _ = write!(out, ", min {min}, max {max}, mean {mean:.4}");
            }
            out.push('\n');
        }
        let _ = write!(
            out,
            "\nFirst {} rows:\n{}",
            preview_rows.min(self.rows.len()),
            self.preview(preview_rows)
        );
        out
    }
}

fn csv_cell(cell: &str) -> Value {
    if CSV_NULLS.contains(&cell) {
        return Value::Null;
    }
    if let Ok(integer) = cell.parse::<i64>() {
        return Value::from(integer);
    }
    if let Some(number) = cell.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(number);
    }
    match cell {
        "true" | "True" | "TRUE" => Value::Bool(true),
        "false" | "False" | "FALSE" => Value::Bool(false),
        _ => Value::String(cell.to_string()),
    }
}
