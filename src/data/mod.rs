//! Dataset access
//!
//! Training reads its input through [`DatasetAccessor`], keyed by an integer
//! dataset handle. Two implementations are provided:
//! - [`CsvDatasetAccessor`]: handle → file registry, parsed on every read
//!   (CSV, TSV, JSON and Parquet)
//! - [`InMemoryDatasets`]: handle → already-loaded `DataFrame`

use crate::error::{PlatformError, Result};
use parking_lot::RwLock;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Identifier of an uploaded dataset
pub type DatasetHandle = i64;

/// Supplies a rectangular table given a dataset handle
pub trait DatasetAccessor: Send + Sync {
    /// Fails with `DataUnavailable` when nothing is associated with the handle
    fn read_table(&self, handle: DatasetHandle) -> Result<DataFrame>;
}

/// File-backed datasets
#[derive(Default)]
pub struct CsvDatasetAccessor {
    paths: RwLock<HashMap<DatasetHandle, PathBuf>>,
}

impl CsvDatasetAccessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a file with a handle, replacing any previous association
    pub fn register(&self, handle: DatasetHandle, path: impl Into<PathBuf>) {
        self.paths.write().insert(handle, path.into());
    }

    pub fn path_of(&self, handle: DatasetHandle) -> Option<PathBuf> {
        self.paths.read().get(&handle).cloned()
    }
}

impl DatasetAccessor for CsvDatasetAccessor {
    fn read_table(&self, handle: DatasetHandle) -> Result<DataFrame> {
        let path = self
            .path_of(handle)
            .ok_or(PlatformError::DataUnavailable(handle))?;
        load_table(&path)
    }
}

/// Datasets held in memory
#[derive(Default)]
pub struct InMemoryDatasets {
    tables: RwLock<HashMap<DatasetHandle, DataFrame>>,
}

impl InMemoryDatasets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: DatasetHandle, df: DataFrame) {
        self.tables.write().insert(handle, df);
    }
}

impl DatasetAccessor for InMemoryDatasets {
    fn read_table(&self, handle: DatasetHandle) -> Result<DataFrame> {
        self.tables
            .read()
            .get(&handle)
            .cloned()
            .ok_or(PlatformError::DataUnavailable(handle))
    }
}

fn csv_options(separator: u8) -> CsvReadOptions {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .with_parse_options(CsvParseOptions::default().with_separator(separator))
}

/// Load a table, picking the reader from the file extension (CSV when unknown)
pub fn load_table(path: &Path) -> Result<DataFrame> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let file = File::open(path)?;

    let df = match ext.as_str() {
        "parquet" | "pq" => ParquetReader::new(file).finish()?,
        "json" => JsonReader::new(file).finish()?,
        "jsonl" | "ndjson" => JsonReader::new(file).with_json_format(JsonFormat::JsonLines).finish()?,
        "tsv" => csv_options(b'\t').into_reader_with_file_handle(file).finish()?,
        _ => csv_options(b',').into_reader_with_file_handle(file).finish()?,
    };
    Ok(df)
}

/// Parse uploaded bytes, picking the reader from the file name
pub fn parse_table(file_name: &str, data: &[u8]) -> Result<DataFrame> {
    let lower = file_name.to_lowercase();
    let df = if lower.ends_with(".csv") {
        csv_options(b',').into_reader_with_file_handle(Cursor::new(data)).finish()?
    } else if lower.ends_with(".tsv") {
        csv_options(b'\t').into_reader_with_file_handle(Cursor::new(data)).finish()?
    } else if lower.ends_with(".json") {
        JsonReader::new(Cursor::new(data)).finish()?
    } else if lower.ends_with(".jsonl") || lower.ends_with(".ndjson") {
        JsonReader::new(Cursor::new(data))
            .with_json_format(JsonFormat::JsonLines)
            .finish()?
    } else if lower.ends_with(".parquet") {
        ParquetReader::new(Cursor::new(data)).finish()?
    } else {
        return Err(PlatformError::Data(format!(
            "unsupported file format '{}', use CSV, JSON or Parquet",
            file_name
        )));
    };
    Ok(df)
}

/// Shape and column names of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub n_rows: usize,
    pub n_columns: usize,
    pub columns: Vec<String>,
}

impl DatasetSummary {
    pub fn of(df: &DataFrame) -> Self {
        Self {
            n_rows: df.height(),
            n_columns: df.width(),
            columns: df
                .get_column_names()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Fail with `SchemaError` naming every requested column absent from `df`
pub fn require_columns(df: &DataFrame, columns: &[String]) -> Result<()> {
    let present: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let missing: Vec<&str> = columns
        .iter()
        .filter(|c| !present.contains(c))
        .map(|c| c.as_str())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PlatformError::Schema(format!(
            "columns not found in dataset: {}",
            missing.join(", ")
        )))
    }
}
