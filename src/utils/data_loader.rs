//! Data loading utilities

use crate::data::Dataset;
use crate::error::{AutoMlError, Result};
use polars::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Data loader for CSV, Parquet and JSON files
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows used for schema inference
    infer_schema_length: usize,
    /// Parse ISO dates in CSV files into date columns
    try_parse_dates: bool,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: 1000,
            try_parse_dates: true,
        }
    }

    /// Set number of rows used for schema inference
    pub fn with_infer_schema_length(mut self, n: usize) -> Self {
        self.infer_schema_length = n;
        self
    }

    /// Enable or disable date parsing for CSV input
    pub fn with_try_parse_dates(mut self, enabled: bool) -> Self {
        self.try_parse_dates = enabled;
        self
    }

    /// Load a CSV file
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        self.load_csv_with_separator(path, b',')
    }

    /// Load a delimited text file with the given separator
    pub fn load_csv_with_separator(&self, path: &Path, separator: u8) -> Result<DataFrame> {
        let file = File::open(path)?;

        let parse_opts = CsvParseOptions::default()
            .with_separator(separator)
            .with_try_parse_dates(self.try_parse_dates);

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| AutoMlError::DataError(e.to_string()))
    }

    /// Load a Parquet file
    pub fn load_parquet(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)?;
        ParquetReader::new(file)
            .finish()
            .map_err(|e| AutoMlError::DataError(e.to_string()))
    }

    /// Load a JSON file
    pub fn load_json(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)?;
        JsonReader::new(file)
            .finish()
            .map_err(|e| AutoMlError::DataError(e.to_string()))
    }

    /// Detect file format from extension and load
    pub fn load_auto(&self, path: &Path) -> Result<DataFrame> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        let start = Instant::now();
        let df = match ext.as_str() {
            "csv" => self.load_csv(path)?,
            "tsv" => self.load_csv_with_separator(path, b'\t')?,
            "parquet" | "pq" => self.load_parquet(path)?,
            "json" => self.load_json(path)?,
            other => {
                return Err(AutoMlError::DataError(format!(
                    "Unsupported file format '{}'. Please use CSV, TSV, Parquet or JSON files",
                    other
                )))
            }
        };

        info!(
            path = %path.display(),
            rows = df.height(),
            cols = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "loaded data file"
        );
        Ok(df)
    }

    /// Load a file straight into a typed [`Dataset`]
    pub fn load_dataset(&self, path: &Path) -> Result<Dataset> {
        let df = self.load_auto(path)?;
        Dataset::from_dataframe(&df)
    }

    /// Get file info without loading full data
    pub fn get_file_info(&self, path: &Path) -> Result<FileInfo> {
        let file_size = std::fs::metadata(path)?.len();

        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);

        let (n_rows, columns) = if is_csv {
            let reader = BufReader::new(File::open(path)?);
            let mut lines = reader.lines();
            let header = lines.next().transpose()?.unwrap_or_default();
            let columns: Vec<String> = header.split(',').map(|s| s.trim().to_string()).collect();
            (Some(lines.count()), Some(columns))
        } else {
            (None, None)
        };

        Ok(FileInfo {
            path: path.display().to_string(),
            file_size,
            n_rows,
            n_cols: columns.as_ref().map(Vec::len),
            columns,
        })
    }
}

/// File information
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub path: String,
    pub file_size: u64,
    pub n_rows: Option<usize>,
    pub n_cols: Option<usize>,
    pub columns: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SemanticType;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .unwrap();
        writeln!(file, "age,plan,signup,churn").unwrap();
        writeln!(file, "34,basic,2023-01-15,0").unwrap();
        writeln!(file, "51,premium,2022-11-02,1").unwrap();
        writeln!(file, "27,basic,2023-06-30,0").unwrap();
        file
    }

    #[test]
    fn test_load_csv() {
        let file = create_test_csv();
        let loader = DataLoader::new();

        let df = loader.load_auto(file.path()).unwrap();

        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 4);
    }

    #[test]
    fn test_load_dataset_infers_types() {
        let file = create_test_csv();
        let ds = DataLoader::new().load_dataset(file.path()).unwrap();

        assert_eq!(ds.column("age").unwrap().semantic_type(), SemanticType::Numeric);
        assert_eq!(ds.column("plan").unwrap().semantic_type(), SemanticType::Categorical);
        assert_eq!(ds.column("signup").unwrap().semantic_type(), SemanticType::DateTime);
    }

    #[test]
    fn test_get_file_info() {
        let file = create_test_csv();
        let info = DataLoader::new().get_file_info(file.path()).unwrap();

        assert_eq!(info.n_rows, Some(3));
        assert_eq!(info.n_cols, Some(4));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        let result = DataLoader::new().load_auto(file.path());
        assert!(matches!(result, Err(AutoMlError::DataError(_))));
    }
}
