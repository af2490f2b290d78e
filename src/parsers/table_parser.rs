use std::fs::File;
use std::path::Path;
use csv::ReaderBuilder;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("column '{column}' not found in {path}")]
    MissingColumn { column: String, path: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
}

impl CsvTable {
    pub fn is_empty(&self) -> bool {
        self.total_rows == 0
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == column)
    }
}

fn open_reader(path: &Path) -> Result<csv::Reader<File>, TableError> {
    let file = File::open(path).map_err(|source| TableError::Io {
        path: path.display().to_string(),
        source,
    })?;

    Ok(ReaderBuilder::new().flexible(true).from_reader(file))
}

pub fn read_table(path: impl AsRef<Path>) -> Result<CsvTable, TableError> {
    read_table_preview(path, usize::MAX)
}

/// Reads at most `limit` rows but still counts every record in the file.
pub fn read_table_preview(path: impl AsRef<Path>, limit: usize) -> Result<CsvTable, TableError> {
    let mut csv_reader = open_reader(path.as_ref())?;

    let headers = csv_reader
        .headers()?
        .iter()
        .map(|header| header.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    let mut total_rows = 0;
    for result in csv_reader.records() {
        let record = result?;
        if rows.len() < limit {
            rows.push(record.iter().map(str::to_string).collect());
        }
        total_rows += 1;
    }

    Ok(CsvTable {
        headers,
        rows,
        total_rows,
    })
}

pub fn count_rows(path: impl AsRef<Path>) -> Result<usize, TableError> {
    let mut csv_reader = open_reader(path.as_ref())?;
    let mut count = 0;
    for result in csv_reader.records() {
        result?;
        count += 1;
    }
    Ok(count)
}

pub fn unique_column_values(path: impl AsRef<Path>, column: &str) -> Result<Vec<String>, TableError> {
    let path = path.as_ref();
    let mut csv_reader = open_reader(path)?;

    let index = csv_reader
        .headers()?
        .iter()
        .position(|header| header.trim() == column)
        .ok_or_else(|| TableError::MissingColumn {
            column: column.to_string(),
            path: path.display().to_string(),
        })?;

    let mut values: Vec<String> = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        if let Some(value) = record.get(index).map(str::trim) {
            if !value.is_empty() && !value.eq_ignore_ascii_case("NA") && !values.iter().any(|v| v == value) {
                values.push(value.to_string());
            }
        }
    }

    Ok(values)
}
