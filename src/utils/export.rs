use std::path::PathBuf;
use anyhow::{anyhow, Context, Result};
use csv::WriterBuilder;
use serde_json::{Map, Value};
use crate::parsers::table_parser::{read_table, CsvTable};

pub const EXPORT_FORMATS: [&str; 3] = ["csv", "tsv", "json"];

pub fn mime_for(format: &str) -> &'static str {
    match format {
        "csv" => "text/csv",
        "tsv" => "text/tab-separated-values",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// Re-encodes one result table of the workspace for download.
pub struct TableExporter {
    table_path: PathBuf,
}

impl TableExporter {
    pub fn new(table_path: impl Into<PathBuf>) -> Self {
        Self {
            table_path: table_path.into(),
        }
    }

    fn table_stem(&self) -> String {
        self.table_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "results".to_string())
    }

    pub fn generate_file_content(&self, format: &str) -> Result<(String, Vec<u8>)> {
        if !EXPORT_FORMATS.contains(&format) {
            return Err(anyhow!("Unsupported format: {}", format));
        }

        let table = read_table(&self.table_path)
            .with_context(|| format!("Failed to read {}", self.table_path.display()))?;
        let output_filename = format!("{}.{}", self.table_stem(), format);

        let content = match format {
            "csv" => write_delimited(&table, b',')?,
            "tsv" => write_delimited(&table, b'\t')?,
            _ => serde_json::to_vec_pretty(&records(&table))?,
        };

        Ok((output_filename, content))
    }
}

fn write_delimited(table: &CsvTable, delimiter: u8) -> Result<Vec<u8>> {
    let mut wtr = WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_writer(vec![]);

    wtr.write_record(&table.headers)?;
    for row in &table.rows {
        wtr.write_record(row)?;
    }

    wtr.into_inner().map_err(|e| anyhow!("Failed to flush table: {}", e))
}

fn records(table: &CsvTable) -> Vec<Map<String, Value>> {
    table
        .rows
        .iter()
        .map(|row| {
            table
                .headers
                .iter()
                .zip(row.iter())
                .map(|(header, cell)| (header.clone(), Value::String(cell.clone())))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_table(dir: &Path) -> PathBuf {
        let path = dir.join("KEGG_result.csv");
        fs::write(&path, "ID,Description,p.adjust\nhsa00230,Purine metabolism,0.01\nhsa04110,Cell cycle,0.2\n").unwrap();
        path
    }

    #[test]
    fn tsv_export_keeps_rows() {
        let dir = tempdir().unwrap();
        let exporter = TableExporter::new(write_table(dir.path()));

        let (name, content) = exporter.generate_file_content("tsv").unwrap();
        assert_eq!(name, "KEGG_result.tsv");
        let text = String::from_utf8(content).unwrap();
        assert_eq!(text.lines().next().unwrap(), "ID\tDescription\tp.adjust");
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn json_export_keys_by_header() {
        let dir = tempdir().unwrap();
        let exporter = TableExporter::new(write_table(dir.path()));

        let (name, content) = exporter.generate_file_content("json").unwrap();
        assert_eq!(name, "KEGG_result.json");
        let value: Value = serde_json::from_slice(&content).unwrap();
        assert_eq!(value[1]["Description"], "Cell cycle");
    }

    #[test]
    fn unsupported_format_is_an_error() {
        let dir = tempdir().unwrap();
        let exporter = TableExporter::new(write_table(dir.path()));
        assert!(exporter.generate_file_content("xlsx").is_err());
    }
}
