use std::fs::File;
use std::path::Path;
use csv::Reader;
use itertools::Itertools;
use thiserror::Error;

pub const COMBO_COLUMN: &str = "combo";

#[derive(Debug, Error)]
pub enum ComboError {
    #[error("combo '{0}' has no '_' separator")]
    MissingSeparator(String),
    #[error("combo '{combo}' is missing the '{prefix}' prefix")]
    MissingPrefix { combo: String, prefix: &'static str },
    #[error("combo '{combo}' has a non-numeric threshold '{value}'")]
    InvalidNumber { combo: String, value: String },
    #[error("column 'combo' not found in {0}")]
    MissingColumn(String),
    #[error("failed to read combo names: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to open combo names: {0}")]
    Io(#[from] std::io::Error),
}

/// A fold-change / p-value threshold pair, named like `FC1.5_p0.05`.
#[derive(Debug, Clone, PartialEq)]
pub struct Combo {
    pub name: String,
    pub fc: f64,
    pub pval: f64,
}

impl Combo {
    pub fn parse(name: &str) -> Result<Self, ComboError> {
        let (fc_part, pval_part) = name
            .split_once('_')
            .ok_or_else(|| ComboError::MissingSeparator(name.to_string()))?;

        let fc = parse_threshold(name, fc_part, "FC")?;
        let pval = parse_threshold(name, pval_part, "p")?;

        Ok(Combo {
            name: name.to_string(),
            fc,
            pval,
        })
    }

    pub fn matches(&self, fc: f64, pval: f64) -> bool {
        self.fc == fc && self.pval == pval
    }
}

fn parse_threshold(combo: &str, part: &str, prefix: &'static str) -> Result<f64, ComboError> {
    let value = part
        .strip_prefix(prefix)
        .ok_or_else(|| ComboError::MissingPrefix {
            combo: combo.to_string(),
            prefix,
        })?;

    value.parse::<f64>().map_err(|_| ComboError::InvalidNumber {
        combo: combo.to_string(),
        value: value.to_string(),
    })
}

pub fn read_combo_names(path: impl AsRef<Path>) -> Result<Vec<String>, ComboError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut csv_reader = Reader::from_reader(file);

    let column = csv_reader
        .headers()?
        .iter()
        .position(|header| header.trim() == COMBO_COLUMN)
        .ok_or_else(|| ComboError::MissingColumn(path.display().to_string()))?;

    let mut names = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        if let Some(name) = record.get(column) {
            let name = name.trim();
            if !name.is_empty() {
                names.push(name.to_string());
            }
        }
    }

    Ok(names)
}

/// Parses each name on its own; malformed names come back as errors next to the valid combos.
pub fn parse_combos(names: &[String]) -> (Vec<Combo>, Vec<ComboError>) {
    names.iter().map(|name| Combo::parse(name)).partition_result()
}

pub fn threshold_options(combos: &[Combo]) -> (Vec<f64>, Vec<f64>) {
    let sorted_unique = |values: Vec<f64>| -> Vec<f64> {
        values
            .into_iter()
            .sorted_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .dedup()
            .collect()
    };

    (
        sorted_unique(combos.iter().map(|combo| combo.fc).collect()),
        sorted_unique(combos.iter().map(|combo| combo.pval).collect()),
    )
}

pub fn select_combos(combos: &[Combo], fc: f64, pval: f64) -> Vec<String> {
    combos
        .iter()
        .filter(|combo| combo.matches(fc, pval))
        .map(|combo| combo.name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn parses_well_formed_combo() {
        let combo = Combo::parse("FC1.5_p0.05").unwrap();
        assert_eq!(combo.fc, 1.5);
        assert_eq!(combo.pval, 0.05);
        assert_eq!(combo.name, "FC1.5_p0.05");

        let combo = Combo::parse("FC2_p0.01").unwrap();
        assert_eq!(combo.fc, 2.0);
        assert_eq!(combo.pval, 0.01);
    }

    #[test]
    fn rejects_missing_underscore() {
        assert!(matches!(
            Combo::parse("FC1.5p0.05"),
            Err(ComboError::MissingSeparator(_))
        ));
    }

    #[test]
    fn rejects_bad_prefix_and_number() {
        assert!(matches!(
            Combo::parse("LFC1.5_p0.05"),
            Err(ComboError::MissingPrefix { prefix: "FC", .. })
        ));
        assert!(matches!(
            Combo::parse("FC1.5_q0.05"),
            Err(ComboError::MissingPrefix { prefix: "p", .. })
        ));
        assert!(matches!(
            Combo::parse("FCx_p0.05"),
            Err(ComboError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn threshold_options_are_sorted_and_unique() {
        let combos: Vec<Combo> = ["FC2_p0.05", "FC1.5_p0.05", "FC2_p0.01", "FC1.5_p0.01"]
            .iter()
            .map(|name| Combo::parse(name).unwrap())
            .collect();

        let (fc_values, pval_values) = threshold_options(&combos);
        assert_eq!(fc_values, vec![1.5, 2.0]);
        assert_eq!(pval_values, vec![0.01, 0.05]);

        assert_eq!(select_combos(&combos, 2.0, 0.05), vec!["FC2_p0.05".to_string()]);
        assert!(select_combos(&combos, 3.0, 0.05).is_empty());
    }

    #[test]
    fn reads_combo_column() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "id,combo").unwrap();
        writeln!(file, "1,FC1.5_p0.05").unwrap();
        writeln!(file, "2,").unwrap();
        writeln!(file, "3,FC2_p0.01").unwrap();

        let names = read_combo_names(file.path()).unwrap();
        assert_eq!(names, vec!["FC1.5_p0.05", "FC2_p0.01"]);
    }

    #[test]
    fn malformed_names_do_not_hide_valid_combos() {
        let names: Vec<String> = ["FC2_p0.01", "badcombo", "FC1.5_p0.05"]
            .iter()
            .map(|name| name.to_string())
            .collect();

        let (combos, rejected) = parse_combos(&names);
        assert_eq!(
            combos.iter().map(|combo| combo.name.as_str()).collect::<Vec<_>>(),
            vec!["FC2_p0.01", "FC1.5_p0.05"]
        );
        assert_eq!(rejected.len(), 1);
        assert!(matches!(&rejected[0], ComboError::MissingSeparator(name) if name == "badcombo"));
    }

    #[test]
    fn missing_combo_column_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "name").unwrap();
        writeln!(file, "FC1.5_p0.05").unwrap();

        assert!(matches!(
            read_combo_names(file.path()),
            Err(ComboError::MissingColumn(_))
        ));
    }
}
