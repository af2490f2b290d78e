use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
    Null,
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(value) => Some(*value as f64),
            ParamValue::Float(value) => Some(*value),
            ParamValue::Text(value) => value.parse().ok(),
            _ => None,
        }
    }

    /// Scalar rendering used for form bodies and HTML inputs; `None` for nulls.
    pub fn to_form_value(&self) -> Option<String> {
        match self {
            ParamValue::Int(value) => Some(value.to_string()),
            ParamValue::Float(value) => Some(value.to_string()),
            ParamValue::Text(value) => Some(value.clone()),
            ParamValue::List(values) => Some(values.join(",")),
            ParamValue::Null => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(values: Vec<String>) -> Self {
        ParamValue::List(values)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ParamValue::Null)
    }
}

/// Flat option map sent verbatim as a request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamBundle {
    values: BTreeMap<String, ParamValue>,
}

impl ParamBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ParamValue> {
        self.values.remove(name)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(ParamValue::as_f64)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(ParamValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn get_list(&self, name: &str) -> Vec<String> {
        match self.get(name) {
            Some(ParamValue::List(values)) => values.clone(),
            _ => Vec::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Pairs for `application/x-www-form-urlencoded`; lists repeat their key, nulls are dropped.
    pub fn form_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.values.len());
        for (name, value) in &self.values {
            match value {
                ParamValue::List(items) => {
                    for item in items {
                        pairs.push((name.clone(), item.clone()));
                    }
                }
                ParamValue::Null => {}
                scalar => {
                    if let Some(text) = scalar.to_form_value() {
                        pairs.push((name.clone(), text));
                    }
                }
            }
        }
        pairs
    }

    /// Drops list items rejected by `keep`; returns how many were removed.
    pub fn retain_list_items<F>(&mut self, key_filter: impl Fn(&str) -> bool, keep: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let mut removed = 0;
        for (name, value) in self.values.iter_mut() {
            if !key_filter(name.as_str()) {
                continue;
            }
            if let ParamValue::List(items) = value {
                let before = items.len();
                items.retain(|item| keep(item.as_str()));
                removed += before - items.len();
            }
        }
        removed
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ParamError {
    #[error("{label}: '{raw}' is not a number")]
    NotANumber { label: String, raw: String },
    #[error("{label}: '{raw}' is not a whole number")]
    NotAnInteger { label: String, raw: String },
    #[error("{label}: {value} is outside [{min}, {max}]")]
    OutOfRange { label: String, value: f64, min: f64, max: f64 },
    #[error("{label}: '{raw}' is not one of the available options")]
    UnknownOption { label: String, raw: String },
    #[error("{label}: no options available")]
    NoOptions { label: String },
    #[error("{label} is required")]
    Required { label: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Number {
        default: f64,
        step: f64,
        min: Option<f64>,
        max: Option<f64>,
    },
    Integer {
        default: i64,
        min: Option<i64>,
        max: Option<i64>,
    },
    Text {
        default: String,
        required: bool,
    },
    Choice {
        options: Vec<String>,
    },
    MultiChoice {
        options: Vec<String>,
    },
}

/// One configurable option of a page, rendered as a form control.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub label: String,
    pub kind: FieldKind,
}

impl Field {
    pub fn number(name: &'static str, label: &str, default: f64, step: f64) -> Self {
        Field {
            name,
            label: label.to_string(),
            kind: FieldKind::Number { default, step, min: None, max: None },
        }
    }

    pub fn bounded_number(name: &'static str, label: &str, default: f64, step: f64, min: f64, max: f64) -> Self {
        Field {
            name,
            label: label.to_string(),
            kind: FieldKind::Number { default, step, min: Some(min), max: Some(max) },
        }
    }

    pub fn integer(name: &'static str, label: &str, default: i64, min: Option<i64>, max: Option<i64>) -> Self {
        Field {
            name,
            label: label.to_string(),
            kind: FieldKind::Integer { default, min, max },
        }
    }

    pub fn text(name: &'static str, label: &str, default: &str) -> Self {
        Field {
            name,
            label: label.to_string(),
            kind: FieldKind::Text { default: default.to_string(), required: false },
        }
    }

    pub fn required_text(name: &'static str, label: &str) -> Self {
        Field {
            name,
            label: label.to_string(),
            kind: FieldKind::Text { default: String::new(), required: true },
        }
    }

    pub fn choice(name: &'static str, label: &str, options: Vec<String>) -> Self {
        Field {
            name,
            label: label.to_string(),
            kind: FieldKind::Choice { options },
        }
    }

    pub fn multi_choice(name: &'static str, label: &str, options: Vec<String>) -> Self {
        Field {
            name,
            label: label.to_string(),
            kind: FieldKind::MultiChoice { options },
        }
    }

    /// Parses raw form input; blank input selects the default (first option for choices).
    pub fn parse(&self, raw: &[String]) -> Result<ParamValue, ParamError> {
        let first = raw.first().map(|value| value.trim()).filter(|value| !value.is_empty());
        let label = || self.label.clone();

        match &self.kind {
            FieldKind::Number { default, min, max, .. } => {
                let value = match first {
                    Some(text) => text
                        .parse::<f64>()
                        .ok()
                        .filter(|value| value.is_finite())
                        .ok_or_else(|| ParamError::NotANumber {
                            label: label(),
                            raw: text.to_string(),
                        })?,
                    None => *default,
                };
                check_range(&self.label, value, *min, *max)?;
                Ok(ParamValue::Float(value))
            }
            FieldKind::Integer { default, min, max } => {
                let value = match first {
                    Some(text) => text.parse::<i64>().map_err(|_| ParamError::NotAnInteger {
                        label: label(),
                        raw: text.to_string(),
                    })?,
                    None => *default,
                };
                check_range(&self.label, value as f64, min.map(|m| m as f64), max.map(|m| m as f64))?;
                Ok(ParamValue::Int(value))
            }
            FieldKind::Text { default, required } => match first {
                Some(text) => Ok(ParamValue::Text(text.to_string())),
                None if *required => Err(ParamError::Required { label: label() }),
                None => Ok(ParamValue::Text(default.clone())),
            },
            FieldKind::Choice { options } => {
                if options.is_empty() {
                    return Err(ParamError::NoOptions { label: label() });
                }
                match first {
                    Some(text) if options.iter().any(|option| option == text) => {
                        Ok(ParamValue::Text(text.to_string()))
                    }
                    Some(text) => Err(ParamError::UnknownOption {
                        label: label(),
                        raw: text.to_string(),
                    }),
                    None => Ok(ParamValue::Text(options[0].clone())),
                }
            }
            FieldKind::MultiChoice { options } => {
                let mut selected = Vec::new();
                for item in raw.iter().map(|value| value.trim()).filter(|value| !value.is_empty()) {
                    if !options.iter().any(|option| option == item) {
                        return Err(ParamError::UnknownOption {
                            label: label(),
                            raw: item.to_string(),
                        });
                    }
                    if !selected.iter().any(|existing: &String| existing == item) {
                        selected.push(item.to_string());
                    }
                }
                Ok(ParamValue::List(selected))
            }
        }
    }
}

fn check_range(label: &str, value: f64, min: Option<f64>, max: Option<f64>) -> Result<(), ParamError> {
    let lower = min.unwrap_or(f64::NEG_INFINITY);
    let upper = max.unwrap_or(f64::INFINITY);
    if value < lower || value > upper {
        return Err(ParamError::OutOfRange {
            label: label.to_string(),
            value,
            min: lower,
            max: upper,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn json_body_is_flat_map() {
        let mut bundle = ParamBundle::new();
        bundle.insert("csv_path", "/ws/csv-files/counts.csv");
        bundle.insert("width", 8.0);
        bundle.insert("top_n_genes", 50i64);
        bundle.insert("fc_threshold", None::<f64>);
        bundle.insert("combo_names", vec!["FC1.5_p0.05".to_string()]);

        let json = serde_json::to_value(&bundle).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "combo_names": ["FC1.5_p0.05"],
                "csv_path": "/ws/csv-files/counts.csv",
                "fc_threshold": null,
                "top_n_genes": 50,
                "width": 8.0
            })
        );
    }

    #[test]
    fn form_pairs_repeat_lists_and_skip_nulls() {
        let mut bundle = ParamBundle::new();
        bundle.insert("fc_input", "1.5,2");
        bundle.insert("combos", vec!["a".to_string(), "b".to_string()]);
        bundle.insert("missing", ParamValue::Null);
        bundle.insert("pval_cutoff", 0.05);

        assert_eq!(
            bundle.form_pairs(),
            vec![
                ("combos".to_string(), "a".to_string()),
                ("combos".to_string(), "b".to_string()),
                ("fc_input".to_string(), "1.5,2".to_string()),
                ("pval_cutoff".to_string(), "0.05".to_string()),
            ]
        );
    }

    #[test]
    fn blank_input_uses_default() {
        let width = Field::number("width", "Plot width", 8.0, 0.5);
        assert_eq!(width.parse(&raw(&[""])).unwrap(), ParamValue::Float(8.0));
        assert_eq!(width.parse(&[]).unwrap(), ParamValue::Float(8.0));
        assert_eq!(width.parse(&raw(&["9.5"])).unwrap(), ParamValue::Float(9.5));
        assert!(matches!(width.parse(&raw(&["wide"])), Err(ParamError::NotANumber { .. })));
        for text in ["NaN", "inf", "-infinity"] {
            assert!(matches!(width.parse(&raw(&[text])), Err(ParamError::NotANumber { .. })));
        }
    }

    #[test]
    fn bounds_are_enforced() {
        let cutoff = Field::bounded_number("cutoff", "Confidence cutoff", 0.5, 0.05, 0.0, 1.0);
        assert!(matches!(cutoff.parse(&raw(&["1.5"])), Err(ParamError::OutOfRange { .. })));

        let top = Field::integer("topN", "Top N terms", 10, Some(1), None);
        assert_eq!(top.parse(&raw(&["3"])).unwrap(), ParamValue::Int(3));
        assert!(matches!(top.parse(&raw(&["0"])), Err(ParamError::OutOfRange { .. })));
        assert!(matches!(top.parse(&raw(&["2.5"])), Err(ParamError::NotAnInteger { .. })));
    }

    #[test]
    fn choices_validate_membership() {
        let orgdb = Field::choice("orgdb", "OrgDb", vec!["org.Hs.eg.db".into(), "org.Mm.eg.db".into()]);
        assert_eq!(orgdb.parse(&[]).unwrap(), ParamValue::Text("org.Hs.eg.db".into()));
        assert_eq!(orgdb.parse(&raw(&["org.Mm.eg.db"])).unwrap(), ParamValue::Text("org.Mm.eg.db".into()));
        assert!(matches!(orgdb.parse(&raw(&["org.Dm.eg.db"])), Err(ParamError::UnknownOption { .. })));

        let empty = Field::choice("csv", "CSV file", Vec::new());
        assert!(matches!(empty.parse(&[]), Err(ParamError::NoOptions { .. })));

        let samples = Field::multi_choice("samples", "Samples", vec!["s1".into(), "s2".into()]);
        assert_eq!(
            samples.parse(&raw(&["s2", "s1", "s2"])).unwrap(),
            ParamValue::List(vec!["s2".into(), "s1".into()])
        );
    }

    #[test]
    fn retain_list_items_only_touches_matching_keys() {
        let mut bundle = ParamBundle::new();
        bundle.insert("csv_files", vec!["a.csv".to_string(), "b.csv".to_string()]);
        bundle.insert("combo_names", vec!["a.csv".to_string()]);

        let removed = bundle.retain_list_items(|key| key.contains("csv"), |item| item != "a.csv");
        assert_eq!(removed, 1);
        assert_eq!(bundle.get_list("csv_files"), vec!["b.csv"]);
        assert_eq!(bundle.get_list("combo_names"), vec!["a.csv"]);
    }
}
