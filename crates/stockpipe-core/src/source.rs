//! Tabular source readers.
//!
//! A source yields [`RawRow`]s: one per data row, keyed by column name, with
//! values kept as loosely typed as the file format allows. Interpretation is
//! left to [`crate::normalize`].

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use time::Date;

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Csv,
    Json,
}

impl SourceFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    /// Infer the format from a file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// A loosely typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Date(Date),
    /// Bytes that are not valid UTF-8, kept in lossy form for reporting.
    Undecodable(String),
    Null,
}

impl RawValue {
    /// `Null` and empty text both count as absent.
    pub fn is_absent(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(text) => text.is_empty(),
            _ => false,
        }
    }

    /// Text form used in error messages.
    pub fn display_value(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Integer(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
            Self::Date(date) => crate::domain::TradeDate::from_date(*date).to_string(),
            Self::Undecodable(text) => text.clone(),
            Self::Null => String::from("null"),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Date> for RawValue {
    fn from(value: Date) -> Self {
        Self::Date(value)
    }
}

/// One data row of a source, positioned by its 0-based `index`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRow {
    pub index: usize,
    fields: HashMap<String, RawValue>,
}

impl RawRow {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            fields: HashMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<RawValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Present, non-empty value for `name`.
    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.fields.get(name).filter(|value| !value.is_absent())
    }
}

/// A located tabular source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub path: PathBuf,
    pub format: SourceFormat,
}

impl Source {
    /// Explicit `format` wins; otherwise it is inferred from the extension
    /// and falls back to CSV.
    pub fn new(path: impl Into<PathBuf>, format: Option<SourceFormat>) -> Self {
        let path = path.into();
        let format = format
            .or_else(|| SourceFormat::from_path(&path))
            .unwrap_or(SourceFormat::Csv);
        Self { path, format }
    }

    pub fn read_rows(&self) -> Result<Vec<RawRow>, PipelineError> {
        let unavailable = |reason: String| PipelineError::SourceUnavailable {
            path: self.path.clone(),
            reason,
        };

        match self.format {
            SourceFormat::Csv => {
                let file = fs::File::open(&self.path).map_err(|error| unavailable(error.to_string()))?;
                parse_csv(file).map_err(|error| unavailable(error.to_string()))
            }
            SourceFormat::Json => {
                let text =
                    fs::read_to_string(&self.path).map_err(|error| unavailable(error.to_string()))?;
                parse_json(&text).map_err(unavailable)
            }
        }
    }
}

/// Resolve the source for a run.
///
/// An explicit path must exist. Without one, each candidate is tried in order
/// and the first existing file wins.
pub fn locate_source(
    explicit: Option<&Path>,
    format: Option<SourceFormat>,
    candidates: &[PathBuf],
) -> Result<Source, PipelineError> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(PipelineError::SourceUnavailable {
                path: path.to_path_buf(),
                reason: String::from("file not found"),
            });
        }
        return Ok(Source::new(path, format));
    }

    candidates
        .iter()
        .find(|candidate| candidate.is_file())
        .map(|candidate| Source::new(candidate.clone(), format))
        .ok_or_else(|| PipelineError::SourceUnavailable {
            path: candidates.first().cloned().unwrap_or_default(),
            reason: format!(
                "no source file found (searched: {})",
                candidates
                    .iter()
                    .map(|candidate| candidate.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        })
}

/// Read CSV with a header row. Short rows are allowed; their trailing
/// columns are simply absent.
///
/// The header must be valid UTF-8. A data cell that is not becomes
/// [`RawValue::Undecodable`] and fails only its own row.
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<RawRow>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for (index, result) in reader.byte_records().enumerate() {
        let record = result?;
        let mut row = RawRow::new(index);
        for (name, bytes) in headers.iter().zip(record.iter()) {
            match std::str::from_utf8(bytes) {
                Ok(value) => row.set(name, value),
                Err(_) => row.set(
                    name,
                    RawValue::Undecodable(String::from_utf8_lossy(bytes).into_owned()),
                ),
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Read a JSON array of objects.
pub fn parse_json(text: &str) -> Result<Vec<RawRow>, String> {
    let document: Value = serde_json::from_str(text).map_err(|error| error.to_string())?;
    let Value::Array(items) = document else {
        return Err(String::from("expected a JSON array of records"));
    };

    let mut rows = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let Value::Object(object) = item else {
            return Err(format!("record {index} is not a JSON object"));
        };
        let mut row = RawRow::new(index);
        for (name, value) in object {
            row.set(name, json_value(value));
        }
        rows.push(row);
    }
    Ok(rows)
}

fn json_value(value: Value) -> RawValue {
    match value {
        Value::Null => RawValue::Null,
        Value::String(text) => RawValue::Text(text),
        Value::Number(number) => number
            .as_i64()
            .map(RawValue::Integer)
            .or_else(|| number.as_f64().map(RawValue::Float))
            .unwrap_or_else(|| RawValue::Text(number.to_string())),
        other => RawValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_rows_are_keyed_by_trimmed_headers() {
        let data = "date, trade_code ,open,high,low,close,volume\n\
                    2020-01-02,ACI,10,11,9,10.5,\"1,000\"\n\
                    2020-01-03,GP,20\n";
        let rows = parse_csv(data.as_bytes()).expect("parse csv");

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].index, 0);
        assert_eq!(rows[0].get("trade_code"), Some(&RawValue::from("ACI")));
        assert_eq!(rows[0].get("volume"), Some(&RawValue::from("1,000")));
        assert_eq!(rows[1].index, 1);
        assert_eq!(rows[1].get("high"), None);
    }

    #[test]
    fn undecodable_cells_stay_on_their_row() {
        let mut data = b"date,trade_code\n2020-01-02,ACI\n2020-01-03,".to_vec();
        data.extend_from_slice(&[b'G', 0xFF, b'\n']);
        data.extend_from_slice(b"2020-01-06,GP\n");

        let rows = parse_csv(data.as_slice()).expect("parse csv");

        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[1].get("trade_code"),
            Some(&RawValue::Undecodable(String::from("G\u{FFFD}")))
        );
        assert_eq!(rows[2].get("trade_code"), Some(&RawValue::from("GP")));
    }

    #[test]
    fn undecodable_header_fails_the_source() {
        assert!(parse_csv(&[b'd', 0xFF, b'\n', b'1', b'\n'][..]).is_err());
    }

    #[test]
    fn empty_cells_are_absent() {
        let rows = parse_csv("date,trade_code\n2020-01-02,\n".as_bytes()).expect("parse csv");
        assert_eq!(rows[0].get("trade_code"), None);
    }

    #[test]
    fn json_numbers_keep_their_kind() {
        let rows = parse_json(
            r#"[{"trade_code": "ACI", "open": 10, "close": 10.5, "volume": null, "flag": true}]"#,
        )
        .expect("parse json");

        assert_eq!(rows[0].get("open"), Some(&RawValue::Integer(10)));
        assert_eq!(rows[0].get("close"), Some(&RawValue::Float(10.5)));
        assert_eq!(rows[0].get("volume"), None);
        assert_eq!(rows[0].get("flag"), Some(&RawValue::from("true")));
    }

    #[test]
    fn json_must_be_an_array_of_objects() {
        assert!(parse_json(r#"{"trade_code": "ACI"}"#).is_err());
        assert!(parse_json("[1, 2]").is_err());
    }

    #[test]
    fn format_is_inferred_from_extension() {
        assert_eq!(Source::new("data/x.JSON", None).format, SourceFormat::Json);
        assert_eq!(Source::new("data/x.txt", None).format, SourceFormat::Csv);
        assert_eq!(
            Source::new("data/x.csv", Some(SourceFormat::Json)).format,
            SourceFormat::Json
        );
    }

    #[test]
    fn locate_source_uses_first_existing_candidate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("missing.csv");
        let present = dir.path().join("present.csv");
        std::fs::write(&present, "date\n").expect("write source");

        let source =
            locate_source(None, None, &[missing.clone(), present.clone()]).expect("locate");
        assert_eq!(source.path, present);

        let error = locate_source(Some(&missing), None, &[]).expect_err("missing explicit path");
        assert!(matches!(error, PipelineError::SourceUnavailable { .. }));
    }
}
