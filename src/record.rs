use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::dates::parse_event_date;
use crate::errors::JoinError;
use crate::types::{FieldName, StreamId};

/// Shared per-stream header: column order plus stream provenance.
#[derive(Debug)]
pub struct Header {
    stream: StreamId,
    index: IndexMap<FieldName, usize>,
}

impl Header {
    /// Build a header from column names in stream order.
    pub fn new(
        stream: impl Into<StreamId>,
        columns: impl IntoIterator<Item = impl Into<FieldName>>,
    ) -> Self {
        let index = columns
            .into_iter()
            .enumerate()
            .map(|(idx, name)| (name.into(), idx))
            .collect();
        Self {
            stream: stream.into(),
            index,
        }
    }

    /// Stream tag this header belongs to.
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True when the header names no columns.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub(crate) fn position(&self, field: &str) -> Option<usize> {
        self.index.get(field).copied()
    }
}

/// One row of a source stream: named textual fields plus provenance.
///
/// Records are materialized on read and discarded after extraction; nothing
/// in the join retains them beyond the current step.
#[derive(Clone, Debug)]
pub struct Record {
    header: Arc<Header>,
    values: Vec<String>,
    line: u64,
}

impl Record {
    /// Build a record from a shared header and field values in column order.
    pub fn new(header: Arc<Header>, values: Vec<String>, line: u64) -> Self {
        Self {
            header,
            values,
            line,
        }
    }

    /// The raw value of `field`, if the column exists.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.header
            .position(field)
            .and_then(|idx| self.values.get(idx))
            .map(String::as_str)
    }

    /// The raw value of `field`, or a malformed-record error naming the column.
    pub fn require(&self, field: &str) -> Result<&str, JoinError> {
        self.get(field)
            .ok_or_else(|| self.malformed(format!("missing column '{field}'")))
    }

    /// The value of `field` parsed as an integer.
    pub fn require_int(&self, field: &str) -> Result<i64, JoinError> {
        let value = self.require(field)?;
        value
            .parse()
            .map_err(|_| self.malformed(format!("column '{field}' value '{value}' is not an integer")))
    }

    /// The value of `field` parsed as a float.
    pub fn require_float(&self, field: &str) -> Result<f64, JoinError> {
        let value = self.require(field)?;
        value
            .parse()
            .map_err(|_| self.malformed(format!("column '{field}' value '{value}' is not a float")))
    }

    /// The value of `field` parsed as an event timestamp.
    pub fn require_date(&self, field: &str) -> Result<NaiveDateTime, JoinError> {
        let value = self.require(field)?;
        parse_event_date(value)
            .map_err(|err| self.malformed(format!("column '{field}' value '{value}': {err}")))
    }

    /// Stream tag this record was read from.
    pub fn stream(&self) -> &str {
        self.header.stream()
    }

    /// One-based line number within the source stream (the header is line 1).
    pub fn line(&self) -> u64 {
        self.line
    }

    fn malformed(&self, details: String) -> JoinError {
        JoinError::MalformedRecord {
            stream: self.stream().to_string(),
            line: self.line,
            details,
        }
    }
}

/// A single extracted feature value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    /// Integer-typed feature.
    Int(i64),
    /// Float-typed feature.
    Float(f64),
    /// Textual feature.
    Text(String),
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Int(value) => write!(f, "{value}"),
            FeatureValue::Float(value) => write!(f, "{value}"),
            FeatureValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for FeatureValue {
    fn from(value: i64) -> Self {
        FeatureValue::Int(value)
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        FeatureValue::Float(value)
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        FeatureValue::Text(value.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(value: String) -> Self {
        FeatureValue::Text(value)
    }
}

/// Union of all extracted fields for one joined row, insertion-ordered.
///
/// Ordered so emitted rows serialize identically across runs.
pub type JoinedRow = IndexMap<FieldName, FeatureValue>;

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> Record {
        let header = Arc::new(Header::new("clicks", ["SearchID", "AdID", "HistCTR"]));
        Record::new(
            header,
            vec!["12".to_string(), "100".to_string(), "0.02".to_string()],
            2,
        )
    }

    #[test]
    fn record_reads_fields_by_name() {
        let record = sample_record();
        assert_eq!(record.get("AdID"), Some("100"));
        assert_eq!(record.get("Missing"), None);
        assert_eq!(record.require_int("SearchID").unwrap(), 12);
        assert!((record.require_float("HistCTR").unwrap() - 0.02).abs() < 1e-9);
    }

    #[test]
    fn missing_column_is_a_malformed_record() {
        let record = sample_record();
        let err = record.require("Missing").unwrap_err();
        assert!(matches!(
            err,
            JoinError::MalformedRecord { stream, line, details }
                if stream == "clicks" && line == 2 && details.contains("Missing")
        ));
    }

    #[test]
    fn non_integer_key_is_a_malformed_record() {
        let header = Arc::new(Header::new("clicks", ["SearchID"]));
        let record = Record::new(header, vec!["abc".to_string()], 3);
        let err = record.require_int("SearchID").unwrap_err();
        assert!(matches!(
            err,
            JoinError::MalformedRecord { line, ref details, .. }
                if line == 3 && details.contains("abc")
        ));
    }

    #[test]
    fn feature_values_display_without_decoration() {
        assert_eq!(FeatureValue::Int(5).to_string(), "5");
        assert_eq!(FeatureValue::Text("a b".to_string()).to_string(), "a b");
        assert_eq!(FeatureValue::from("x"), FeatureValue::Text("x".to_string()));
        assert_eq!(FeatureValue::from(3i64), FeatureValue::Int(3));
    }

    #[test]
    fn joined_rows_preserve_insertion_order() {
        let mut row = JoinedRow::new();
        row.insert("b".to_string(), FeatureValue::Int(1));
        row.insert("a".to_string(), FeatureValue::Int(2));
        let names: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
