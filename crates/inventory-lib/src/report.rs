//! Flat tabular reports with a schema discovered from the records
//!
//! Records of one report may carry different field sets (a task owned by a
//! service has more columns than one that is not), so the assembler keeps
//! the union of every key it has seen and only renders once all records are
//! in. Columns are sorted lexically, absent fields render as empty cells.

use crate::error::{InventoryError, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Which of the two per-cluster reports a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Instances,
    Tasks,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Instances => "instances",
            ReportKind::Tasks => "tasks",
        }
    }

    /// Output file name for a cluster display name
    pub fn file_name(&self, cluster_short_name: &str) -> String {
        match self {
            ReportKind::Instances => format!("{}.csv", cluster_short_name),
            ReportKind::Tasks => format!("{}--tasks.csv", cluster_short_name),
        }
    }
}

/// One cell value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    /// Already-serialized structured document
    Json(String),
}

impl FieldValue {
    /// Compact JSON serialization of a structured value
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(FieldValue::Json(serde_json::to_string(value)?))
    }

    /// JSON serialization with four-space indentation
    pub fn pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        value.serialize(&mut serializer)?;
        // serde_json only ever emits UTF-8
        Ok(FieldValue::Json(String::from_utf8_lossy(&buffer).into_owned()))
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) | FieldValue::Json(s) => f.write_str(s),
            FieldValue::Integer(n) => write!(f, "{}", n),
            FieldValue::Unsigned(n) => write!(f, "{}", n),
            // Debug keeps the decimal point on whole numbers (80.0, not 80)
            FieldValue::Float(x) => write!(f, "{:?}", x),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Unsigned(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

/// A flat field-name to value mapping, one per instance or task
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl ReportRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> &mut Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Set `name` only when a value is present
    pub fn set_opt<V: Into<FieldValue>>(&mut self, name: impl Into<String>, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.set(name, value);
        }
        self
    }

    /// Merge another record's fields, overwriting on collision
    pub fn extend(&mut self, other: ReportRecord) -> &mut Self {
        self.fields.extend(other.fields);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Accumulates records and renders them with a unified, sorted header
#[derive(Debug, Clone)]
pub struct ReportAssembler {
    kind: ReportKind,
    columns: BTreeSet<String>,
    records: Vec<ReportRecord>,
}

impl ReportAssembler {
    pub fn new(kind: ReportKind) -> Self {
        Self {
            kind,
            columns: BTreeSet::new(),
            records: Vec::new(),
        }
    }

    pub fn kind(&self) -> ReportKind {
        self.kind
    }

    pub fn push(&mut self, record: ReportRecord) {
        for key in record.keys() {
            if !self.columns.contains(key) {
                self.columns.insert(key.to_string());
            }
        }
        self.records.push(record);
    }

    /// Header row: every field name seen so far, in ascending order
    pub fn columns(&self) -> Vec<&str> {
        self.columns.iter().map(String::as_str).collect()
    }

    pub fn records(&self) -> &[ReportRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Render as CSV into `writer`
    ///
    /// Writes nothing at all when no field was ever seen.
    pub fn render<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer);

        if !self.columns.is_empty() {
            csv.write_record(self.columns.iter())?;
            for record in &self.records {
                csv.write_record(self.columns.iter().map(|column| {
                    record
                        .get(column)
                        .map(ToString::to_string)
                        .unwrap_or_default()
                }))?;
            }
        }

        csv.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    pub fn render_to_string(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.render(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Create (or truncate) `path`, write the report and close the file
    pub fn write_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| InventoryError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        self.render(&mut writer)?;
        writer.flush().map_err(|e| InventoryError::io(path, e))?;
        Ok(())
    }
}
