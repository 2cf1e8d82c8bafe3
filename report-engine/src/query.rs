//! FILENAME: report-engine/src/query.rs
//! PURPOSE: The query table a report is generated from.
//! CONTEXT: The table is fully materialized before generation: ordered field
//! names, positional rows, optional variable overrides, literal overrides keyed
//! by output coordinate, and nested tables for sub-reports.
//!
//! JSON SHAPE:
//! ```json
//! {
//!   "__fields__": ["region", "amount"],
//!   "__data__": [["north", 10], ["south", null]],
//!   "__variables__": {"title": "Sales"},
//!   "__coord_fill__": [[0, 1, "literal"]],
//!   "__sub__": {"lines": {"report": { ... }, "__fields__": [...], "__data__": [...]}}
//! }
//! ```

use crate::model::Report;
use engine::{CellValue, Namespace, Record};
use persistence::{read_json_file, PersistenceError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryTable {
    #[serde(rename = "__fields__", default)]
    pub fields: Vec<String>,

    #[serde(
        rename = "__data__",
        default,
        serialize_with = "ser_rows",
        deserialize_with = "de_rows"
    )]
    pub data: Vec<Vec<CellValue>>,

    #[serde(
        rename = "__variables__",
        default,
        serialize_with = "ser_vars",
        deserialize_with = "de_vars"
    )]
    pub variables: Namespace,

    #[serde(
        rename = "__coord_fill__",
        default,
        serialize_with = "ser_coord_fill",
        deserialize_with = "de_coord_fill"
    )]
    pub coord_fill: BTreeMap<(usize, usize), String>,

    #[serde(rename = "__sub__", default)]
    pub sub: BTreeMap<String, SubReport>,
}

/// Data for a `[$name$]` sub-report: its template plus its own table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SubReport {
    #[serde(default)]
    pub report: Report,
    #[serde(flatten)]
    pub table: QueryTable,
}

impl SubReport {
    pub fn new(report: Report, table: QueryTable) -> Self {
        SubReport { report, table }
    }
}

/// The canonical "no data" table.
pub fn create_empty_query_table() -> QueryTable {
    QueryTable::default()
}

impl QueryTable {
    pub fn new(fields: &[&str], data: Vec<Vec<CellValue>>) -> Self {
        QueryTable {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            data,
            ..QueryTable::default()
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, PersistenceError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, PersistenceError> {
        read_json_file(path)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f == name)
            .or_else(|| self.fields.iter().position(|f| f.eq_ignore_ascii_case(name)))
    }

    /// The record for row `index`, carrying its ordinal in `ic_sys_num_rec`.
    pub fn record(&self, index: usize) -> Option<Record> {
        self.data
            .get(index)
            .map(|row| Record::from_row(&self.fields, row, index))
    }

    pub fn with_variable(mut self, name: &str, value: impl Into<CellValue>) -> Self {
        self.variables.set(name, value);
        self
    }

    pub fn with_coord_fill(mut self, row: usize, col: usize, value: &str) -> Self {
        self.coord_fill.insert((row, col), value.to_string());
        self
    }

    pub fn with_sub(mut self, name: &str, sub: SubReport) -> Self {
        self.sub.insert(name.to_string(), sub);
        self
    }
}

// ============================================================================
// JSON SCALARS
// ============================================================================

/// A JSON scalar as it appears in `__data__` and `__variables__`.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Number(f64),
    Text(String),
}

fn to_cell(value: Option<Scalar>) -> CellValue {
    match value {
        None => CellValue::Empty,
        Some(Scalar::Bool(b)) => CellValue::Boolean(b),
        Some(Scalar::Number(n)) => CellValue::Number(n),
        Some(Scalar::Text(s)) => CellValue::Text(s),
    }
}

fn from_cell(value: &CellValue) -> Option<Scalar> {
    match value {
        CellValue::Empty => None,
        CellValue::Boolean(b) => Some(Scalar::Bool(*b)),
        CellValue::Number(n) => Some(Scalar::Number(*n)),
        CellValue::Text(s) => Some(Scalar::Text(s.clone())),
        CellValue::Error(e) => Some(Scalar::Text(e.to_string())),
    }
}

fn scalar_text(value: Option<Scalar>) -> String {
    to_cell(value).display()
}

fn de_rows<'de, D>(deserializer: D) -> Result<Vec<Vec<CellValue>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Vec<Option<Scalar>>> = Deserialize::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|row| row.into_iter().map(to_cell).collect())
        .collect())
}

fn ser_rows<S>(rows: &[Vec<CellValue>], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let raw: Vec<Vec<Option<Scalar>>> = rows
        .iter()
        .map(|row| row.iter().map(from_cell).collect())
        .collect();
    raw.serialize(serializer)
}

fn de_vars<'de, D>(deserializer: D) -> Result<Namespace, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, Option<Scalar>> = Deserialize::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(k, v)| (k, to_cell(v))).collect())
}

fn ser_vars<S>(vars: &Namespace, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let raw: BTreeMap<&String, Option<Scalar>> =
        vars.iter().map(|(k, v)| (k, from_cell(v))).collect();
    raw.serialize(serializer)
}

fn de_coord_fill<'de, D>(deserializer: D) -> Result<BTreeMap<(usize, usize), String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<(usize, usize, Option<Scalar>)> = Deserialize::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(row, col, value)| ((row, col), scalar_text(value)))
        .collect())
}

fn ser_coord_fill<S>(
    fill: &BTreeMap<(usize, usize), String>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let raw: Vec<(usize, usize, &String)> = fill
        .iter()
        .map(|(&(row, col), value)| (row, col, value))
        .collect();
    raw.serialize(serializer)
}
