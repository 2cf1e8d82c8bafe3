//! FILENAME: engine/src/record.rs
//! PURPOSE: The per-row record and the report variable namespace.
//! CONTEXT: A `Record` is one query-table row keyed by field name, plus the
//! synthetic `ic_sys_num_rec` ordinal. A `Namespace` holds report variables
//! merged from the caller, the template and the query table.

use crate::cell::CellValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Synthetic field holding the 0-based ordinal of the record in the query table.
pub const SYS_NUM_REC: &str = "ic_sys_num_rec";

/// One query-table row, addressable by field name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, CellValue)>,
}

impl Record {
    pub fn new() -> Self {
        Record { fields: Vec::new() }
    }

    /// Builds the record for row `ordinal`, pairing values with field names by position.
    /// Missing trailing values are Empty; surplus values are ignored.
    pub fn from_row(field_names: &[String], row: &[CellValue], ordinal: usize) -> Self {
        let mut fields: Vec<(String, CellValue)> = field_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), row.get(i).cloned().unwrap_or_default()))
            .collect();
        fields.push((SYS_NUM_REC.to_string(), CellValue::Number(ordinal as f64)));
        Record { fields }
    }

    /// Looks up a field by exact name, then case-insensitively.
    pub fn get(&self, name: &str) -> Option<&CellValue> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .or_else(|| self.fields.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)))
            .map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Sets a field, replacing an existing one with the same exact name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<CellValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// The 0-based ordinal, if this record came from a query-table row.
    pub fn ordinal(&self) -> Option<usize> {
        match self.get(SYS_NUM_REC) {
            Some(CellValue::Number(n)) if *n >= 0.0 => Some(*n as usize),
            _ => None,
        }
    }

    /// Field names and values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Report variables. Lookups fall back to a case-insensitive match
/// because expression identifiers are normalized to uppercase.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Namespace {
    vars: BTreeMap<String, CellValue>,
}

impl Namespace {
    pub fn new() -> Self {
        Namespace::default()
    }

    pub fn get(&self, name: &str) -> Option<&CellValue> {
        self.vars.get(name).or_else(|| {
            self.vars
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<CellValue>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Overlays `other` on top of this namespace; later sources win.
    pub fn extend(&mut self, other: &Namespace) {
        for (k, v) in &other.vars {
            self.vars.insert(k.clone(), v.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CellValue)> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K: Into<String>, V: Into<CellValue>> FromIterator<(K, V)> for Namespace {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut ns = Namespace::new();
        for (k, v) in iter {
            ns.set(k, v);
        }
        ns
    }
}
