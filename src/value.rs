//! Field values, rows and record views.
//!
//! Rows are ordered maps from column name to [`FieldValue`]. A record read
//! through a join is keyed by relation name instead; [`RecordRef`] lets
//! consumers accept either shape and normalize it.

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// Identifier of a stored row (and of a super-entity instance).
pub type RecordId = i64;

/// Represents different types of field values in a row
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    List(Vec<FieldValue>),
    Null,
}

impl FieldValue {
    /// True for `Null`, empty strings and empty lists.
    ///
    /// This is the notion of "empty" used by required-field validation.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::String(s) => s.trim().is_empty(),
            FieldValue::List(l) => l.is_empty(),
            _ => false,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            FieldValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert a JSON value into a field value.
    ///
    /// Nested objects have no column representation and are kept as their
    /// JSON text.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => FieldValue::String(s),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Int(i)
                } else if let Some(f) = n.as_f64() {
                    FieldValue::Float(f)
                } else {
                    FieldValue::Null
                }
            }
            serde_json::Value::Bool(b) => FieldValue::Bool(b),
            serde_json::Value::Array(arr) => {
                FieldValue::List(arr.into_iter().map(FieldValue::from_json).collect())
            }
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Object(_) => FieldValue::String(value.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(fl) => write!(f, "{}", fl),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            FieldValue::List(l) => {
                let items: Vec<String> = l.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", items.join(", "))
            }
            FieldValue::Null => write!(f, "null"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::DateTime(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// A single row of a relation: column name -> value, in column order.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(transparent)]
pub struct Row {
    values: IndexMap<String, FieldValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.values.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.values.shift_remove(field)
    }

    /// The row identifier, if the row has been stored.
    pub fn id(&self) -> Option<RecordId> {
        self.get("id").and_then(FieldValue::as_i64)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Build a row from a JSON object; anything else yields `None`.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Object(map) => Some(Self {
                values: map
                    .into_iter()
                    .map(|(k, v)| (k, FieldValue::from_json(v)))
                    .collect(),
            }),
            _ => None,
        }
    }

    /// Copy `changes` over this row.
    pub fn merge(&mut self, changes: &Row) {
        for (field, value) in changes.fields() {
            self.values.insert(field.clone(), value.clone());
        }
    }
}

impl FromIterator<(String, FieldValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// A record produced by a join: relation name -> row.
pub type JoinedRow = IndexMap<String, Row>;

/// Borrowed view over either a bare row or a joined record.
#[derive(Debug, Clone, Copy)]
pub enum RecordRef<'a> {
    Bare(&'a Row),
    Joined(&'a JoinedRow),
}

impl<'a> RecordRef<'a> {
    /// Normalize to the row of `table`.
    ///
    /// A bare row is assumed to belong to `table`. A joined record yields
    /// the row nested under the relation's own name, if present.
    pub fn row_for(&self, table: &str) -> Option<&'a Row> {
        match self {
            RecordRef::Bare(row) => Some(row),
            RecordRef::Joined(joined) => joined.get(table),
        }
    }
}

impl<'a> From<&'a Row> for RecordRef<'a> {
    fn from(row: &'a Row) -> Self {
        RecordRef::Bare(row)
    }
}

impl<'a> From<&'a JoinedRow> for RecordRef<'a> {
    fn from(joined: &'a JoinedRow) -> Self {
        RecordRef::Joined(joined)
    }
}
