//! Relational store seam.
//!
//! The model layer issues single statements against a [`Store`]; locking and
//! transactions belong to the backend. [`MemoryStore`] keeps rows in process,
//! the `sql` module renders the schema for a real database and, with a
//! backend feature enabled, stores rows in it.

pub mod memory;
pub mod sql;
pub mod statement;

pub use memory::MemoryStore;

use std::cmp::Ordering;

use crate::error::StoreError;
use crate::value::{FieldValue, RecordId, Row};

/// A single row predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `field == value`; a missing column counts as `Null`
    Eq(String, FieldValue),
    /// `field != value`; a missing column counts as `Null`
    Ne(String, FieldValue),
    /// `field` is one of the values
    In(String, Vec<FieldValue>),
    /// Case-insensitive substring match on any of the fields
    Contains(Vec<String>, String),
}

impl Filter {
    pub fn matches(&self, row: &Row) -> bool {
        let value_of = |field: &str| row.get(field).cloned().unwrap_or(FieldValue::Null);
        match self {
            Filter::Eq(field, value) => &value_of(field) == value,
            Filter::Ne(field, value) => &value_of(field) != value,
            Filter::In(field, values) => values.contains(&value_of(field)),
            Filter::Contains(fields, text) => {
                let needle = text.to_lowercase();
                fields.iter().any(|f| match row.get(f) {
                    Some(FieldValue::Null) | None => false,
                    Some(v) => v.to_string().to_lowercase().contains(&needle),
                })
            }
        }
    }
}

/// Sort specification
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

/// Conjunction of filters plus an optional ordering
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query that skips soft-deleted rows.
    pub fn active() -> Self {
        Self::new().ne("deleted", true)
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.filters.push(Filter::Eq(field.into(), value.into()));
        self
    }

    pub fn ne(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.filters.push(Filter::Ne(field.into(), value.into()));
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = Some(order_by);
        self
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }
}

/// Storage backend used by the model layer.
///
/// Rows returned by the store always carry their `id`.
pub trait Store: Send + Sync {
    /// Make sure a table exists; existing tables are left untouched.
    fn ensure_table(&mut self, table: &str) -> Result<(), StoreError>;

    /// Insert a row and return its new identifier.
    fn insert(&mut self, table: &str, row: Row) -> Result<RecordId, StoreError>;

    /// Overwrite the given fields of a row.
    fn update(&mut self, table: &str, id: RecordId, changes: &Row) -> Result<(), StoreError>;

    /// Fetch a row by identifier.
    fn get(&self, table: &str, id: RecordId) -> Result<Option<Row>, StoreError>;

    /// Fetch all rows matching the query.
    fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, StoreError>;

    /// Count rows matching the query.
    fn count(&self, table: &str, query: &Query) -> Result<usize, StoreError> {
        Ok(self.select(table, query)?.len())
    }

    /// Remove a row; returns whether it existed.
    fn delete(&mut self, table: &str, id: RecordId) -> Result<bool, StoreError>;
}

impl<S: Store + ?Sized> Store for Box<S> {
    fn ensure_table(&mut self, table: &str) -> Result<(), StoreError> {
        (**self).ensure_table(table)
    }

    fn insert(&mut self, table: &str, row: Row) -> Result<RecordId, StoreError> {
        (**self).insert(table, row)
    }

    fn update(&mut self, table: &str, id: RecordId, changes: &Row) -> Result<(), StoreError> {
        (**self).update(table, id, changes)
    }

    fn get(&self, table: &str, id: RecordId) -> Result<Option<Row>, StoreError> {
        (**self).get(table, id)
    }

    fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, StoreError> {
        (**self).select(table, query)
    }

    fn count(&self, table: &str, query: &Query) -> Result<usize, StoreError> {
        (**self).count(table, query)
    }

    fn delete(&mut self, table: &str, id: RecordId) -> Result<bool, StoreError> {
        (**self).delete(table, id)
    }
}

/// Total order over field values used for sorting.
///
/// `Null` sorts first; values of different kinds sort by kind.
pub fn compare_values(a: &FieldValue, b: &FieldValue) -> Ordering {
    fn rank(v: &FieldValue) -> u8 {
        match v {
            FieldValue::Null => 0,
            FieldValue::Bool(_) => 1,
            FieldValue::Int(_) | FieldValue::Float(_) => 2,
            FieldValue::Date(_) => 3,
            FieldValue::DateTime(_) => 4,
            FieldValue::String(_) => 5,
            FieldValue::List(_) => 6,
        }
    }

    match (a, b) {
        (FieldValue::Bool(x), FieldValue::Bool(y)) => x.cmp(y),
        (FieldValue::Int(x), FieldValue::Int(y)) => x.cmp(y),
        (FieldValue::Int(x), FieldValue::Float(y)) => (*x as f64).total_cmp(y),
        (FieldValue::Float(x), FieldValue::Int(y)) => x.total_cmp(&(*y as f64)),
        (FieldValue::Float(x), FieldValue::Float(y)) => x.total_cmp(y),
        (FieldValue::Date(x), FieldValue::Date(y)) => x.cmp(y),
        (FieldValue::DateTime(x), FieldValue::DateTime(y)) => x.cmp(y),
        (FieldValue::String(x), FieldValue::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters() {
        let row = Row::new()
            .with("title", "Cyclone Pam")
            .with("status", 1i64);

        assert!(Filter::Eq("status".to_string(), FieldValue::Int(1)).matches(&row));
        assert!(Filter::Eq("location_id".to_string(), FieldValue::Null).matches(&row));
        assert!(Filter::Ne("deleted".to_string(), FieldValue::Bool(true)).matches(&row));
        assert!(Filter::Contains(vec!["title".to_string()], "PAM".to_string()).matches(&row));
        assert!(!Filter::In("status".to_string(), vec![FieldValue::Int(2)]).matches(&row));
    }

    #[test]
    fn test_active_query_skips_deleted() {
        let query = Query::active();

        assert!(query.matches(&Row::new().with("deleted", false)));
        assert!(query.matches(&Row::new()));
        assert!(!query.matches(&Row::new().with("deleted", true)));
    }

    #[test]
    fn test_boxed_store() {
        let mut store: Box<dyn Store> = Box::new(MemoryStore::new());
        store.ensure_table("deploy_alert").unwrap();
        let id = store.insert("deploy_alert", Row::new().with("message", "Report in")).unwrap();

        assert_eq!(store.count("deploy_alert", &Query::new().eq("id", id)).unwrap(), 1);
        assert!(store.delete("deploy_alert", id).unwrap());
        assert!(store.get("deploy_alert", id).unwrap().is_none());
    }

    #[test]
    fn test_compare_values() {
        assert_eq!(compare_values(&FieldValue::Null, &FieldValue::Int(1)), Ordering::Less);
        assert_eq!(compare_values(&FieldValue::Int(2), &FieldValue::Float(1.5)), Ordering::Greater);
        assert_eq!(
            compare_values(&FieldValue::from("a"), &FieldValue::from("b")),
            Ordering::Less
        );
    }
}
