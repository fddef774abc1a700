//! Virtual fields computed at read time.
//!
//! A virtual field is never stored. It is evaluated against the current
//! record and a read-only store every time it is displayed.

use std::fmt;
use std::sync::Arc;

use crate::error::ModelError;
use crate::schema::field::default_label;
use crate::store::{Query, Store};
use crate::value::{FieldValue, RecordRef};

/// Computation behind a virtual field
pub trait ComputeFn: Send + Sync {
    /// Compute the value for `record` of relation `table`.
    fn compute(
        &self,
        table: &str,
        record: RecordRef<'_>,
        store: &dyn Store,
    ) -> Result<FieldValue, ModelError>;
}

/// Simple function-based implementation of ComputeFn
impl<F> ComputeFn for F
where
    F: Fn(&str, RecordRef<'_>, &dyn Store) -> Result<FieldValue, ModelError> + Send + Sync,
{
    fn compute(
        &self,
        table: &str,
        record: RecordRef<'_>,
        store: &dyn Store,
    ) -> Result<FieldValue, ModelError> {
        self(table, record, store)
    }
}

/// A named read-only attribute of a relation
#[derive(Clone)]
pub struct VirtualField {
    pub name: String,
    pub label: String,
    compute: Arc<dyn ComputeFn>,
}

impl fmt::Debug for VirtualField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualField")
            .field("name", &self.name)
            .field("label", &self.label)
            .finish()
    }
}

impl VirtualField {
    pub fn new(name: impl Into<String>, compute: impl ComputeFn + 'static) -> Self {
        let name = name.into();
        Self {
            label: default_label(&name),
            name,
            compute: Arc::new(compute),
        }
    }

    /// Number of non-deleted rows in `child_table` whose `fk` points at the
    /// record. Records without an `id` count 0.
    pub fn count_of(name: impl Into<String>, child_table: &str, fk: &str) -> Self {
        Self::new(
            name,
            CountOf {
                child_table: child_table.to_string(),
                fk: fk.to_string(),
            },
        )
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Evaluate the field for `record` of relation `table`.
    pub fn evaluate(
        &self,
        table: &str,
        record: RecordRef<'_>,
        store: &dyn Store,
    ) -> Result<FieldValue, ModelError> {
        self.compute.compute(table, record, store)
    }
}

/// Child-count computation used by [`VirtualField::count_of`]
struct CountOf {
    child_table: String,
    fk: String,
}

impl ComputeFn for CountOf {
    fn compute(
        &self,
        table: &str,
        record: RecordRef<'_>,
        store: &dyn Store,
    ) -> Result<FieldValue, ModelError> {
        count_children(table, record, store, &self.child_table, &self.fk)
    }
}

/// Count children referencing the record's `id`.
///
/// Accepts both a bare row and a record nested under `table`. A missing or
/// unset `id` (e.g. an unsaved row) yields 0 rather than an error.
pub fn count_children(
    table: &str,
    record: RecordRef<'_>,
    store: &dyn Store,
    child_table: &str,
    fk: &str,
) -> Result<FieldValue, ModelError> {
    let id = match record.row_for(table).and_then(|row| row.id()) {
        Some(id) => id,
        None => return Ok(FieldValue::Int(0)),
    };

    let count = store.count(child_table, &Query::active().eq(fk, id))?;
    Ok(FieldValue::Int(count as i64))
}
