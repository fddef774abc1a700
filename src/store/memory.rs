//! In-process store.

use std::collections::{BTreeMap, HashMap};

use crate::error::StoreError;
use crate::store::{compare_values, Query, Store};
use crate::value::{FieldValue, RecordId, Row};

#[derive(Debug, Default)]
struct MemoryTable {
    next_id: RecordId,
    rows: BTreeMap<RecordId, Row>,
}

/// Rows kept in process, keyed by table name.
///
/// Identifiers are assigned per table starting at 1 and never reused.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<String, MemoryTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table; existing tables are left untouched.
    pub fn create_table(&mut self, name: &str) {
        self.tables.entry(name.to_string()).or_default();
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    fn table(&self, name: &str) -> Result<&MemoryTable, StoreError> {
        self.tables
            .get(name)
            .ok_or_else(|| StoreError::NoSuchTable(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemoryTable, StoreError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StoreError::NoSuchTable(name.to_string()))
    }
}

impl Store for MemoryStore {
    fn ensure_table(&mut self, table: &str) -> Result<(), StoreError> {
        self.create_table(table);
        Ok(())
    }

    fn insert(&mut self, table: &str, row: Row) -> Result<RecordId, StoreError> {
        let table = self.table_mut(table)?;
        table.next_id += 1;
        let id = table.next_id;

        let mut stored = Row::new().with("id", id);
        for (field, value) in row.fields().filter(|(f, _)| f.as_str() != "id") {
            stored.set(field.clone(), value.clone());
        }
        table.rows.insert(id, stored);
        Ok(id)
    }

    fn update(&mut self, table: &str, id: RecordId, changes: &Row) -> Result<(), StoreError> {
        let name = table.to_string();
        let row = self
            .table_mut(table)?
            .rows
            .get_mut(&id)
            .ok_or(StoreError::NoSuchRecord { table: name, id })?;
        for (field, value) in changes.fields().filter(|(f, _)| f.as_str() != "id") {
            row.set(field.clone(), value.clone());
        }
        Ok(())
    }

    fn get(&self, table: &str, id: RecordId) -> Result<Option<Row>, StoreError> {
        Ok(self.table(table)?.rows.get(&id).cloned())
    }

    fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, StoreError> {
        let mut rows: Vec<Row> = self
            .table(table)?
            .rows
            .values()
            .filter(|row| query.matches(row))
            .cloned()
            .collect();

        if let Some(order) = &query.order_by {
            rows.sort_by(|a, b| {
                let null = FieldValue::Null;
                let ord = compare_values(
                    a.get(&order.field).unwrap_or(&null),
                    b.get(&order.field).unwrap_or(&null),
                );
                if order.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }
        Ok(rows)
    }

    fn count(&self, table: &str, query: &Query) -> Result<usize, StoreError> {
        Ok(self
            .table(table)?
            .rows
            .values()
            .filter(|row| query.matches(row))
            .count())
    }

    fn delete(&mut self, table: &str, id: RecordId) -> Result<bool, StoreError> {
        Ok(self.table_mut(table)?.rows.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::OrderBy;

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.create_table("deploy_alert");
        store
    }

    #[test]
    fn test_insert_assigns_ids() {
        let mut store = store();

        let a = store.insert("deploy_alert", Row::new().with("deployment_id", 1i64)).unwrap();
        let b = store.insert("deploy_alert", Row::new().with("deployment_id", 1i64)).unwrap();

        assert_eq!((a, b), (1, 2));
        let row = store.get("deploy_alert", b).unwrap().unwrap();
        assert_eq!(row.id(), Some(2));
        assert_eq!(row.fields().next().map(|(k, _)| k.as_str()), Some("id"));
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let mut store = store();

        let a = store.insert("deploy_alert", Row::new()).unwrap();
        assert!(store.delete("deploy_alert", a).unwrap());
        assert!(!store.delete("deploy_alert", a).unwrap());

        let b = store.insert("deploy_alert", Row::new()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_unknown_table() {
        let store = MemoryStore::new();
        let result = store.get("deploy_alert", 1);
        assert_eq!(result, Err(StoreError::NoSuchTable("deploy_alert".to_string())));
    }

    #[test]
    fn test_update_missing_record() {
        let mut store = store();
        let result = store.update("deploy_alert", 5, &Row::new());
        assert!(matches!(result, Err(StoreError::NoSuchRecord { id: 5, .. })));
    }

    #[test]
    fn test_select_and_count() {
        let mut store = store();
        for deployment in [1i64, 2, 1, 3] {
            store
                .insert("deploy_alert", Row::new().with("deployment_id", deployment))
                .unwrap();
        }

        let query = Query::new().eq("deployment_id", 1i64);
        assert_eq!(store.count("deploy_alert", &query).unwrap(), 2);

        let ordered = store
            .select(
                "deploy_alert",
                &Query::new().order_by(OrderBy {
                    field: "deployment_id".to_string(),
                    descending: true,
                }),
            )
            .unwrap();
        let ids: Vec<i64> = ordered
            .iter()
            .filter_map(|r| r.get("deployment_id").and_then(FieldValue::as_i64))
            .collect();
        assert_eq!(ids, vec![3, 2, 1, 1]);
    }
}
