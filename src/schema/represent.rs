//! Human-readable rendering of references.
//!
//! Labels are looked up when rendered, never cached on the referencing row,
//! so they always reflect the current state of the referenced record.

use serde::Serialize;

use crate::error::StoreError;
use crate::store::Store;
use crate::value::FieldValue;

/// Shown for empty references
pub const NONE: &str = "-";
/// Shown for references to records that no longer exist
pub const UNKNOWN: &str = "Unknown";

/// How to render a reference to `lookup`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Represent {
    pub lookup: String,
    /// Fields of the referenced row that make up the label
    pub fields: Vec<String>,
    pub separator: String,
    /// Follow a key of another relation first: (relation, key field)
    pub via: Option<(String, String)>,
}

impl Represent {
    pub fn new(lookup: &str, fields: &[&str]) -> Self {
        Self {
            lookup: lookup.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            separator: " ".to_string(),
            via: None,
        }
    }

    /// Resolve the value through `table.key` before looking up the label,
    /// e.g. a human resource shown by its person's name.
    pub fn via(mut self, table: &str, key: &str) -> Self {
        self.via = Some((table.to_string(), key.to_string()));
        self
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Render a reference value.
    ///
    /// # Returns
    /// * `"-"` for an empty value
    /// * `"Unknown"` if the referenced record does not exist
    /// * `"#<id>"` if none of the display fields has a value
    /// * otherwise the display fields joined by the separator
    pub fn render(&self, store: &dyn Store, value: &FieldValue) -> Result<String, StoreError> {
        if value.is_empty() {
            return Ok(NONE.to_string());
        }
        let mut id = match value.as_i64() {
            Some(id) => id,
            None => return Ok(value.to_string()),
        };

        if let Some((table, key)) = &self.via {
            let Some(row) = store.get(table, id)? else {
                tracing::warn!(table = %table, id, "Reference to missing record");
                return Ok(UNKNOWN.to_string());
            };
            match row.get(key).and_then(FieldValue::as_i64) {
                Some(next) => id = next,
                None => return Ok(format!("#{}", id)),
            }
        }

        let row = match store.get(&self.lookup, id)? {
            Some(row) => row,
            None => {
                tracing::warn!(table = %self.lookup, id, "Reference to missing record");
                return Ok(UNKNOWN.to_string());
            }
        };

        let parts: Vec<String> = self
            .fields
            .iter()
            .filter_map(|f| row.get(f))
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
            .collect();

        if parts.is_empty() {
            Ok(format!("#{}", id))
        } else {
            Ok(parts.join(&self.separator))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::value::Row;

    fn store_with_deployment(title: &str) -> (MemoryStore, i64) {
        let mut store = MemoryStore::new();
        store.create_table("deploy_deployment");
        let id = store
            .insert("deploy_deployment", Row::new().with("title", title))
            .unwrap();
        (store, id)
    }

    #[test]
    fn test_render_reflects_current_state() {
        let (mut store, id) = store_with_deployment("Typhoon");
        let represent = Represent::new("deploy_deployment", &["title"]);

        assert_eq!(represent.render(&store, &FieldValue::Int(id)).unwrap(), "Typhoon");

        store
            .update("deploy_deployment", id, &Row::new().with("title", "Typhoon Haiyan"))
            .unwrap();

        assert_eq!(represent.render(&store, &FieldValue::Int(id)).unwrap(), "Typhoon Haiyan");
    }

    #[test]
    fn test_render_empty_and_missing() {
        let (store, _) = store_with_deployment("Typhoon");
        let represent = Represent::new("deploy_deployment", &["title"]);

        assert_eq!(represent.render(&store, &FieldValue::Null).unwrap(), NONE);
        assert_eq!(represent.render(&store, &FieldValue::Int(999)).unwrap(), UNKNOWN);
    }

    #[test]
    fn test_render_via_key() {
        let mut store = MemoryStore::new();
        store.create_table("pr_person");
        store.create_table("hrm_human_resource");
        let person = store
            .insert("pr_person", Row::new().with("first_name", "Ana").with("last_name", "Cruz"))
            .unwrap();
        let hr = store
            .insert("hrm_human_resource", Row::new().with("person_id", person))
            .unwrap();

        let represent = Represent::new("pr_person", &["first_name", "last_name"])
            .via("hrm_human_resource", "person_id");
        assert_eq!(represent.render(&store, &FieldValue::Int(hr)).unwrap(), "Ana Cruz");
        assert_eq!(represent.render(&store, &FieldValue::Int(hr + 1)).unwrap(), UNKNOWN);
    }

    #[test]
    fn test_render_without_display_fields() {
        let (store, id) = store_with_deployment("Typhoon");
        let represent = Represent::new("deploy_deployment", &["name"]);

        assert_eq!(represent.render(&store, &FieldValue::Int(id)).unwrap(), format!("#{}", id));
    }

    #[test]
    fn test_render_multiple_fields() {
        let mut store = MemoryStore::new();
        store.create_table("pr_person");
        let id = store
            .insert("pr_person", Row::new().with("first_name", "Ana").with("last_name", "Cruz"))
            .unwrap();

        let represent = Represent::new("pr_person", &["last_name", "first_name"]).separator(", ");

        assert_eq!(represent.render(&store, &FieldValue::Int(id)).unwrap(), "Cruz, Ana");
    }
}
