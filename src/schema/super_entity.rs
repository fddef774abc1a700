//! Super-entities: shared identity spaces across relations.
//!
//! Every row of a relation attached to a super-entity also owns one row in
//! the super-entity's own table. That row's `id` is the shared identifier
//! (e.g. `doc_id`, `pe_id`) and it records which concrete relation and row it
//! stands for, so generic subsystems such as attachments or messaging can
//! address rows of any attached relation.

use serde::Serialize;

use crate::schema::field::{FieldDef, FieldType};
use crate::schema::table::TableDef;
use crate::value::{RecordId, Row};

/// A shared identity space
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SuperEntity {
    /// Relation holding the identity rows, e.g. `doc_entity`
    pub name: String,
    /// Name of the key field in attached relations, e.g. `doc_id`
    pub key: String,
}

impl SuperEntity {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }

    /// Definition of the mapping relation.
    pub fn table(&self) -> TableDef {
        TableDef::new(&self.name)
            .with_field(FieldDef::string("instance_type").not_null())
            .with_field(FieldDef::new("instance_id", FieldType::Integer))
    }
}

/// Where a shared identifier points
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceRef {
    pub instance_type: String,
    pub instance_id: RecordId,
}

impl InstanceRef {
    /// Read the mapping from a super-entity row.
    pub fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            instance_type: row.get("instance_type")?.as_str()?.to_string(),
            instance_id: row.get("instance_id")?.as_i64()?,
        })
    }
}

/// Anything that can be addressed through a shared identity space.
pub trait Attachable {
    /// The super-entity this belongs to
    fn super_entity(&self) -> Option<&str>;

    /// The shared identifier, once allocated
    fn super_id(&self) -> Option<RecordId>;
}

/// A stored row together with the definition of its relation
#[derive(Debug, Clone, Copy)]
pub struct Instance<'a> {
    pub table: &'a TableDef,
    pub row: &'a Row,
}

impl<'a> Attachable for Instance<'a> {
    fn super_entity(&self) -> Option<&str> {
        self.table.super_entity.as_ref().map(|s| s.name.as_str())
    }

    fn super_id(&self) -> Option<RecordId> {
        let key = &self.table.super_entity.as_ref()?.key;
        self.row.get(key)?.as_i64()
    }
}
