//! Relation definitions.

use serde::Serialize;

use crate::schema::computed::VirtualField;
use crate::schema::field::FieldDef;
use crate::schema::reference::ReferenceSpec;
use crate::schema::super_entity::SuperEntity;

/// A relation: ordered fields, optional super-entity and virtual fields.
///
/// The `id` column is implicit. Meta fields and the super-entity key are
/// added when the table is registered with
/// [`Model::define_table`](crate::model::Model::define_table).
#[derive(Debug, Clone, Serialize)]
pub struct TableDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub super_entity: Option<SuperEntity>,
    #[serde(skip)]
    pub virtual_fields: Vec<VirtualField>,
}

impl TableDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
            super_entity: None,
            virtual_fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Attach the relation to a shared identity space.
    pub fn super_entity(mut self, super_entity: SuperEntity) -> Self {
        self.super_entity = Some(super_entity);
        self
    }

    pub fn with_virtual(mut self, field: VirtualField) -> Self {
        self.virtual_fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// True for declared fields and the implicit `id`.
    pub fn has_field(&self, name: &str) -> bool {
        name == "id" || self.field(name).is_some()
    }

    pub fn virtual_field(&self, name: &str) -> Option<&VirtualField> {
        self.virtual_fields.iter().find(|f| f.name == name)
    }

    /// Reference fields with their metadata.
    pub fn references(&self) -> impl Iterator<Item = (&FieldDef, &ReferenceSpec)> {
        self.fields
            .iter()
            .filter_map(|f| f.reference.as_ref().map(|spec| (f, spec)))
    }

    /// Names of all stored columns, `id` first.
    pub fn column_names(&self) -> Vec<&str> {
        std::iter::once("id")
            .chain(self.fields.iter().map(|f| f.name.as_str()))
            .collect()
    }

    /// Label of a stored or virtual field.
    pub fn label_of(&self, name: &str) -> Option<&str> {
        if name == "id" {
            return Some("Id");
        }
        self.field(name)
            .map(|f| f.label.as_str())
            .or_else(|| self.virtual_field(name).map(|f| f.label.as_str()))
    }
}
