//! Declarative schema: relations, fields, references, virtual fields,
//! components, super-entities and view settings.

pub mod component;
pub mod computed;
pub mod field;
pub mod reference;
pub mod represent;
pub mod super_entity;
pub mod table;
pub mod view;

pub use component::Component;
pub use computed::{ComputeFn, VirtualField};
pub use field::{comments, meta_fields, super_link, FieldDef, FieldType, Validator};
pub use reference::{OnDelete, ReferenceSpec, ReusableField};
pub use represent::Represent;
pub use super_entity::{Attachable, Instance, InstanceRef, SuperEntity};
pub use table::TableDef;
pub use view::{
    CrudStrings, FilterWidget, FormElement, ListField, SummarySection, SummaryWidget, ViewConfig,
};
