//! Relations the deployment model links to.
//!
//! Locations, persons, human resources and documents belong to other
//! modules of the platform. Only the columns the deployment model needs are
//! defined here, enough to keep every reference resolvable.

use crate::error::ModelError;
use crate::model::{Model, ModelModule};
use crate::schema::field::comments;
use crate::schema::{
    Component, FieldDef, OnDelete, Represent, ReusableField, SuperEntity, TableDef, Validator,
};
use crate::value::FieldValue;

/// Location hierarchy levels, country first
pub const LOCATION_LEVELS: [&str; 6] = ["L0", "L1", "L2", "L3", "L4", "L5"];

/// Staff member
pub const HRM_TYPE_STAFF: i64 = 1;
/// Volunteer
pub const HRM_TYPE_VOLUNTEER: i64 = 2;

fn pr_pentity() -> SuperEntity {
    SuperEntity::new("pr_pentity", "pe_id")
}

fn doc_entity() -> SuperEntity {
    SuperEntity::new("doc_entity", "doc_id")
}

/// `gis_location`
pub struct LocationModel;

impl ModelModule for LocationModel {
    fn prefix(&self) -> &str {
        "gis"
    }

    fn name(&self) -> &str {
        "gis_location"
    }

    fn model(&self, model: &mut Model) -> Result<(), ModelError> {
        let levels = LOCATION_LEVELS.iter().map(|l| FieldValue::from(*l)).collect();
        let parent = ReusableField::reference("parent", "gis_location")
            .label("Parent")
            .optional()
            .on_delete(OnDelete::SetNull);

        model.define_table(
            TableDef::new("gis_location")
                .with_field(FieldDef::string("name").requires(Validator::NotEmpty))
                .with_field(FieldDef::string("level").requires(Validator::IsIn(levels)))
                .with_field(parent.field()),
        )?;

        model.add_reusable(
            "gis_location_id",
            ReusableField::reference("location_id", "gis_location")
                .label("Location")
                .optional(),
        );
        Ok(())
    }

    fn defaults(&self, model: &mut Model) -> Result<(), ModelError> {
        model.add_reusable("gis_location_id", ReusableField::dummy("location_id"));
        Ok(())
    }
}

/// `pr_person` and the person-entity identity space
pub struct PersonModel;

impl ModelModule for PersonModel {
    fn prefix(&self) -> &str {
        "pr"
    }

    fn name(&self) -> &str {
        "pr_person"
    }

    fn model(&self, model: &mut Model) -> Result<(), ModelError> {
        model.define_super_entity(pr_pentity())?;
        model.define_table(
            TableDef::new("pr_person")
                .with_field(FieldDef::string("first_name").requires(Validator::NotEmpty))
                .with_field(FieldDef::string("last_name"))
                .super_entity(pr_pentity()),
        )?;

        model.add_reusable(
            "pr_person_id",
            ReusableField::reference("person_id", "pr_person")
                .label("Person")
                .represent(Represent::new("pr_person", &["first_name", "last_name"])),
        );
        Ok(())
    }

    // The identity space outlives the person registry: alerts still need it.
    fn defaults(&self, model: &mut Model) -> Result<(), ModelError> {
        model.define_super_entity(pr_pentity())?;
        model.add_reusable("pr_person_id", ReusableField::dummy("person_id"));
        Ok(())
    }
}

/// `hrm_human_resource`
pub struct HumanResourceModel;

impl ModelModule for HumanResourceModel {
    fn prefix(&self) -> &str {
        "hrm"
    }

    fn name(&self) -> &str {
        "hrm_human_resource"
    }

    fn requires(&self) -> Vec<&str> {
        vec!["pr_person"]
    }

    fn model(&self, model: &mut Model) -> Result<(), ModelError> {
        let person_id = model.reusable("pr_person_id")?.field();
        let types = vec![FieldValue::Int(HRM_TYPE_STAFF), FieldValue::Int(HRM_TYPE_VOLUNTEER)];

        model.define_table(
            TableDef::new("hrm_human_resource")
                .with_field(person_id)
                .with_field(
                    FieldDef::integer("type")
                        .default_value(HRM_TYPE_STAFF)
                        .requires(Validator::IsIn(types)),
                ),
        )?;

        let mut human_resource_id =
            ReusableField::reference("human_resource_id", "hrm_human_resource").label("Human Resource");
        if model.has_table("pr_person") {
            human_resource_id = human_resource_id.represent(
                Represent::new("pr_person", &["first_name", "last_name"])
                    .via("hrm_human_resource", "person_id"),
            );
        }
        model.add_reusable("hrm_human_resource_id", human_resource_id);
        Ok(())
    }

    fn defaults(&self, model: &mut Model) -> Result<(), ModelError> {
        model.add_reusable("hrm_human_resource_id", ReusableField::dummy("human_resource_id"));
        Ok(())
    }
}

/// `doc_document`, attachable to anything in the document-entity space
pub struct DocumentModel;

impl ModelModule for DocumentModel {
    fn prefix(&self) -> &str {
        "doc"
    }

    fn name(&self) -> &str {
        "doc_document"
    }

    fn model(&self, model: &mut Model) -> Result<(), ModelError> {
        model.define_super_entity(doc_entity())?;

        let doc_id = ReusableField::reference("doc_id", "doc_entity")
            .label("Attached To")
            .optional()
            .on_delete(OnDelete::Cascade)
            .represent(Represent::new("doc_entity", &["instance_type"]));

        model.define_table(
            TableDef::new("doc_document")
                .with_field(doc_id.field())
                .with_field(FieldDef::string("name"))
                .with_field(FieldDef::string("file").requires(Validator::NotEmpty))
                .with_field(comments()),
        )?;
        model.add_component(Component::new("doc_document", "doc_entity", "doc_id").alias("document"))
    }

    fn defaults(&self, model: &mut Model) -> Result<(), ModelError> {
        model.define_super_entity(doc_entity())
    }
}
