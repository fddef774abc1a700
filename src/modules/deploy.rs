//! Deployments of human resources and the alerts sent to them.

use crate::error::ModelError;
use crate::model::{Model, ModelModule};
use crate::schema::computed::count_children;
use crate::schema::field::comments;
use crate::schema::view::parse_orderby;
use crate::schema::{
    Component, CrudStrings, FieldDef, FilterWidget, FormElement, ListField, OnDelete, Represent,
    ReusableField, SummarySection, SummaryWidget, SuperEntity, TableDef, Validator, ViewConfig,
    VirtualField,
};
use crate::store::Store;
use crate::value::{FieldValue, RecordRef};

/// Where the deployment list lives; also the target after a delete
pub const DEPLOYMENT_SUMMARY_URL: &str = "/deploy/deployment/summary";

/// Number of human resources assigned to a deployment.
///
/// Takes either a bare deployment row or a joined record that nests it
/// under `deploy_deployment`. Unsaved rows count 0.
pub fn deployment_hrquantity(
    table: &str,
    record: RecordRef<'_>,
    store: &dyn Store,
) -> Result<FieldValue, ModelError> {
    count_children(
        table,
        record,
        store,
        "deploy_human_resource_assignment",
        "deployment_id",
    )
}

fn crud_strings(
    singular: &str,
    plural: &str,
    create: &str,
    added: &str,
) -> CrudStrings {
    CrudStrings {
        title_create: format!("New {}", singular),
        title_display: format!("{} Details", singular),
        title_list: plural.to_string(),
        title_update: format!("Edit {} Details", singular),
        title_search: format!("Search {}", plural),
        title_upload: format!("Import {}", plural),
        subtitle_create: format!("Add New {}", singular),
        label_list_button: format!("List {}", plural),
        label_create_button: create.to_string(),
        label_delete_button: format!("Delete {}", singular),
        msg_record_created: added.to_string(),
        msg_record_modified: format!("{} Details updated", singular),
        msg_record_deleted: format!("{} deleted", singular),
        msg_list_empty: format!("No {} currently registered", plural),
    }
}

/// `deploy_deployment` and `deploy_human_resource_assignment`
pub struct DeploymentModel;

impl ModelModule for DeploymentModel {
    fn prefix(&self) -> &str {
        "deploy"
    }

    fn name(&self) -> &str {
        "deploy_deployment"
    }

    fn requires(&self) -> Vec<&str> {
        vec!["gis_location", "hrm_human_resource", "doc_document"]
    }

    fn model(&self, model: &mut Model) -> Result<(), ModelError> {
        let doc_entity = SuperEntity::new("doc_entity", "doc_id");

        // Deployment
        let location_id = model
            .reusable("gis_location_id")?
            .clone()
            .label("Country")
            .filter("level", "L0")
            .represent(Represent::new("gis_location", &["name"]).separator(", "))
            .comment("Country|Enter some characters to bring up a list of possible matches");

        model.define_table(
            TableDef::new("deploy_deployment")
                .super_entity(doc_entity.clone())
                .with_field(FieldDef::string("title").requires(Validator::NotEmpty))
                .with_field(location_id.field())
                .with_field(FieldDef::string("event_type"))
                .with_field(FieldDef::integer("status"))
                .with_field(comments())
                .with_virtual(VirtualField::new("hrquantity", deployment_hrquantity).label("Members")),
        )?;

        let mut crud_form = vec![
            FormElement::field("title"),
            FormElement::field("location_id"),
            FormElement::field("event_type"),
        ];
        // Attachments need the document registry
        if model.component("doc_entity", "document").is_some() {
            crud_form.push(FormElement::inline(
                "document",
                "file",
                "Attachments",
                &["file", "comments"],
            ));
        }
        crud_form.push(FormElement::field("comments"));
        crud_form.push(FormElement::field("created_on"));

        model.configure(
            "deploy_deployment",
            ViewConfig {
                list_fields: vec![
                    ListField::new("title"),
                    ListField::labeled("Date", "created_on"),
                    ListField::labeled("Country", "location_id"),
                    ListField::labeled("Members", "hrquantity"),
                ],
                filter_widgets: vec![
                    FilterWidget::text("title", "Search"),
                    FilterWidget::location("location_id", "Location", &["L0"]).hidden(),
                ],
                summary: vec![
                    SummarySection::common("rheader", vec![SummaryWidget::AddButton]),
                    SummarySection::tab("table", "Table", vec![SummaryWidget::Datatable]),
                    SummarySection::tab("map", "Map", vec![SummaryWidget::Map { ajax_init: true }]),
                ],
                orderby: Some(parse_orderby(
                    "deploy_deployment",
                    "deploy_deployment.created_on desc",
                )?),
                delete_next: Some(DEPLOYMENT_SUMMARY_URL.to_string()),
                crud_form,
                crud_strings: Some(crud_strings(
                    "Deployment",
                    "Deployments",
                    "New Deployment",
                    "Deployment added",
                )),
            },
        )?;

        let deployment_id = ReusableField::reference("deployment_id", "deploy_deployment")
            .label("Deployment")
            .represent(Represent::new("deploy_deployment", &["title"]))
            .on_delete(OnDelete::Cascade);

        // Assignment of human resources
        let human_resource_id = model.reusable("hrm_human_resource_id")?.clone();
        model.define_table(
            TableDef::new("deploy_human_resource_assignment")
                .super_entity(doc_entity)
                .with_field(deployment_id.field())
                .with_field(human_resource_id.field_with(Some("Member"), Some(true)))
                .with_field(FieldDef::date("start_date"))
                .with_field(FieldDef::date("end_date")),
        )?;
        model.configure(
            "deploy_human_resource_assignment",
            ViewConfig {
                crud_strings: Some(crud_strings(
                    "Assignment",
                    "Assignments",
                    "Add Assignment",
                    "Assignment added",
                )),
                ..Default::default()
            },
        )?;

        model.add_component(Component::new(
            "deploy_human_resource_assignment",
            "deploy_deployment",
            "deployment_id",
        ))?;
        model.add_reusable("deploy_deployment_id", deployment_id);
        Ok(())
    }

    fn defaults(&self, model: &mut Model) -> Result<(), ModelError> {
        model.add_reusable("deploy_deployment_id", ReusableField::dummy("deployment_id"));
        Ok(())
    }
}

/// `deploy_alert`, its recipients and the responses to a deployment
pub struct AlertModel;

impl ModelModule for AlertModel {
    fn prefix(&self) -> &str {
        "deploy"
    }

    fn name(&self) -> &str {
        "deploy_alert"
    }

    fn requires(&self) -> Vec<&str> {
        vec!["deploy_deployment", "pr_person", "hrm_human_resource"]
    }

    fn model(&self, model: &mut Model) -> Result<(), ModelError> {
        let deployment_id = model.reusable("deploy_deployment_id")?.field();
        let human_resource_id = model.reusable("hrm_human_resource_id")?.clone();

        // Alert; its person entity stands for the group of recipients
        model.define_table(
            TableDef::new("deploy_alert")
                .with_field(deployment_id.clone())
                .super_entity(SuperEntity::new("pr_pentity", "pe_id")),
        )?;
        model.configure(
            "deploy_alert",
            ViewConfig {
                list_fields: vec![
                    ListField::new("deployment_id"),
                    ListField::labeled("Date", "created_on"),
                ],
                crud_strings: Some(crud_strings("Alert", "Alerts", "New Alert", "Alert added")),
                ..Default::default()
            },
        )?;

        let alert_id = ReusableField::reference("alert_id", "deploy_alert")
            .label("Alert")
            .represent(Represent::new("deploy_alert", &[]))
            .on_delete(OnDelete::Cascade);

        model.define_table(
            TableDef::new("deploy_alert_recipient")
                .with_field(alert_id.field())
                .with_field(human_resource_id.field_with(Some("Member"), Some(true))),
        )?;
        model.add_component(Component::new(
            "deploy_alert_recipient",
            "deploy_alert",
            "alert_id",
        ))?;

        // TODO: link responses to the inbound message once messaging is modelled
        model.define_table(
            TableDef::new("deploy_response")
                .with_field(deployment_id)
                .with_field(human_resource_id.field_with(Some("Member"), Some(true))),
        )?;

        model.add_reusable("deploy_alert_id", alert_id);
        Ok(())
    }
}
