//! Request handlers of the `deploy` controller.
//!
//! Handlers take the database and the request context explicitly and
//! return serializable output; mapping errors to HTTP status codes is left
//! to the server binary.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::context::RequestContext;
use crate::crud::{date_represent_utc, ListOutput, ListRequest, RecordOutput, Resource, SummaryOutput};
use crate::db::Db;
use crate::error::ModelError;
use crate::settings::{HrmSettings, UiSettings};
use crate::store::Store;
use crate::value::{RecordId, Row};

/// Controller (and module) name
pub const MODULE: &str = "deploy";

/// Filter and report forms submit themselves after this many milliseconds
pub const AUTO_SUBMIT_MS: u32 = 750;

/// Resources served by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployResource {
    Deployment,
    Assignment,
    Alert,
    /// Members of the deployment roster
    Member,
    /// People registered (and imported) as members
    Person,
}

impl DeployResource {
    pub fn table(&self) -> &'static str {
        match self {
            DeployResource::Deployment => "deploy_deployment",
            DeployResource::Assignment => "deploy_human_resource_assignment",
            DeployResource::Alert => "deploy_alert",
            DeployResource::Member => "hrm_human_resource",
            DeployResource::Person => "pr_person",
        }
    }

    pub fn function(&self) -> &'static str {
        match self {
            DeployResource::Deployment => "deployment",
            DeployResource::Assignment => "human_resource_assignment",
            DeployResource::Alert => "alert",
            DeployResource::Member => "human_resource",
            DeployResource::Person => "person",
        }
    }

    pub fn base_url(&self) -> String {
        format!("/{}/{}", MODULE, self.function())
    }
}

impl FromStr for DeployResource {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deployment" => Ok(DeployResource::Deployment),
            "human_resource_assignment" => Ok(DeployResource::Assignment),
            "alert" => Ok(DeployResource::Alert),
            "human_resource" => Ok(DeployResource::Member),
            "person" => Ok(DeployResource::Person),
            other => Err(ModelError::UnknownTable(format!("{}_{}", MODULE, other))),
        }
    }
}

impl fmt::Display for DeployResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.function())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IndexOutput {
    pub module_name: String,
}

/// Deployment summary with the UI settings it is rendered with
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentSummary {
    #[serde(flatten)]
    pub summary: SummaryOutput,
    pub ui: UiSettings,
}

/// Member roster with the staff settings it is rendered with
#[derive(Debug, Clone, Serialize)]
pub struct MemberSummary {
    #[serde(flatten)]
    pub summary: SummaryOutput,
    pub hrm: HrmSettings,
}

/// Output of a list request
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ListResponse {
    Summary(Box<DeploymentSummary>),
    Members(Box<MemberSummary>),
    List(ListOutput),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Created {
    pub id: RecordId,
    pub message: String,
    pub next: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Deleted {
    pub id: RecordId,
    /// Rows removed, including cascaded children
    pub count: usize,
    pub message: String,
    pub next: String,
}

/// Fail unless the module is enabled.
pub fn ensure_enabled(ctx: &RequestContext) -> Result<(), ModelError> {
    if ctx.settings().has_module(MODULE) {
        Ok(())
    } else {
        Err(ModelError::ModuleDisabled(MODULE.to_string()))
    }
}

/// Module home page
pub fn index(ctx: &RequestContext) -> Result<IndexOutput, ModelError> {
    ensure_enabled(ctx)?;
    Ok(IndexOutput {
        module_name: ctx.settings().module_name_nice(MODULE),
    })
}

/// Staff settings in effect for member pages.
///
/// Members always record experience and skills, whatever the deployment
/// settings say; the shared settings are left as they are.
pub fn member_settings(ctx: &RequestContext) -> HrmSettings {
    let mut hrm = ctx.settings().hrm.clone();
    hrm.staff_experience = true;
    hrm.use_skills = true;
    hrm
}

fn resource<'a, S: Store>(
    db: &'a Db<S>,
    ctx: &'a RequestContext,
    which: DeployResource,
) -> Result<Resource<'a, S>, ModelError> {
    let resource = Resource::new(db, ctx, which.table(), which.base_url())?;
    Ok(match which {
        DeployResource::Deployment | DeployResource::Alert => {
            resource.format("created_on", date_represent_utc)
        }
        DeployResource::Assignment | DeployResource::Member | DeployResource::Person => resource,
    })
}

/// List a resource; deployments are listed as a summary page.
pub fn list<S: Store>(
    db: &Db<S>,
    ctx: &RequestContext,
    which: DeployResource,
    request: &ListRequest,
) -> Result<ListResponse, ModelError> {
    ensure_enabled(ctx)?;
    let resource = resource(db, ctx, which)?;

    match which {
        DeployResource::Deployment => {
            let mut summary = resource.summary(request)?;
            if let Some(button) = summary.buttons.get("summary_btn").cloned() {
                summary.buttons.insert("list_btn".to_string(), button);
            }
            let mut ui = ctx.settings().ui.clone();
            ui.filter_auto_submit = Some(AUTO_SUBMIT_MS);
            ui.report_auto_submit = Some(AUTO_SUBMIT_MS);
            Ok(ListResponse::Summary(Box::new(DeploymentSummary { summary, ui })))
        }
        DeployResource::Member | DeployResource::Person => {
            Ok(ListResponse::Members(Box::new(MemberSummary {
                summary: resource.summary(request)?,
                hrm: member_settings(ctx),
            })))
        }
        _ => Ok(ListResponse::List(resource.list(request)?)),
    }
}

pub fn read<S: Store>(
    db: &Db<S>,
    ctx: &RequestContext,
    which: DeployResource,
    id: RecordId,
) -> Result<RecordOutput, ModelError> {
    ensure_enabled(ctx)?;
    resource(db, ctx, which)?.read(id)
}

/// Create a record.
///
/// A person is registered together with its member record; the member
/// `type` may be given alongside the person fields.
pub fn create<S: Store>(
    db: &mut Db<S>,
    ctx: &RequestContext,
    which: DeployResource,
    row: Row,
) -> Result<Created, ModelError> {
    ensure_enabled(ctx)?;
    let id = match which {
        DeployResource::Person => create_member(db, ctx, row)?,
        _ => db.insert(ctx, which.table(), row)?,
    };
    let resource = resource(db, ctx, which)?;
    Ok(Created {
        id,
        message: resource.crud_string("msg_record_created"),
        next: format!("{}/{}", which.base_url(), id),
    })
}

fn create_member<S: Store>(
    db: &mut Db<S>,
    ctx: &RequestContext,
    mut row: Row,
) -> Result<RecordId, ModelError> {
    let member_type = row.remove("type");
    let person = db.insert(ctx, DeployResource::Person.table(), row)?;

    let mut member = Row::new().with("person_id", person);
    if let Some(member_type) = member_type {
        member.set("type", member_type);
    }
    if let Err(e) = db.insert(ctx, DeployResource::Member.table(), member) {
        db.delete(ctx, DeployResource::Person.table(), person)?;
        return Err(e);
    }
    Ok(person)
}

/// Delete a record and everything that cascades from it.
///
/// Rows are flagged as deleted rather than removed.
pub fn delete<S: Store>(
    db: &mut Db<S>,
    ctx: &RequestContext,
    which: DeployResource,
    id: RecordId,
) -> Result<Deleted, ModelError> {
    ensure_enabled(ctx)?;
    let summary = db.archive(ctx, which.table(), id)?;

    let next = db
        .model()
        .view(which.table())
        .and_then(|v| v.delete_next.clone())
        .unwrap_or_else(|| which.base_url());
    let resource = resource(db, ctx, which)?;
    Ok(Deleted {
        id,
        count: summary.deleted.len(),
        message: resource.crud_string("msg_record_deleted"),
        next,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;
    use crate::modules::all_modules;
    use crate::settings::Settings;
    use crate::store::{MemoryStore, Query};
    use crate::value::FieldValue;
    use std::sync::Arc;

    fn setup(settings: Settings) -> (Db, RequestContext) {
        let model = Model::load(&all_modules(), &settings).unwrap();
        let db = Db::new(Arc::new(model), MemoryStore::new()).unwrap();
        (db, RequestContext::new(Arc::new(settings)).with_user(1))
    }

    fn member(db: &mut Db, ctx: &RequestContext, name: &str) -> RecordId {
        let person = db
            .insert(ctx, "pr_person", Row::new().with("first_name", name))
            .unwrap();
        db.insert(ctx, "hrm_human_resource", Row::new().with("person_id", person))
            .unwrap()
    }

    #[test]
    fn test_resource_names() {
        assert_eq!(
            "human_resource_assignment".parse::<DeployResource>().unwrap(),
            DeployResource::Assignment
        );
        assert_eq!(DeployResource::Alert.base_url(), "/deploy/alert");
        assert_eq!(
            "human_resource".parse::<DeployResource>().unwrap(),
            DeployResource::Member
        );
        assert_eq!(DeployResource::Person.table(), "pr_person");
        assert!("response".parse::<DeployResource>().is_err());
    }

    #[test]
    fn test_module_gate() {
        let mut settings = Settings::default();
        settings.modules.shift_remove("deploy");
        let (db, ctx) = setup(settings);

        assert_eq!(index(&ctx), Err(ModelError::ModuleDisabled("deploy".to_string())));
        assert!(matches!(
            list(&db, &ctx, DeployResource::Deployment, &ListRequest::default()),
            Err(ModelError::ModuleDisabled(_))
        ));
    }

    #[test]
    fn test_index() {
        let (_, ctx) = setup(Settings::default());
        assert_eq!(index(&ctx).unwrap().module_name, "Deployments");
    }

    #[test]
    fn test_deployment_summary() {
        let (mut db, ctx) = setup(Settings::default());
        let created = create(
            &mut db,
            &ctx,
            DeployResource::Deployment,
            Row::new().with("title", "Gorkha Earthquake"),
        )
        .unwrap();
        assert_eq!(created.message, "Deployment added");
        assert_eq!(created.next, format!("/deploy/deployment/{}", created.id));

        let response = list(&db, &ctx, DeployResource::Deployment, &ListRequest::default()).unwrap();
        let ListResponse::Summary(page) = response else {
            panic!("deployments are listed as a summary");
        };

        assert_eq!(page.ui.filter_auto_submit, Some(AUTO_SUBMIT_MS));
        assert_eq!(page.ui.report_auto_submit, Some(AUTO_SUBMIT_MS));
        assert_eq!(page.summary.buttons["summary_btn"].url, "/deploy/deployment/summary");
        assert_eq!(page.summary.buttons["list_btn"], page.summary.buttons["summary_btn"]);
        assert_eq!(page.summary.list.title, "Deployments");

        let row = &page.summary.list.rows[0];
        assert_eq!(row.values["title"], "Gorkha Earthquake");
        assert_eq!(row.values["created_on"].len(), "2015-04-25".len());
        assert_eq!(row.values["hrquantity"], "0");
    }

    #[test]
    fn test_assignments_and_delete() {
        let (mut db, ctx) = setup(Settings::default());
        let deployment = create(
            &mut db,
            &ctx,
            DeployResource::Deployment,
            Row::new().with("title", "Cyclone Pam"),
        )
        .unwrap()
        .id;
        let hr = member(&mut db, &ctx, "Ana");
        create(
            &mut db,
            &ctx,
            DeployResource::Assignment,
            Row::new()
                .with("deployment_id", deployment)
                .with("human_resource_id", hr),
        )
        .unwrap();

        let record = read(&db, &ctx, DeployResource::Deployment, deployment).unwrap();
        assert!(record.fields.iter().any(|f| f.name == "hrquantity" && f.value == "1"));

        let ListResponse::List(assignments) =
            list(&db, &ctx, DeployResource::Assignment, &ListRequest::default()).unwrap()
        else {
            panic!("assignments are listed plainly");
        };
        assert_eq!(assignments.total, 1);

        let deleted = delete(&mut db, &ctx, DeployResource::Deployment, deployment).unwrap();
        assert_eq!(deleted.next, "/deploy/deployment/summary");
        assert_eq!(deleted.message, "Deployment deleted");
        assert!(deleted.count >= 2);

        assert!(matches!(
            read(&db, &ctx, DeployResource::Deployment, deployment),
            Err(ModelError::NotFound { .. })
        ));
        let ListResponse::List(assignments) =
            list(&db, &ctx, DeployResource::Assignment, &ListRequest::default()).unwrap()
        else {
            panic!("assignments are listed plainly");
        };
        assert_eq!(assignments.total, 0);
    }

    #[test]
    fn test_create_alert_requires_deployment() {
        let (mut db, ctx) = setup(Settings::default());
        let result = create(&mut db, &ctx, DeployResource::Alert, Row::new());

        let Err(ModelError::Validation(errors)) = result else {
            panic!("expected a validation error");
        };
        assert_eq!(errors.for_field("deployment_id"), Some("Value required"));
    }

    #[test]
    fn test_members_use_staff_settings() {
        let (mut db, ctx) = setup(Settings::default());
        member(&mut db, &ctx, "Ana");

        let response = list(&db, &ctx, DeployResource::Member, &ListRequest::default()).unwrap();
        let ListResponse::Members(page) = response else {
            panic!("members are listed with their staff settings");
        };
        assert!(page.hrm.staff_experience);
        assert!(page.hrm.use_skills);
        assert_eq!(page.summary.list.total, 1);

        assert!(!ctx.settings().hrm.staff_experience);
        assert!(!ctx.settings().hrm.use_skills);
    }

    #[test]
    fn test_person_import_creates_member() {
        let (mut db, ctx) = setup(Settings::default());
        let created = create(
            &mut db,
            &ctx,
            DeployResource::Person,
            Row::new()
                .with("first_name", "Ana")
                .with("last_name", "Lopez")
                .with("type", 2i64),
        )
        .unwrap();
        assert_eq!(created.next, format!("/deploy/person/{}", created.id));

        let members = db
            .select("hrm_human_resource", &Query::new().eq("person_id", created.id))
            .unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].get("type"), Some(&FieldValue::Int(2)));

        let rejected = create(
            &mut db,
            &ctx,
            DeployResource::Person,
            Row::new().with("first_name", "Ben").with("type", 9i64),
        );
        assert!(matches!(rejected, Err(ModelError::Validation(_))));
        assert_eq!(db.count("pr_person", &Query::new()).unwrap(), 1);
    }
}
