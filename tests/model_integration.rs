//! End-to-end behavior of the deployment model over the in-memory store.

use std::sync::Arc;

use deploy_model::{
    all_modules, Db, FieldValue, MemoryStore, Model, ModelError, RecordId, RecordRef,
    RequestContext, Row, Settings,
};

fn setup() -> (Db<MemoryStore>, RequestContext) {
    let settings = Settings::default();
    let model = Model::load(&all_modules(), &settings).expect("model loads");
    let db = Db::new(Arc::new(model), MemoryStore::new()).expect("store opens");
    (db, RequestContext::new(Arc::new(settings)).with_user(7))
}

fn deployment(db: &mut Db, ctx: &RequestContext, title: &str) -> RecordId {
    db.insert(ctx, "deploy_deployment", Row::new().with("title", title))
        .unwrap()
}

fn member(db: &mut Db, ctx: &RequestContext, first: &str, last: &str) -> RecordId {
    let person = db
        .insert(
            ctx,
            "pr_person",
            Row::new().with("first_name", first).with("last_name", last),
        )
        .unwrap();
    db.insert(ctx, "hrm_human_resource", Row::new().with("person_id", person))
        .unwrap()
}

fn assign(db: &mut Db, ctx: &RequestContext, deployment_id: RecordId, hr: RecordId) -> RecordId {
    db.insert(
        ctx,
        "deploy_human_resource_assignment",
        Row::new()
            .with("deployment_id", deployment_id)
            .with("human_resource_id", hr),
    )
    .unwrap()
}

fn hrquantity(db: &Db, id: RecordId) -> FieldValue {
    let row = db.get("deploy_deployment", id).unwrap().unwrap();
    db.virtual_value("deploy_deployment", RecordRef::from(&row), "hrquantity")
        .unwrap()
}

#[test]
fn test_member_count_without_assignments_is_zero() {
    let (mut db, ctx) = setup();
    let id = deployment(&mut db, &ctx, "Cyclone Pam");

    assert_eq!(hrquantity(&db, id), FieldValue::Int(0));
}

#[test]
fn test_member_count_is_per_deployment() {
    let (mut db, ctx) = setup();
    let gorkha = deployment(&mut db, &ctx, "Gorkha Earthquake");
    let pam = deployment(&mut db, &ctx, "Cyclone Pam");
    let haiyan = deployment(&mut db, &ctx, "Typhoon Haiyan");

    for (first, target) in [("Ana", gorkha), ("Ben", gorkha), ("Chen", gorkha), ("Dina", pam)] {
        let hr = member(&mut db, &ctx, first, "Lopez");
        assign(&mut db, &ctx, target, hr);
    }

    assert_eq!(hrquantity(&db, gorkha), FieldValue::Int(3));
    assert_eq!(hrquantity(&db, pam), FieldValue::Int(1));
    assert_eq!(hrquantity(&db, haiyan), FieldValue::Int(0));
}

#[test]
fn test_member_count_ignores_archived_assignments() {
    let (mut db, ctx) = setup();
    let id = deployment(&mut db, &ctx, "Gorkha Earthquake");
    let hr = member(&mut db, &ctx, "Ana", "Lopez");
    let assignment = assign(&mut db, &ctx, id, hr);
    assert_eq!(hrquantity(&db, id), FieldValue::Int(1));

    db.archive(&ctx, "deploy_human_resource_assignment", assignment)
        .unwrap();
    assert_eq!(hrquantity(&db, id), FieldValue::Int(0));
}

#[test]
fn test_deleting_alert_removes_recipients() {
    let (mut db, ctx) = setup();
    let id = deployment(&mut db, &ctx, "Gorkha Earthquake");
    let alert = db
        .insert(&ctx, "deploy_alert", Row::new().with("deployment_id", id))
        .unwrap();
    let other_alert = db
        .insert(&ctx, "deploy_alert", Row::new().with("deployment_id", id))
        .unwrap();

    for (first, target) in [("Ana", alert), ("Ben", alert), ("Chen", other_alert)] {
        let hr = member(&mut db, &ctx, first, "Lopez");
        db.insert(
            &ctx,
            "deploy_alert_recipient",
            Row::new().with("alert_id", target).with("human_resource_id", hr),
        )
        .unwrap();
    }

    let summary = db.delete(&ctx, "deploy_alert", alert).unwrap();
    let recipients_deleted = summary
        .deleted
        .iter()
        .filter(|(table, _)| table == "deploy_alert_recipient")
        .count();
    assert_eq!(recipients_deleted, 2);

    let remaining = db
        .select("deploy_alert_recipient", &deploy_model::Query::new())
        .unwrap();
    assert_eq!(remaining.len(), 1);
    for row in &remaining {
        let alert_id = row.get("alert_id").and_then(FieldValue::as_i64).unwrap();
        assert!(db.get("deploy_alert", alert_id).unwrap().is_some());
    }
}

#[test]
fn test_deleting_alert_removes_archived_recipients() {
    use deploy_model::Store;

    let (mut db, ctx) = setup();
    let id = deployment(&mut db, &ctx, "Gorkha Earthquake");
    let alert = db
        .insert(&ctx, "deploy_alert", Row::new().with("deployment_id", id))
        .unwrap();
    let hr = member(&mut db, &ctx, "Ana", "Lopez");
    let recipient = db
        .insert(
            &ctx,
            "deploy_alert_recipient",
            Row::new().with("alert_id", alert).with("human_resource_id", hr),
        )
        .unwrap();
    db.archive(&ctx, "deploy_alert_recipient", recipient).unwrap();

    let summary = db.delete(&ctx, "deploy_alert", alert).unwrap();
    assert!(summary
        .deleted
        .contains(&("deploy_alert_recipient".to_string(), recipient)));

    let stored = db
        .store()
        .select("deploy_alert_recipient", &deploy_model::Query::new())
        .unwrap();
    for row in &stored {
        let alert_id = row.get("alert_id").and_then(FieldValue::as_i64).unwrap();
        assert!(db.store().get("deploy_alert", alert_id).unwrap().is_some());
    }
    assert!(stored.is_empty());
}

#[test]
fn test_deleting_alert_releases_its_person_entity() {
    let (mut db, ctx) = setup();
    let id = deployment(&mut db, &ctx, "Gorkha Earthquake");
    let alert = db
        .insert(&ctx, "deploy_alert", Row::new().with("deployment_id", id))
        .unwrap();
    let pe_id = db
        .get("deploy_alert", alert)
        .unwrap()
        .and_then(|row| row.get("pe_id").and_then(FieldValue::as_i64))
        .unwrap();

    let instance = db.resolve_super("pr_pentity", pe_id).unwrap().unwrap();
    assert_eq!(instance.instance_type, "deploy_alert");
    assert_eq!(instance.instance_id, alert);

    db.delete(&ctx, "deploy_alert", alert).unwrap();
    assert!(db.resolve_super("pr_pentity", pe_id).unwrap().is_none());
}

#[test]
fn test_required_reference_rejects_absent_value() {
    let (mut db, ctx) = setup();

    for row in [Row::new(), Row::new().with("deployment_id", ""), Row::new().with("deployment_id", FieldValue::Null)] {
        match db.insert(&ctx, "deploy_alert", row) {
            Err(ModelError::Validation(errors)) => {
                assert_eq!(errors.for_field("deployment_id"), Some("Value required"));
            }
            other => panic!("expected a validation error, got {:?}", other),
        }
    }
    assert_eq!(
        db.count("deploy_alert", &deploy_model::Query::new()).unwrap(),
        0
    );
}

#[test]
fn test_optional_reference_accepts_absent_value() {
    let (mut db, ctx) = setup();
    let id = deployment(&mut db, &ctx, "Cyclone Pam");

    let row = db.get("deploy_deployment", id).unwrap().unwrap();
    assert!(row.get("location_id").map(FieldValue::is_empty).unwrap_or(true));
}

#[test]
fn test_country_must_be_a_country() {
    let (mut db, ctx) = setup();
    let nepal = db
        .insert(
            &ctx,
            "gis_location",
            Row::new().with("name", "Nepal").with("level", "L0"),
        )
        .unwrap();
    let gorkha = db
        .insert(
            &ctx,
            "gis_location",
            Row::new()
                .with("name", "Gorkha")
                .with("level", "L2")
                .with("parent", nepal),
        )
        .unwrap();

    let result = db.insert(
        &ctx,
        "deploy_deployment",
        Row::new().with("title", "Gorkha Earthquake").with("location_id", gorkha),
    );
    let Err(ModelError::Validation(errors)) = result else {
        panic!("district accepted as country");
    };
    assert_eq!(errors.for_field("location_id"), Some("Value not in database"));

    db.insert(
        &ctx,
        "deploy_deployment",
        Row::new().with("title", "Gorkha Earthquake").with("location_id", nepal),
    )
    .unwrap();
}

#[test]
fn test_represent_reflects_latest_name() {
    let (mut db, ctx) = setup();
    let person = db
        .insert(
            &ctx,
            "pr_person",
            Row::new().with("first_name", "Ana").with("last_name", "Lopez"),
        )
        .unwrap();
    let hr = db
        .insert(&ctx, "hrm_human_resource", Row::new().with("person_id", person))
        .unwrap();
    let id = deployment(&mut db, &ctx, "Gorkha Earthquake");
    assign(&mut db, &ctx, id, hr);

    let member = FieldValue::Int(hr);
    assert_eq!(
        db.represent("deploy_human_resource_assignment", "human_resource_id", &member)
            .unwrap(),
        "Ana Lopez"
    );

    db.update(&ctx, "pr_person", person, &Row::new().with("last_name", "Garcia"))
        .unwrap();
    assert_eq!(
        db.represent("deploy_human_resource_assignment", "human_resource_id", &member)
            .unwrap(),
        "Ana Garcia"
    );

    db.update(&ctx, "deploy_deployment", id, &Row::new().with("title", "Nepal Earthquake"))
        .unwrap();
    assert_eq!(
        db.represent("deploy_alert", "deployment_id", &FieldValue::Int(id))
            .unwrap(),
        "Nepal Earthquake"
    );
}

#[test]
fn test_deployment_documents_follow_deployment() {
    let (mut db, ctx) = setup();
    let id = deployment(&mut db, &ctx, "Gorkha Earthquake");
    let doc_id = db
        .get("deploy_deployment", id)
        .unwrap()
        .and_then(|row| row.get("doc_id").and_then(FieldValue::as_i64))
        .unwrap();
    db.insert(
        &ctx,
        "doc_document",
        Row::new().with("doc_id", doc_id).with("file", "sitrep-1.pdf"),
    )
    .unwrap();

    let documents = db.children("deploy_deployment", id, "document").unwrap();
    assert_eq!(documents.len(), 1);
    let (table, _) = db.instance("doc_entity", doc_id).unwrap().unwrap();
    assert_eq!(table, "deploy_deployment");

    db.delete(&ctx, "deploy_deployment", id).unwrap();
    assert_eq!(
        db.count("doc_document", &deploy_model::Query::new()).unwrap(),
        0
    );
}

#[test]
fn test_member_in_use_cannot_be_deleted() {
    let (mut db, ctx) = setup();
    let id = deployment(&mut db, &ctx, "Gorkha Earthquake");
    let hr = member(&mut db, &ctx, "Ana", "Lopez");
    assign(&mut db, &ctx, id, hr);

    let result = db.delete(&ctx, "hrm_human_resource", hr);
    assert!(matches!(
        result,
        Err(ModelError::Restricted { ref child, count: 1, .. }) if child == "deploy_human_resource_assignment"
    ));
    assert!(db.get("hrm_human_resource", hr).unwrap().is_some());
    assert_eq!(hrquantity(&db, id), FieldValue::Int(1));
}

#[test]
fn test_audit_fields() {
    let (mut db, ctx) = setup();
    let id = deployment(&mut db, &ctx, "Gorkha Earthquake");
    let row = db.get("deploy_deployment", id).unwrap().unwrap();

    assert_eq!(row.get("created_by"), Some(&FieldValue::Int(7)));
    assert_eq!(row.get("deleted"), Some(&FieldValue::Bool(false)));
    assert!(row.get("uuid").and_then(FieldValue::as_str).is_some());
    assert!(matches!(row.get("created_on"), Some(FieldValue::DateTime(_))));
}
