//! Validated reads and writes over a [`Store`].
//!
//! [`Db`] is the only place rows enter the store. Inserts and updates go
//! through type coercion, field validators and reference checks, get their
//! audit fields stamped, and allocate super-entity identities. Deletes are
//! planned across every reference policy before anything is touched.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::{ModelError, ValidationErrors};
use crate::model::Model;
use crate::schema::represent::NONE;
use crate::schema::{Attachable, Instance, InstanceRef, OnDelete, ReferenceSpec, TableDef};
use crate::store::{MemoryStore, Query, Store};
use crate::value::{FieldValue, RecordId, RecordRef, Row};

/// Rows touched by a delete
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeleteSummary {
    /// Deleted (or archived) rows, children before parents
    pub deleted: Vec<(String, RecordId)>,
    /// Rows whose reference was cleared: table, id, field
    pub nulled: Vec<(String, RecordId, String)>,
}

impl DeleteSummary {
    pub fn count(&self) -> usize {
        self.deleted.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeleteMode {
    Remove,
    Archive,
}

#[derive(Debug, Default)]
struct DeletePlan {
    rows: Vec<(String, RecordId)>,
    nullify: Vec<(String, RecordId, String)>,
    /// parent table, child table, child id
    restricted: Vec<(String, String, RecordId)>,
    visited: HashSet<(String, RecordId)>,
}

impl DeletePlan {
    fn contains(&self, table: &str, id: RecordId) -> bool {
        self.visited.contains(&(table.to_string(), id))
    }
}

/// Model-aware access to a store
pub struct Db<S: Store = MemoryStore> {
    model: Arc<Model>,
    store: S,
}

impl<S: Store> Db<S> {
    /// Wrap a store, creating any relation of the model it lacks.
    pub fn new(model: Arc<Model>, mut store: S) -> Result<Self, ModelError> {
        for table in model.tables() {
            store.ensure_table(&table.name)?;
        }
        Ok(Self { model, store })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Validate and insert a row.
    ///
    /// Returns the new record id. Rows of relations attached to a
    /// super-entity get their shared identity allocated first.
    ///
    /// # Errors
    /// * `UnknownTable` / `UnknownField` for names not in the model
    /// * `Validation` with one message per offending field
    pub fn insert(
        &mut self,
        ctx: &RequestContext,
        table: &str,
        row: Row,
    ) -> Result<RecordId, ModelError> {
        let model = Arc::clone(&self.model);
        let def = model.table(table)?;
        let mut values = self.validate(def, &row, true)?;

        let now = Utc::now();
        values.merge(&created(ctx, now));

        let identity = match &def.super_entity {
            Some(super_entity) => {
                let mut identity = created(ctx, now);
                identity.set("instance_type", table);
                let super_id = self.store.insert(&super_entity.name, identity)?;
                values.set(super_entity.key.clone(), super_id);
                Some((super_entity, super_id))
            }
            None => None,
        };

        let id = self.store.insert(table, values)?;

        if let Some((super_entity, super_id)) = identity {
            self.store.update(
                &super_entity.name,
                super_id,
                &Row::new().with("instance_id", id),
            )?;
            tracing::info!(
                "Allocated {} {} for {} {}",
                super_entity.key,
                super_id,
                table,
                id
            );
        }

        tracing::debug!("Inserted {} {}", table, id);
        Ok(id)
    }

    /// Validate and apply changes to an existing row.
    pub fn update(
        &mut self,
        ctx: &RequestContext,
        table: &str,
        id: RecordId,
        changes: &Row,
    ) -> Result<(), ModelError> {
        let model = Arc::clone(&self.model);
        let def = model.table(table)?;
        if self.get(table, id)?.is_none() {
            return Err(ModelError::NotFound {
                table: table.to_string(),
                id,
            });
        }

        let mut values = self.validate(def, changes, false)?;
        values.set("modified_on", Utc::now());
        values.set("modified_by", ctx.user_id());
        self.store.update(table, id, &values)?;
        Ok(())
    }

    /// Fetch a row unless it is missing or soft-deleted.
    pub fn get(&self, table: &str, id: RecordId) -> Result<Option<Row>, ModelError> {
        self.model.table(table)?;
        Ok(self.store.get(table, id)?.filter(is_active))
    }

    /// Fetch non-deleted rows matching `query`.
    pub fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, ModelError> {
        self.model.table(table)?;
        Ok(self.store.select(table, &active(query))?)
    }

    pub fn count(&self, table: &str, query: &Query) -> Result<usize, ModelError> {
        self.model.table(table)?;
        Ok(self.store.count(table, &active(query))?)
    }

    /// Delete a row following every reference policy.
    ///
    /// Children referencing the row with CASCADE are deleted, SET NULL
    /// references are cleared and RESTRICT references block the delete.
    /// The restriction check covers the whole plan, so a blocked delete
    /// leaves every row untouched.
    pub fn delete(
        &mut self,
        ctx: &RequestContext,
        table: &str,
        id: RecordId,
    ) -> Result<DeleteSummary, ModelError> {
        self.remove(ctx, table, id, DeleteMode::Remove)
    }

    /// Like [`delete`](Self::delete) but only flags rows as deleted.
    pub fn archive(
        &mut self,
        ctx: &RequestContext,
        table: &str,
        id: RecordId,
    ) -> Result<DeleteSummary, ModelError> {
        self.remove(ctx, table, id, DeleteMode::Archive)
    }

    fn remove(
        &mut self,
        ctx: &RequestContext,
        table: &str,
        id: RecordId,
        mode: DeleteMode,
    ) -> Result<DeleteSummary, ModelError> {
        if self.get(table, id)?.is_none() {
            return Err(ModelError::NotFound {
                table: table.to_string(),
                id,
            });
        }
        let mut plan = DeletePlan::default();
        self.plan_delete(table, id, mode, &mut plan)?;

        let mut blocking: IndexMap<(String, String), usize> = IndexMap::new();
        for (parent, child, child_id) in &plan.restricted {
            if !plan.contains(child, *child_id) {
                *blocking.entry((parent.clone(), child.clone())).or_default() += 1;
            }
        }
        if let Some(((parent, child), count)) = blocking.into_iter().next() {
            tracing::debug!("Delete of {} {} restricted by {}", table, id, child);
            return Err(ModelError::Restricted {
                table: parent,
                child,
                count,
            });
        }

        let now = Utc::now();
        let mut summary = DeleteSummary::default();
        for (child, child_id, field) in plan.nullify {
            if plan.visited.contains(&(child.clone(), child_id)) {
                continue;
            }
            let changes = Row::new()
                .with(field.clone(), FieldValue::Null)
                .with("modified_on", now)
                .with("modified_by", ctx.user_id());
            self.store.update(&child, child_id, &changes)?;
            summary.nulled.push((child, child_id, field));
        }

        for (name, row_id) in plan.rows {
            match mode {
                DeleteMode::Remove => {
                    self.store.delete(&name, row_id)?;
                }
                DeleteMode::Archive => {
                    let changes = Row::new()
                        .with("deleted", true)
                        .with("modified_on", now)
                        .with("modified_by", ctx.user_id());
                    self.store.update(&name, row_id, &changes)?;
                }
            }
            summary.deleted.push((name, row_id));
        }

        if summary.count() > 1 || !summary.nulled.is_empty() {
            tracing::info!(
                "Deleting {} {} removed {} row(s), cleared {} reference(s)",
                table,
                id,
                summary.count(),
                summary.nulled.len()
            );
        }
        Ok(summary)
    }

    /// Collect every row a delete touches.
    ///
    /// A hard delete also walks rows that are already archived, so no
    /// stored row is left pointing at a removed parent.
    fn plan_delete(
        &self,
        table: &str,
        id: RecordId,
        mode: DeleteMode,
        plan: &mut DeletePlan,
    ) -> Result<(), ModelError> {
        if !plan.visited.insert((table.to_string(), id)) {
            return Ok(());
        }
        let def = self.model.table(table)?;
        let row = self.planned_row(table, id, mode)?.ok_or_else(|| ModelError::NotFound {
            table: table.to_string(),
            id,
        })?;
        let children = match mode {
            DeleteMode::Remove => Query::new(),
            DeleteMode::Archive => Query::active(),
        };

        for (child, field, spec) in self.model.references_to(table) {
            let rows = self
                .store
                .select(&child.name, &children.clone().eq(field.name.clone(), id))?;
            for child_id in rows.iter().filter_map(Row::id) {
                match spec.on_delete {
                    OnDelete::Restrict => {
                        plan.restricted
                            .push((table.to_string(), child.name.clone(), child_id));
                    }
                    OnDelete::Cascade => self.plan_delete(&child.name, child_id, mode, plan)?,
                    OnDelete::SetNull => {
                        plan.nullify
                            .push((child.name.clone(), child_id, field.name.clone()));
                    }
                }
            }
        }

        plan.rows.push((table.to_string(), id));

        let instance = Instance { table: def, row: &row };
        if let (Some(super_entity), Some(super_id)) = (instance.super_entity(), instance.super_id()) {
            if self.planned_row(super_entity, super_id, mode)?.is_some() {
                self.plan_delete(super_entity, super_id, mode, plan)?;
            }
        }
        Ok(())
    }

    fn planned_row(&self, table: &str, id: RecordId, mode: DeleteMode) -> Result<Option<Row>, ModelError> {
        match mode {
            DeleteMode::Remove => Ok(self.store.get(table, id)?),
            DeleteMode::Archive => self.get(table, id),
        }
    }

    /// Rows of a component, by alias, belonging to parent row `id`.
    ///
    /// Components registered on the relation's super-entity are keyed by
    /// the row's shared identity.
    pub fn children(&self, table: &str, id: RecordId, alias: &str) -> Result<Vec<Row>, ModelError> {
        let component = self.model.resolve_component(table, alias).ok_or_else(|| {
            ModelError::Config(format!("'{}' is not a component of {}", alias, table))
        })?;

        let key = if component.parent == table {
            id
        } else {
            let row = self.get(table, id)?.ok_or_else(|| ModelError::NotFound {
                table: table.to_string(),
                id,
            })?;
            let instance = Instance {
                table: self.model.table(table)?,
                row: &row,
            };
            match instance.super_id() {
                Some(super_id) => super_id,
                None => return Ok(Vec::new()),
            }
        };

        self.select(&component.child, &Query::new().eq(component.fk.clone(), key))
    }

    /// Map a shared identity back to its concrete relation and row.
    pub fn resolve_super(
        &self,
        super_entity: &str,
        super_id: RecordId,
    ) -> Result<Option<InstanceRef>, ModelError> {
        if self.model.super_entity(super_entity).is_none() {
            return Err(ModelError::UnknownSuperEntity(super_entity.to_string()));
        }
        Ok(self
            .get(super_entity, super_id)?
            .as_ref()
            .and_then(InstanceRef::from_row))
    }

    /// The concrete row behind a shared identity.
    pub fn instance(
        &self,
        super_entity: &str,
        super_id: RecordId,
    ) -> Result<Option<(String, Row)>, ModelError> {
        match self.resolve_super(super_entity, super_id)? {
            Some(instance) => Ok(self
                .get(&instance.instance_type, instance.instance_id)?
                .map(|row| (instance.instance_type, row))),
            None => Ok(None),
        }
    }

    /// Evaluate a virtual field.
    pub fn virtual_value(
        &self,
        table: &str,
        record: RecordRef<'_>,
        name: &str,
    ) -> Result<FieldValue, ModelError> {
        let field = self
            .model
            .table(table)?
            .virtual_field(name)
            .ok_or_else(|| ModelError::UnknownField {
                table: table.to_string(),
                field: name.to_string(),
            })?;
        field.evaluate(table, record, &self.store)
    }

    /// Display text for a stored value.
    ///
    /// References are looked up now, so renamed targets show their
    /// current name.
    pub fn represent(
        &self,
        table: &str,
        field: &str,
        value: &FieldValue,
    ) -> Result<String, ModelError> {
        let def = self.model.table(table)?;
        let field_def = def.field(field).ok_or_else(|| ModelError::UnknownField {
            table: table.to_string(),
            field: field.to_string(),
        })?;

        if let Some(spec) = &field_def.reference {
            return Ok(spec.represent.render(&self.store, value)?);
        }
        Ok(match value {
            FieldValue::Null => NONE.to_string(),
            other => other.to_string(),
        })
    }

    fn validate(&self, def: &TableDef, row: &Row, insert: bool) -> Result<Row, ModelError> {
        for (name, _) in row.fields() {
            if name != "id" && def.field(name).is_none() {
                return Err(ModelError::UnknownField {
                    table: def.name.clone(),
                    field: name.clone(),
                });
            }
        }

        let mut errors = ValidationErrors::new();
        let mut values = Row::new();

        for field in &def.fields {
            let value = match row.get(&field.name) {
                Some(value) if field.writable => value.clone(),
                _ if insert => field.default.clone().unwrap_or(FieldValue::Null),
                _ => continue,
            };

            let value = match field.field_type.coerce(value) {
                Ok(value) => value,
                Err(message) => {
                    errors.add(&field.name, message);
                    continue;
                }
            };

            if let Some(spec) = &field.reference {
                if value.is_empty() {
                    if spec.required {
                        errors.add(&field.name, "Value required");
                        continue;
                    }
                } else if !self.reference_exists(spec, &value)? {
                    tracing::debug!(
                        "{}.{}: {} not found in {}",
                        def.name,
                        field.name,
                        value,
                        spec.target
                    );
                    errors.add(&field.name, "Value not in database");
                    continue;
                }
            }

            if let Some(message) = field
                .validators
                .iter()
                .find_map(|v| v.validate(&value).err())
            {
                errors.add(&field.name, message);
                continue;
            }

            values.set(field.name.clone(), value);
        }

        if !errors.is_empty() {
            return Err(errors.into());
        }
        Ok(values)
    }

    fn reference_exists(&self, spec: &ReferenceSpec, value: &FieldValue) -> Result<bool, ModelError> {
        let Some(id) = value.as_i64() else {
            return Ok(false);
        };
        let Some(target) = self.get(&spec.target, id)? else {
            return Ok(false);
        };
        Ok(match &spec.filter {
            Some((field, expected)) => target.get(field) == Some(expected),
            None => true,
        })
    }
}

/// Audit fields of a new row
fn created(ctx: &RequestContext, now: DateTime<Utc>) -> Row {
    Row::new()
        .with("uuid", Uuid::new_v4().to_string())
        .with("created_on", now)
        .with("created_by", ctx.user_id())
        .with("modified_on", now)
        .with("modified_by", ctx.user_id())
        .with("deleted", false)
}

fn is_active(row: &Row) -> bool {
    row.get("deleted") != Some(&FieldValue::Bool(true))
}

fn active(query: &Query) -> Query {
    let mut scoped = Query::active();
    scoped.filters.extend(query.filters.iter().cloned());
    scoped.order_by = query.order_by.clone();
    scoped
}
