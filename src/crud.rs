//! Generic list, read and summary output for one relation.
//!
//! A [`Resource`] combines a relation, its [`ViewConfig`] and the request
//! context into display-ready values: labels translated, references
//! represented, virtual fields evaluated. Rendering to HTML is left to the
//! caller.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::db::Db;
use crate::error::ModelError;
use crate::schema::represent::NONE;
use crate::schema::{CrudStrings, FilterWidget, SummarySection, TableDef, ViewConfig};
use crate::store::{Filter, Query, Store};
use crate::value::{FieldValue, RecordId, RecordRef, Row};

/// Formats a stored value for display
pub type Formatter = fn(&FieldValue) -> String;

/// Calendar date of a timestamp, taken in UTC.
pub fn date_represent_utc(value: &FieldValue) -> String {
    match value {
        FieldValue::DateTime(dt) => dt.date_naive().format("%Y-%m-%d").to_string(),
        FieldValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        FieldValue::Null => NONE.to_string(),
        other => other.to_string(),
    }
}

/// Filter values submitted with a list request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListRequest {
    /// Applied to the text filter widget
    pub search: Option<String>,
    /// Applied to the location filter widget
    pub location: Vec<RecordId>,
    pub limit: Option<usize>,
    pub offset: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Column {
    pub selector: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ListRow {
    pub id: RecordId,
    pub values: IndexMap<String, String>,
}

/// Display-ready list of records
#[derive(Debug, Clone, Serialize)]
pub struct ListOutput {
    pub table: String,
    pub title: String,
    pub columns: Vec<Column>,
    pub rows: Vec<ListRow>,
    /// Rows matching the filters, before paging
    pub total: usize,
    /// Shown instead of the table when there are no rows
    pub empty: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DisplayField {
    pub name: String,
    pub label: String,
    pub value: String,
}

/// Display-ready single record
#[derive(Debug, Clone, Serialize)]
pub struct RecordOutput {
    pub table: String,
    pub id: RecordId,
    pub title: String,
    pub fields: Vec<DisplayField>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Button {
    pub label: String,
    pub url: String,
}

/// Summary page: common sections, tabs, filter form and the list
#[derive(Debug, Clone, Serialize)]
pub struct SummaryOutput {
    pub title: String,
    pub sections: Vec<SummarySection>,
    pub filters: Vec<FilterWidget>,
    pub list: ListOutput,
    pub buttons: IndexMap<String, Button>,
}

/// View of one relation for the current request
pub struct Resource<'a, S: Store> {
    db: &'a Db<S>,
    ctx: &'a RequestContext,
    table: &'a TableDef,
    view: Option<&'a ViewConfig>,
    base_url: String,
    formatters: HashMap<String, Formatter>,
}

impl<'a, S: Store> Resource<'a, S> {
    /// Resource for `table`, addressed at `/<controller>/<function>`.
    pub fn new(
        db: &'a Db<S>,
        ctx: &'a RequestContext,
        table: &str,
        base_url: impl Into<String>,
    ) -> Result<Self, ModelError> {
        let model = db.model();
        Ok(Self {
            table: model.table(table)?,
            view: model.view(table),
            db,
            ctx,
            base_url: base_url.into(),
            formatters: HashMap::new(),
        })
    }

    /// Override how one column is displayed.
    pub fn format(mut self, selector: &str, formatter: Formatter) -> Self {
        self.formatters.insert(selector.to_string(), formatter);
        self
    }

    pub fn table(&self) -> &TableDef {
        self.table
    }

    /// A CRUD string, translated, with a generic fallback.
    pub fn crud_string(&self, key: &str) -> String {
        let configured = self
            .view
            .and_then(|v| v.crud_strings.as_ref())
            .and_then(|s: &CrudStrings| s.get(key))
            .filter(|s| !s.is_empty());
        let text = match (configured, key) {
            (Some(text), _) => text,
            (None, "title_list") => "List Records",
            (None, "title_display") => "Record Details",
            (None, "label_create_button") => "Create",
            (None, "label_list_button") => "List Records",
            (None, "label_delete_button") => "Delete",
            (None, "msg_record_created") => "Record created",
            (None, "msg_record_deleted") => "Record deleted",
            (None, "msg_list_empty") => "No Records currently available",
            (None, other) => other,
        };
        self.ctx.t(text)
    }

    /// Columns shown in lists: the configured list fields, or every
    /// readable stored field.
    pub fn columns(&self) -> Vec<Column> {
        match self.view.filter(|v| !v.list_fields.is_empty()) {
            Some(view) => view
                .list_fields
                .iter()
                .map(|f| Column {
                    label: self.ctx.t(f.label.as_deref().unwrap_or_else(|| self.label_of(&f.selector))),
                    selector: f.selector.clone(),
                })
                .collect(),
            None => self
                .table
                .fields
                .iter()
                .filter(|f| f.readable)
                .map(|f| Column {
                    selector: f.name.clone(),
                    label: self.ctx.t(&f.label),
                })
                .collect(),
        }
    }

    fn label_of<'s>(&'s self, selector: &'s str) -> &'s str {
        self.table.label_of(selector).unwrap_or(selector)
    }

    /// Query for the submitted filter values, in the configured order.
    pub fn query(&self, request: &ListRequest) -> Query {
        let mut query = Query::new();
        let widgets = self.view.map(|v| v.filter_widgets.as_slice()).unwrap_or_default();

        for widget in widgets {
            match widget {
                FilterWidget::Text { fields, .. } => {
                    if let Some(text) = request.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                        query = query.filter(Filter::Contains(fields.clone(), text.to_string()));
                    }
                }
                FilterWidget::Location { field, .. } => {
                    if !request.location.is_empty() {
                        let values = request.location.iter().map(|id| FieldValue::Int(*id)).collect();
                        query = query.filter(Filter::In(field.clone(), values));
                    }
                }
            }
        }

        if let Some(order) = self.view.and_then(|v| v.orderby.clone()) {
            query = query.order_by(order);
        }
        query
    }

    /// Display value of one column of a stored row.
    pub fn display(&self, row: &Row, selector: &str) -> Result<String, ModelError> {
        let table = self.table.name.as_str();
        if self.table.virtual_field(selector).is_some() {
            let value = self.db.virtual_value(table, RecordRef::from(row), selector)?;
            return Ok(value.to_string());
        }

        let value = row.get(selector).cloned().unwrap_or(FieldValue::Null);
        match self.formatters.get(selector) {
            Some(formatter) => Ok(formatter(&value)),
            None => self.db.represent(table, selector, &value),
        }
    }

    /// Filtered, ordered and paged list.
    pub fn list(&self, request: &ListRequest) -> Result<ListOutput, ModelError> {
        let columns = self.columns();
        let rows = self.db.select(&self.table.name, &self.query(request))?;
        let total = rows.len();

        let page = rows
            .iter()
            .skip(request.offset)
            .take(request.limit.unwrap_or(usize::MAX));
        let mut out = Vec::new();
        for row in page {
            let Some(id) = row.id() else { continue };
            let mut values = IndexMap::new();
            for column in &columns {
                values.insert(column.selector.clone(), self.display(row, &column.selector)?);
            }
            out.push(ListRow { id, values });
        }

        Ok(ListOutput {
            table: self.table.name.clone(),
            title: self.crud_string("title_list"),
            columns,
            empty: (total == 0).then(|| self.crud_string("msg_list_empty")),
            rows: out,
            total,
        })
    }

    /// Readable fields of one record.
    pub fn read(&self, id: RecordId) -> Result<RecordOutput, ModelError> {
        let row = self
            .db
            .get(&self.table.name, id)?
            .ok_or_else(|| ModelError::NotFound {
                table: self.table.name.clone(),
                id,
            })?;

        let mut fields = Vec::new();
        for field in self.table.fields.iter().filter(|f| f.readable) {
            fields.push(DisplayField {
                name: field.name.clone(),
                label: self.ctx.t(&field.label),
                value: self.display(&row, &field.name)?,
            });
        }
        for field in &self.table.virtual_fields {
            fields.push(DisplayField {
                name: field.name.clone(),
                label: self.ctx.t(&field.label),
                value: self.display(&row, &field.name)?,
            });
        }

        Ok(RecordOutput {
            table: self.table.name.clone(),
            id,
            title: self.crud_string("title_display"),
            fields,
        })
    }

    /// Standard action buttons.
    pub fn buttons(&self) -> IndexMap<String, Button> {
        let mut buttons = IndexMap::new();
        buttons.insert(
            "add_btn".to_string(),
            Button {
                label: self.crud_string("label_create_button"),
                url: format!("{}/create", self.base_url),
            },
        );
        buttons.insert(
            "list_btn".to_string(),
            Button {
                label: self.crud_string("label_list_button"),
                url: self.base_url.clone(),
            },
        );
        if self.view.map(|v| !v.summary.is_empty()).unwrap_or(false) {
            buttons.insert(
                "summary_btn".to_string(),
                Button {
                    label: self.crud_string("label_list_button"),
                    url: format!("{}/summary", self.base_url),
                },
            );
        }
        buttons
    }

    /// Summary page with the configured sections and filter form.
    pub fn summary(&self, request: &ListRequest) -> Result<SummaryOutput, ModelError> {
        let view = self.view.cloned().unwrap_or_default();
        Ok(SummaryOutput {
            title: self.crud_string("title_list"),
            sections: view.summary,
            filters: view.filter_widgets,
            list: self.list(request)?,
            buttons: self.buttons(),
        })
    }
}
