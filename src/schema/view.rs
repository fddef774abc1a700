//! Presentation metadata for relations.
//!
//! Nothing here renders anything. The list/summary consumers in
//! [`crud`](crate::crud) and the HTTP API read these settings to decide
//! which columns, filters and tabs to offer.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use crate::error::ModelError;
use crate::store::OrderBy;

/// A column of the list view
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ListField {
    /// Label override; the field's own label is used when absent
    pub label: Option<String>,
    /// Stored or virtual field name
    pub selector: String,
}

impl ListField {
    pub fn new(selector: &str) -> Self {
        Self {
            label: None,
            selector: selector.to_string(),
        }
    }

    pub fn labeled(label: &str, selector: &str) -> Self {
        Self {
            label: Some(label.to_string()),
            selector: selector.to_string(),
        }
    }
}

/// Filter form widgets offered above list views
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterWidget {
    /// Free-text search over one or more fields
    Text { fields: Vec<String>, label: String },
    /// Pick locations, optionally limited to some hierarchy levels
    Location {
        field: String,
        label: String,
        levels: Vec<String>,
        widget: String,
        hidden: bool,
    },
}

impl FilterWidget {
    pub fn text(field: &str, label: &str) -> Self {
        FilterWidget::Text {
            fields: vec![field.to_string()],
            label: label.to_string(),
        }
    }

    pub fn location(field: &str, label: &str, levels: &[&str]) -> Self {
        FilterWidget::Location {
            field: field.to_string(),
            label: label.to_string(),
            levels: levels.iter().map(|l| l.to_string()).collect(),
            widget: "multiselect".to_string(),
            hidden: false,
        }
    }

    /// Collapse the widget into the "more options" section.
    pub fn hidden(mut self) -> Self {
        if let FilterWidget::Location { hidden, .. } = &mut self {
            *hidden = true;
        }
        self
    }

    pub fn label(&self) -> &str {
        match self {
            FilterWidget::Text { label, .. } | FilterWidget::Location { label, .. } => label,
        }
    }
}

/// Widget shown in a summary tab
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SummaryWidget {
    Datatable,
    Map { ajax_init: bool },
    Report,
    /// "Create" action button labelled from the CRUD strings
    AddButton,
}

/// A tab (or common header) of the summary page
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SummarySection {
    pub name: String,
    pub label: Option<String>,
    /// Shown above every tab rather than as a tab of its own
    pub common: bool,
    pub widgets: Vec<SummaryWidget>,
}

impl SummarySection {
    pub fn tab(name: &str, label: &str, widgets: Vec<SummaryWidget>) -> Self {
        Self {
            name: name.to_string(),
            label: Some(label.to_string()),
            common: false,
            widgets,
        }
    }

    pub fn common(name: &str, widgets: Vec<SummaryWidget>) -> Self {
        Self {
            name: name.to_string(),
            label: None,
            common: true,
            widgets,
        }
    }
}

/// Element of a create/update form
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormElement {
    Field { name: String },
    /// Rows of a component edited inline in the parent's form
    Inline {
        component: String,
        name: String,
        label: String,
        fields: Vec<String>,
    },
}

impl FormElement {
    pub fn field(name: &str) -> Self {
        FormElement::Field {
            name: name.to_string(),
        }
    }

    pub fn inline(component: &str, name: &str, label: &str, fields: &[&str]) -> Self {
        FormElement::Inline {
            component: component.to_string(),
            name: name.to_string(),
            label: label.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// User-facing strings for the CRUD pages of one relation
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CrudStrings {
    pub title_create: String,
    pub title_display: String,
    pub title_list: String,
    pub title_update: String,
    pub title_search: String,
    pub title_upload: String,
    pub subtitle_create: String,
    pub label_list_button: String,
    pub label_create_button: String,
    pub label_delete_button: String,
    pub msg_record_created: String,
    pub msg_record_modified: String,
    pub msg_record_deleted: String,
    pub msg_list_empty: String,
}

impl CrudStrings {
    /// Look up a string by its key name.
    pub fn get(&self, key: &str) -> Option<&str> {
        let value = match key {
            "title_create" => &self.title_create,
            "title_display" => &self.title_display,
            "title_list" => &self.title_list,
            "title_update" => &self.title_update,
            "title_search" => &self.title_search,
            "title_upload" => &self.title_upload,
            "subtitle_create" => &self.subtitle_create,
            "label_list_button" => &self.label_list_button,
            "label_create_button" => &self.label_create_button,
            "label_delete_button" => &self.label_delete_button,
            "msg_record_created" => &self.msg_record_created,
            "msg_record_modified" => &self.msg_record_modified,
            "msg_record_deleted" => &self.msg_record_deleted,
            "msg_list_empty" => &self.msg_list_empty,
            _ => return None,
        };
        Some(value.as_str())
    }
}

/// Presentation settings of one relation
#[derive(Debug, Clone, Default, Serialize)]
pub struct ViewConfig {
    pub list_fields: Vec<ListField>,
    pub filter_widgets: Vec<FilterWidget>,
    pub summary: Vec<SummarySection>,
    #[serde(skip)]
    pub orderby: Option<OrderBy>,
    /// Where to go after a record is deleted
    pub delete_next: Option<String>,
    pub crud_form: Vec<FormElement>,
    pub crud_strings: Option<CrudStrings>,
}

/// Parse an ordering such as `deploy_deployment.created_on desc`.
///
/// The table prefix is optional; when present it must name `table`.
pub fn parse_orderby(table: &str, spec: &str) -> Result<OrderBy, ModelError> {
    static ORDERBY: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    let pattern = ORDERBY
        .get_or_init(|| {
            Regex::new(r"(?i)^\s*(?:([a-z][a-z0-9_]*)\.)?([a-z][a-z0-9_]*)(?:\s+(asc|desc))?\s*$")
        })
        .as_ref()
        .map_err(|e| ModelError::Config(e.to_string()))?;

    let caps = pattern
        .captures(spec)
        .ok_or_else(|| ModelError::Config(format!("Invalid orderby: '{}'", spec)))?;

    if let Some(prefix) = caps.get(1) {
        if prefix.as_str() != table {
            return Err(ModelError::Config(format!(
                "orderby '{}' does not refer to table {}",
                spec, table
            )));
        }
    }

    Ok(OrderBy {
        field: caps[2].to_string(),
        descending: caps
            .get(3)
            .map(|d| d.as_str().eq_ignore_ascii_case("desc"))
            .unwrap_or(false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_orderby() {
        let order = parse_orderby("deploy_deployment", "deploy_deployment.created_on desc").unwrap();
        assert_eq!(order.field, "created_on");
        assert!(order.descending);

        let order = parse_orderby("deploy_deployment", "title").unwrap();
        assert_eq!(order.field, "title");
        assert!(!order.descending);
    }

    #[test]
    fn test_parse_orderby_errors() {
        assert!(parse_orderby("deploy_deployment", "deploy_alert.created_on").is_err());
        assert!(parse_orderby("deploy_deployment", "created_on sideways").is_err());
    }

    #[test]
    fn test_crud_string_lookup() {
        let strings = CrudStrings {
            label_create_button: "New Deployment".to_string(),
            ..Default::default()
        };
        assert_eq!(strings.get("label_create_button"), Some("New Deployment"));
        assert_eq!(strings.get("nonsense"), None);
    }

    #[test]
    fn test_hidden_location_filter() {
        let widget = FilterWidget::location("location_id", "Location", &["L0"]).hidden();
        match widget {
            FilterWidget::Location { hidden, levels, .. } => {
                assert!(hidden);
                assert_eq!(levels, vec!["L0"]);
            }
            _ => panic!("expected location filter"),
        }
    }
}
