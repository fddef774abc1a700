//! Reusable reference fields.
//!
//! A [`ReusableField`] is defined once per target relation and then stamped
//! into every relation that links to that target, so all of them share the
//! same label, validation, representation and deletion policy.

use serde::Serialize;

use crate::schema::field::{FieldDef, FieldType};
use crate::schema::represent::Represent;
use crate::value::FieldValue;

/// What happens to referencing rows when the referenced row is deleted
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnDelete {
    /// Refuse to delete the parent while children exist
    #[default]
    Restrict,
    /// Delete the children with the parent
    Cascade,
    /// Clear the child's reference
    SetNull,
}

impl OnDelete {
    /// SQL spelling of the policy
    pub fn as_sql(&self) -> &'static str {
        match self {
            OnDelete::Restrict => "RESTRICT",
            OnDelete::Cascade => "CASCADE",
            OnDelete::SetNull => "SET NULL",
        }
    }
}

/// Reference metadata carried by a field definition
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceSpec {
    pub target: String,
    pub required: bool,
    pub on_delete: OnDelete,
    pub represent: Represent,
    /// Additional constraint on the referenced row, e.g. `level = L0`
    pub filter: Option<(String, FieldValue)>,
}

/// Factory for reference fields pointing at one target relation.
///
/// # Example
///
/// ```
/// use deploy_model::schema::{OnDelete, Represent, ReusableField};
///
/// let deployment_id = ReusableField::reference("deployment_id", "deploy_deployment")
///     .label("Deployment")
///     .represent(Represent::new("deploy_deployment", &["title"]))
///     .on_delete(OnDelete::Cascade);
///
/// let field = deployment_id.field();
/// assert_eq!(field.label, "Deployment");
/// assert!(field.is_required());
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ReusableField {
    name: String,
    field_type: FieldType,
    label: Option<String>,
    spec: Option<ReferenceSpec>,
    readable: bool,
    writable: bool,
    comment: Option<String>,
}

impl ReusableField {
    /// Reference to `target`; required by default, RESTRICT on delete,
    /// represented by the target's `name` field.
    pub fn reference(name: impl Into<String>, target: impl Into<String>) -> Self {
        let target = target.into();
        Self {
            name: name.into(),
            field_type: FieldType::Reference(target.clone()),
            label: None,
            spec: Some(ReferenceSpec {
                represent: Represent::new(&target, &["name"]),
                target,
                required: true,
                on_delete: OnDelete::default(),
                filter: None,
            }),
            readable: true,
            writable: true,
            comment: None,
        }
    }

    /// Placeholder used when the target module is disabled: a hidden,
    /// unvalidated integer column with the same name.
    pub fn dummy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Integer,
            label: None,
            spec: None,
            readable: false,
            writable: false,
            comment: None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn optional(mut self) -> Self {
        if let Some(spec) = self.spec.as_mut() {
            spec.required = false;
        }
        self
    }

    pub fn required(mut self) -> Self {
        if let Some(spec) = self.spec.as_mut() {
            spec.required = true;
        }
        self
    }

    pub fn on_delete(mut self, policy: OnDelete) -> Self {
        if let Some(spec) = self.spec.as_mut() {
            spec.on_delete = policy;
        }
        self
    }

    pub fn represent(mut self, represent: Represent) -> Self {
        if let Some(spec) = self.spec.as_mut() {
            spec.represent = represent;
        }
        self
    }

    /// Only accept referenced rows where `field == value`.
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        if let Some(spec) = self.spec.as_mut() {
            spec.filter = Some((field.into(), value.into()));
        }
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> Option<&str> {
        self.spec.as_ref().map(|s| s.target.as_str())
    }

    pub fn is_dummy(&self) -> bool {
        self.spec.is_none()
    }

    /// Produce a field definition with the shared configuration.
    pub fn field(&self) -> FieldDef {
        let mut field = FieldDef::new(self.name.clone(), self.field_type.clone());
        if let Some(label) = &self.label {
            field.label = label.clone();
        }
        field.readable = self.readable;
        field.writable = self.writable;
        field.reference = self.spec.clone();
        field.comment = self.comment.clone();
        field
    }

    /// Produce a field definition, overriding label and strictness.
    ///
    /// Mirrors the per-use overrides relations apply to shared fields, e.g.
    /// the human-resource reference labelled "Member" and made mandatory.
    pub fn field_with(&self, label: Option<&str>, required: Option<bool>) -> FieldDef {
        let mut field = self.field();
        if let Some(label) = label {
            field.label = label.to_string();
        }
        if let (Some(required), Some(spec)) = (required, field.reference.as_mut()) {
            spec.required = required;
        }
        field
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_definition() {
        let alert_id = ReusableField::reference("alert_id", "deploy_alert")
            .label("Alert")
            .on_delete(OnDelete::Cascade);

        let a = alert_id.field();
        let b = alert_id.field();

        assert_eq!(a.name, b.name);
        assert_eq!(a.field_type, FieldType::Reference("deploy_alert".to_string()));
        assert_eq!(a.reference.as_ref().unwrap().on_delete, OnDelete::Cascade);
        assert_eq!(b.reference.as_ref().unwrap().target, "deploy_alert");
    }

    #[test]
    fn test_optional_reference() {
        let location_id = ReusableField::reference("location_id", "gis_location")
            .optional()
            .filter("level", "L0");

        let field = location_id.field();
        assert!(!field.is_required());
        assert_eq!(
            field.reference.unwrap().filter,
            Some(("level".to_string(), FieldValue::from("L0")))
        );
    }

    #[test]
    fn test_field_with_overrides() {
        let hr_id = ReusableField::reference("human_resource_id", "hrm_human_resource").optional();

        let field = hr_id.field_with(Some("Member"), Some(true));

        assert_eq!(field.label, "Member");
        assert!(field.is_required());
        assert!(!hr_id.field().is_required());
    }

    #[test]
    fn test_dummy_field() {
        let dummy = ReusableField::dummy("deployment_id");
        let field = dummy.field();

        assert!(dummy.is_dummy());
        assert_eq!(field.field_type, FieldType::Integer);
        assert!(!field.readable);
        assert!(!field.writable);
        assert!(field.reference.is_none());
    }

    #[test]
    fn test_on_delete_sql() {
        assert_eq!(OnDelete::Cascade.as_sql(), "CASCADE");
        assert_eq!(OnDelete::SetNull.as_sql(), "SET NULL");
        assert_eq!(OnDelete::default(), OnDelete::Restrict);
    }
}
