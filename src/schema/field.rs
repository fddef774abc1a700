//! Field definitions, value coercion and the standard meta fields.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use convert_case::{Case, Casing};
use serde::Serialize;

use crate::schema::reference::ReferenceSpec;
use crate::value::FieldValue;

/// Column type of a field
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "target")]
pub enum FieldType {
    String,
    Text,
    Integer,
    Boolean,
    Date,
    DateTime,
    Uuid,
    /// Foreign key to the `id` of a relation
    Reference(String),
    /// Key into a super-entity's identity space
    SuperLink(String),
}

/// RFC 3339, or a zone-less `YYYY-MM-DD HH:MM:SS` taken as UTC.
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .map(|dt| dt.and_utc())
        })
}

impl FieldType {
    /// Coerce an incoming value to this type.
    ///
    /// `Null` always passes; numeric and date strings (as sent by forms and
    /// JSON clients) are parsed.
    pub fn coerce(&self, value: FieldValue) -> Result<FieldValue, String> {
        if matches!(value, FieldValue::Null) {
            return Ok(value);
        }
        match self {
            FieldType::String | FieldType::Text | FieldType::Uuid => match value {
                FieldValue::String(_) => Ok(value),
                FieldValue::List(_) => Err("Expected a text value".to_string()),
                other => Ok(FieldValue::String(other.to_string())),
            },
            FieldType::Integer | FieldType::Reference(_) | FieldType::SuperLink(_) => match &value {
                FieldValue::String(s) if s.trim().is_empty() => Ok(FieldValue::Null),
                _ => value
                    .as_i64()
                    .map(FieldValue::Int)
                    .ok_or_else(|| "Enter an integer".to_string()),
            },
            FieldType::Boolean => match value {
                FieldValue::Bool(_) => Ok(value),
                FieldValue::Int(i) => Ok(FieldValue::Bool(i != 0)),
                FieldValue::String(s) => match s.to_lowercase().as_str() {
                    "true" | "on" | "1" => Ok(FieldValue::Bool(true)),
                    "false" | "off" | "0" | "" => Ok(FieldValue::Bool(false)),
                    _ => Err("Enter true or false".to_string()),
                },
                _ => Err("Enter true or false".to_string()),
            },
            FieldType::Date => match value {
                FieldValue::Date(_) => Ok(value),
                FieldValue::DateTime(dt) => Ok(FieldValue::Date(dt.date_naive())),
                FieldValue::String(s) if s.trim().is_empty() => Ok(FieldValue::Null),
                FieldValue::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .map(FieldValue::Date)
                    .map_err(|_| "Enter a date as YYYY-MM-DD".to_string()),
                _ => Err("Enter a date as YYYY-MM-DD".to_string()),
            },
            FieldType::DateTime => match value {
                FieldValue::DateTime(_) => Ok(value),
                FieldValue::String(s) if s.trim().is_empty() => Ok(FieldValue::Null),
                FieldValue::String(s) => parse_datetime(s.trim())
                    .map(FieldValue::DateTime)
                    .ok_or_else(|| "Enter a date and time (RFC 3339)".to_string()),
                _ => Err("Enter a date and time (RFC 3339)".to_string()),
            },
        }
    }

    /// Target relation for references.
    pub fn reference_target(&self) -> Option<&str> {
        match self {
            FieldType::Reference(target) => Some(target),
            _ => None,
        }
    }
}

/// Write-time validators beyond type coercion
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Validator {
    /// Reject empty values
    NotEmpty,
    /// Value must be one of the listed options
    IsIn(Vec<FieldValue>),
}

impl Validator {
    pub fn validate(&self, value: &FieldValue) -> Result<(), String> {
        match self {
            Validator::NotEmpty if value.is_empty() => Err("Enter a value".to_string()),
            Validator::NotEmpty => Ok(()),
            Validator::IsIn(_) if value.is_empty() => Ok(()),
            Validator::IsIn(options) if options.contains(value) => Ok(()),
            Validator::IsIn(_) => Err("Value not allowed".to_string()),
        }
    }
}

/// A column of a relation
#[derive(Debug, Clone, Serialize)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    /// User-facing label (translation key)
    pub label: String,
    /// Column-level NOT NULL constraint
    pub not_null: bool,
    pub default: Option<FieldValue>,
    pub readable: bool,
    pub writable: bool,
    pub validators: Vec<Validator>,
    /// Present for reference fields built by a [`ReusableField`](crate::schema::ReusableField)
    pub reference: Option<ReferenceSpec>,
    pub comment: Option<String>,
}

impl FieldDef {
    /// Create a field with a label derived from its name.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        let label = default_label(&name);
        Self {
            name,
            field_type,
            label,
            not_null: false,
            default: None,
            readable: true,
            writable: true,
            validators: Vec::new(),
            reference: None,
            comment: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Date)
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn requires(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.readable = false;
        self.writable = false;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// True if a write must supply a non-empty value.
    pub fn is_required(&self) -> bool {
        self.validators.contains(&Validator::NotEmpty)
            || self.reference.as_ref().map(|r| r.required).unwrap_or(false)
    }
}

/// Title-case label from a field name (`start_date` -> `Start Date`).
pub fn default_label(name: &str) -> String {
    name.to_case(Case::Title)
}

/// Free-text comments field.
pub fn comments() -> FieldDef {
    FieldDef::new("comments", FieldType::Text)
}

/// Key field linking a row to its super-entity instance.
pub fn super_link(key: &str, super_entity: &str) -> FieldDef {
    FieldDef::new(key, FieldType::SuperLink(super_entity.to_string())).hidden()
}

/// Names of the audit fields appended to every relation.
pub const META_FIELD_NAMES: [&str; 6] = [
    "uuid",
    "created_on",
    "created_by",
    "modified_on",
    "modified_by",
    "deleted",
];

/// Standard audit fields: record UUID, creator and creation time, last
/// modifier and modification time, soft-delete flag.
pub fn meta_fields() -> Vec<FieldDef> {
    vec![
        FieldDef::new("uuid", FieldType::Uuid).label("UUID").hidden(),
        FieldDef::new("created_on", FieldType::DateTime).label("Created On").read_only(),
        FieldDef::integer("created_by").label("Created By").read_only(),
        FieldDef::new("modified_on", FieldType::DateTime).label("Modified On").read_only(),
        FieldDef::integer("modified_by").label("Modified By").read_only(),
        FieldDef::new("deleted", FieldType::Boolean)
            .default_value(false)
            .not_null()
            .hidden(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_label() {
        assert_eq!(default_label("start_date"), "Start Date");
        assert_eq!(default_label("title"), "Title");
    }

    #[test]
    fn test_coerce_integer_from_form_string() {
        assert_eq!(FieldType::Integer.coerce(FieldValue::from("42")), Ok(FieldValue::Int(42)));
        assert_eq!(FieldType::Integer.coerce(FieldValue::from("")), Ok(FieldValue::Null));
        assert!(FieldType::Integer.coerce(FieldValue::from("many")).is_err());
    }

    #[test]
    fn test_coerce_date() {
        let date = NaiveDate::from_ymd_opt(2013, 11, 30).unwrap();
        assert_eq!(
            FieldType::Date.coerce(FieldValue::from("2013-11-30")),
            Ok(FieldValue::Date(date))
        );
        assert!(FieldType::Date.coerce(FieldValue::from("30/11/2013")).is_err());
    }

    #[test]
    fn test_coerce_datetime() {
        let expected = Utc.with_ymd_and_hms(2015, 4, 25, 6, 11, 26).unwrap();
        for text in ["2015-04-25T06:11:26Z", "2015-04-25T08:11:26+02:00", "2015-04-25 06:11:26.000000"] {
            assert_eq!(
                FieldType::DateTime.coerce(FieldValue::from(text)),
                Ok(FieldValue::DateTime(expected))
            );
        }
        assert!(FieldType::DateTime.coerce(FieldValue::from("25/04/2015")).is_err());
    }

    #[test]
    fn test_validators() {
        assert!(Validator::NotEmpty.validate(&FieldValue::from("  ")).is_err());
        assert!(Validator::NotEmpty.validate(&FieldValue::from("Haiyan")).is_ok());

        let levels = Validator::IsIn(vec![FieldValue::from("L0"), FieldValue::from("L1")]);
        assert!(levels.validate(&FieldValue::from("L1")).is_ok());
        assert!(levels.validate(&FieldValue::from("L9")).is_err());
        assert!(levels.validate(&FieldValue::Null).is_ok());
    }

    #[test]
    fn test_meta_fields() {
        let names: Vec<String> = meta_fields().into_iter().map(|f| f.name).collect();
        assert_eq!(names, META_FIELD_NAMES.to_vec());
    }
}
