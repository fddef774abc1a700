//! Error types for model definition, validation and storage.

use crate::value::RecordId;
use std::fmt;

/// A validation failure attached to a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Field-level validation failures collected over a whole write.
///
/// The form layer shows each message next to its field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// First message for `field`, if any.
    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Error type for the storage seam
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    NoSuchTable(String),
    NoSuchRecord { table: String, id: RecordId },
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NoSuchTable(name) => write!(f, "Table not found in store: {}", name),
            StoreError::NoSuchRecord { table, id } => {
                write!(f, "Record {} not found in {}", id, table)
            }
            StoreError::Backend(msg) => write!(f, "Storage backend error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Error type for model operations
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    UnknownTable(String),
    UnknownField {
        table: String,
        field: String,
    },
    DuplicateTable(String),
    DuplicateField {
        table: String,
        field: String,
    },
    DuplicateComponent {
        parent: String,
        alias: String,
    },
    InvalidName(String),
    UnknownSuperEntity(String),
    UnknownReusableField(String),
    Validation(ValidationErrors),
    Restricted {
        table: String,
        child: String,
        count: usize,
    },
    NotFound {
        table: String,
        id: RecordId,
    },
    ModuleDisabled(String),
    Store(StoreError),
    Config(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::UnknownTable(name) => write!(f, "Unknown table: {}", name),
            ModelError::UnknownField { table, field } => {
                write!(f, "Unknown field '{}' in table {}", field, table)
            }
            ModelError::DuplicateTable(name) => write!(f, "Table already defined: {}", name),
            ModelError::DuplicateField { table, field } => {
                write!(f, "Field '{}' defined twice in table {}", field, table)
            }
            ModelError::DuplicateComponent { parent, alias } => {
                write!(f, "Component '{}' already registered for {}", alias, parent)
            }
            ModelError::InvalidName(name) => write!(f, "Invalid identifier: '{}'", name),
            ModelError::UnknownSuperEntity(name) => write!(f, "Unknown super-entity: {}", name),
            ModelError::UnknownReusableField(name) => {
                write!(f, "Reusable field not registered: {}", name)
            }
            ModelError::Validation(errors) => write!(f, "Validation error: {}", errors),
            ModelError::Restricted { table, child, count } => write!(
                f,
                "Cannot delete from {}: {} referencing row(s) in {}",
                table, count, child
            ),
            ModelError::NotFound { table, id } => write!(f, "Record {} not found in {}", id, table),
            ModelError::ModuleDisabled(module) => write!(f, "Module disabled: {}", module),
            ModelError::Store(err) => write!(f, "{}", err),
            ModelError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ModelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ModelError::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for ModelError {
    fn from(err: StoreError) -> Self {
        ModelError::Store(err)
    }
}

impl From<ValidationErrors> for ModelError {
    fn from(errors: ValidationErrors) -> Self {
        ModelError::Validation(errors)
    }
}
