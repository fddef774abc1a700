//! Label translation.
//!
//! Every user-facing label is looked up by its literal English text. When no
//! translation exists the key itself is returned unmodified.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::ModelError;

/// Lookup of user-facing labels
pub trait Translator: Send + Sync {
    /// Translate `key`; implementations return `key` unchanged when unknown.
    fn translate(&self, key: &str) -> String;
}

/// Translation table for one language, loaded from YAML (`English: translated`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    strings: HashMap<String, String>,
}

impl Catalog {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: Some(language.into()),
            strings: HashMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, translation: impl Into<String>) -> Self {
        self.strings.insert(key.into(), translation.into());
        self
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Load a catalog from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            ModelError::Config(format!("Failed to read catalog {}: {}", path.display(), e))
        })?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ModelError::Config(format!("Failed to parse catalog YAML: {}", e)))
    }
}

impl Translator for Catalog {
    fn translate(&self, key: &str) -> String {
        self.strings
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_key_passes_through() {
        let catalog = Catalog::new("es").with("Deployments", "Despliegues");

        assert_eq!(catalog.translate("Deployments"), "Despliegues");
        assert_eq!(catalog.translate("New Deployment"), "New Deployment");
    }

    #[test]
    fn test_load_from_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("es.yaml");
        fs::write(&path, "language: es\nstrings:\n  Members: Miembros\n").unwrap();

        let catalog = Catalog::load_from_file(&path).unwrap();

        assert_eq!(catalog.language(), Some("es"));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.translate("Members"), "Miembros");
    }
}
