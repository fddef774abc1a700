//! Deployment settings loader.
//!
//! Settings are read from YAML and passed explicitly to whatever needs them
//! (menus, controllers). Missing sections fall back to the defaults of the
//! relief-goods inventory template.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ModelError;

/// Top-level deployment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base: BaseSettings,
    /// Enabled modules in menu order
    pub modules: IndexMap<String, ModuleSettings>,
    pub req: RequestSettings,
    pub ui: UiSettings,
    pub hrm: HrmSettings,
    pub system_roles: SystemRoles,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseSettings {
    pub system_name: String,
    pub system_name_short: String,
}

impl Default for BaseSettings {
    fn default() -> Self {
        Self {
            system_name: "Relief Goods Inventory & Monitoring System".to_string(),
            system_name_short: "RGIMS".to_string(),
        }
    }
}

/// Per-module settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSettings {
    pub name_nice: String,
    /// Use ACLs to control access to this module
    pub restricted: bool,
    /// Role expression for module visibility, e.g. `|1|` for administrators
    pub access: Option<String>,
    /// Position in the main menu; `None` hides the module from it
    pub module_type: Option<u32>,
}

/// Request management settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestSettings {
    /// Allowed request types (`Stock`, `People`, `Other`); empty means all
    pub req_type: Vec<String>,
    pub use_commit: bool,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            req_type: vec!["Stock".to_string()],
            use_commit: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    /// Delay in milliseconds before filter forms auto-submit
    pub filter_auto_submit: Option<u32>,
    pub report_auto_submit: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HrmSettings {
    pub staff_experience: bool,
    pub use_skills: bool,
}

/// Names of the system roles
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SystemRoles {
    pub admin: String,
    pub authenticated: String,
    pub anonymous: String,
}

impl Default for SystemRoles {
    fn default() -> Self {
        Self {
            admin: "ADMIN".to_string(),
            authenticated: "AUTHENTICATED".to_string(),
            anonymous: "ANONYMOUS".to_string(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base: BaseSettings::default(),
            modules: default_modules(),
            req: RequestSettings::default(),
            ui: UiSettings::default(),
            hrm: HrmSettings::default(),
            system_roles: SystemRoles::default(),
        }
    }
}

fn module(name_nice: &str, restricted: bool, access: Option<&str>, module_type: Option<u32>) -> ModuleSettings {
    ModuleSettings {
        name_nice: name_nice.to_string(),
        restricted,
        access: access.map(str::to_string),
        module_type,
    }
}

fn default_modules() -> IndexMap<String, ModuleSettings> {
    let mut modules = IndexMap::new();
    modules.insert("default".to_string(), module("Home", false, None, None));
    modules.insert("admin".to_string(), module("Administration", true, Some("|1|"), None));
    modules.insert("gis".to_string(), module("Map", true, None, Some(6)));
    modules.insert("pr".to_string(), module("Person Registry", true, Some("|1|"), Some(10)));
    modules.insert("org".to_string(), module("Organizations", true, None, Some(2)));
    modules.insert("hrm".to_string(), module("Staff", true, None, Some(3)));
    modules.insert("doc".to_string(), module("Documents", true, None, Some(10)));
    modules.insert("supply".to_string(), module("Supply Chain Management", true, None, None));
    modules.insert("inv".to_string(), module("Warehouses", true, None, Some(1)));
    modules.insert("req".to_string(), module("Requests", true, None, Some(4)));
    modules.insert("deploy".to_string(), module("Deployments", true, None, Some(5)));
    modules
}

impl Settings {
    /// Load settings from a YAML file.
    ///
    /// # Arguments
    /// * `path` - Path to the settings file
    ///
    /// # Errors
    /// Returns `ModelError::Config` if the file cannot be read or parsed
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path).map_err(|e| {
            ModelError::Config(format!("Failed to read settings file {}: {}", path.display(), e))
        })?;

        Self::from_yaml_str(&contents)
    }

    /// Parse settings from YAML text.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ModelError> {
        let settings: Settings = serde_yaml::from_str(contents)
            .map_err(|e| ModelError::Config(format!("Failed to parse settings YAML: {}", e)))?;
        tracing::debug!(
            system = %settings.base.system_name_short,
            modules = settings.modules.len(),
            "Loaded settings"
        );
        Ok(settings)
    }

    /// Whether `name` is an enabled module.
    pub fn has_module(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Nice name of a module, falling back to the module prefix.
    pub fn module_name_nice(&self, name: &str) -> String {
        self.modules
            .get(name)
            .map(|m| m.name_nice.clone())
            .unwrap_or_else(|| name.to_string())
    }

    /// Allowed request types; an empty list means every type.
    pub fn req_types(&self) -> Vec<String> {
        if self.req.req_type.is_empty() {
            vec!["Stock".to_string(), "People".to_string(), "Other".to_string()]
        } else {
            self.req.req_type.clone()
        }
    }
}
