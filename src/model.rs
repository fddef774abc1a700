//! Model registry.
//!
//! The [`Model`] holds every relation, super-entity, component, view setting
//! and reusable field. It is assembled once at startup from a list of
//! [`ModelModule`]s and is read-only afterwards (share it as `Arc<Model>`).

use indexmap::IndexMap;
use regex::Regex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::OnceLock;

use crate::error::ModelError;
use crate::schema::field::{meta_fields, super_link, FieldDef};
use crate::schema::reference::{ReferenceSpec, ReusableField};
use crate::schema::view::{FilterWidget, FormElement, ViewConfig};
use crate::schema::{Component, SuperEntity, TableDef};
use crate::settings::Settings;

/// A group of related relations that is enabled or disabled as a unit.
///
/// `model` registers the real definitions. When the module is disabled,
/// `defaults` registers safe placeholders for the names other modules
/// depend on (typically dummy reusable fields).
pub trait ModelModule: Send + Sync {
    /// Module prefix as used in settings, e.g. `deploy`
    fn prefix(&self) -> &str;

    /// Unique name of this model within the module
    fn name(&self) -> &str;

    /// Names of models that must be loaded first
    fn requires(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Register definitions.
    fn model(&self, model: &mut Model) -> Result<(), ModelError>;

    /// Register placeholders when the module is disabled.
    fn defaults(&self, _model: &mut Model) -> Result<(), ModelError> {
        Ok(())
    }
}

/// Registry of relations and their metadata
#[derive(Debug, Default)]
pub struct Model {
    tables: IndexMap<String, TableDef>,
    super_entities: IndexMap<String, SuperEntity>,
    /// parent -> alias -> component
    components: IndexMap<String, IndexMap<String, Component>>,
    views: HashMap<String, ViewConfig>,
    reusable: HashMap<String, ReusableField>,
}

static IDENTIFIER: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

fn valid_identifier(name: &str) -> bool {
    IDENTIFIER
        .get_or_init(|| Regex::new(r"^[a-z][a-z0-9_]*$"))
        .as_ref()
        .map(|re| re.is_match(name))
        .unwrap_or(false)
}

impl Model {
    /// Create a new empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a model from modules, honoring the enabled modules in `settings`.
    ///
    /// Modules are loaded in dependency order; a disabled module contributes
    /// only its defaults. The assembled model is checked for dangling
    /// references before it is returned.
    pub fn load(modules: &[Box<dyn ModelModule>], settings: &Settings) -> Result<Self, ModelError> {
        let names: Vec<String> = modules.iter().map(|m| m.name().to_string()).collect();
        let deps: HashMap<String, Vec<String>> = modules
            .iter()
            .map(|m| {
                (
                    m.name().to_string(),
                    m.requires().into_iter().map(str::to_string).collect(),
                )
            })
            .collect();
        let order = dependency_order(&names, &deps).map_err(ModelError::Config)?;

        let mut model = Model::new();
        for name in &order {
            let module = modules
                .iter()
                .find(|m| m.name() == name.as_str())
                .ok_or_else(|| ModelError::Config(format!("Unknown model {}", name)))?;

            if settings.has_module(module.prefix()) {
                tracing::debug!("Loading model {}", name);
                module.model(&mut model)?;
            } else {
                tracing::info!("Module {} disabled, using defaults for {}", module.prefix(), name);
                module.defaults(&mut model)?;
            }
        }

        model.check()?;
        Ok(model)
    }

    /// Register a super-entity and its mapping relation.
    pub fn define_super_entity(&mut self, super_entity: SuperEntity) -> Result<(), ModelError> {
        if !valid_identifier(&super_entity.key) {
            return Err(ModelError::InvalidName(super_entity.key.clone()));
        }
        let table = super_entity.table();
        self.super_entities
            .insert(super_entity.name.clone(), super_entity);
        self.define_table(table)?;
        Ok(())
    }

    /// Register a relation.
    ///
    /// Adds the super-entity key (first) when the relation is attached to a
    /// super-entity, and appends the meta fields.
    ///
    /// # Errors
    /// * `InvalidName` for table or field names that are not lowercase identifiers
    /// * `DuplicateTable` / `DuplicateField`
    /// * `UnknownSuperEntity` if the super-entity was not registered
    pub fn define_table(&mut self, mut table: TableDef) -> Result<&TableDef, ModelError> {
        if !valid_identifier(&table.name) {
            return Err(ModelError::InvalidName(table.name));
        }
        if self.tables.contains_key(&table.name) {
            return Err(ModelError::DuplicateTable(table.name));
        }

        if let Some(super_entity) = &table.super_entity {
            let registered = self
                .super_entities
                .get(&super_entity.name)
                .ok_or_else(|| ModelError::UnknownSuperEntity(super_entity.name.clone()))?;
            if table.field(&registered.key).is_none() {
                table
                    .fields
                    .insert(0, super_link(&registered.key, &registered.name));
            }
        }

        for meta in meta_fields() {
            if table.field(&meta.name).is_none() {
                table.fields.push(meta);
            }
        }

        let mut seen = HashSet::new();
        let field_names = table
            .fields
            .iter()
            .map(|f| &f.name)
            .chain(table.virtual_fields.iter().map(|f| &f.name));
        for name in field_names {
            if !valid_identifier(name) || name == "id" {
                return Err(ModelError::InvalidName(name.clone()));
            }
            if !seen.insert(name.clone()) {
                return Err(ModelError::DuplicateField {
                    table: table.name.clone(),
                    field: name.clone(),
                });
            }
        }

        tracing::debug!("Defined table {} ({} fields)", table.name, table.fields.len());
        let name = table.name.clone();
        let entry = self.tables.entry(name).or_insert(table);
        Ok(entry)
    }

    /// Get a relation by name.
    pub fn table(&self, name: &str) -> Result<&TableDef, ModelError> {
        self.tables
            .get(name)
            .ok_or_else(|| ModelError::UnknownTable(name.to_string()))
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// All relations in definition order.
    pub fn tables(&self) -> impl Iterator<Item = &TableDef> {
        self.tables.values()
    }

    pub fn super_entity(&self, name: &str) -> Option<&SuperEntity> {
        self.super_entities.get(name)
    }

    /// Attach presentation settings to a relation.
    ///
    /// List columns and filter fields must name stored or virtual fields.
    pub fn configure(&mut self, table: &str, view: ViewConfig) -> Result<(), ModelError> {
        let def = self.table(table)?;

        let mut selectors: Vec<&str> = view.list_fields.iter().map(|f| f.selector.as_str()).collect();
        for widget in &view.filter_widgets {
            match widget {
                FilterWidget::Text { fields, .. } => selectors.extend(fields.iter().map(String::as_str)),
                FilterWidget::Location { field, .. } => selectors.push(field),
            }
        }
        for element in &view.crud_form {
            if let FormElement::Field { name } = element {
                selectors.push(name);
            }
        }
        if let Some(order) = &view.orderby {
            selectors.push(&order.field);
        }

        for selector in selectors {
            if !def.has_field(selector) && def.virtual_field(selector).is_none() {
                return Err(ModelError::UnknownField {
                    table: table.to_string(),
                    field: selector.to_string(),
                });
            }
        }

        self.views.insert(table.to_string(), view);
        Ok(())
    }

    pub fn view(&self, table: &str) -> Option<&ViewConfig> {
        self.views.get(table)
    }

    /// Declare a one-to-many component.
    ///
    /// # Errors
    /// * `UnknownTable` if either side is not defined
    /// * `UnknownField` if `fk` is not a field of the child
    /// * `DuplicateComponent` if the alias is taken under the parent
    pub fn add_component(&mut self, component: Component) -> Result<(), ModelError> {
        self.table(&component.parent)?;
        let child = self.table(&component.child)?;
        if child.field(&component.fk).is_none() {
            return Err(ModelError::UnknownField {
                table: component.child.clone(),
                field: component.fk.clone(),
            });
        }

        let aliases = self.components.entry(component.parent.clone()).or_default();
        if aliases.contains_key(&component.alias) {
            return Err(ModelError::DuplicateComponent {
                parent: component.parent.clone(),
                alias: component.alias.clone(),
            });
        }
        tracing::debug!(
            "Component {}.{} -> {}.{}",
            component.parent,
            component.alias,
            component.child,
            component.fk
        );
        aliases.insert(component.alias.clone(), component);
        Ok(())
    }

    /// Components registered under `parent`.
    pub fn components(&self, parent: &str) -> impl Iterator<Item = &Component> {
        self.components
            .get(parent)
            .into_iter()
            .flat_map(|aliases| aliases.values())
    }

    pub fn component(&self, parent: &str, alias: &str) -> Option<&Component> {
        self.components.get(parent).and_then(|aliases| aliases.get(alias))
    }

    /// Make a reusable field available to later modules under `name`.
    pub fn add_reusable(&mut self, name: impl Into<String>, field: ReusableField) {
        self.reusable.insert(name.into(), field);
    }

    pub fn reusable(&self, name: &str) -> Result<&ReusableField, ModelError> {
        self.reusable
            .get(name)
            .ok_or_else(|| ModelError::UnknownReusableField(name.to_string()))
    }

    /// Every reference field, in any relation, that targets `table`.
    pub fn references_to<'a>(
        &'a self,
        table: &'a str,
    ) -> impl Iterator<Item = (&'a TableDef, &'a FieldDef, &'a ReferenceSpec)> + 'a {
        self.tables.values().flat_map(move |def| {
            def.references()
                .filter(move |(_, spec)| spec.target == table)
                .map(move |(field, spec)| (def, field, spec))
        })
    }

    /// Check that every reference, representation and inline form component
    /// points at something that exists.
    pub fn check(&self) -> Result<(), ModelError> {
        for def in self.tables.values() {
            for (field, spec) in def.references() {
                let target = self.table(&spec.target)?;
                if let Some((filter_field, _)) = &spec.filter {
                    if !target.has_field(filter_field) {
                        return Err(ModelError::UnknownField {
                            table: spec.target.clone(),
                            field: filter_field.clone(),
                        });
                    }
                }
                self.table(&spec.represent.lookup)?;
                if let Some((via, _)) = &spec.represent.via {
                    self.table(via)?;
                }
                tracing::trace!("{}.{} -> {}", def.name, field.name, spec.target);
            }
        }

        for (table, view) in &self.views {
            for element in &view.crud_form {
                if let FormElement::Inline { component, .. } = element {
                    if self.component(table, component).is_none()
                        && !self.super_component_exists(table, component)
                    {
                        return Err(ModelError::Config(format!(
                            "Inline component '{}' is not a component of {}",
                            component, table
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Components may also hang off the relation's super-entity.
    fn super_component_exists(&self, table: &str, alias: &str) -> bool {
        self.tables
            .get(table)
            .and_then(|def| def.super_entity.as_ref())
            .map(|s| self.component(&s.name, alias).is_some())
            .unwrap_or(false)
    }

    /// Resolve a component of `table` or of its super-entity.
    pub fn resolve_component(&self, table: &str, alias: &str) -> Option<&Component> {
        self.component(table, alias).or_else(|| {
            let super_entity = self.tables.get(table)?.super_entity.as_ref()?;
            self.component(&super_entity.name, alias)
        })
    }
}

/// Order names so that every name comes after its dependencies (Kahn's
/// algorithm). Input order is preserved among independent names.
///
/// # Errors
/// Returns an error message on unknown dependencies or cycles.
pub fn dependency_order(
    names: &[String],
    deps: &HashMap<String, Vec<String>>,
) -> Result<Vec<String>, String> {
    let mut in_degree: HashMap<&str, usize> = names.iter().map(|n| (n.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for name in names {
        for dep in deps.get(name).into_iter().flatten() {
            if !in_degree.contains_key(dep.as_str()) {
                return Err(format!("'{}' depends on undefined '{}'", name, dep));
            }
            if let Some(degree) = in_degree.get_mut(name.as_str()) {
                *degree += 1;
            }
            dependents.entry(dep.as_str()).or_default().push(name.as_str());
        }
    }

    let mut queue: VecDeque<&str> = names
        .iter()
        .map(String::as_str)
        .filter(|n| in_degree.get(n) == Some(&0))
        .collect();
    let mut sorted = Vec::with_capacity(names.len());

    while let Some(name) = queue.pop_front() {
        sorted.push(name.to_string());
        for dependent in dependents.get(name).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(*dependent);
                }
            }
        }
    }

    if sorted.len() != names.len() {
        let unprocessed: Vec<&str> = names
            .iter()
            .map(String::as_str)
            .filter(|n| !sorted.iter().any(|s| s == n))
            .collect();
        return Err(format!("Circular dependency involving: {:?}", unprocessed));
    }

    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field::FieldDef;
    use crate::schema::view::ListField;
    use crate::schema::{OnDelete, VirtualField};

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn deps(items: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), names(v)))
            .collect()
    }

    #[test]
    fn test_define_table_adds_meta_and_super_link() {
        let mut model = Model::new();
        model
            .define_super_entity(SuperEntity::new("doc_entity", "doc_id"))
            .unwrap();

        let table = model
            .define_table(
                TableDef::new("deploy_deployment")
                    .with_field(FieldDef::string("title"))
                    .super_entity(SuperEntity::new("doc_entity", "doc_id")),
            )
            .unwrap();

        let columns = table.column_names();
        assert_eq!(columns[0], "id");
        assert_eq!(columns[1], "doc_id");
        assert_eq!(columns[2], "title");
        assert!(columns.contains(&"uuid"));
        assert!(columns.contains(&"deleted"));
        assert!(model.has_table("deploy_deployment"));
        assert!(model.has_table("doc_entity"));
    }

    #[test]
    fn test_valid_identifier() {
        for _ in 0..3 {
            assert!(valid_identifier("deploy_alert_recipient"));
            assert!(valid_identifier("l0"));
            assert!(!valid_identifier("Deploy"));
            assert!(!valid_identifier("1st_table"));
            assert!(!valid_identifier("deploy-alert"));
            assert!(!valid_identifier(""));
        }
        assert!(IDENTIFIER.get().is_some_and(|re| re.is_ok()));
    }

    #[test]
    fn test_define_table_errors() {
        let mut model = Model::new();
        model.define_table(TableDef::new("deploy_alert")).unwrap();

        assert!(matches!(
            model.define_table(TableDef::new("deploy_alert")),
            Err(ModelError::DuplicateTable(_))
        ));
        assert!(matches!(
            model.define_table(TableDef::new("Deploy Alert")),
            Err(ModelError::InvalidName(_))
        ));
        assert!(matches!(
            model.define_table(
                TableDef::new("x_dup")
                    .with_field(FieldDef::string("a"))
                    .with_field(FieldDef::string("a"))
            ),
            Err(ModelError::DuplicateField { .. })
        ));
        assert!(matches!(
            model.define_table(
                TableDef::new("x_super").super_entity(SuperEntity::new("pr_pentity", "pe_id"))
            ),
            Err(ModelError::UnknownSuperEntity(_))
        ));
    }

    #[test]
    fn test_components() {
        let mut model = Model::new();
        model.define_table(TableDef::new("deploy_alert")).unwrap();
        let alert_id = ReusableField::reference("alert_id", "deploy_alert").on_delete(OnDelete::Cascade);
        model
            .define_table(TableDef::new("deploy_alert_recipient").with_field(alert_id.field()))
            .unwrap();

        model
            .add_component(Component::new("deploy_alert_recipient", "deploy_alert", "alert_id"))
            .unwrap();

        let component = model.component("deploy_alert", "alert_recipient").unwrap();
        assert_eq!(component.fk, "alert_id");
        assert_eq!(model.components("deploy_alert").count(), 1);
        assert_eq!(model.components("deploy_alert_recipient").count(), 0);

        assert!(matches!(
            model.add_component(Component::new("deploy_alert_recipient", "deploy_alert", "alert_id")),
            Err(ModelError::DuplicateComponent { .. })
        ));
        assert!(matches!(
            model.add_component(
                Component::new("deploy_alert_recipient", "deploy_alert", "parent_id").alias("other")
            ),
            Err(ModelError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_configure_validates_selectors() {
        let mut model = Model::new();
        model
            .define_table(
                TableDef::new("deploy_deployment")
                    .with_field(FieldDef::string("title"))
                    .with_virtual(VirtualField::count_of("hrquantity", "x", "y")),
            )
            .unwrap();

        let view = ViewConfig {
            list_fields: vec![ListField::new("title"), ListField::labeled("Members", "hrquantity")],
            ..Default::default()
        };
        model.configure("deploy_deployment", view).unwrap();
        assert!(model.view("deploy_deployment").is_some());

        let bad = ViewConfig {
            list_fields: vec![ListField::new("nonexistent")],
            ..Default::default()
        };
        assert!(matches!(
            model.configure("deploy_deployment", bad),
            Err(ModelError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_check_dangling_reference() {
        let mut model = Model::new();
        let location_id = ReusableField::reference("location_id", "gis_location").optional();
        model
            .define_table(TableDef::new("deploy_deployment").with_field(location_id.field()))
            .unwrap();

        assert!(matches!(model.check(), Err(ModelError::UnknownTable(t)) if t == "gis_location"));
    }

    #[test]
    fn test_references_to() {
        let mut model = Model::new();
        model.define_table(TableDef::new("deploy_deployment")).unwrap();
        let deployment_id = ReusableField::reference("deployment_id", "deploy_deployment");
        model
            .define_table(TableDef::new("deploy_alert").with_field(deployment_id.field()))
            .unwrap();
        model
            .define_table(TableDef::new("deploy_response").with_field(deployment_id.field()))
            .unwrap();

        let referencing: Vec<&str> = model
            .references_to("deploy_deployment")
            .map(|(table, _, _)| table.name.as_str())
            .collect();
        assert_eq!(referencing, vec!["deploy_alert", "deploy_response"]);
    }

    #[test]
    fn test_dependency_order_linear_chain() {
        let order = dependency_order(
            &names(&["c", "b", "a"]),
            &deps(&[("c", &["b"]), ("b", &["a"])]),
        )
        .unwrap();

        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_dependency_order_keeps_input_order() {
        let order = dependency_order(&names(&["x", "y", "z"]), &HashMap::new()).unwrap();
        assert_eq!(order, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_dependency_order_cycle() {
        let result = dependency_order(&names(&["a", "b"]), &deps(&[("a", &["b"]), ("b", &["a"])]));
        assert!(result.unwrap_err().contains("Circular dependency"));
    }

    #[test]
    fn test_dependency_order_missing() {
        let result = dependency_order(&names(&["a"]), &deps(&[("a", &["b"])]));
        assert!(result.unwrap_err().contains("undefined"));
    }
}
