//! One-to-many component relationships.
//!
//! A component names a child relation under a parent, independently of the
//! physical foreign key, so generic code can list the children of a record
//! without knowing the join.

use serde::Serialize;

/// Child relation `child` whose `fk` references `parent.id`, addressed as
/// `alias` under the parent.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Component {
    pub parent: String,
    pub child: String,
    pub fk: String,
    pub alias: String,
}

impl Component {
    /// Declare `child` as a component of `parent` linked through `fk`.
    ///
    /// The alias defaults to the child name without its module prefix
    /// (`deploy_alert_recipient` -> `alert_recipient`).
    pub fn new(child: &str, parent: &str, fk: &str) -> Self {
        Self {
            parent: parent.to_string(),
            child: child.to_string(),
            fk: fk.to_string(),
            alias: default_alias(child),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }
}

fn default_alias(table: &str) -> String {
    match table.split_once('_') {
        Some((_, rest)) if !rest.is_empty() => rest.to_string(),
        _ => table.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_alias() {
        let component = Component::new(
            "deploy_human_resource_assignment",
            "deploy_deployment",
            "deployment_id",
        );
        assert_eq!(component.alias, "human_resource_assignment");
        assert_eq!(Component::new("document", "x", "doc_id").alias, "document");
    }

    #[test]
    fn test_explicit_alias() {
        let component = Component::new("doc_document", "doc_entity", "doc_id").alias("file");
        assert_eq!(component.alias, "file");
        assert_eq!(component.child, "doc_document");
    }
}
