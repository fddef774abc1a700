//! Request context passed explicitly to request-scoped operations.
//!
//! Holds the current user, the roles held by that user and the active
//! settings. Nothing in this crate reads ambient global state; menus,
//! audit stamping and controllers all take a `&RequestContext`.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::i18n::{Catalog, Translator};
use crate::settings::Settings;
use crate::value::RecordId;

/// Context for a single inbound request.
#[derive(Clone)]
pub struct RequestContext {
    user_id: Option<RecordId>,
    roles: BTreeSet<String>,
    settings: Arc<Settings>,
    translator: Arc<dyn Translator>,
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("user_id", &self.user_id)
            .field("roles", &self.roles)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl RequestContext {
    /// Create an anonymous context over the given settings.
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            user_id: None,
            roles: BTreeSet::new(),
            settings,
            translator: Arc::new(Catalog::default()),
        }
    }

    /// Context with default settings, mainly for tools and tests.
    pub fn anonymous() -> Self {
        Self::new(Arc::new(Settings::default()))
    }

    pub fn with_user(mut self, user_id: RecordId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Use `translator` for every label this context renders.
    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn user_id(&self) -> Option<RecordId> {
        self.user_id
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// True if the user holds the administrator role.
    pub fn is_admin(&self) -> bool {
        self.has_role(&self.settings.system_roles.admin)
    }

    /// True if the user holds any of `roles`. An empty list is unrestricted.
    pub fn has_any_role(&self, roles: &[String]) -> bool {
        roles.is_empty() || roles.iter().any(|r| self.has_role(r))
    }

    /// Translate a user-facing label.
    pub fn t(&self, key: &str) -> String {
        self.translator.translate(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles() {
        let ctx = RequestContext::anonymous().with_user(3).with_role("ADMIN");

        assert_eq!(ctx.user_id(), Some(3));
        assert!(ctx.is_admin());
        assert!(ctx.has_any_role(&["EDITOR".to_string(), "ADMIN".to_string()]));
        assert!(ctx.has_any_role(&[]));
    }

    #[test]
    fn test_anonymous_has_no_roles() {
        let ctx = RequestContext::anonymous();

        assert_eq!(ctx.user_id(), None);
        assert!(!ctx.is_admin());
        assert!(!ctx.has_any_role(&["ADMIN".to_string()]));
    }

    #[test]
    fn test_translation_passthrough() {
        let ctx = RequestContext::anonymous();
        assert_eq!(ctx.t("List All"), "List All");
    }

    struct Shouting;

    impl Translator for Shouting {
        fn translate(&self, key: &str) -> String {
            key.to_uppercase()
        }
    }

    #[test]
    fn test_custom_translator() {
        let ctx = RequestContext::anonymous().with_translator(Arc::new(Shouting));
        assert_eq!(ctx.t("Members"), "MEMBERS");

        let catalog = Catalog::new("fr").with("Members", "Membres");
        let ctx = ctx.with_translator(Arc::new(catalog));
        assert_eq!(ctx.t("Members"), "Membres");
        assert!(format!("{:?}", ctx).starts_with("RequestContext"));
    }
}
