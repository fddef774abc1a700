//! Navigation menus.
//!
//! Menus are built as trees of [`MenuItem`] values and resolved against a
//! [`RequestContext`] on every request. Resolution is pure: it drops items
//! the current user may not see, fills in inherited controller/function
//! names, translates labels and builds URLs. The result is a plain
//! serializable [`ResolvedMenu`]; turning it into HTML is up to the caller.

pub mod options;

pub use options::{options_menu, resolve_options_menu};

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::context::RequestContext;

/// Visibility predicate evaluated per request
pub type Check = Arc<dyn Fn(&RequestContext) -> bool + Send + Sync>;

/// A menu entry and its sub-entries
#[derive(Clone, Default)]
pub struct MenuItem {
    label: Option<String>,
    c: Option<String>,
    f: Option<String>,
    m: Option<String>,
    p: Option<String>,
    vars: Vec<(String, String)>,
    restrict: Vec<String>,
    check: Option<Check>,
    children: Vec<MenuItem>,
}

impl fmt::Debug for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MenuItem")
            .field("label", &self.label)
            .field("c", &self.c)
            .field("f", &self.f)
            .field("m", &self.m)
            .field("restrict", &self.restrict)
            .field("check", &self.check.is_some())
            .field("children", &self.children)
            .finish()
    }
}

impl MenuItem {
    /// Labelled entry.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Default::default()
        }
    }

    /// Unlabelled container, usually the top of an options menu.
    pub fn root() -> Self {
        Self::default()
    }

    /// Controller
    pub fn c(mut self, controller: impl Into<String>) -> Self {
        self.c = Some(controller.into());
        self
    }

    /// Function
    pub fn f(mut self, function: impl Into<String>) -> Self {
        self.f = Some(function.into());
        self
    }

    /// Method, e.g. `create` or `search`
    pub fn m(mut self, method: impl Into<String>) -> Self {
        self.m = Some(method.into());
        self
    }

    /// Method whose permission the entry requires when it differs from `m`
    pub fn p(mut self, method: impl Into<String>) -> Self {
        self.p = Some(method.into());
        self
    }

    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.push((key.into(), value.into()));
        self
    }

    /// Show only to users holding one of `roles`.
    pub fn restrict(mut self, roles: &[&str]) -> Self {
        self.restrict = roles.iter().map(|r| r.to_string()).collect();
        self
    }

    /// Show only when `check` holds for the request.
    pub fn check<F>(mut self, check: F) -> Self
    where
        F: Fn(&RequestContext) -> bool + Send + Sync + 'static,
    {
        self.check = Some(Arc::new(check));
        self
    }

    pub fn child(mut self, item: MenuItem) -> Self {
        self.children.push(item);
        self
    }

    pub fn children(mut self, items: impl IntoIterator<Item = MenuItem>) -> Self {
        self.children.extend(items);
        self
    }

    /// Resolve for one request; `None` if the item is hidden.
    pub fn resolve(&self, ctx: &RequestContext) -> Option<ResolvedMenu> {
        self.resolve_in(ctx, None, None)
    }

    fn visible(&self, ctx: &RequestContext) -> bool {
        ctx.has_any_role(&self.restrict) && self.check.as_ref().map(|check| check(ctx)).unwrap_or(true)
    }

    fn resolve_in(
        &self,
        ctx: &RequestContext,
        parent_c: Option<&str>,
        parent_f: Option<&str>,
    ) -> Option<ResolvedMenu> {
        if !self.visible(ctx) {
            return None;
        }

        let c = self.c.as_deref().or(parent_c);
        // A new controller starts over at its index unless a function is given
        let f = match (&self.f, &self.c) {
            (Some(f), _) => Some(f.as_str()),
            (None, None) => parent_f,
            (None, Some(_)) => None,
        };

        let children = self
            .children
            .iter()
            .filter_map(|child| child.resolve_in(ctx, c, f))
            .collect();

        let url = c.map(|c| {
            let mut url = format!("/{}/{}", c, f.unwrap_or("index"));
            if let Some(m) = &self.m {
                url.push('/');
                url.push_str(m);
            }
            if !self.vars.is_empty() {
                let query: Vec<String> = self.vars.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                url.push('?');
                url.push_str(&query.join("&"));
            }
            url
        });

        Some(ResolvedMenu {
            label: self.label.as_deref().map(|l| ctx.t(l)),
            url,
            permission: self.p.clone().or_else(|| self.m.clone()),
            children,
        })
    }
}

/// A menu tree after visibility and inheritance have been applied
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResolvedMenu {
    pub label: Option<String>,
    pub url: Option<String>,
    /// Method whose permission the entry needs (`None` for plain reads)
    pub permission: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ResolvedMenu>,
}

impl ResolvedMenu {
    /// First item with `label`, depth first.
    pub fn find(&self, label: &str) -> Option<&ResolvedMenu> {
        if self.label.as_deref() == Some(label) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(label))
    }

    /// Labels of the direct children.
    pub fn labels(&self) -> Vec<&str> {
        self.children
            .iter()
            .filter_map(|c| c.label.as_deref())
            .collect()
    }
}
