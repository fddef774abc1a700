//! # deploy-model: Deployment and Alert Data Model
//!
//! A declarative relational model for deploying human resources to
//! emergencies and alerting them. Relations are assembled from modules into
//! a read-only [`Model`], written through a validating [`Db`] over any
//! [`Store`] and presented through generic CRUD resources and options menus.
//!
//! ## Features
//!
//! - **Table definer**: relations with audit/meta fields, validators and defaults
//! - **Reusable reference fields**: one foreign-key definition shared by many relations,
//!   with delete policies and read-time represent
//! - **Super-entities**: shared identity spaces (`doc_entity`, `pr_pentity`) with a
//!   mapping back to the concrete row
//! - **Virtual fields**: values computed at read time, e.g. the member count of a deployment
//! - **View configuration**: list fields, filter widgets, summary tabs, CRUD strings
//! - **Options menus**: builder trees resolved against an explicit request context
//! - **SQL storage**: DDL rendering for Postgres and MySQL; a Diesel-pooled store
//!   behind the `postgres` / `mysql` features
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use deploy_model::{all_modules, Db, MemoryStore, Model, RequestContext, Row, Settings};
//!
//! let settings = Settings::default();
//! let model = Arc::new(Model::load(&all_modules(), &settings).unwrap());
//! let mut db = Db::new(model, MemoryStore::new()).unwrap();
//! let ctx = RequestContext::new(Arc::new(settings));
//!
//! let id = db
//!     .insert(&ctx, "deploy_deployment", Row::new().with("title", "Gorkha Earthquake"))
//!     .unwrap();
//! assert!(db.get("deploy_deployment", id).unwrap().is_some());
//! ```

// Core modules
pub mod context;
pub mod error;
pub mod i18n;
pub mod settings;
pub mod value;

// Declarative model
pub mod model;
pub mod modules;
pub mod schema;

// Storage and validated writes
pub mod db;
pub mod store;

// Presentation
pub mod controller;
pub mod crud;
pub mod menu;
pub mod serialization;

pub use context::RequestContext;
pub use error::{FieldError, ModelError, StoreError, ValidationErrors};
pub use i18n::{Catalog, Translator};
pub use settings::Settings;
pub use value::{FieldValue, JoinedRow, RecordId, RecordRef, Row};

pub use model::{dependency_order, Model, ModelModule};
pub use modules::all_modules;
pub use schema::{
    Component, FieldDef, FieldType, OnDelete, Represent, ReusableField, SuperEntity, TableDef,
    Validator, ViewConfig, VirtualField,
};

pub use db::{Db, DeleteSummary};
pub use store::{Filter, MemoryStore, OrderBy, Query, Store};

pub use crud::{ListOutput, ListRequest, Resource};
pub use menu::{options_menu, resolve_options_menu, MenuItem, ResolvedMenu};
pub use serialization::{export_list, ExportError, ExportFormat};

#[cfg(any(feature = "postgres", feature = "mysql"))]
pub use store::sql::{Database, DatabaseConfig, SqlStore};
