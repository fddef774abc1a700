//! Model modules shipped with the crate.

pub mod deploy;
pub mod support;

pub use deploy::{deployment_hrquantity, AlertModel, DeploymentModel};
pub use support::{DocumentModel, HumanResourceModel, LocationModel, PersonModel};

use crate::model::ModelModule;

/// Every model module, in registration order.
///
/// [`Model::load`](crate::model::Model::load) sorts them by their declared
/// requirements, so the order here only breaks ties.
pub fn all_modules() -> Vec<Box<dyn ModelModule>> {
    vec![
        Box::new(LocationModel),
        Box::new(PersonModel),
        Box::new(HumanResourceModel),
        Box::new(DocumentModel),
        Box::new(DeploymentModel),
        Box::new(AlertModel),
    ]
}
