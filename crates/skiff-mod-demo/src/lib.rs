//! Reference modules and dependencies for skiff.
//!
//! [`catalog`] maps registration keys to module constructors and
//! [`dependency_loader`] knows how to build the `utils/*` dependencies the
//! modules declare.

use std::rc::Rc;

use skiff_core::deps::Dependency;
use skiff_core::loader::FactoryLoader;
use skiff_core::Module;

pub mod modone;
pub mod modthree;
pub mod modtwo;
pub mod notification;
pub mod status;
pub mod validation;

pub use modone::ModOne;
pub use modthree::ModThree;
pub use modtwo::ModTwo;
pub use notification::Notification;
pub use status::Status;
pub use validation::Validation;

pub type Constructor = fn() -> Box<dyn Module>;

/// Every reference module, keyed by its registration key.
pub fn catalog() -> Vec<(&'static str, Constructor)> {
    vec![
        ("modules/modone", || Box::new(ModOne::new())),
        ("modules/modtwo", || Box::new(ModTwo::new())),
        ("modules/modthree", || Box::new(ModThree::new())),
        ("modules/status", || Box::new(Status::new())),
    ]
}

/// Construct the module registered under `key`, if the catalog has one.
pub fn build(key: &str) -> Option<Box<dyn Module>> {
    catalog()
        .into_iter()
        .find(|(k, _)| *k == key)
        .map(|(_, constructor)| constructor())
}

/// Loader for the `utils/notification` and `utils/validation` dependencies.
pub fn dependency_loader() -> FactoryLoader {
    FactoryLoader::new()
        .with("utils/notification", || Ok(Rc::new(Notification::new()) as Dependency))
        .with("utils/validation", || Ok(Rc::new(Validation::new()) as Dependency))
}
