//! Domain services
//!
//! Artifact location, the module runner and registry, and timeline merging.

mod locator;
mod module_registry;
mod module_runner;
mod timeline;

pub use locator::{expand_template, locate_artifact};
pub use module_registry::{ModuleDescriptor, ModuleRegistry, RegistryError, SourceModes};
pub use module_runner::ModuleRunner;
pub use timeline::{merge, TimelineAggregator};
