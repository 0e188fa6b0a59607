//! Artifact extraction modules
//!
//! Each module parses one artifact into typed records. The registry below
//! lists them in the order they run.

mod interaction_c;
mod manifest;
mod safari_browser_state;
pub mod sqlite;
pub mod time;

pub use interaction_c::{Interaction, InteractionC};
pub use manifest::{Manifest, ManifestRecord};
pub use safari_browser_state::{parse_session, BrowserTab, SafariBrowserState, SessionEntry};

use crate::domain::services::{ModuleDescriptor, ModuleRegistry, RegistryError, SourceModes};

/// Descriptors of every built-in module, in run order
pub fn builtin_descriptors() -> Vec<ModuleDescriptor> {
    vec![
        ModuleDescriptor::of::<Manifest>(SourceModes::BACKUP),
        ModuleDescriptor::of::<SafariBrowserState>(SourceModes::ALL),
        ModuleDescriptor::of::<InteractionC>(SourceModes::ALL),
    ]
}

pub fn builtin_registry() -> Result<ModuleRegistry, RegistryError> {
    ModuleRegistry::new(builtin_descriptors())
}
