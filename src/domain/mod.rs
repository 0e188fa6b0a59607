//! Domain layer - Core triage logic
//!
//! Entities (keybag, unlock state, manifest entries, timeline events), the
//! traits the rest of the crate implements, and the services that tie
//! modules together. Nothing here touches crypto primitives or databases.

pub mod entities;
pub mod repositories;
pub mod services;
