//! Infrastructure layer
//!
//! Concrete implementations of the domain traits: backup crypto and
//! container access, artifact modules, indicator loading and persistence.

pub mod backup;
pub mod crypto;
pub mod indicators;
pub mod modules;
pub mod persistence;
