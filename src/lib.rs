//! Forensic triage of iOS backups and filesystem dumps.
//!
//! Layered the usual way: `domain` holds entities and contracts,
//! `infrastructure` the crypto, storage and artifact parsers, `application`
//! the use cases and `presentation` the command line.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
