//! Repository traits (interfaces)
//!
//! Contracts the domain relies on without knowing the implementation:
//! extraction modules, indicator sets and result persistence.

mod indicators;
mod module;
mod result_store;

pub use indicators::{IndicatorKind, IndicatorMatch, IndicatorSet};
pub use module::{
    Extractor, IndicatorOutcome, Module, ModuleContext, ModuleError, RunOutcome, SourceKind,
};
pub use result_store::{PersistenceError, ResultStore, StoredSnapshot};
