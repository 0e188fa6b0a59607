//! Module registry
//!
//! Static list of module descriptors. A descriptor knows how to build a
//! module for a source and how to restore one from a persisted snapshot,
//! which is all the driver and the re-check command need.

use crate::domain::repositories::{Extractor, Module, ModuleContext, ModuleError, SourceKind};
use crate::domain::services::ModuleRunner;
use std::collections::HashSet;
use thiserror::Error;

/// Registry construction errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate module slug: {0}")]
    DuplicateSlug(&'static str),

    #[error("Duplicate module name: {0}")]
    DuplicateName(&'static str),
}

/// Source kinds a module supports for live extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceModes {
    pub backup: bool,
    pub filesystem: bool,
}

impl SourceModes {
    pub const BACKUP: Self = Self {
        backup: true,
        filesystem: false,
    };
    pub const FILESYSTEM: Self = Self {
        backup: false,
        filesystem: true,
    };
    pub const ALL: Self = Self {
        backup: true,
        filesystem: true,
    };

    pub fn supports(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::Backup => self.backup,
            SourceKind::FileSystem => self.filesystem,
            SourceKind::Snapshot => true,
        }
    }
}

type BuildFn = fn(ModuleContext) -> Box<dyn Module>;
type RestoreFn = fn(ModuleContext, serde_json::Value) -> Result<Box<dyn Module>, ModuleError>;

/// Constructors and identity of one module type
#[derive(Clone, Copy)]
pub struct ModuleDescriptor {
    pub name: &'static str,
    pub slug: &'static str,
    pub modes: SourceModes,
    build: BuildFn,
    restore: RestoreFn,
}

impl ModuleDescriptor {
    pub fn of<E: Extractor + 'static>(modes: SourceModes) -> Self {
        Self {
            name: E::NAME,
            slug: E::SLUG,
            modes,
            build: |ctx| Box::new(ModuleRunner::<E>::new(ctx)),
            restore: |ctx, data| {
                let module: Box<dyn Module> = Box::new(ModuleRunner::<E>::from_snapshot(ctx, data)?);
                Ok(module)
            },
        }
    }

    /// Builds a fresh module bound to `ctx`. The context's module name is
    /// overwritten with this descriptor's.
    pub fn build(&self, mut ctx: ModuleContext) -> Box<dyn Module> {
        ctx.module = self.name;
        (self.build)(ctx)
    }

    /// Rebuilds a module from a JSON array written by a previous run
    pub fn restore(&self, data: serde_json::Value) -> Result<Box<dyn Module>, ModuleError> {
        (self.restore)(ModuleContext::snapshot(self.name), data)
    }
}

impl std::fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name)
            .field("slug", &self.slug)
            .field("modes", &self.modes)
            .finish()
    }
}

/// Ordered set of module descriptors with unique slugs and names
#[derive(Debug, Clone)]
pub struct ModuleRegistry {
    modules: Vec<ModuleDescriptor>,
}

impl ModuleRegistry {
    pub fn new(modules: Vec<ModuleDescriptor>) -> Result<Self, RegistryError> {
        let mut slugs = HashSet::new();
        let mut names = HashSet::new();

        for module in &modules {
            if !slugs.insert(module.slug) {
                return Err(RegistryError::DuplicateSlug(module.slug));
            }
            if !names.insert(module.name) {
                return Err(RegistryError::DuplicateName(module.name));
            }
        }

        Ok(Self { modules })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.modules.iter()
    }

    /// Modules supporting `kind`, in registry order, optionally narrowed to
    /// one module name
    pub fn select<'a>(
        &'a self,
        kind: SourceKind,
        only: Option<&'a str>,
    ) -> impl Iterator<Item = &'a ModuleDescriptor> + 'a {
        self.modules
            .iter()
            .filter(move |m| m.modes.supports(kind))
            .filter(move |m| only.is_none_or(|name| m.name == name))
    }

    pub fn find_by_slug(&self, slug: &str) -> Option<&ModuleDescriptor> {
        self.modules.iter().find(|m| m.slug == slug)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.modules.iter().map(|m| m.name).collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
