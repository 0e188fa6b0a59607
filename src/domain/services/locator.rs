//! Artifact locator
//!
//! Resolves a module's artifact by content identifier (backup trees) or,
//! failing that, by path template (filesystem dumps). Templates are
//! `/`-separated and a `*` segment matches any single directory entry.

use crate::domain::entities::storage_path;
use crate::domain::repositories::{ModuleContext, ModuleError, SourceKind};
use std::fs;
use std::path::{Path, PathBuf};

const WILDCARD: &str = "*";

/// Finds the first existing artifact under the context's source.
///
/// Known content identifiers are tried first, then the path templates, so a
/// backup tree that kept an artifact at its device path and a filesystem
/// dump are both covered. Lookups only read the tree, so repeated calls
/// against an unchanged tree return the same path.
pub fn locate_artifact(
    ctx: &ModuleContext,
    backup_ids: &[&str],
    root_paths: &[&str],
) -> Result<PathBuf, ModuleError> {
    if ctx.kind == SourceKind::Snapshot {
        return Err(ModuleError::ArtifactNotFound {
            module: ctx.module,
            searched: Vec::new(),
        });
    }

    for id in backup_ids {
        let path = storage_path(&ctx.source, id);
        if path.is_file() {
            return Ok(path);
        }
    }

    for template in root_paths {
        if let Some(path) = expand_template(&ctx.source, template).into_iter().next() {
            return Ok(path);
        }
    }

    Err(ModuleError::ArtifactNotFound {
        module: ctx.module,
        searched: backup_ids
            .iter()
            .chain(root_paths)
            .map(|s| s.to_string())
            .collect(),
    })
}

/// Expands a path template under `root` into every existing file it matches,
/// in sorted order.
pub fn expand_template(root: &Path, template: &str) -> Vec<PathBuf> {
    let mut candidates = vec![root.to_path_buf()];

    for segment in template.split('/').filter(|s| !s.is_empty()) {
        let mut next = Vec::new();

        for base in &candidates {
            if segment == WILDCARD {
                next.extend(sorted_children(base));
            } else {
                let path = base.join(segment);
                if path.exists() {
                    next.push(path);
                }
            }
        }

        if next.is_empty() {
            return next;
        }
        candidates = next;
    }

    candidates.retain(|path| path.is_file());
    candidates
}

fn sorted_children(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut children: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();
    children.sort();
    children
}
