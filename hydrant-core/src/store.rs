//! Template store loading.
//!
//! On disk the store is two directory trees:
//!
//! ```text
//! templates/
//! ├── base/                  shared layer, rendered for every entity
//! │   ├── app.yaml.tera
//! │   └── service.yaml
//! └── overlays/
//!     ├── prod/              one overlay layer per group
//!     │   └── patch.yaml.tera
//!     └── staging/
//!         └── patch.yaml.tera
//! ```
//!
//! Loading snapshots every file as bytes. Nothing here interprets template
//! syntax; the engine decides what is a template and what is copied as-is.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{store_io_err, StoreError};
use crate::types::{GroupName, TemplateLayer, TemplateSet};

/// Read every regular file under `root` into a path-ordered map keyed by the
/// path relative to `root`.
pub fn read_tree(root: &Path) -> Result<BTreeMap<PathBuf, Vec<u8>>, StoreError> {
    let mut files = BTreeMap::new();
    collect_files(root, PathBuf::new(), &mut files)?;
    Ok(files)
}

fn collect_files(
    dir: &Path,
    rel: PathBuf,
    out: &mut BTreeMap<PathBuf, Vec<u8>>,
) -> Result<(), StoreError> {
    let entries = fs::read_dir(dir).map_err(|e| store_io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| store_io_err(dir, e))?;
        let path = entry.path();
        let child_rel = if rel.as_os_str().is_empty() {
            PathBuf::from(entry.file_name())
        } else {
            rel.join(entry.file_name())
        };
        if path.is_dir() {
            collect_files(&path, child_rel, out)?;
        } else {
            let contents = fs::read(&path).map_err(|e| store_io_err(&path, e))?;
            out.insert(child_rel, contents);
        }
    }
    Ok(())
}

/// Load one layer from a directory tree.
pub fn load_layer(root: &Path, name: impl Into<String>) -> Result<TemplateLayer, StoreError> {
    require_dir(root)?;
    Ok(TemplateLayer {
        name: name.into(),
        files: read_tree(root)?,
    })
}

/// Load the full template set: the base layer plus one overlay layer per
/// subdirectory of `overlays_root`. Stray files directly under
/// `overlays_root` are ignored; only directories name a group.
pub fn load_template_set(base_root: &Path, overlays_root: &Path) -> Result<TemplateSet, StoreError> {
    let base = load_layer(base_root, "base")?;
    require_dir(overlays_root)?;

    let mut overlays = BTreeMap::new();
    let mut seen: BTreeMap<String, String> = BTreeMap::new();
    let entries = fs::read_dir(overlays_root).map_err(|e| store_io_err(overlays_root, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| store_io_err(overlays_root, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let group = GroupName::from(entry.file_name().to_string_lossy().to_string());
        // Group matching is case-insensitive, so "Prod" next to "prod"
        // would make overlay resolution ambiguous.
        if let Some(first) = seen.insert(group.0.to_ascii_lowercase(), group.0.clone()) {
            return Err(StoreError::DuplicateOverlay {
                first,
                second: group.0,
            });
        }
        let layer = load_layer(&path, group.0.clone())?;
        overlays.insert(group, layer);
    }

    Ok(TemplateSet::new(base, overlays))
}

fn require_dir(path: &Path) -> Result<(), StoreError> {
    if !path.exists() {
        return Err(StoreError::MissingRoot {
            path: path.to_path_buf(),
        });
    }
    if !path.is_dir() {
        return Err(StoreError::NotADirectory {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}
