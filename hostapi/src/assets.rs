//! Asset path resolution under the assets location.

use std::path::{Component, Path, PathBuf};

use crate::error::HostError;

/// Resolve `relative` under `root`.
///
/// Only plain relative paths are accepted: absolute paths, drive prefixes
/// and `..` components are refused so the core cannot read outside the
/// assets location.
pub fn resolve_asset_path(root: &Path, relative: &str) -> Result<PathBuf, HostError> {
    if relative.is_empty() {
        return Err(HostError::AssetRefused("empty path".into()));
    }

    let mut resolved = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(HostError::AssetRefused(relative.to_string()));
            }
        }
    }
    Ok(resolved)
}
