// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine where settings live, and how paths inside the source tree map to
//! project names.

use std::path::{Component, Path, PathBuf};

/// Determine default absolute path to the settings file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/repatch/config.toml` as the
/// default. Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoConfigHome`] if configuration directory cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_settings_file() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("repatch").join("config.toml"))
        .ok_or(NoConfigHome)
}

/// Turn a path relative to `base` into a project name.
///
/// Project names always use `/` as separator regardless of platform, so they
/// match what the manifest tool reports through `$REPO_PATH`. Both paths are
/// normalized lexically first, so `..` components are folded away without
/// touching the file system. Returns [`None`] if `path` does not live under
/// `base`, or is `base` itself.
pub fn project_name(base: &Path, path: &Path) -> Option<String> {
    let base = normalize(base);
    let path = normalize(path);
    let relative = path.strip_prefix(&base).ok()?;
    let parts = relative
        .components()
        .map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;

    if parts.is_empty() {
        return None;
    }

    Some(parts.join("/"))
}

/// Fold `.` and `..` components of `path` without resolving symlinks.
///
/// A `..` that would climb above the root or above the start of a relative
/// path is kept as is.
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => continue,
            Component::ParentDir => match result.components().next_back() {
                Some(Component::Normal(_)) => {
                    result.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => continue,
                _ => result.push(component),
            },
            component => result.push(component),
        }
    }

    result
}

/// No way to determine user's configuration directory.
///
/// # See Also
///
/// - [`dirs::config_dir`](https://docs.rs/dirs/latest/dirs/fn.config_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's configuration directory")]
pub struct NoConfigHome;

/// Friendly result alias :3
pub type Result<T, E = NoConfigHome> = std::result::Result<T, E>;
