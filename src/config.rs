// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Repatch reads an optional settings file written in TOML. Every field has a
//! sensible default, so an absent file, or an empty one, is perfectly valid.
//! Settings are combined with the source tree root to form a [`Layout`], the
//! single explicit value every other component receives instead of reaching
//! for global state.
//!
//! # General Layout
//!
//! ```toml
//! branch = "repatch"
//! patches_dir = ".repo/manifests/patches"
//! index_file = "README.md"
//! placeholder = ".keep"
//!
//! [tools]
//! manifest = "repo"
//! git = "git"
//! ```

use serde::Deserialize;
use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};

/// User settings for repatch.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Name of tracking branch holding automation managed patch commits.
    pub branch: String,

    /// Root of patch directory tree, relative to source tree root unless
    /// absolute.
    pub patches_dir: PathBuf,

    /// Name of generated feature index placed at the root of the patch tree.
    pub index_file: String,

    /// Marker file kept in patch directories of projects without patches.
    pub placeholder: String,

    /// External programs to invoke.
    pub tools: ToolSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            branch: "repatch".into(),
            patches_dir: PathBuf::from(".repo/manifests/patches"),
            index_file: "README.md".into(),
            placeholder: ".keep".into(),
            tools: ToolSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from file at `path`.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if file cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file content is malformed.
    /// - Return [`ConfigError::ShellExpansion`] if patch directory expansion
    ///   fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_to_string(path.as_ref()).map_err(|err| ConfigError::Read {
            source: err,
            path: path.as_ref().to_path_buf(),
        })?;

        content.parse()
    }

    /// Load settings from file at `path` if it exists, or use defaults.
    ///
    /// # Errors
    ///
    /// - Same as [`Settings::load`] when the file exists.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().is_file() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on patch directory field.
        settings.patches_dir = PathBuf::from(
            shellexpand::full(settings.patches_dir.to_string_lossy().as_ref())
                .map_err(ConfigError::ShellExpansion)?
                .into_owned(),
        );

        Ok(settings)
    }
}

/// External program settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolSettings {
    /// Multi-repository manifest tool.
    pub manifest: String,

    /// Version control tool.
    pub git: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            manifest: "repo".into(),
            git: "git".into(),
        }
    }
}

/// Resolved locations for a single run.
///
/// Constructed once at startup from the source tree root and [`Settings`],
/// then handed by reference to every component.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Layout {
    top: PathBuf,
    patches_root: PathBuf,
    index_file: PathBuf,
    branch: String,
    placeholder: String,
}

impl Layout {
    /// Construct new layout rooted at source tree root `top`.
    pub fn new(top: impl Into<PathBuf>, settings: &Settings) -> Self {
        let top = top.into();
        let patches_root = top.join(&settings.patches_dir);
        let index_file = patches_root.join(&settings.index_file);

        Self {
            top,
            patches_root,
            index_file,
            branch: settings.branch.clone(),
            placeholder: settings.placeholder.clone(),
        }
    }

    /// Root of the source tree.
    pub fn top(&self) -> &Path {
        &self.top
    }

    /// Root of the patch directory tree.
    pub fn patches_root(&self) -> &Path {
        &self.patches_root
    }

    /// Location of generated feature index.
    pub fn index_file(&self) -> &Path {
        &self.index_file
    }

    /// Name of tracking branch.
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Name of placeholder marker file.
    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Source directory of project `name`.
    pub fn source_dir(&self, name: &str) -> PathBuf {
        self.top.join(name)
    }

    /// Patch directory of project `name`.
    pub fn patches_dir(&self, name: &str) -> PathBuf {
        self.patches_root.join(name)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read settings file.
    #[error("failed to read settings file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize settings.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to perform shell expansion on settings.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
