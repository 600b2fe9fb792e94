// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Project discovery and validation.
//!
//! A __project__ is a sub-repository of the source tree that carries local
//! patches. Projects are never listed explicitly anywhere. Instead, the patch
//! tree mirrors the layout of the source tree, and any directory of the patch
//! tree that directly holds at least one file marks a project at the same
//! relative path in the source tree.
//!
//! # Example
//!
//! ```text
//! .repo/manifests/patches/
//! ├── README.md                       <- feature index, not a project
//! ├── frameworks/base/
//! │   ├── 0001-Add-a-thing.patch
//! │   └── 0002-Fix-the-thing.patch
//! └── system/core/
//!     └── .keep                       <- tracked, but no patches right now
//! ```
//!
//! Here `frameworks/base` and `system/core` are projects, provided both exist
//! as working trees in the source tree.

use crate::{config::Layout, path::project_name, style::highlight, vcs::Vcs};

use ignore::WalkBuilder;
use indexmap::IndexMap;
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};
use tracing::{debug, error, instrument, warn};

/// Project tracked by the patch tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    name: String,
    source_dir: PathBuf,
    patches_dir: PathBuf,
}

impl Project {
    /// Construct new project `name` located through `layout`.
    pub fn new(name: impl Into<String>, layout: &Layout) -> Self {
        let name = name.into();
        Self {
            source_dir: layout.source_dir(&name),
            patches_dir: layout.patches_dir(&name),
            name,
        }
    }

    /// Path of project relative to source tree root.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Working tree of project.
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Directory holding patch files of project.
    pub fn patches_dir(&self) -> &Path {
        &self.patches_dir
    }

    /// Check that project refers to a usable working tree.
    ///
    /// # Errors
    ///
    /// - Return [`ValidationError::Missing`] if source directory is absent.
    /// - Return [`ValidationError::NotWorkTree`] if source directory is not
    ///   version controlled.
    pub fn validate(&self, vcs: &impl Vcs) -> Result<(), ValidationError> {
        if !self.source_dir.is_dir() {
            return Err(ValidationError::Missing {
                project: self.name.clone(),
            });
        }

        if !vcs.is_work_tree(&self.source_dir) {
            return Err(ValidationError::NotWorkTree {
                project: self.name.clone(),
            });
        }

        Ok(())
    }
}

/// Canonical set of projects for a run.
///
/// # Invariant
///
/// - Projects keep the order they were discovered in.
/// - Only valid projects are registered.
#[derive(Debug, Default, Clone)]
pub struct ProjectRegistry {
    projects: IndexMap<String, Project>,
    rejected: Vec<ValidationError>,
}

impl ProjectRegistry {
    /// Discover projects from patch tree described by `layout`.
    ///
    /// Walks the patch tree in file name order. Candidates whose source
    /// directory fails validation are logged and recorded as rejected rather
    /// than aborting discovery.
    #[instrument(skip(layout, vcs), level = "debug")]
    pub fn discover(layout: &Layout, vcs: &impl Vcs) -> Self {
        let mut registry = Self::default();
        let root = layout.patches_root();
        if !root.is_dir() {
            debug!("no patch tree at {:?}", root.display());
            return registry;
        }

        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut seen = HashSet::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("skipping unreadable patch tree entry: {err}");
                    continue;
                }
            };

            if !entry.file_type().is_some_and(|kind| kind.is_file()) {
                continue;
            }

            // INVARIANT: Files at the root of the patch tree never mark a project.
            let Some(parent) = entry.path().parent() else {
                continue;
            };
            if parent == root || !seen.insert(parent.to_path_buf()) {
                continue;
            }

            let Some(name) = project_name(root, parent) else {
                continue;
            };

            let project = Project::new(name, layout);
            match project.validate(vcs) {
                Ok(()) => registry.insert(project),
                Err(err) => {
                    error!("ignoring {}: {err}", highlight(project.name()));
                    registry.rejected.push(err);
                }
            }
        }

        registry
    }

    /// Register a project, keeping registration order.
    pub fn insert(&mut self, project: Project) {
        self.projects.insert(project.name.clone(), project);
    }

    /// Lookup project by name.
    pub fn get(&self, name: &str) -> Option<&Project> {
        self.projects.get(name)
    }

    /// Check if project is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.projects.contains_key(name)
    }

    /// Iterate projects in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    /// Amount of registered projects.
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    /// Check if no project is registered.
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Candidates rejected during discovery.
    pub fn rejected(&self) -> &[ValidationError] {
        &self.rejected
    }

    /// Select projects to operate on.
    ///
    /// No names selects every project in registration order. Otherwise
    /// selects the named projects in the order given. Unknown names are
    /// logged once, and reported through [`Selection::unknown`].
    pub fn resolve_targets(&self, names: &[impl AsRef<str>]) -> Selection<'_> {
        if names.is_empty() {
            return Selection {
                projects: self.iter().collect(),
                unknown: Vec::new(),
                whole_tree: true,
            };
        }

        let mut selection = Selection {
            projects: Vec::new(),
            unknown: Vec::new(),
            whole_tree: false,
        };

        for name in names.iter().map(|name| name.as_ref()) {
            match self.get(name) {
                Some(project) => selection.projects.push(project),
                None if selection.unknown.iter().any(|unknown| unknown == name) => continue,
                None => {
                    error!("project {} not found", highlight(name));
                    selection.unknown.push(name.to_string());
                }
            }
        }

        selection
    }
}

/// Projects selected for an operation.
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    /// Selected projects in operation order.
    pub projects: Vec<&'a Project>,

    /// Requested names that are not registered.
    pub unknown: Vec<String>,

    /// Whether selection covers the whole tree, i.e., no names were given.
    pub whole_tree: bool,
}

/// Project validation error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Source directory does not exist.
    #[error("project {project:?} doesn't exist")]
    Missing { project: String },

    /// Source directory is not a version controlled working tree.
    #[error("project {project:?} isn't a git repository")]
    NotWorkTree { project: String },

    /// Path does not live inside the source tree.
    #[error("path {:?} is outside of source tree {:?}", path.display(), top.display())]
    OutsideTree { path: PathBuf, top: PathBuf },
}
