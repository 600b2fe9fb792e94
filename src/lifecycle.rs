// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Patch lifecycle.
//!
//! Every tracked project carries local commits on top of the revision the
//! manifest pins it to. Those commits live in two forms: as history on the
//! project's tracking branch, and as ordered patch files in the patch tree.
//! The lifecycle moves them between both forms.
//!
//! # Operations
//!
//! - __init__ registers a project by giving it a patch directory, and starts
//!   its tracking branch.
//! - __rebuild__ regenerates patch files from a project's history, then
//!   refreshes the feature index.
//! - __apply__ resets a project to upstream and replays its patch files. A
//!   whole-tree apply also reverts projects that sit on the tracking branch
//!   but are no longer tracked, see [`Lifecycle::reconcile_drift`].
//!
//! # Failure Isolation
//!
//! Batch operations never stop at the first broken project. Each project ends
//! up with an [`Outcome`] in the [`Report`], and the caller decides what the
//! overall result is.
//!
//! # See Also
//!
//! 1. [`ProjectRegistry`]
//! 2. [`readme`](crate::readme)

mod apply;
mod drift;
mod extract;

use crate::{
    config::Layout,
    manifest::{Manifest, ManifestError, RepoTool},
    path::project_name,
    patch::PatchError,
    project::{Project, ProjectRegistry, ValidationError},
    readme::ReadmeError,
    revision::RevisionError,
    style::highlight,
    vcs::{GitCli, ResetMode, TreeState, Vcs, VcsError},
};

use std::{
    error::Error as StdError,
    fs::{create_dir_all, write},
    path::{Path, PathBuf},
};
use tracing::{error, info, instrument};

/// Operation to run on the patch tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Register project at `path` and start its tracking branch.
    ///
    /// Relative paths are taken relative to the source tree root.
    Init { path: PathBuf },

    /// Regenerate patch files of `projects`, or of every project if empty.
    Rebuild { projects: Vec<String> },

    /// Replay patch files of `projects`, or of every project if empty.
    ///
    /// With `discard`, uncommitted changes of the named projects are thrown
    /// away by a hard reset instead of being protected.
    Apply { projects: Vec<String>, discard: bool },
}

/// Final state of a project after a batch operation.
#[derive(Debug)]
pub enum Outcome {
    /// Operation went through.
    Done,

    /// Project was left untouched.
    Skipped(String),

    /// Operation failed part way.
    Failed(LifecycleError),
}

/// Result of a batch operation.
#[derive(Debug, Default)]
pub struct Report {
    /// Outcome of every selected project in operation order.
    pub outcomes: Vec<(String, Outcome)>,

    /// Requested project names that are not registered.
    pub unknown: Vec<String>,

    /// Failures not tied to a single project.
    pub errors: Vec<LifecycleError>,
}

impl Report {
    fn new(unknown: Vec<String>) -> Self {
        Self {
            unknown,
            ..Self::default()
        }
    }

    fn push(&mut self, project: &Project, outcome: Outcome) {
        self.outcomes.push((project.name().to_string(), outcome));
    }

    /// Lookup outcome of project `name`.
    pub fn outcome(&self, name: &str) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|(project, _)| project == name)
            .map(|(_, outcome)| outcome)
    }

    /// Names of projects that failed.
    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, Outcome::Failed(_)))
            .map(|(project, _)| project.as_str())
            .collect()
    }

    /// Names of projects that were skipped.
    pub fn skipped(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, Outcome::Skipped(_)))
            .map(|(project, _)| project.as_str())
            .collect()
    }

    /// Check that nothing failed.
    ///
    /// Skipped projects and unknown names do not count as failures.
    pub fn is_success(&self) -> bool {
        self.failed().is_empty() && self.errors.is_empty()
    }
}

/// Patch lifecycle driver.
///
/// Owns the project registry for a run, and reaches the outside world only
/// through its [`Manifest`] and [`Vcs`] implementations.
#[derive(Debug)]
pub struct Lifecycle<'a, M = RepoTool, V = GitCli>
where
    M: Manifest,
    V: Vcs,
{
    pub(crate) layout: &'a Layout,
    pub(crate) registry: ProjectRegistry,
    pub(crate) manifest: M,
    pub(crate) vcs: V,
}

impl<'a, M, V> Lifecycle<'a, M, V>
where
    M: Manifest,
    V: Vcs,
{
    /// Construct new lifecycle over an already built `registry`.
    pub fn new(layout: &'a Layout, registry: ProjectRegistry, manifest: M, vcs: V) -> Self {
        Self {
            layout,
            registry,
            manifest,
            vcs,
        }
    }

    /// Construct new lifecycle, discovering projects from the patch tree.
    pub fn open(layout: &'a Layout, manifest: M, vcs: V) -> Self {
        let registry = ProjectRegistry::discover(layout, &vcs);
        Self::new(layout, registry, manifest, vcs)
    }

    /// Registry of projects for this run.
    pub fn registry(&self) -> &ProjectRegistry {
        &self.registry
    }

    /// Run `operation`.
    ///
    /// # Errors
    ///
    /// - Return [`LifecycleError`] if init fails, or if a discarding apply is
    ///   requested without naming projects. Batch failures are reported
    ///   through the returned [`Report`] instead.
    pub fn run(&self, operation: Operation) -> Result<Report> {
        match operation {
            Operation::Init { path } => {
                let project = self.init(&path)?;
                let mut report = Report::default();
                report.push(&project, Outcome::Done);
                Ok(report)
            }
            Operation::Rebuild { projects } => Ok(self.rebuild(&projects)),
            Operation::Apply { projects, discard } => {
                let mode = match discard {
                    true if projects.is_empty() => return Err(LifecycleError::DiscardWholeTree),
                    true => ResetMode::Hard,
                    false => ResetMode::Keep,
                };
                Ok(self.apply(&projects, mode))
            }
        }
    }

    /// Register project at `path`, and prepare its tracking branch.
    ///
    /// Creates a patch directory holding only a placeholder if the project is
    /// not registered yet. Then disables commit signing and starts the
    /// tracking branch.
    ///
    /// # Errors
    ///
    /// - Return [`LifecycleError::Validation`] if `path` is no usable project.
    /// - Return [`LifecycleError::PatchDir`] if patch directory cannot be
    ///   created.
    /// - Return [`LifecycleError::Vcs`] or [`LifecycleError::Manifest`] if
    ///   external tools fail.
    #[instrument(skip(self), level = "debug")]
    pub fn init(&self, path: &Path) -> Result<Project> {
        let top = self.layout.top();
        let path = top.join(path);
        let name = project_name(top, &path).ok_or_else(|| ValidationError::OutsideTree {
            path: path.clone(),
            top: top.to_path_buf(),
        })?;

        let project = Project::new(name, self.layout);
        if let Err(err) = project.validate(&self.vcs) {
            error!("cannot initialize {}: {err}", highlight(project.name()));
            return Err(err.into());
        }

        if !self.registry.contains(project.name()) {
            info!("tracking new project {}", highlight(project.name()));
            self.write_placeholder(&project)?;
        }

        self.vcs.disable_signing(project.source_dir())?;
        self.manifest
            .start_branch(self.layout.branch(), project.source_dir())?;
        info!(
            "started branch {} in {}",
            highlight(self.layout.branch()),
            highlight(project.name())
        );

        Ok(project)
    }

    pub(crate) fn write_placeholder(&self, project: &Project) -> Result<()> {
        let dir = project.patches_dir();
        create_dir_all(dir)
            .and_then(|_| write(dir.join(self.layout.placeholder()), ""))
            .map_err(|err| LifecycleError::PatchDir {
                source: err,
                path: dir.to_path_buf(),
            })
    }
}

/// Render error along with every source in its chain.
pub(crate) fn describe(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    message
}

/// Lifecycle error types.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Project is not a usable working tree.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Upstream revision cannot be determined.
    #[error(transparent)]
    Revision(#[from] RevisionError),

    /// Working tree is in a state patches cannot be rebuilt from.
    #[error("working tree of {project:?} is in an unsupported state ({state}), resolve it manually")]
    UnsupportedState { project: String, state: TreeState },

    /// Patch application stopped on a conflict, and was left for inspection.
    #[error("patches of {project:?} do not apply cleanly, resolve or abort with `git am`")]
    Conflict {
        project: String,
        #[source]
        source: VcsError,
    },

    /// Discarding reset was requested for the whole tree.
    #[error("refusing to discard uncommitted changes across the whole tree, name the projects")]
    DiscardWholeTree,

    /// Patch directory cannot be prepared.
    #[error("failed to prepare patch directory {:?}", path.display())]
    PatchDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Patch files cannot be handled.
    #[error(transparent)]
    Patch(#[from] PatchError),

    /// Feature index cannot be regenerated.
    #[error(transparent)]
    Readme(#[from] ReadmeError),

    /// Manifest tool failed.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Version control tool failed.
    #[error(transparent)]
    Vcs(#[from] VcsError),
}

/// Friendly result alias :3
pub type Result<T, E = LifecycleError> = std::result::Result<T, E>;
