// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Patch application.
//!
//! Applying moves a project's tracking branch back to its upstream revision,
//! then replays the project's patch files on top through a three-way merge
//! that ignores whitespace. Minor drift in context lines is merged instead of
//! rejected. A real conflict stops that project, and leaves the mailbox
//! session in place so the operator can inspect and resolve it.
//!
//! # Uncommitted Work
//!
//! Projects with anything in their status are skipped, unless the operator
//! explicitly asked to discard local changes of named projects. The reset
//! keeps unrelated working tree state by default.
//!
//! An unresolved conflict leaves unmerged entries behind, so it counts as
//! uncommitted work too. Only a clean stale session, or a discarding apply,
//! gets its `git am` aborted automatically.

use super::{describe, Lifecycle, LifecycleError, Outcome, Report, Result};
use crate::{
    manifest::Manifest,
    patch::list_patches,
    project::Project,
    revision::upstream_revision,
    style::highlight,
    vcs::{ResetMode, TreeState, Vcs, VcsError},
};

use tracing::{debug, error, info, instrument, warn};

impl<M, V> Lifecycle<'_, M, V>
where
    M: Manifest,
    V: Vcs,
{
    /// Reset projects named in `names` to upstream, and replay their patches.
    ///
    /// No names means every registered project, followed by drift
    /// reconciliation.
    pub fn apply(&self, names: &[impl AsRef<str>], mode: ResetMode) -> Report {
        let selection = self.registry.resolve_targets(names);
        let mut report = Report::new(selection.unknown);

        for project in selection.projects {
            let outcome = match self.apply_project(project, mode) {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(
                        "failed to apply patches to {}: {}",
                        highlight(project.name()),
                        describe(&err)
                    );
                    Outcome::Failed(err)
                }
            };

            if let Outcome::Skipped(reason) = &outcome {
                warn!("{reason} in {}, skipping", highlight(project.name()));
            }
            report.push(project, outcome);
        }

        if selection.whole_tree {
            if let Err(err) = self.reconcile_drift() {
                error!("failed to revert untracked projects: {}", describe(&err));
                report.errors.push(err);
            }
        }

        report
    }

    #[instrument(skip(self, project), fields(project = project.name()), level = "debug")]
    fn apply_project(&self, project: &Project, mode: ResetMode) -> Result<Outcome> {
        let dir = project.source_dir();
        let state = self.vcs.state(dir)?;

        // INVARIANT: Never touch uncommitted work unless told to discard it.
        if self.vcs.is_dirty(dir)? {
            match (mode, state) {
                (ResetMode::Keep, TreeState::Applying) => {
                    return Ok(Outcome::Skipped(
                        "unresolved patch conflict (finish or `git am --abort` it, or use --discard)"
                            .into(),
                    ))
                }
                (ResetMode::Keep, _) => return Ok(Outcome::Skipped("uncommitted changes".into())),
                (ResetMode::Hard, _) => warn!(
                    "discarding uncommitted changes in {}",
                    highlight(project.name())
                ),
            }
        }

        info!("applying patches to {}", highlight(project.name()));

        match state {
            TreeState::Clean => {}
            TreeState::Applying => {
                info!("  aborting previous patch application");
                self.vcs.abort_apply(dir)?;
            }
            state @ TreeState::Busy(_) => return Ok(Outcome::Skipped(state.to_string())),
        }

        self.vcs.disable_signing(dir)?;
        self.ensure_branch(project)?;

        let upstream = upstream_revision(&self.manifest, project)?;
        info!("  upstream revision: {}", highlight(upstream.as_str()));

        let head = self.vcs.reset(dir, upstream.as_str(), mode)?;
        info!("  reset to {}", highlight(&head));

        let patches = list_patches(project.patches_dir())?;
        if patches.is_empty() {
            info!("  no patches to apply");
            return Ok(Outcome::Done);
        }

        self.vcs
            .apply_patches(dir, &patches)
            .map_err(|err| match err {
                VcsError::Conflict { .. } => LifecycleError::Conflict {
                    project: project.name().to_string(),
                    source: err,
                },
                err => err.into(),
            })?;
        info!("  applied {} patches", patches.len());

        Ok(Outcome::Done)
    }

    fn ensure_branch(&self, project: &Project) -> Result<()> {
        let dir = project.source_dir();
        let branch = self.layout.branch();
        if self.vcs.current_branch(dir)?.as_deref() == Some(branch) {
            debug!("already on tracking branch {branch}");
            return Ok(());
        }

        if self.vcs.has_branch(dir, branch)? {
            info!("  switching to tracking branch {}", highlight(branch));
        } else {
            info!("  creating tracking branch {}", highlight(branch));
        }
        self.manifest.start_branch(branch, dir)?;

        Ok(())
    }
}
