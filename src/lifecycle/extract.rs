// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Patch extraction.
//!
//! Rebuilding throws a project's patch files away, and writes one fresh patch
//! file per commit the project carries beyond its upstream revision. Patch
//! headers carry no commit ids, so rebuilding without new commits reproduces
//! byte-identical files, and the patch tree can be versioned meaningfully.
//!
//! Fresh patches are generated into a staging directory first. Existing
//! patches are only replaced once generation went through, so a failed
//! rebuild never leaves a tracked project without files.

use super::{describe, Lifecycle, LifecycleError, Outcome, Report, Result};
use crate::{
    manifest::Manifest,
    patch::list_patches,
    project::Project,
    readme::update_index,
    revision::upstream_revision,
    style::highlight,
    vcs::{TreeState, Vcs},
};

use std::fs::{create_dir_all, remove_file, rename};
use tempfile::Builder;
use tracing::{debug, error, info, instrument};

impl<M, V> Lifecycle<'_, M, V>
where
    M: Manifest,
    V: Vcs,
{
    /// Regenerate patch files of projects named in `names`.
    ///
    /// No names means every registered project. Refreshes the feature index
    /// once afterwards, over every registered project.
    pub fn rebuild(&self, names: &[impl AsRef<str>]) -> Report {
        let selection = self.registry.resolve_targets(names);
        let mut report = Report::new(selection.unknown);

        for project in selection.projects {
            info!("rebuilding patches for {}", highlight(project.name()));
            let outcome = match self.rebuild_project(project) {
                Ok(()) => Outcome::Done,
                Err(err) => {
                    error!(
                        "failed to rebuild {}: {}",
                        highlight(project.name()),
                        describe(&err)
                    );
                    Outcome::Failed(err)
                }
            };
            report.push(project, outcome);
        }

        if !self.layout.patches_root().is_dir() {
            debug!("no patch tree, skipping feature index");
            return report;
        }

        if let Err(err) = update_index(&self.registry, self.layout.index_file()) {
            error!("failed to update feature index: {}", describe(&err));
            report.errors.push(err.into());
        }

        report
    }

    #[instrument(skip(self, project), fields(project = project.name()), level = "debug")]
    fn rebuild_project(&self, project: &Project) -> Result<()> {
        let state = self.vcs.state(project.source_dir())?;
        if state != TreeState::Clean {
            return Err(LifecycleError::UnsupportedState {
                project: project.name().to_string(),
                state,
            });
        }

        let upstream = upstream_revision(&self.manifest, project)?;
        info!("  upstream revision: {}", highlight(upstream.as_str()));

        let dir = project.patches_dir();
        let prepare = |err: std::io::Error| LifecycleError::PatchDir {
            source: err,
            path: dir.to_path_buf(),
        };
        create_dir_all(dir).map_err(prepare)?;

        // INVARIANT: Old patches stay in place until format-patch went through.
        let staging = Builder::new()
            .prefix(".rebuild-")
            .tempdir_in(self.layout.patches_root())
            .map_err(prepare)?;
        self.vcs
            .format_patches(project.source_dir(), upstream.as_str(), staging.path())?;

        let staged = list_patches(staging.path())?;
        self.clear_patches(project)?;
        if staged.is_empty() {
            info!("  no local commits, keeping placeholder");
            self.write_placeholder(project)?;
        }

        for patch in &staged {
            let Some(name) = patch.file_name() else {
                continue;
            };
            rename(patch, dir.join(name)).map_err(prepare)?;
            info!("  {}", highlight(&name.to_string_lossy()));
        }

        Ok(())
    }

    fn clear_patches(&self, project: &Project) -> Result<()> {
        let dir = project.patches_dir();
        let placeholder = dir.join(self.layout.placeholder());
        let prepare = |err: std::io::Error| LifecycleError::PatchDir {
            source: err,
            path: dir.to_path_buf(),
        };

        for patch in list_patches(dir)? {
            remove_file(&patch).map_err(prepare)?;
        }

        if placeholder.is_file() {
            remove_file(&placeholder).map_err(prepare)?;
        }

        Ok(())
    }
}
