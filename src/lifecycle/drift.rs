// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Drift reconciliation.
//!
//! A project drifts when it still sits on the tracking branch, but its patch
//! directory is gone from the patch tree. Typically because someone stopped
//! tracking it upstream. Drifted projects are handed back to the manifest
//! tool, which abandons the tracking branch and returns them to their pinned
//! revision.

use super::{Lifecycle, Result};
use crate::{manifest::Manifest, style::highlight, vcs::Vcs};

use tracing::{debug, info, instrument};

impl<M, V> Lifecycle<'_, M, V>
where
    M: Manifest,
    V: Vcs,
{
    /// Abandon tracking branch in every project that is not registered.
    ///
    /// Returns names of reverted projects.
    ///
    /// # Errors
    ///
    /// - Return [`LifecycleError::Manifest`](super::LifecycleError::Manifest)
    ///   if the manifest tool cannot be queried or fails to abandon.
    #[instrument(skip(self), level = "debug")]
    pub fn reconcile_drift(&self) -> Result<Vec<String>> {
        let branch = self.layout.branch();
        let drifted = self
            .manifest
            .projects_on_branch(branch)?
            .into_iter()
            .filter(|name| !self.registry.contains(name))
            .collect::<Vec<_>>();

        if drifted.is_empty() {
            debug!("no untracked projects on {branch}");
            return Ok(drifted);
        }

        for name in &drifted {
            info!("reverting untracked project {}", highlight(name));
        }
        self.manifest.abandon(branch, &drifted)?;

        Ok(drifted)
    }
}
