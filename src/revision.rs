// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Upstream revision resolution.

use crate::{
    manifest::{Manifest, ManifestError},
    project::Project,
};

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Revision a project is pinned to by the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision(String);

impl Revision {
    /// Treat revision as string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Revision {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.0)
    }
}

/// Determine upstream revision of `project`.
///
/// # Errors
///
/// - Return [`RevisionError::Unpinned`] if manifest pins no revision.
/// - Return [`RevisionError::Manifest`] if manifest tool fails.
pub fn upstream_revision(manifest: &impl Manifest, project: &Project) -> Result<Revision> {
    let revision = manifest.pinned_revision(project.source_dir())?;
    let revision = revision.trim();
    if revision.is_empty() {
        return Err(RevisionError::Unpinned {
            project: project.name().to_string(),
        });
    }

    Ok(Revision(revision.to_string()))
}

/// Revision resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum RevisionError {
    /// Manifest does not pin project to any revision.
    #[error("project {project:?} is not pinned to any upstream revision")]
    Unpinned { project: String },

    /// Manifest tool failed.
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Friendly result alias :3
pub type Result<T, E = RevisionError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{Layout, Settings},
        testing::FakeManifest,
    };
    use pretty_assertions::assert_eq;

    fn project() -> (Layout, Project) {
        let layout = Layout::new("/top", &Settings::default());
        let project = Project::new("a/b", &layout);
        (layout, project)
    }

    #[test]
    fn trim_pinned_revision() -> anyhow::Result<()> {
        let (_layout, project) = project();
        let manifest = FakeManifest::default().pin(project.source_dir(), "  cafe\n");

        let result = upstream_revision(&manifest, &project)?;
        assert_eq!(result.as_str(), "cafe");
        assert_eq!(result.to_string(), "cafe");

        Ok(())
    }

    #[test]
    fn blank_pin_is_unpinned() {
        let (_layout, project) = project();
        for pin in ["", " \n", "\t"] {
            let manifest = FakeManifest::default().pin(project.source_dir(), pin);
            let result = upstream_revision(&manifest, &project);
            assert!(
                matches!(&result, Err(RevisionError::Unpinned { project: name }) if name == "a/b"),
                "pin {pin:?} gave {result:?}"
            );
        }
    }

    #[test]
    fn missing_pin_is_unpinned() {
        let (_layout, project) = project();
        let result = upstream_revision(&FakeManifest::default(), &project);
        assert!(matches!(result, Err(RevisionError::Unpinned { .. })));
    }
}
