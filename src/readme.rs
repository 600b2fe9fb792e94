// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Feature index generation.
//!
//! The root of the patch tree holds a human readable index of every patch,
//! grouped by the feature each patch is tagged with. Untagged patches are
//! listed last under "miscellaneous". The index is rebuilt from scratch every
//! time, and never written partially: if any patch lacks a subject, the
//! previous index stays as it was.

use crate::{
    patch::{list_patches, Patch, PatchError},
    project::ProjectRegistry,
};

use indexmap::IndexMap;
use std::{fmt::Write as _, fs::write, path::{Path, PathBuf}};
use tracing::{info, instrument};

/// Section title for untagged patches.
pub const MISCELLANEOUS: &str = "miscellaneous";

/// Patches grouped by feature tag in first-seen order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FeatureIndex {
    features: IndexMap<Option<String>, Vec<Patch>>,
}

impl FeatureIndex {
    /// Construct new empty feature index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every patch of every project in `registry`.
    ///
    /// # Errors
    ///
    /// - Return [`PatchError`] if any patch cannot be listed, read, or parsed.
    pub fn collect(registry: &ProjectRegistry) -> Result<Self, PatchError> {
        let mut index = Self::new();
        for project in registry.iter() {
            for path in list_patches(project.patches_dir())? {
                index.insert(Patch::load(project.name(), path)?);
            }
        }

        Ok(index)
    }

    /// Add patch to the section of its feature.
    pub fn insert(&mut self, patch: Patch) {
        self.features
            .entry(patch.header.feature.clone())
            .or_default()
            .push(patch);
    }

    /// Render index as markdown.
    ///
    /// Tagged sections come first in first-seen order, followed by the
    /// miscellaneous section if any patch is untagged.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (feature, patches) in &self.features {
            if let Some(feature) = feature {
                render_section(&mut out, feature, patches);
            }
        }

        if let Some(patches) = self.features.get(&None) {
            render_section(&mut out, MISCELLANEOUS, patches);
        }

        out
    }
}

fn render_section(out: &mut String, title: &str, patches: &[Patch]) {
    // INVARIANT: Writing into a String never fails.
    let _ = writeln!(out, "## {title}\n");
    for patch in patches {
        let _ = writeln!(
            out,
            "- [`{project}` {subject}](./{project}/{file})",
            project = patch.project,
            subject = patch.header.subject,
            file = patch.file_name,
        );
    }
    out.push('\n');
}

/// Regenerate feature index file at `path` from every project in `registry`.
///
/// # Errors
///
/// - Return [`ReadmeError::Patch`] if any patch is unusable. Nothing is
///   written in that case.
/// - Return [`ReadmeError::Write`] if index file cannot be written.
#[instrument(skip(registry, path), level = "debug")]
pub fn update_index(registry: &ProjectRegistry, path: impl AsRef<Path>) -> Result<FeatureIndex> {
    let index = FeatureIndex::collect(registry)?;
    write(path.as_ref(), index.render()).map_err(|err| ReadmeError::Write {
        source: err,
        path: path.as_ref().to_path_buf(),
    })?;
    info!("updated feature index {:?}", path.as_ref().display());

    Ok(index)
}

/// Feature index error types.
#[derive(Debug, thiserror::Error)]
pub enum ReadmeError {
    /// A patch could not be indexed.
    #[error(transparent)]
    Patch(#[from] PatchError),

    /// Index file cannot be written.
    #[error("failed to write feature index at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ReadmeError> = std::result::Result<T, E>;
