// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Recording fakes of external tools for unit tests.

use crate::{
    manifest::{Manifest, Result as ManifestResult},
    syscall::SyscallError,
    vcs::{ResetMode, Result as VcsResult, TreeState, Vcs, VcsError},
};

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    fs::write,
    path::{Path, PathBuf},
};

/// Call observed by a fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    StartBranch(PathBuf),
    Abandon(Vec<String>),
    AbortApply(PathBuf),
    DisableSigning(PathBuf),
    FormatPatches(PathBuf),
    Reset(PathBuf, ResetMode),
    ApplyPatches(PathBuf, Vec<String>),
}

#[derive(Debug, Default)]
pub(crate) struct FakeManifest {
    pub(crate) revisions: HashMap<PathBuf, String>,
    pub(crate) on_branch: Vec<String>,
    pub(crate) calls: RefCell<Vec<Call>>,
}

impl FakeManifest {
    pub(crate) fn pin(mut self, dir: impl Into<PathBuf>, revision: &str) -> Self {
        self.revisions.insert(dir.into(), revision.into());
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }
}

impl Manifest for FakeManifest {
    fn start_branch(&self, _branch: &str, project_dir: &Path) -> ManifestResult<()> {
        self.calls
            .borrow_mut()
            .push(Call::StartBranch(project_dir.to_path_buf()));
        Ok(())
    }

    fn pinned_revision(&self, project_dir: &Path) -> ManifestResult<String> {
        Ok(self.revisions.get(project_dir).cloned().unwrap_or_default())
    }

    fn projects_on_branch(&self, _branch: &str) -> ManifestResult<Vec<String>> {
        Ok(self.on_branch.clone())
    }

    fn abandon(&self, _branch: &str, projects: &[String]) -> ManifestResult<()> {
        self.calls
            .borrow_mut()
            .push(Call::Abandon(projects.to_vec()));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeVcs {
    pub(crate) dirty: HashSet<PathBuf>,
    pub(crate) states: HashMap<PathBuf, TreeState>,
    pub(crate) branches: HashMap<PathBuf, String>,
    pub(crate) conflicts: HashSet<PathBuf>,
    /// Projects whose upstream revision cannot be found by format-patch.
    pub(crate) unknown_upstream: HashSet<PathBuf>,
    /// Patch files (name, contents) format-patch writes per project.
    pub(crate) commits: HashMap<PathBuf, Vec<(String, String)>>,
    pub(crate) calls: RefCell<Vec<Call>>,
}

impl FakeVcs {
    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub(crate) fn calls_for(&self, dir: &Path) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| match call {
                Call::StartBranch(path)
                | Call::AbortApply(path)
                | Call::DisableSigning(path)
                | Call::FormatPatches(path)
                | Call::Reset(path, _)
                | Call::ApplyPatches(path, _) => path == dir,
                Call::Abandon(_) => false,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl Vcs for FakeVcs {
    fn is_work_tree(&self, dir: &Path) -> bool {
        dir.join(".git").exists()
    }

    fn is_dirty(&self, dir: &Path) -> VcsResult<bool> {
        Ok(self.dirty.contains(dir))
    }

    fn state(&self, dir: &Path) -> VcsResult<TreeState> {
        Ok(self.states.get(dir).copied().unwrap_or(TreeState::Clean))
    }

    fn abort_apply(&self, dir: &Path) -> VcsResult<()> {
        self.record(Call::AbortApply(dir.to_path_buf()));
        Ok(())
    }

    fn disable_signing(&self, dir: &Path) -> VcsResult<()> {
        self.record(Call::DisableSigning(dir.to_path_buf()));
        Ok(())
    }

    fn current_branch(&self, dir: &Path) -> VcsResult<Option<String>> {
        Ok(self.branches.get(dir).cloned())
    }

    fn has_branch(&self, dir: &Path, name: &str) -> VcsResult<bool> {
        Ok(self.branches.get(dir).is_some_and(|branch| branch == name))
    }

    fn format_patches(&self, dir: &Path, upstream: &str, out_dir: &Path) -> VcsResult<()> {
        self.record(Call::FormatPatches(dir.to_path_buf()));
        if self.unknown_upstream.contains(dir) {
            return Err(VcsError::Syscall(SyscallError::Failed {
                command: "git format-patch".into(),
                status: Some(128),
                message: format!("fatal: bad revision '{upstream}'"),
            }));
        }

        for (name, contents) in self.commits.get(dir).into_iter().flatten() {
            write(out_dir.join(name), contents).expect("write fake patch");
        }
        Ok(())
    }

    fn reset(&self, dir: &Path, revision: &str, mode: ResetMode) -> VcsResult<String> {
        self.record(Call::Reset(dir.to_path_buf(), mode));
        Ok(revision.to_string())
    }

    fn apply_patches(&self, dir: &Path, patches: &[PathBuf]) -> VcsResult<()> {
        let names = patches
            .iter()
            .filter_map(|patch| patch.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();
        self.record(Call::ApplyPatches(dir.to_path_buf(), names));

        if self.conflicts.contains(dir) {
            return Err(VcsError::Conflict {
                message: "patch does not apply".into(),
            });
        }

        Ok(())
    }
}
