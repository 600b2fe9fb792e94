// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version control access for project working trees.
//!
//! Inspection (working tree status, repository state, branches, local
//! configuration) goes through libgit2. Operations libgit2 cannot express the
//! way we need them, i.e., format-patch with deterministic headers, three-way
//! mailbox application, and keep-style resets, are delegated to the Git
//! binary itself.

use crate::syscall::{syscall, SyscallError};

use git2::{BranchType, ConfigLevel, ErrorCode, Repository, RepositoryState, StatusOptions};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, instrument};

/// Intermediate state a working tree can be left in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeState {
    /// Nothing in progress.
    Clean,

    /// Mailbox application (`git am`) in progress.
    Applying,

    /// Some other operation in progress, e.g., merge, rebase, cherry-pick.
    Busy(RepositoryState),
}

impl Display for TreeState {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Clean => fmt.write_str("clean"),
            Self::Applying => fmt.write_str("patch application in progress"),
            Self::Busy(state) => write!(fmt, "{state:?} in progress"),
        }
    }
}

/// How to move a branch back to upstream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    /// Keep working tree changes not touched by the reset.
    #[default]
    Keep,

    /// Discard everything.
    Hard,
}

impl ResetMode {
    fn as_flag(&self) -> &'static str {
        match self {
            Self::Keep => "--keep",
            Self::Hard => "--hard",
        }
    }
}

/// Layer of indirection for version control access.
pub trait Vcs {
    /// Check if `dir` is a non-bare version controlled working tree.
    fn is_work_tree(&self, dir: &Path) -> bool;

    /// Check if working tree has anything to show in its status.
    fn is_dirty(&self, dir: &Path) -> Result<bool>;

    /// Determine intermediate state of working tree.
    fn state(&self, dir: &Path) -> Result<TreeState>;

    /// Abort in-progress patch application.
    fn abort_apply(&self, dir: &Path) -> Result<()>;

    /// Disable commit signing in local repository configuration.
    fn disable_signing(&self, dir: &Path) -> Result<()>;

    /// Name of branch HEAD points to, if any.
    fn current_branch(&self, dir: &Path) -> Result<Option<String>>;

    /// Check if local branch `name` exists.
    fn has_branch(&self, dir: &Path, name: &str) -> Result<bool>;

    /// Write one patch file per commit between `upstream` and HEAD into
    /// `out_dir`, in commit order.
    fn format_patches(&self, dir: &Path, upstream: &str, out_dir: &Path) -> Result<()>;

    /// Reset branch and working tree to `revision`, returning the new HEAD.
    fn reset(&self, dir: &Path, revision: &str, mode: ResetMode) -> Result<String>;

    /// Apply ordered `patches` as commits via three-way merge.
    fn apply_patches(&self, dir: &Path, patches: &[PathBuf]) -> Result<()>;
}

/// Version control access through libgit2 and the Git binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCli {
    /// Construct new version control access through Git binary `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn open(&self, dir: &Path) -> Result<Repository> {
        Repository::open(dir).map_err(|err| VcsError::Open {
            source: err,
            dir: dir.to_path_buf(),
        })
    }

    fn git(&self, dir: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command.current_dir(dir);
        command
    }
}

impl Vcs for GitCli {
    fn is_work_tree(&self, dir: &Path) -> bool {
        Repository::open(dir)
            .map(|repo| !repo.is_bare())
            .unwrap_or(false)
    }

    fn is_dirty(&self, dir: &Path) -> Result<bool> {
        let repo = self.open(dir)?;
        let mut opts = StatusOptions::new();
        opts.include_untracked(true).include_ignored(false);
        let statuses = repo.statuses(Some(&mut opts))?;

        Ok(!statuses.is_empty())
    }

    fn state(&self, dir: &Path) -> Result<TreeState> {
        let repo = self.open(dir)?;
        let state = match repo.state() {
            RepositoryState::Clean => TreeState::Clean,
            RepositoryState::ApplyMailbox | RepositoryState::ApplyMailboxOrRebase => {
                TreeState::Applying
            }
            other => TreeState::Busy(other),
        };

        Ok(state)
    }

    #[instrument(skip(self), level = "debug")]
    fn abort_apply(&self, dir: &Path) -> Result<()> {
        syscall(self.git(dir).args(["am", "--abort"]))?;

        Ok(())
    }

    fn disable_signing(&self, dir: &Path) -> Result<()> {
        let repo = self.open(dir)?;
        let mut config = repo.config()?.open_level(ConfigLevel::Local)?;
        config.set_bool("commit.gpgsign", false)?;

        Ok(())
    }

    fn current_branch(&self, dir: &Path) -> Result<Option<String>> {
        let repo = self.open(dir)?;
        let head = match repo.head() {
            Ok(head) => head,
            Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                return Ok(None)
            }
            Err(err) => return Err(err.into()),
        };

        if !head.is_branch() {
            return Ok(None);
        }

        Ok(head.shorthand().map(ToString::to_string))
    }

    fn has_branch(&self, dir: &Path, name: &str) -> Result<bool> {
        let repo = self.open(dir)?;
        let found = match repo.find_branch(name, BranchType::Local) {
            Ok(_) => true,
            Err(err) if err.code() == ErrorCode::NotFound => false,
            Err(err) => return Err(err.into()),
        };

        Ok(found)
    }

    #[instrument(skip(self), level = "debug")]
    fn format_patches(&self, dir: &Path, upstream: &str, out_dir: &Path) -> Result<()> {
        // INVARIANT: Headers must not depend on commit ids, so rebuilding
        // without new commits reproduces byte-identical files.
        syscall(
            self.git(dir)
                .args([
                    "format-patch",
                    "--quiet",
                    "--no-stat",
                    "--no-numbered",
                    "--zero-commit",
                    "--full-index",
                    "--no-signature",
                    "-o",
                ])
                .arg(out_dir)
                .arg(upstream),
        )?;

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn reset(&self, dir: &Path, revision: &str, mode: ResetMode) -> Result<String> {
        let output = syscall(self.git(dir).args(["reset", mode.as_flag(), revision]))?;
        debug!("{}", output.message());

        let repo = self.open(dir)?;
        let head = repo.head()?.peel_to_commit()?.id();

        Ok(head.to_string())
    }

    #[instrument(skip(self, patches), level = "debug")]
    fn apply_patches(&self, dir: &Path, patches: &[PathBuf]) -> Result<()> {
        if patches.is_empty() {
            return Ok(());
        }

        let result = syscall(
            self.git(dir)
                .args(["am", "--3way", "--ignore-whitespace"])
                .args(patches),
        );

        match result {
            Ok(output) => {
                debug!("{}", output.message());
                Ok(())
            }
            // INVARIANT: A failure that leaves a mailbox session behind is a conflict.
            Err(SyscallError::Failed { message, .. })
                if self.state(dir)? == TreeState::Applying =>
            {
                Err(VcsError::Conflict { message })
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Version control error types.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// Directory cannot be opened as repository.
    #[error("failed to open repository at {:?}", dir.display())]
    Open {
        #[source]
        source: git2::Error,
        dir: PathBuf,
    },

    /// Patch application stopped on a conflict.
    #[error("patch application stopped on conflict:\n{message}")]
    Conflict { message: String },

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),

    /// Git binary invocation failed.
    #[error(transparent)]
    Syscall(#[from] SyscallError),
}

/// Friendly result alias :3
pub type Result<T, E = VcsError> = std::result::Result<T, E>;
