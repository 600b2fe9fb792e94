// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Multi-repository manifest tool access.
//!
//! The source tree is managed by a manifest tool (`repo`), which knows what
//! revision every project is pinned to, and can broadcast commands across
//! every project it manages. Repatch never parses the manifest itself. It
//! only asks the tool the following questions:
//!
//! - Where is the root of the source tree?
//! - What revision is this project pinned to?
//! - Which projects currently sit on the tracking branch?
//!
//! Along with two mutations: starting the tracking branch in a project, and
//! abandoning it across a list of projects.

use crate::syscall::{syscall, SyscallError};

use std::{
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, instrument};

/// Environment variable carrying the tracking branch name into broadcasts.
const BRANCH_ENV: &str = "REPATCH_BRANCH";

/// Layer of indirection for manifest tool access.
pub trait Manifest {
    /// Start tracking branch `branch` in project at `project_dir`.
    ///
    /// Creates the branch from the pinned revision when it does not exist, or
    /// switches to it otherwise.
    fn start_branch(&self, branch: &str, project_dir: &Path) -> Result<()>;

    /// Revision the project at `project_dir` is pinned to.
    ///
    /// May be empty if the manifest pins nothing for the project.
    fn pinned_revision(&self, project_dir: &Path) -> Result<String>;

    /// Names of every project whose HEAD is on tracking branch `branch`.
    fn projects_on_branch(&self, branch: &str) -> Result<Vec<String>>;

    /// Abandon tracking branch `branch` across `projects`.
    fn abandon(&self, branch: &str, projects: &[String]) -> Result<()>;
}

/// Manifest tool access through the `repo` binary.
#[derive(Debug, Clone)]
pub struct RepoTool {
    program: String,
    top: PathBuf,
}

impl RepoTool {
    /// Construct new manifest tool access for tree rooted at `top`.
    pub fn new(program: impl Into<String>, top: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            top: top.into(),
        }
    }

    /// Ask manifest tool for the root of the source tree containing `cwd`.
    ///
    /// # Errors
    ///
    /// - Return [`ManifestError::Syscall`] if the manifest tool fails.
    /// - Return [`ManifestError::NoTopLevel`] if the tool reports nothing.
    #[instrument(skip(program, cwd), level = "debug")]
    pub fn top_level(program: impl AsRef<str>, cwd: impl AsRef<Path>) -> Result<PathBuf> {
        let output = syscall(
            Command::new(program.as_ref())
                .arg("--show-toplevel")
                .current_dir(cwd.as_ref()),
        )?;

        let top = output.stdout.trim();
        if top.is_empty() {
            return Err(ManifestError::NoTopLevel {
                cwd: cwd.as_ref().to_path_buf(),
            });
        }

        Ok(PathBuf::from(top))
    }

    fn command(&self, cwd: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command.current_dir(cwd);
        command
    }
}

impl Manifest for RepoTool {
    #[instrument(skip(self), level = "debug")]
    fn start_branch(&self, branch: &str, project_dir: &Path) -> Result<()> {
        let output = syscall(self.command(project_dir).args(["start", branch, "."]))?;
        debug!("{}", output.message());

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn pinned_revision(&self, project_dir: &Path) -> Result<String> {
        let output = syscall(
            self.command(project_dir)
                .arg("forall")
                .arg(project_dir)
                .args(["-c", "echo $REPO_LREV"]),
        )?;

        Ok(output.stdout.trim().to_string())
    }

    #[instrument(skip(self), level = "debug")]
    fn projects_on_branch(&self, branch: &str) -> Result<Vec<String>> {
        // INVARIANT: Branch name travels through environment, never through the script text.
        let script = format!(
            "if [ \"$(git rev-parse --abbrev-ref HEAD)\" = \"${BRANCH_ENV}\" ]; then echo \"$REPO_PATH\"; fi"
        );
        let output = syscall(
            self.command(&self.top)
                .env(BRANCH_ENV, branch)
                .args(["forall", "-c", script.as_str()]),
        )?;

        Ok(parse_project_list(&output.stdout))
    }

    #[instrument(skip(self), level = "debug")]
    fn abandon(&self, branch: &str, projects: &[String]) -> Result<()> {
        if projects.is_empty() {
            return Ok(());
        }

        let output = syscall(
            self.command(&self.top)
                .args(["abandon", "--quiet", branch])
                .args(projects),
        )?;
        debug!("{}", output.message());

        Ok(())
    }
}

fn parse_project_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Manifest tool error types.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// Manifest tool reported no source tree root.
    #[error("no source tree root found from {:?}", cwd.display())]
    NoTopLevel { cwd: PathBuf },

    /// Manifest tool invocation failed.
    #[error(transparent)]
    Syscall(#[from] SyscallError),
}

/// Friendly result alias :3
pub type Result<T, E = ManifestError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_projects_on_branch() {
        let stdout = indoc! {"
            frameworks/base

              packages/apps/Settings
            system/core
        "};
        let result = parse_project_list(stdout);
        let expect = vec![
            "frameworks/base".to_string(),
            "packages/apps/Settings".to_string(),
            "system/core".to_string(),
        ];
        assert_eq!(result, expect);
        assert!(parse_project_list("").is_empty());
    }
}
