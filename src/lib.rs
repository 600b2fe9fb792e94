// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Patch lifecycle management for multi-repository source trees.
//!
//! A source tree managed by `repo` pins every project to some upstream
//! revision. Local changes are kept as commits on a tracking branch in each
//! project, and mirrored as ordered patch files in a __patch tree__ that
//! lives next to the manifest. The patch tree is the durable form. It can be
//! committed, reviewed, and replayed on a fresh checkout.
//!
//! # Patch Tree
//!
//! ```text
//! <top>/.repo/manifests/patches/
//! ├── README.md               feature index
//! ├── device/board/
//! │   ├── 0001-Add-login.patch
//! │   └── 0002-Tweak-colors.patch
//! └── external/tool/
//!     └── .keep               tracked, no local commits
//! ```
//!
//! Every directory holding at least one file is a tracked project, named by
//! its path relative to the patch tree root. The same relative path under
//! the source tree root is the project's working tree.
//!
//! # See Also
//!
//! 1. [`Lifecycle`]
//! 2. [`ProjectRegistry`]

pub mod config;
pub mod lifecycle;
pub mod manifest;
pub mod patch;
pub mod path;
pub mod project;
pub mod readme;
pub mod revision;
pub mod style;
pub mod syscall;
pub mod vcs;

#[cfg(test)]
mod testing;

pub use config::{Layout, Settings};
pub use lifecycle::{Lifecycle, LifecycleError, Operation, Outcome, Report};
pub use manifest::{Manifest, RepoTool};
pub use project::{Project, ProjectRegistry};
pub use vcs::{GitCli, ResetMode, Vcs};
