// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use repatch::{
    path::default_settings_file, GitCli, Layout, Lifecycle, Operation, RepoTool, Settings,
};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::{
    env::current_dir,
    path::{absolute, PathBuf},
    process::exit,
};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "repatch [options] <repatch-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to settings file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Root of source tree instead of asking the manifest tool.
    #[arg(short, long, global = true, value_name = "path")]
    pub top: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let settings = match self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::load_or_default(default_settings_file()?)?,
        };

        let top = match self.top {
            Some(top) => absolute(top)?,
            None => RepoTool::top_level(&settings.tools.manifest, current_dir()?)?,
        };

        let layout = Layout::new(top, &settings);
        let manifest = RepoTool::new(&settings.tools.manifest, layout.top());
        let vcs = GitCli::new(&settings.tools.git);
        let lifecycle = Lifecycle::open(&layout, manifest, vcs);

        let operation = match self.command {
            Command::Init(opts) => Operation::Init {
                path: absolute(opts.project)?,
            },
            Command::Rebuild(opts) => Operation::Rebuild {
                projects: opts.projects,
            },
            Command::Apply(opts) => Operation::Apply {
                projects: opts.projects,
                discard: opts.discard,
            },
        };

        let report = lifecycle.run(operation)?;
        if !report.is_success() {
            let failed = report.failed();
            return match failed.is_empty() {
                true => Err(anyhow!("operation finished with errors")),
                false => Err(anyhow!("failed projects: {}", failed.join(", "))),
            };
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Start tracking a project, and create its tracking branch.
    #[command(override_usage = "repatch init [options] <project>")]
    Init(InitOptions),

    /// Regenerate patch files from local commits.
    #[command(override_usage = "repatch rebuild [options] [<project>]...")]
    Rebuild(RebuildOptions),

    /// Reset projects to upstream and replay their patch files.
    #[command(override_usage = "repatch apply [options] [<project>]...")]
    Apply(ApplyOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InitOptions {
    /// Path to project working tree.
    #[arg(required = true, value_name = "project")]
    pub project: PathBuf,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RebuildOptions {
    /// Projects to rebuild, all tracked projects if none given.
    #[arg(value_name = "project")]
    pub projects: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ApplyOptions {
    /// Throw away uncommitted changes of named projects.
    #[arg(short, long, requires = "projects")]
    pub discard: bool,

    /// Projects to apply, all tracked projects if none given.
    #[arg(value_name = "project")]
    pub projects: Vec<String>,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = Cli::parse().run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}
