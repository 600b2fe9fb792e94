// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External program invocation.
//!
//! Both the manifest tool and the version control tool are driven as plain
//! child processes. Every call blocks until the child exits. Output is always
//! captured so it can be logged, parsed, or attached to an error.

use std::process::Command;
use tracing::{debug, instrument};

/// Captured output of a successful external program call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Captured {
    /// Standard output with trailing newlines chomped.
    pub stdout: String,

    /// Standard error with trailing newlines chomped.
    pub stderr: String,
}

impl Captured {
    /// Combine stdout and stderr into one message for logging.
    pub fn message(&self) -> String {
        let mut message = String::new();
        if !self.stdout.is_empty() {
            message.push_str(&self.stdout);
        }

        if !self.stderr.is_empty() {
            if !message.is_empty() {
                message.push('\n');
            }
            message.push_str(&self.stderr);
        }

        message
    }
}

/// Run external program to completion, capturing its output.
///
/// # Errors
///
/// - Return [`SyscallError::Spawn`] if program cannot be started.
/// - Return [`SyscallError::Failed`] if program exits unsuccessfully.
#[instrument(skip(command), fields(program = ?command.get_program()), level = "debug")]
pub fn syscall(command: &mut Command) -> Result<Captured> {
    let line = render(command);
    debug!("run {line}");

    let output = command.output().map_err(|err| SyscallError::Spawn {
        source: err,
        command: line.clone(),
    })?;

    let captured = Captured {
        stdout: chomp(String::from_utf8_lossy(output.stdout.as_slice()).into_owned()),
        stderr: chomp(String::from_utf8_lossy(output.stderr.as_slice()).into_owned()),
    };

    if !output.status.success() {
        return Err(SyscallError::Failed {
            command: line,
            status: output.status.code(),
            message: captured.message(),
        });
    }

    Ok(captured)
}

fn render(command: &Command) -> String {
    let mut line = command.get_program().to_string_lossy().into_owned();
    for arg in command.get_args() {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }

    line
}

// INVARIANT: Chomp trailing newlines.
fn chomp(message: String) -> String {
    message.trim_end_matches(['\r', '\n']).to_string()
}

/// External program invocation error types.
#[derive(Debug, thiserror::Error)]
pub enum SyscallError {
    /// Program could not be started at all.
    #[error("failed to run {command:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        command: String,
    },

    /// Program ran, but exited unsuccessfully.
    #[error("command {command:?} failed with status {}:\n{message}", display_status(status))]
    Failed {
        command: String,
        status: Option<i32>,
        message: String,
    },
}

fn display_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "signal".into(),
    }
}

/// Friendly result alias :3
pub type Result<T, E = SyscallError> = std::result::Result<T, E>;
