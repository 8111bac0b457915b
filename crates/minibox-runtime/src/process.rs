//! Command execution with inherited standard streams.
//!
//! Starting the command and the command's own result are kept apart:
//! [`ProcessRunner::run`] returns the exit code when the command ran and
//! [`StartError`] when it never did.

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus, Stdio};

use minibox_common::constants::{SETUP_FAILURE_EXIT_CODE, SIGNAL_EXIT_OFFSET};
use thiserror::Error;

/// Program and arguments to run inside the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program path or name, resolved against the container's `PATH`.
    pub program: String,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Creates a command from a program and its arguments.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Splits an argv vector into program and arguments.
    #[must_use]
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }
}

/// The command could not be started or awaited.
#[derive(Debug, Error)]
#[error("could not start {program}: {source}")]
pub struct StartError {
    /// Program that failed to start.
    pub program: String,
    /// Underlying OS error.
    #[source]
    pub source: io::Error,
}

/// Runs a command to completion.
pub trait ProcessRunner {
    /// Runs `command` and returns its exit code.
    ///
    /// # Errors
    ///
    /// Returns `StartError` if the command could not be started.
    fn run(&self, command: &CommandSpec) -> Result<i32, StartError>;
}

/// Runner wiring the child's stdin, stdout, and stderr to this process's own.
#[derive(Debug, Clone, Copy, Default)]
pub struct InheritedStdioRunner;

impl ProcessRunner for InheritedStdioRunner {
    fn run(&self, command: &CommandSpec) -> Result<i32, StartError> {
        let start_err = |source| StartError {
            program: command.program.clone(),
            source,
        };
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(start_err)?;
        tracing::debug!(pid = child.id(), program = %command.program, "command started");

        let status = child.wait().map_err(start_err)?;
        let code = exit_code_of(status);
        tracing::debug!(code, program = %command.program, "command exited");
        Ok(code)
    }
}

/// Maps a wait status to a process exit code.
///
/// A normal exit keeps its code; death by signal `N` becomes `128 + N`.
#[must_use]
pub fn exit_code_of(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|signal| SIGNAL_EXIT_OFFSET + signal))
        .unwrap_or(SETUP_FAILURE_EXIT_CODE)
}
