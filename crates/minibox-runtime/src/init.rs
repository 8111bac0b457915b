//! The isolated side of a run.
//!
//! Runs in the re-executed `init` process: changes root, unshares
//! namespaces, then starts the user command as the first process of the
//! new PID namespace and reports its exit code.

use std::path::Path;

use minibox_common::error::MiniboxError;
use minibox_core::bootstrap::{Isolator, Unisolated};
use thiserror::Error;

use crate::process::{CommandSpec, ProcessRunner, StartError};

/// Why the init process could not produce the command's exit code.
#[derive(Debug, Error)]
pub enum InitError {
    /// Isolation failed before the command was started.
    #[error(transparent)]
    Setup(#[from] MiniboxError),
    /// Isolation succeeded but the command could not be started.
    #[error(transparent)]
    Start(#[from] StartError),
}

/// Isolates the current process inside `rootfs` and runs `command`.
///
/// The command is only started once both isolation steps have succeeded.
///
/// # Errors
///
/// Returns `InitError::Setup` if either isolation step fails and
/// `InitError::Start` if the command cannot be started.
pub fn enter_and_run<I, R>(
    isolator: I,
    runner: &R,
    rootfs: &Path,
    command: &CommandSpec,
) -> Result<i32, InitError>
where
    I: Isolator,
    R: ProcessRunner + ?Sized,
{
    let isolated = Unisolated::new(isolator)
        .isolate_filesystem(rootfs)?
        .isolate_process()?;
    tracing::debug!(state = %isolated.state(), program = %command.program, "starting command");

    let code = runner.run(command)?;
    Ok(code)
}
