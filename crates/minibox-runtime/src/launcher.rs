//! Starts the isolated init process.
//!
//! The parent re-executes its own binary in `init` mode so that the PID
//! namespace unshare happens in a process that still has a child to spawn,
//! while the parent stays outside the chroot and can clean up afterwards.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use minibox_common::constants::INIT_SUBCOMMAND;
use minibox_common::error::{MiniboxError, Result};

use crate::process::{CommandSpec, exit_code_of};

/// Everything the init process needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Materialized root filesystem to change into.
    pub rootfs: PathBuf,
    /// Hostname for the new UTS namespace.
    pub hostname: Option<String>,
    /// Command to run inside the container.
    pub command: CommandSpec,
    /// Number of `-v` flags handed to init so its logs match the parent's.
    pub verbosity: u8,
}

impl LaunchRequest {
    /// Arguments for `<binary> init ...`, command last after `--`.
    #[must_use]
    pub fn init_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![INIT_SUBCOMMAND.into()];
        if self.verbosity > 0 {
            args.push(format!("-{}", "v".repeat(usize::from(self.verbosity))).into());
        }
        args.push("--rootfs".into());
        args.push(self.rootfs.clone().into());
        if let Some(hostname) = &self.hostname {
            args.push("--hostname".into());
            args.push(hostname.into());
        }
        args.push("--".into());
        args.push((&self.command.program).into());
        args.extend(self.command.args.iter().map(OsString::from));
        args
    }
}

/// Spawns init processes and waits for them.
#[derive(Debug, Clone)]
pub struct Launcher {
    program: PathBuf,
    leading_args: Vec<OsString>,
}

impl Launcher {
    /// Launcher re-executing the running binary.
    ///
    /// # Errors
    ///
    /// Returns `MiniboxError::Launch` if the executable path is unavailable.
    pub fn current_exe() -> Result<Self> {
        let program = std::env::current_exe().map_err(|e| MiniboxError::Launch {
            message: format!("cannot locate own executable: {e}"),
        })?;
        Ok(Self::with_program(program, Vec::new()))
    }

    /// Launcher running `program leading_args... init ...` instead.
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>, leading_args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            leading_args,
        }
    }

    /// Program this launcher executes.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Runs the init process with inherited stdio and returns its exit code.
    ///
    /// # Errors
    ///
    /// Returns `MiniboxError::Launch` if the process cannot be started.
    pub fn launch(&self, request: &LaunchRequest) -> Result<i32> {
        tracing::debug!(
            program = %self.program.display(),
            rootfs = %request.rootfs.display(),
            "launching init"
        );
        let status = Command::new(&self.program)
            .args(&self.leading_args)
            .args(request.init_args())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| MiniboxError::Launch {
                message: format!("{}: {e}", self.program.display()),
            })?;
        Ok(exit_code_of(status))
    }
}

/// Re-executes the running binary in `init` mode for `request`.
///
/// # Errors
///
/// Returns `MiniboxError::Launch` if the init process cannot be started.
pub fn launch_isolated(request: &LaunchRequest) -> Result<i32> {
    Launcher::current_exe()?.launch(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(hostname: Option<&str>) -> LaunchRequest {
        LaunchRequest {
            rootfs: PathBuf::from("/tmp/minibox-x/rootfs"),
            hostname: hostname.map(String::from),
            command: CommandSpec::new("sh", vec!["-c".into(), "exit 3".into()]),
            verbosity: 0,
        }
    }

    #[test]
    fn init_args_put_command_after_separator() {
        let args = request(None).init_args();
        assert_eq!(
            args,
            ["init", "--rootfs", "/tmp/minibox-x/rootfs", "--", "sh", "-c", "exit 3"]
                .map(OsString::from)
        );
    }

    #[test]
    fn init_args_carry_hostname() {
        let args = request(Some("box")).init_args();
        assert_eq!(&args[3..5], &[OsString::from("--hostname"), OsString::from("box")]);
    }

    #[test]
    fn init_args_forward_verbosity() {
        let request = LaunchRequest {
            verbosity: 2,
            ..request(None)
        };
        let args = request.init_args();
        assert_eq!(&args[..3], &[OsString::from("init"), OsString::from("-vv"), OsString::from("--rootfs")]);
    }

    #[test]
    fn launch_passes_arguments_and_returns_exit_code() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("argv");
        let script = dir.path().join("init.sh");
        std::fs::write(
            &script,
            format!("printf '%s\\n' \"$@\" > '{}'\nexit 9\n", out.display()),
        )
        .expect("script");

        let launcher = Launcher::with_program("sh", vec![script.into()]);
        let code = launcher.launch(&request(Some("box"))).expect("launch");

        assert_eq!(code, 9);
        let recorded = std::fs::read_to_string(&out).expect("argv");
        assert_eq!(
            recorded.lines().collect::<Vec<_>>(),
            ["init", "--rootfs", "/tmp/minibox-x/rootfs", "--hostname", "box", "--", "sh", "-c", "exit 3"]
        );
    }

    #[test]
    fn unstartable_program_is_launch_error() {
        let launcher = Launcher::with_program("/nonexistent/minibox", Vec::new());
        let err = launcher.launch(&request(None)).unwrap_err();
        assert!(matches!(err, MiniboxError::Launch { .. }));
    }
}
