//! `minibox init`: isolated entry point re-executed by `run`.
//!
//! Never returns an error: setup and start failures are printed and
//! reported as exit code 1 so the parent can pass them through.

use std::fmt::Display;
use std::path::PathBuf;

use clap::Args;
use minibox_common::constants::{APP_NAME, SETUP_FAILURE_EXIT_CODE};
use minibox_core::bootstrap::LinuxIsolator;
use minibox_runtime::init::enter_and_run;
use minibox_runtime::process::{CommandSpec, InheritedStdioRunner};

/// Arguments for the `init` command.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Root filesystem to change into.
    #[arg(long)]
    pub rootfs: PathBuf,

    /// Hostname for the new UTS namespace.
    #[arg(long)]
    pub hostname: Option<String>,

    /// Command and arguments, after `--`.
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Executes the `init` command and returns the exit code to report.
#[must_use]
pub fn execute(args: &InitArgs) -> i32 {
    let Some(command) = CommandSpec::from_argv(&args.command) else {
        return setup_failed("no command given");
    };

    let isolator = match &args.hostname {
        Some(hostname) => match LinuxIsolator::new().with_hostname(hostname.as_str()) {
            Ok(isolator) => isolator,
            Err(e) => return setup_failed(e),
        },
        None => LinuxIsolator::new(),
    };

    match enter_and_run(isolator, &InheritedStdioRunner, &args.rootfs, &command) {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!(error = ?e, "init failed");
            setup_failed(e)
        }
    }
}

/// Reports `cause` on stderr and returns the setup failure exit code.
fn setup_failed(cause: impl Display) -> i32 {
    #[allow(clippy::print_stderr)]
    {
        eprintln!("{APP_NAME}: {cause}");
    }
    SETUP_FAILURE_EXIT_CODE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_hostname_fails_before_isolation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let args = InitArgs {
            rootfs: dir.path().to_path_buf(),
            hostname: Some("not a hostname".into()),
            command: vec!["true".into()],
        };
        assert_eq!(execute(&args), SETUP_FAILURE_EXIT_CODE);
    }

    #[test]
    fn missing_rootfs_fails_with_setup_code() {
        let dir = tempfile::tempdir().expect("tempdir");
        let args = InitArgs {
            rootfs: dir.path().join("absent"),
            hostname: None,
            command: vec!["true".into()],
        };
        assert_eq!(execute(&args), SETUP_FAILURE_EXIT_CODE);
    }
}
