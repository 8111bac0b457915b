//! # minibox
//!
//! Pulls an image from a Docker-compatible registry and runs a single
//! command inside it, isolated by chroot and fresh UTS, PID, and mount
//! namespaces. The command's exit code becomes minibox's exit code.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

mod commands;

use std::process::ExitCode;

use clap::Parser;
use minibox_common::constants::{APP_NAME, SETUP_FAILURE_EXIT_CODE};
use tracing_subscriber::EnvFilter;

use crate::commands::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match commands::execute(cli) {
        Ok(code) => code,
        Err(e) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("{APP_NAME}: {e:#}");
            }
            SETUP_FAILURE_EXIT_CODE
        }
    };
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

/// Logs go to stderr; stdout belongs to the contained command.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
