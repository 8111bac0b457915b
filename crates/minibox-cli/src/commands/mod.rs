//! CLI command definitions and dispatch.

pub mod init;
pub mod run;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// minibox: run one command inside a registry image.
#[derive(Parser, Debug)]
#[command(name = "minibox", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// JSON configuration file.
    #[arg(long, global = true, env = "MINIBOX_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pull an image and run a command inside it.
    Run(run::RunArgs),
    /// Isolated entry point started by `run`. Not meant to be called directly.
    #[command(hide = true)]
    Init(init::InitArgs),
}

/// Dispatches the parsed CLI command and returns the process exit code.
///
/// # Errors
///
/// Returns an error if the command fails before producing an exit code.
pub fn execute(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Command::Run(args) => run::execute(args, cli.config.as_deref(), cli.verbose),
        Command::Init(args) => Ok(init::execute(&args)),
    }
}
