// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::actions::TaskAction;

/// Command-line arguments for `procvisor`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "procvisor",
    version,
    about = "Run build and analysis tools and supervise a long-running service.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Procvisor.toml` in the current working directory, or the
    /// built-in defaults when that file does not exist.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROCVISOR_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the resolved commands, but don't execute any.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl CliArgs {
    /// The subcommand to run; `console` when none was given.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Console)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Interactive console (default).
    Console,

    /// Build the project with the configured build tool.
    Build,

    /// Build the shared context file from a project tree.
    Process {
        /// Project root (defaults to `[processor].project_path`).
        #[arg(long, value_name = "PATH")]
        project: Option<String>,
    },

    /// Run the analyzer and show its result file.
    Analyze {
        /// Target file (defaults to `[analyzer].target`).
        #[arg(long, value_name = "PATH")]
        target: Option<String>,
    },

    /// Run a specialist role and show the guide it writes.
    Specialist {
        /// Role key, e.g. `dba` or `qa` (see `roles`).
        role: String,

        /// Target file (defaults to the role's configured target).
        #[arg(long, value_name = "PATH")]
        target: Option<String>,
    },

    /// Start the service and stream its output until Ctrl-C or until it exits.
    Serve,

    /// List the configured specialist roles.
    Roles,
}

impl Command {
    /// The foreground task this subcommand runs, if it is one.
    pub fn task(&self) -> Option<TaskAction> {
        match self {
            Command::Build => Some(TaskAction::Build),
            Command::Process { project } => Some(TaskAction::Process {
                project: project.clone(),
            }),
            Command::Analyze { target } => Some(TaskAction::Analyze {
                target: target.clone(),
            }),
            Command::Specialist { role, target } => Some(TaskAction::Specialist {
                role: role.clone(),
                target: target.clone(),
            }),
            Command::Console | Command::Serve | Command::Roles => None,
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
