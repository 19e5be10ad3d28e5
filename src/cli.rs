// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `clampany`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "clampany",
    version,
    about = "Run a dependency graph of tasks across AI, human and shell roles.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the tasks file (TOML).
    #[arg(long, value_name = "PATH", default_value = "tasks.toml")]
    pub tasks: PathBuf,

    /// Path to the roles file (TOML).
    #[arg(long, value_name = "PATH", default_value = "roles.toml")]
    pub roles: PathBuf,

    /// Directory that receives one `run-<id>` directory per run.
    #[arg(long, value_name = "DIR", default_value = "runs")]
    pub output_dir: PathBuf,

    /// Number of local workers. Overrides `[settings].max_parallel`.
    #[arg(long, value_name = "N")]
    pub max_parallel: Option<usize>,

    /// Directory holding the `<role>_queue.md` files for AI sessions.
    #[arg(long, value_name = "DIR", default_value = "clampany_queue")]
    pub queue_dir: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CLAMPANY_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the execution order, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,
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
