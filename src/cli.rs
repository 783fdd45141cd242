// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::graph::invocation::DEFAULT;

/// Command-line arguments for `wpwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "wpwatch",
    version,
    about = "Build and live-reload WordPress theme assets.",
    long_about = None
)]
pub struct CliArgs {
    /// Task to run: `default`, `build`, `fonts`, `serve` or a single step
    /// such as `styles`.
    #[arg(value_name = "TASK", default_value = DEFAULT)]
    pub task: String,

    /// Path to the config file (TOML).
    ///
    /// Default: `wpwatch.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "wpwatch.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WPWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the task graph and watch bindings, but don't
    /// run anything.
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
