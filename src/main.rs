//! # Tryton Tasks CLI
//!
//! This is the binary entry point for the `tryton-tasks` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Setting up logging and colored output from the global flags.
//! - Executing the appropriate command based on the parsed arguments.
//!
//! The synchronization engine lives in the `lib.rs` library crate; the
//! binary is a thin wrapper around it.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tryton_tasks::output::OutputConfig;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    let global = cli.global();

    env_logger::Builder::new()
        .parse_filters(&global.log_level)
        .parse_default_env()
        .format_timestamp(None)
        .init();

    // JSON reports are never colored.
    let color = match global.format {
        cli::OutputFormat::Json => "never",
        cli::OutputFormat::Text => global.color.as_str(),
    };
    let output = OutputConfig::from_env_and_flag(color);
    output.apply();

    cli.execute()
}
