//! Core library entry for the `dotmigrate` CLI.
//!
//! The pipeline runs in three steps: `analyze` summarises a legacy .NET
//! solution file by file, `plan` proposes a microservice layout from that
//! analysis, and `migrate` generates every proposed file, builds solution
//! files, writes the gateway routing and packages the repository.

pub mod adapters;
pub mod analysis;
pub mod cache;
pub mod cassette;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod generation;
pub mod migrate;
pub mod ports;
pub mod retrieval;
pub mod structure;
pub mod usage;

use clap::Parser;

/// Run the CLI with the provided arguments.
///
/// # Errors
///
/// Returns an error string when argument parsing fails or command execution fails.
pub fn run<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = cli::Cli::try_parse_from(args).map_err(|err| err.to_string())?;
    commands::dispatch(&cli.command)
}
