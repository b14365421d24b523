//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::migrate::Variant;

/// Top-level CLI parser for `dotmigrate`.
#[derive(Debug, Parser)]
#[command(
    name = "dotmigrate",
    version,
    about = "Migrate legacy .NET solutions into microservice repositories"
)]
pub struct Cli {
    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by the commands that shape the target.
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    /// Target framework moniker.
    #[arg(long, default_value = "net8.0")]
    pub target_version: String,
    /// Generate gRPC services instead of REST controllers.
    #[arg(long)]
    pub grpc: bool,
    /// How to split the solution, e.g. "split into orders and users".
    #[arg(long)]
    pub instruction: Option<String>,
}

impl TargetArgs {
    /// The generation variant selected by `--grpc`.
    #[must_use]
    pub fn variant(&self) -> Variant {
        if self.grpc {
            Variant::Grpc
        } else {
            Variant::Rest
        }
    }
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Analyse a legacy source tree file by file.
    Analyze {
        /// Root of the legacy solution.
        #[arg(long)]
        source: PathBuf,
        /// Where to write the analysis JSON.
        #[arg(long)]
        output: PathBuf,
        /// Only record the file tree, without LLM analysis.
        #[arg(long)]
        basic: bool,
    },
    /// Propose a target microservice structure from an analysis.
    Plan {
        /// Analysis JSON written by `analyze`.
        #[arg(long)]
        analysis: PathBuf,
        /// Where to write the target structure JSON.
        #[arg(long)]
        output: PathBuf,
        /// Target framework, variant and split instruction.
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Generate the microservice repository from a target structure.
    Migrate {
        /// Target structure JSON written by `plan`.
        #[arg(long)]
        structure: PathBuf,
        /// Root of the legacy solution.
        #[arg(long)]
        source: PathBuf,
        /// Analysis JSON used as retrieval context.
        #[arg(long)]
        analysis: Option<PathBuf>,
        /// Directory receiving the repository, archive and report.
        #[arg(long)]
        output: PathBuf,
        /// Name of the generated repository.
        #[arg(long)]
        repo_name: String,
        /// Directory for retrieval indexes (defaults to `<output>/.dotmigrate`).
        #[arg(long)]
        workspace: Option<PathBuf>,
        /// Reuse persisted retrieval indexes built from the same documents
        /// instead of rebuilding them.
        #[arg(long)]
        reuse_index: bool,
        /// Target framework, variant and split instruction.
        #[command(flatten)]
        target: TargetArgs,
    },
}
