//! `dotmigrate migrate` command.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{block_on, load_templates, read_input};
use crate::cli::TargetArgs;
use crate::config::Settings;
use crate::context::ServiceContext;
use crate::migrate::{MicroserviceOrchestrator, MigrationJob, MigrationOutcome};
use crate::retrieval::{RetrievalKind, RetrievalService};
use crate::structure::TargetStructure;

/// Directory under the output holding retrieval indexes by default.
const DEFAULT_WORKSPACE: &str = ".dotmigrate";

/// Parsed arguments of the `migrate` command.
#[derive(Debug, Clone, Copy)]
pub struct MigrateArgs<'a> {
    /// Target structure JSON.
    pub structure: &'a Path,
    /// Root of the legacy solution.
    pub source: &'a Path,
    /// Optional analysis JSON for the analysis retrieval service.
    pub analysis: Option<&'a Path>,
    /// Output directory.
    pub output: &'a Path,
    /// Repository name.
    pub repo_name: &'a str,
    /// Retrieval index directory override.
    pub workspace: Option<&'a Path>,
    /// Ignore persisted indexes.
    pub force_rebuild: bool,
    /// Target framework, variant and instruction.
    pub target: &'a TargetArgs,
}

impl MigrateArgs<'_> {
    fn workspace_dir(&self) -> PathBuf {
        self.workspace.map_or_else(|| self.output.join(DEFAULT_WORKSPACE), Path::to_path_buf)
    }
}

/// Execute the `migrate` command.
///
/// # Errors
///
/// Returns an error string if the structure cannot be read or is invalid,
/// the prompt templates cannot be loaded, or the report cannot be written.
/// Per-file and per-microservice failures are reported, not returned.
pub fn run(ctx: &ServiceContext, settings: &Settings, args: &MigrateArgs<'_>) -> Result<(), String> {
    if !args.source.is_dir() {
        return Err(format!("Source directory not found: {}", args.source.display()));
    }
    let structure_text = read_input(ctx.fs.as_ref(), args.structure)?;
    let structure = TargetStructure::from_json(&structure_text).map_err(|e| e.to_string())?;

    let workspace = args.workspace_dir();
    let mut context = RetrievalService::new(RetrievalKind::Context);
    if !context.initialize(ctx.fs.as_ref(), &structure_text, &workspace, args.force_rebuild) {
        warn!("generating without structure context");
    }
    let mut analysis = RetrievalService::new(RetrievalKind::Analysis);
    if let Some(path) = args.analysis {
        let text = read_input(ctx.fs.as_ref(), path)?;
        if !analysis.initialize(ctx.fs.as_ref(), &text, &workspace, args.force_rebuild) {
            warn!("generating without analysis context");
        }
    }

    let templates = load_templates(ctx.fs.as_ref(), settings)?;
    let job = MigrationJob {
        source_dir: args.source.to_path_buf(),
        output_dir: args.output.to_path_buf(),
        repo_name: args.repo_name.to_string(),
        target_version: args.target.target_version.clone(),
        variant: args.target.variant(),
        instruction: args.target.instruction.clone().unwrap_or_default(),
    };

    let orchestrator = MicroserviceOrchestrator::new(ctx, settings, templates, context, analysis);
    let outcome = block_on(orchestrator.run(&structure, &job))?.map_err(|e| e.to_string())?;

    let totals = orchestrator.usage().totals();
    info!(calls = totals.calls, tokens = totals.total(), "migration usage");
    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &MigrationOutcome) {
    for result in &outcome.results {
        println!(
            "{}/{}: {:?} ({}/{} files)",
            result.microservice,
            result.project_name,
            result.status(),
            result.successful_files.len(),
            result.total_files
        );
    }
    for failed in &outcome.report.failed_microservices {
        println!("{}: failed: {}", failed.name, failed.error);
    }
    match &outcome.archive {
        Some(path) => println!("Archive written to: {}", path.display()),
        None => println!("No archive was produced"),
    }
    println!("Report written to: {}", outcome.report_path.display());
}
