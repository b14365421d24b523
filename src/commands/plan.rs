//! `dotmigrate plan` command.

use std::path::Path;

use tokio::sync::Semaphore;

use super::{block_on, read_input};
use crate::analysis::ProjectAnalyzer;
use crate::cli::TargetArgs;
use crate::config::Settings;
use crate::context::ServiceContext;
use crate::usage::UsageTracker;

/// Execute the `plan` command: propose a target structure for the analysis
/// in `analysis` and write it to `output`.
///
/// # Errors
///
/// Returns an error string if the analysis cannot be read, the proposal
/// fails or the output cannot be written.
pub fn run(
    ctx: &ServiceContext,
    settings: &Settings,
    analysis: &Path,
    output: &Path,
    target: &TargetArgs,
) -> Result<(), String> {
    let text = read_input(ctx.fs.as_ref(), analysis)?;
    let tree: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| format!("Invalid analysis JSON in {}: {e}", analysis.display()))?;

    let gate = Semaphore::new(settings.max_concurrency.max(1));
    let usage = UsageTracker::new();
    let source_root = analysis.parent().unwrap_or(Path::new("."));
    let analyzer = ProjectAnalyzer::new(ctx, &gate, settings, &usage, source_root);

    let structure = block_on(analyzer.create_target_structure(
        &tree,
        &target.target_version,
        target.instruction.as_deref(),
        target.variant(),
    ))?
    .map_err(|e| e.to_string())?;

    let json = serde_json::to_string_pretty(&structure).map_err(|e| format!("Failed to serialize structure: {e}"))?;
    ctx.fs
        .write(output, &json)
        .map_err(|e| format!("Failed to write {}: {e}", output.display()))?;

    println!(
        "Target structure written to: {} ({} microservices, {} projects)",
        output.display(),
        structure.microservices.len(),
        structure.project_count()
    );
    Ok(())
}
