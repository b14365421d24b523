//! `dotmigrate analyze` command.

use std::path::Path;

use tokio::sync::Semaphore;
use tracing::info;

use super::block_on;
use crate::analysis::ProjectAnalyzer;
use crate::config::Settings;
use crate::context::ServiceContext;
use crate::usage::UsageTracker;

/// Execute the `analyze` command: scan `source` and write the analysis
/// tree to `output`.
///
/// # Errors
///
/// Returns an error string if the source cannot be scanned or the output
/// cannot be written.
pub fn run(ctx: &ServiceContext, settings: &Settings, source: &Path, output: &Path, basic: bool) -> Result<(), String> {
    if !source.is_dir() {
        return Err(format!("Source directory not found: {}", source.display()));
    }
    let gate = Semaphore::new(settings.max_concurrency.max(1));
    let usage = UsageTracker::new();
    let analyzer = ProjectAnalyzer::new(ctx, &gate, settings, &usage, source);

    let scanned = if basic { analyzer.basic_tree() } else { block_on(analyzer.analyzed_tree())? };
    let tree = scanned.map_err(|e| e.to_string())?;

    let text = serde_json::to_string_pretty(&tree).map_err(|e| format!("Failed to serialize analysis: {e}"))?;
    ctx.fs
        .write(output, &text)
        .map_err(|e| format!("Failed to write {}: {e}", output.display()))?;

    let totals = usage.totals();
    info!(calls = totals.calls, tokens = totals.total(), "analysis usage");
    println!("Analysis written to: {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_analysis_needs_no_model() {
        let source = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(source.path().join("Web/bin")).unwrap();
        std::fs::write(source.path().join("Web/Program.cs"), "class Program {}").unwrap();
        std::fs::write(source.path().join("Web/bin/Web.dll"), "").unwrap();
        let out = tempfile::tempdir().unwrap();
        let output = out.path().join("analysis.json");

        let settings = Settings::default();
        let ctx = ServiceContext::live(&settings);
        run(&ctx, &settings, source.path(), &output, true).unwrap();

        let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written, serde_json::json!({"Web": {"Program.cs": "file"}}));
    }

    #[test]
    fn missing_source_is_reported() {
        let settings = Settings::default();
        let ctx = ServiceContext::live(&settings);
        let err = run(&ctx, &settings, Path::new("/definitely/not/here"), Path::new("out.json"), true).unwrap_err();
        assert!(err.contains("Source directory not found"));
    }
}
