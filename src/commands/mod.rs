//! Command dispatch and handlers.

pub mod analyze;
pub mod migrate;
pub mod plan;

use std::env;
use std::future::Future;
use std::path::{Path, PathBuf};

use crate::adapters::live::id_gen::LiveIdGenerator;
use crate::cassette::session::RecordingSession;
use crate::cli::Command;
use crate::config::Settings;
use crate::context::ServiceContext;
use crate::generation::PromptTemplates;
use crate::ports::{FileSystem, IdGenerator};

/// Environment variable naming the directory cassettes are recorded into.
pub const RECORD_ENV: &str = "DOTMIGRATE_RECORD";

/// Dispatch a parsed command to its handler.
///
/// When `DOTMIGRATE_RECORD` is set to a directory path, LLM and build-tool
/// interactions are recorded to per-port cassette files in that directory.
///
/// # Errors
///
/// Returns an error string if configuration is invalid or the selected
/// command handler fails.
pub fn dispatch(command: &Command) -> Result<(), String> {
    let settings = Settings::from_env().map_err(|e| e.to_string())?;
    let (ctx, session) = if let Ok(path) = env::var(RECORD_ENV) {
        let run_id = LiveIdGenerator.generate_id();
        let (ctx, session) = ServiceContext::recording_at(&settings, &PathBuf::from(path), &run_id)?;
        (ctx, Some(session))
    } else {
        (ServiceContext::live(&settings), None)
    };

    let result = dispatch_with_context(command, &ctx, &settings);

    // Finish recording after the command completes, even on error.
    if let Some(session) = session {
        // Drop the context first to release the recorder handles.
        drop(ctx);
        finish_recording(session)?;
    }

    result
}

/// Dispatch a command with the given service context.
///
/// # Errors
///
/// Returns an error string if the command fails.
pub fn dispatch_with_context(command: &Command, ctx: &ServiceContext, settings: &Settings) -> Result<(), String> {
    match command {
        Command::Analyze { source, output, basic } => analyze::run(ctx, settings, source, output, *basic),
        Command::Plan { analysis, output, target } => plan::run(ctx, settings, analysis, output, target),
        Command::Migrate { structure, source, analysis, output, repo_name, workspace, reuse_index, target } => {
            let args = migrate::MigrateArgs {
                structure,
                source,
                analysis: analysis.as_deref(),
                output,
                repo_name,
                workspace: workspace.as_deref(),
                force_rebuild: !*reuse_index,
                target,
            };
            migrate::run(ctx, settings, &args)
        }
    }
}

/// Finish a recording session and print the output directory.
fn finish_recording(session: RecordingSession) -> Result<(), String> {
    let output_dir = session.finish()?;
    eprintln!("Recording saved to: {}", output_dir.display());
    Ok(())
}

/// Runs `future` to completion on a fresh multi-threaded runtime.
fn block_on<F: Future>(future: F) -> Result<F::Output, String> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start async runtime: {e}"))?;
    Ok(runtime.block_on(future))
}

/// Templates from `DOTMIGRATE_PROMPTS`, or the built-in fallbacks.
fn load_templates(fs: &dyn FileSystem, settings: &Settings) -> Result<PromptTemplates, String> {
    match &settings.prompts_path {
        Some(path) => PromptTemplates::load(fs, path).map_err(|e| e.to_string()),
        None => Ok(PromptTemplates::default()),
    }
}

/// Reads a whole file through the context, naming it in the error.
fn read_input(fs: &dyn FileSystem, path: &Path) -> Result<String, String> {
    fs.read_to_string(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))
}
