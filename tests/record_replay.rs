//! Record-replay round trip over a whole migration.
//!
//! 1. Run a migration with recording adapters wrapped around fake LLM and
//!    build-tool ports.
//! 2. Replay the session's cassettes with `ServiceContext::replaying_from`.
//! 3. Assert the replayed repository matches the recorded one, twice.

use std::path::Path;
use std::sync::Arc;

use dotmigrate::adapters::recording::{RecordingLlmClient, RecordingShellExecutor};
use dotmigrate::cassette::config::CassetteConfig;
use dotmigrate::cassette::session::RecordingSession;
use dotmigrate::config::Settings;
use dotmigrate::context::ServiceContext;
use dotmigrate::generation::PromptTemplates;
use dotmigrate::migrate::{MicroserviceOrchestrator, MigrationJob, Variant};
use dotmigrate::ports::{
    CompletionFuture, CompletionRequest, CompletionResponse, LlmClient, PortError, ShellExecutor, ShellOutput,
};
use dotmigrate::retrieval::{RetrievalKind, RetrievalService};
use dotmigrate::structure::TargetStructure;

const STRUCTURE: &str = r#"{"microservices": [
  {"name": "Orders", "projects": [
    {"project_name": "Orders.Api", "target_structure": {
      "root": {
        "Program.cs": {"file_type": "program", "description": "entry point"},
        "Orders.Api.csproj": {"file_type": "csproj", "description": "api project"}
      },
      "folders": {"Controllers": {"target_files": {
        "OrdersController.cs": {"file_type": "controller", "description": "orders endpoints"}}}}
    }},
    {"project_name": "Orders.Domain", "target_structure": {
      "root": {"Order.cs": {"file_type": "entity", "description": "order"}}
    }}
  ]}
]}"#;

/// Numbers its answers so a replay served out of order would show.
struct CountingLlm {
    calls: std::sync::atomic::AtomicUsize,
}

impl LlmClient for CountingLlm {
    fn complete(&self, request: &CompletionRequest) -> CompletionFuture<'_> {
        let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let name = request
            .prompt
            .split_once("a file named ")
            .and_then(|(_, rest)| rest.split_once(" of type"))
            .map_or("unknown", |(name, _)| name);
        let text = serde_json::json!({"generated_code": format!("// {name} #{n}"), "dependencies": []}).to_string();
        Box::pin(async move { Ok(CompletionResponse { text, prompt_tokens: 3, completion_tokens: 2 }) })
    }
}

struct OkShell;

impl ShellExecutor for OkShell {
    fn run(&self, _command: &str, _cwd: Option<&Path>) -> Result<ShellOutput, PortError> {
        Ok(ShellOutput { exit_code: 0, stdout: "ok".into(), stderr: String::new() })
    }
}

fn migrate(ctx: &ServiceContext, settings: &Settings, source: &Path, output: &Path) -> Vec<(String, String)> {
    let structure = TargetStructure::from_json(STRUCTURE).unwrap();
    let job = MigrationJob {
        source_dir: source.to_path_buf(),
        output_dir: output.to_path_buf(),
        repo_name: "shop".into(),
        target_version: "net8.0".into(),
        variant: Variant::Rest,
        instruction: String::new(),
    };
    let orchestrator = MicroserviceOrchestrator::new(
        ctx,
        settings,
        PromptTemplates::default(),
        RetrievalService::new(RetrievalKind::Context),
        RetrievalService::new(RetrievalKind::Analysis),
    );
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let outcome = runtime.block_on(orchestrator.run(&structure, &job)).unwrap();
    assert!(outcome.report.build_failures.is_empty());

    let repo = output.join("shop");
    let mut files: Vec<(String, String)> = walkdir::WalkDir::new(&repo)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(&repo).unwrap().to_string_lossy().replace('\\', "/");
            (rel, std::fs::read_to_string(e.path()).unwrap())
        })
        .collect();
    files.sort();
    files
}

#[test]
fn record_then_replay_produces_identical_repositories() {
    let settings = Settings::default();
    let source = tempfile::tempdir().unwrap();
    let cassettes = tempfile::tempdir().unwrap();

    // --- Phase 1: Record ---
    let session = RecordingSession::new(cassettes.path(), "run-1").unwrap();
    let recorded_out = tempfile::tempdir().unwrap();
    let recorded = {
        let ctx = ServiceContext {
            llm: Box::new(RecordingLlmClient::new(
                Box::new(CountingLlm { calls: 0.into() }),
                Arc::clone(&session.llm),
            )),
            shell: Box::new(RecordingShellExecutor::new(Box::new(OkShell), Arc::clone(&session.shell))),
            ..ServiceContext::live(&settings)
        };
        migrate(&ctx, &settings, source.path(), recorded_out.path())
    };
    let session_dir = session.finish().unwrap();

    assert_eq!(recorded.len(), 4);
    assert!(recorded.iter().any(|(path, code)| path == "Orders/Orders.Api/Program.cs" && code.starts_with("// ")));

    let llm = CassetteConfig::load(&session_dir.join("llm.cassette.yaml")).unwrap();
    assert_eq!(llm.count_for("llm"), 4);
    let shell = CassetteConfig::load(&session_dir.join("shell.cassette.yaml")).unwrap();
    assert!(shell.count_for("shell") >= 1);

    // --- Phase 2: Replay ---
    let config = CassetteConfig::from_session_dir(&session_dir);
    let replay_out = tempfile::tempdir().unwrap();
    let ctx = ServiceContext::replaying_from(&config).unwrap();
    let replayed = migrate(&ctx, &settings, source.path(), replay_out.path());
    assert_eq!(replayed, recorded, "replay diverged from recording");

    // --- Phase 3: Replay again for determinism ---
    let again_out = tempfile::tempdir().unwrap();
    let ctx = ServiceContext::replaying_from(&config).unwrap();
    let again = migrate(&ctx, &settings, source.path(), again_out.path());
    assert_eq!(again, replayed, "determinism: replays differ");
}
