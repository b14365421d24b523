//! End-to-end migration over fake LLM and build-tool ports.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dotmigrate::adapters::live::filesystem::LiveFileSystem;
use dotmigrate::config::Settings;
use dotmigrate::context::ServiceContext;
use dotmigrate::generation::PromptTemplates;
use dotmigrate::migrate::{GatewayConfigOutcome, MicroserviceOrchestrator, MigrationJob, ProjectStatus, Variant};
use dotmigrate::ports::{
    CompletionFuture, CompletionRequest, CompletionResponse, FileSystem, LlmClient, PortError, ShellExecutor,
    ShellOutput,
};
use dotmigrate::retrieval::{RetrievalKind, RetrievalService};
use dotmigrate::structure::TargetStructure;

const STRUCTURE: &str = r#"{"microservices": [
  {"name": "Gateway", "projects": [{"project_name": "Gateway", "target_structure": {
    "root": {
      "Gateway/appsettings.json": {"file_type": "config", "description": "gateway settings"},
      "Gateway.csproj": {"file_type": "csproj", "description": "gateway project"}
    },
    "folders": {"Middleware": {"target_files": {
      "ErrorHandlingMiddleware.cs": {"file_type": "middleware", "description": "errors"}}}}
  }}]},
  {"name": "Orders", "projects": [{"project_name": "Orders.Api", "target_structure": {
    "root": {
      "Program.cs": {"file_type": "program", "description": "entry point"},
      "Orders.Api.csproj": {"file_type": "csproj", "description": "api project"}
    },
    "folders": {"Controllers": {"target_files": {
      "OrdersController.cs": {"file_type": "controller", "description": "orders endpoints"}}}}
  }}]},
  {"name": "Users", "projects": [{"project_name": "Users.Domain", "target_structure": {
    "root": {
      "User.cs": {"file_type": "entity", "description": "user"},
      "Users.Domain.csproj": {"file_type": "csproj", "description": "domain project"}
    },
    "folders": {"Entities": {"target_files": {
      "Account.cs": {"file_type": "entity", "description": "account"}}}}
  }}]}
]}"#;

/// Answers the gateway prompt with a routing document and every other
/// prompt with a stub naming the requested file.
struct ScriptedLlm;

impl LlmClient for ScriptedLlm {
    fn complete(&self, request: &CompletionRequest) -> CompletionFuture<'_> {
        let text = if request.prompt.starts_with("### Ocelot Configuration") {
            serde_json::json!({
                "Routes": [],
                "GlobalConfiguration": {"BaseUrl": "http://localhost:5004"}
            })
            .to_string()
        } else {
            let name = request
                .prompt
                .split_once("a file named ")
                .and_then(|(_, rest)| rest.split_once(" of type"))
                .map_or("unknown", |(name, _)| name);
            let code = if name.ends_with("Controller.cs") {
                "[ApiController]\n[Route(\"api/orders\")]\npublic class OrdersController { [HttpGet] public void List() {} }"
                    .to_string()
            } else {
                format!("// {name}")
            };
            serde_json::json!({"generated_code": code, "dependencies": ["Ocelot"]}).to_string()
        };
        Box::pin(async move { Ok(CompletionResponse { text, prompt_tokens: 10, completion_tokens: 5 }) })
    }
}

#[derive(Default)]
struct FakeShell {
    commands: Mutex<Vec<(String, Option<PathBuf>)>>,
}

impl ShellExecutor for FakeShell {
    fn run(&self, command: &str, cwd: Option<&Path>) -> Result<ShellOutput, PortError> {
        self.commands.lock().unwrap().push((command.to_string(), cwd.map(Path::to_path_buf)));
        Ok(ShellOutput { exit_code: 0, stdout: String::new(), stderr: String::new() })
    }
}

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.retry.delay = Duration::ZERO;
    settings
}

fn files_under(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
        .collect();
    files.sort();
    files
}

#[tokio::test]
async fn migrates_every_microservice_into_its_own_directory() {
    let source = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let settings = settings();
    let ctx = ServiceContext::live(&settings).with_llm(Box::new(ScriptedLlm)).with_shell(Box::new(FakeShell::default()));

    let structure = TargetStructure::from_json(STRUCTURE).unwrap();
    let job = MigrationJob {
        source_dir: source.path().to_path_buf(),
        output_dir: output.path().to_path_buf(),
        repo_name: "shop".into(),
        target_version: "net8.0".into(),
        variant: Variant::Rest,
        instruction: "split into orders and users".into(),
    };
    let orchestrator = MicroserviceOrchestrator::new(
        &ctx,
        &settings,
        PromptTemplates::default(),
        RetrievalService::new(RetrievalKind::Context),
        RetrievalService::new(RetrievalKind::Analysis),
    );

    let outcome = orchestrator.run(&structure, &job).await.unwrap();

    assert_eq!(outcome.results.len(), 3);
    assert_eq!(outcome.results.iter().map(|r| r.total_files).sum::<usize>(), 9);
    for result in &outcome.results {
        assert_eq!(result.status(), ProjectStatus::Full, "{} was not fully generated", result.project_name);
        assert!(result.dependencies.contains("Ocelot"));
    }
    let orders = outcome.results.iter().find(|r| r.microservice == "Orders").unwrap();
    assert_eq!(orders.successful_files.len(), 3);
    assert!(orders.file_routes.contains_key("Controllers/OrdersController.cs"));

    let repo = output.path().join("shop");
    let files = files_under(&repo);
    for file in &files {
        let top = file.split('/').next().unwrap();
        assert!(["Gateway", "Orders", "Users"].contains(&top), "unexpected file {file}");
        if file.contains("Orders.Api") {
            assert!(file.starts_with("Orders/"), "{file} escaped its microservice");
        }
        if file.contains("Users.Domain") {
            assert!(file.starts_with("Users/"), "{file} escaped its microservice");
        }
    }
    assert!(files.contains(&"Gateway/appsettings.json".to_string()));
    assert!(!files.iter().any(|f| f.starts_with("Gateway/Gateway/")));
    let gateway = outcome.results.iter().find(|r| r.microservice == "Gateway").unwrap();
    assert!(gateway.successful_files.contains(&"appsettings.json".to_string()));
    assert!(files.contains(&"Gateway/Middleware/ErrorHandlingMiddleware.cs".to_string()));
    assert!(files.contains(&"Gateway/ocelot.json".to_string()));
    assert!(files.contains(&"Orders/Orders.Api/Controllers/OrdersController.cs".to_string()));
    assert!(files.contains(&"Users/Users.Domain/Entities/Account.cs".to_string()));

    assert!(matches!(outcome.report.gateway_config, GatewayConfigOutcome::Written { .. }));
    assert!(outcome.report.failed_microservices.is_empty());
    assert!(outcome.report.build_failures.is_empty());
    assert_eq!(outcome.report.expected_projects, 3);
    assert_eq!(outcome.report.produced_projects, 3);
    assert_eq!(outcome.report_path, output.path().join("shop.report.json"));
    assert!(outcome.report_path.is_file());

    let archive_path = outcome.archive.unwrap();
    let mut archive = zip::ZipArchive::new(std::fs::File::open(archive_path).unwrap()).unwrap();
    let top: BTreeSet<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().split('/').next().unwrap().to_string())
        .collect();
    assert_eq!(top, BTreeSet::from(["Gateway".to_string(), "Orders".to_string(), "Users".to_string()]));
}

#[tokio::test]
async fn failing_llm_is_recorded_per_file() {
    struct Refusing;

    impl LlmClient for Refusing {
        fn complete(&self, _request: &CompletionRequest) -> CompletionFuture<'_> {
            Box::pin(async { Err(PortError::from("provider unavailable")) })
        }
    }

    let source = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let mut settings = settings();
    settings.retry.max_attempts = 1;
    let ctx = ServiceContext::live(&settings).with_llm(Box::new(Refusing)).with_shell(Box::new(FakeShell::default()));

    let structure = TargetStructure::from_json(STRUCTURE).unwrap();
    let job = MigrationJob {
        source_dir: source.path().to_path_buf(),
        output_dir: output.path().to_path_buf(),
        repo_name: "shop".into(),
        target_version: "net8.0".into(),
        variant: Variant::Rest,
        instruction: String::new(),
    };
    let orchestrator = MicroserviceOrchestrator::new(
        &ctx,
        &settings,
        PromptTemplates::default(),
        RetrievalService::new(RetrievalKind::Context),
        RetrievalService::new(RetrievalKind::Analysis),
    );

    let outcome = orchestrator.run(&structure, &job).await.unwrap();

    assert_eq!(outcome.results.len(), 3);
    for result in &outcome.results {
        assert_eq!(result.status(), ProjectStatus::NotGenerated);
        assert_eq!(result.failed_files.len(), 3);
    }
    assert!(matches!(outcome.report.gateway_config, GatewayConfigOutcome::Failed { .. }));
    assert!(outcome.report_path.is_file());
}

/// Delegates to the real disk but refuses to create one microservice's
/// directory.
struct RefusingDir {
    name: &'static str,
}

impl FileSystem for RefusingDir {
    fn read_to_string(&self, path: &Path) -> Result<String, PortError> {
        LiveFileSystem.read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), PortError> {
        LiveFileSystem.write(path, contents)
    }

    fn exists(&self, path: &Path) -> bool {
        LiveFileSystem.exists(path)
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>, PortError> {
        LiveFileSystem.list_dir(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), PortError> {
        if path.ends_with(self.name) {
            return Err(format!("permission denied: {}", path.display()).into());
        }
        LiveFileSystem.create_dir_all(path)
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<(), PortError> {
        LiveFileSystem.copy(from, to)
    }
}

#[tokio::test]
async fn failed_microservice_does_not_stop_the_others() {
    let source = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let settings = settings();
    let ctx = ServiceContext {
        fs: Box::new(RefusingDir { name: "Users" }),
        ..ServiceContext::live(&settings).with_llm(Box::new(ScriptedLlm)).with_shell(Box::new(FakeShell::default()))
    };

    let structure = TargetStructure::from_json(STRUCTURE).unwrap();
    let job = MigrationJob {
        source_dir: source.path().to_path_buf(),
        output_dir: output.path().to_path_buf(),
        repo_name: "shop".into(),
        target_version: "net8.0".into(),
        variant: Variant::Rest,
        instruction: String::new(),
    };
    let orchestrator = MicroserviceOrchestrator::new(
        &ctx,
        &settings,
        PromptTemplates::default(),
        RetrievalService::new(RetrievalKind::Context),
        RetrievalService::new(RetrievalKind::Analysis),
    );

    let outcome = orchestrator.run(&structure, &job).await.unwrap();

    let produced: Vec<&str> = outcome.results.iter().map(|r| r.microservice.as_str()).collect();
    assert_eq!(produced, vec!["Gateway", "Orders"]);
    for result in &outcome.results {
        assert_eq!(result.status(), ProjectStatus::Full);
    }
    assert_eq!(outcome.report.failed_microservices.len(), 1);
    assert_eq!(outcome.report.failed_microservices[0].name, "Users");
    assert!(outcome.report.failed_microservices[0].error.contains("permission denied"));
    assert_eq!(outcome.report.expected_projects, 3);
    assert_eq!(outcome.report.produced_projects, 2);
    assert!(!output.path().join("shop/Users").exists());
    assert!(outcome.archive.is_some());
}

const GRPC_STRUCTURE: &str = r#"{"microservices": [
  {"name": "Catalog", "projects": [{"project_name": "Catalog.Grpc", "target_structure": {
    "root": {
      "Program.cs": {"file_type": "program_cs_grpc", "description": "grpc host"},
      "Catalog.Grpc.csproj": {"file_type": "csproj_grpc", "description": "grpc project"},
      "CatalogService.cs": {"file_type": "grpc_service_cs", "description": "catalog service"},
      "ProductMapper.cs": {"file_type": "service", "description": "mapping"},
      "wwwroot/css/site.css": {"file_type": "other", "description": "styles"}
    },
    "folders": {
      "Protos": {"target_files": {"catalog.proto": {"file_type": "proto", "description": "contract"}}},
      "wwwroot": {"target_files": {"site.js": {"file_type": "other", "description": "scripts"}}}
    }
  }}]}
]}"#;

/// Tracks how many completions are in flight at once.
#[derive(Default)]
struct SlowLlm {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl LlmClient for SlowLlm {
    fn complete(&self, request: &CompletionRequest) -> CompletionFuture<'_> {
        let name = request
            .prompt
            .split_once("a file named ")
            .and_then(|(_, rest)| rest.split_once(" of type"))
            .map_or("unknown", |(name, _)| name)
            .to_string();
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let text = serde_json::json!({"generated_code": format!("// {name}"), "dependencies": []}).to_string();
            Ok(CompletionResponse { text, prompt_tokens: 1, completion_tokens: 1 })
        })
    }
}

#[tokio::test]
async fn grpc_variant_skips_wwwroot_and_stays_within_the_gate() {
    let source = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(source.path().join("Content")).unwrap();
    std::fs::create_dir_all(source.path().join("Scripts")).unwrap();
    std::fs::write(source.path().join("Content/site.css"), "body {}").unwrap();
    std::fs::write(source.path().join("Scripts/app.js"), "init();").unwrap();
    let output = tempfile::tempdir().unwrap();

    let mut settings = settings();
    settings.max_concurrency = 2;
    let llm = Arc::new(SlowLlm::default());
    let ctx = ServiceContext::live(&settings)
        .with_llm(Box::new(Shared(Arc::clone(&llm))))
        .with_shell(Box::new(FakeShell::default()));

    let structure = TargetStructure::from_json(GRPC_STRUCTURE).unwrap();
    let job = MigrationJob {
        source_dir: source.path().to_path_buf(),
        output_dir: output.path().to_path_buf(),
        repo_name: "catalog".into(),
        target_version: "net8.0".into(),
        variant: Variant::Grpc,
        instruction: String::new(),
    };
    let orchestrator = MicroserviceOrchestrator::new(
        &ctx,
        &settings,
        PromptTemplates::default(),
        RetrievalService::new(RetrievalKind::Context),
        RetrievalService::new(RetrievalKind::Analysis),
    );

    let outcome = orchestrator.run(&structure, &job).await.unwrap();

    let result = &outcome.results[0];
    assert_eq!(result.status(), ProjectStatus::Full);
    assert_eq!(result.total_files, 5);
    assert!(result.successful_files.iter().all(|f| !f.to_lowercase().contains("wwwroot")));
    assert!(result.static_assets_copied);
    assert!(matches!(outcome.report.gateway_config, GatewayConfigOutcome::Skipped));

    let project = output.path().join("catalog/Catalog/Catalog.Grpc");
    assert!(project.join("Protos/catalog.proto").is_file());
    assert!(project.join("wwwroot/content/site.css").is_file());
    assert!(project.join("wwwroot/scripts/app.js").is_file());
    assert!(!project.join("wwwroot/css/site.css").exists());
    assert!(!project.join("wwwroot/site.js").exists());

    let max = llm.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 2, "{max} completions in flight with a gate of 2");
    assert_eq!(max, 2, "root files were not generated concurrently");
}

/// Keeps a handle on the client after it moves into the context.
struct Shared(Arc<SlowLlm>);

impl LlmClient for Shared {
    fn complete(&self, request: &CompletionRequest) -> CompletionFuture<'_> {
        self.0.complete(request)
    }
}
