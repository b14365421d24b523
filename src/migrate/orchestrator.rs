//! Runs a whole target structure: every microservice concurrently, each
//! project through the walker, then solution files, gateway routing,
//! packaging and the report.

use std::path::{Path, PathBuf};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use super::archive::write_archive;
use super::assets::copy_static_assets;
use super::gateway_config::{write_gateway_config, GatewayConfigInputs};
use super::report::{
    BuildFailure, FailedMicroservice, GatewayConfigOutcome, MigrationReport, UsageSummary,
};
use super::result::MigrationResult;
use super::solution::create_solution;
use super::walker::{slash_path, ProjectScope, TreeWalker};
use crate::cache::FileCache;
use crate::config::Settings;
use crate::context::ServiceContext;
use crate::error::{MigrationError, Result};
use crate::generation::{CodeGenerationWorker, ConversationMemory, PromptTemplates};
use crate::retrieval::RetrievalService;
use crate::structure::{Microservice, Project, TargetFileSpec, TargetStructure, GATEWAY};
use crate::usage::UsageTracker;

/// Project layers in generation order; unmatched projects go last.
const LAYER_ORDER: [&str; 5] = ["domain", "infrastructure", "service", "application", "presentation"];

/// Which flavour of service to generate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// HTTP controllers behind an Ocelot gateway.
    #[default]
    Rest,
    /// gRPC services.
    Grpc,
}

/// Where a run reads from and writes to.
#[derive(Debug, Clone)]
pub struct MigrationJob {
    /// Legacy source root; `source_files` in the structure are relative to it.
    pub source_dir: PathBuf,
    /// Directory receiving the repository, archive and report.
    pub output_dir: PathBuf,
    /// Repository directory and archive name.
    pub repo_name: String,
    /// Target framework, e.g. `net8.0`.
    pub target_version: String,
    /// REST or gRPC.
    pub variant: Variant,
    /// The user's migration instruction, forwarded to gateway synthesis.
    pub instruction: String,
}

impl MigrationJob {
    /// `<output_dir>/<repo_name>`.
    #[must_use]
    pub fn repo_dir(&self) -> PathBuf {
        self.output_dir.join(&self.repo_name)
    }
}

/// What a run hands back.
#[derive(Debug)]
pub struct MigrationOutcome {
    /// One entry per processed project.
    pub results: Vec<MigrationResult>,
    /// The zip archive, when packaging succeeded.
    pub archive: Option<PathBuf>,
    /// The assembled report.
    pub report: MigrationReport,
    /// Where the report was written.
    pub report_path: PathBuf,
}

struct MicroserviceOutcome {
    results: Vec<MigrationResult>,
    build_failure: Option<BuildFailure>,
}

/// Position of `project_name` in [`LAYER_ORDER`].
fn layer_rank(project_name: &str) -> usize {
    let lower = project_name.to_lowercase();
    LAYER_ORDER.iter().position(|layer| lower.contains(layer)).unwrap_or(LAYER_ORDER.len())
}

/// Projects sorted by layer, keeping proposal order within a layer.
#[must_use]
pub fn order_projects(projects: &[Project]) -> Vec<&Project> {
    let mut ordered: Vec<&Project> = projects.iter().collect();
    ordered.sort_by_key(|p| layer_rank(&p.project_name));
    ordered
}

/// Project files and `Program.cs` are generated after everything else at
/// the project root.
fn is_special(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    lower.ends_with(".csproj") || lower == "program.cs"
}

fn is_wwwroot(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower == "wwwroot" || lower.starts_with("wwwroot/")
}

/// Drives one migration run over a shared [`ServiceContext`].
pub struct MicroserviceOrchestrator<'a> {
    ctx: &'a ServiceContext,
    settings: &'a Settings,
    templates: PromptTemplates,
    context: RetrievalService,
    analysis: RetrievalService,
    usage: UsageTracker,
    gate: Semaphore,
}

impl<'a> MicroserviceOrchestrator<'a> {
    /// Creates an orchestrator with its own LLM gate sized from `settings`.
    #[must_use]
    pub fn new(
        ctx: &'a ServiceContext,
        settings: &'a Settings,
        templates: PromptTemplates,
        context: RetrievalService,
        analysis: RetrievalService,
    ) -> Self {
        Self {
            ctx,
            settings,
            templates,
            context,
            analysis,
            usage: UsageTracker::new(),
            gate: Semaphore::new(settings.max_concurrency.max(1)),
        }
    }

    /// Token usage recorded so far.
    #[must_use]
    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    /// Generates every microservice of `structure` under
    /// `<output>/<repo>`, then packages and reports.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Structure`] for an invalid structure and
    /// [`MigrationError::Io`] when the report cannot be written. Failures of
    /// files, microservices, solution builds, gateway synthesis and
    /// packaging are recorded in the report instead.
    pub async fn run(&self, structure: &TargetStructure, job: &MigrationJob) -> Result<MigrationOutcome> {
        structure.validate()?;
        let run_id = self.ctx.id_gen.generate_id();
        let started_at = self.ctx.clock.now();
        let repo_dir = job.repo_dir();
        info!(
            run_id = %run_id,
            repo = %repo_dir.display(),
            microservices = structure.microservices.len(),
            variant = ?job.variant,
            "migration started"
        );

        let outcomes = join_all(structure.microservices.iter().map(|ms| self.process_microservice(ms, job))).await;

        let mut results = Vec::new();
        let mut failed_microservices = Vec::new();
        let mut build_failures = Vec::new();
        for (ms, outcome) in structure.microservices.iter().zip(outcomes) {
            match outcome {
                Ok(outcome) => {
                    results.extend(outcome.results);
                    build_failures.extend(outcome.build_failure);
                }
                Err(err) => {
                    error!(microservice = %ms.name, error = %err, "microservice failed");
                    failed_microservices.push(FailedMicroservice { name: ms.name.clone(), error: err.to_string() });
                }
            }
        }

        let expected_projects = structure.project_count();
        if results.len() < expected_projects {
            warn!(expected = expected_projects, produced = results.len(), "fewer projects produced than proposed");
        }

        let gateway_config = if structure.gateway().is_some() {
            let names: Vec<&str> = structure.microservices.iter().map(|ms| ms.name.as_str()).collect();
            let inputs = GatewayConfigInputs {
                llm: self.ctx.llm.as_ref(),
                gate: &self.gate,
                fs: self.ctx.fs.as_ref(),
                settings: self.settings,
                templates: &self.templates,
                usage: &self.usage,
                target_version: &job.target_version,
            };
            match write_gateway_config(&inputs, &repo_dir, &names, &job.instruction).await {
                Ok(path) => GatewayConfigOutcome::Written { path },
                Err(err) => {
                    error!(error = %err, "gateway configuration failed");
                    GatewayConfigOutcome::Failed { error: err.to_string() }
                }
            }
        } else {
            info!("no gateway microservice, skipping routing configuration");
            GatewayConfigOutcome::Skipped
        };

        let archive = match write_archive(&repo_dir, &job.output_dir, &job.repo_name) {
            Ok(path) => Some(path),
            Err(err) => {
                error!(error = %err, "packaging failed");
                None
            }
        };

        let report = MigrationReport {
            run_id,
            started_at,
            finished_at: self.ctx.clock.now(),
            repo_name: job.repo_name.clone(),
            archive: archive.clone(),
            expected_projects,
            produced_projects: results.len(),
            projects: MigrationReport::summarize(&results),
            failed_microservices,
            build_failures,
            gateway_config,
            usage: UsageSummary { total: self.usage.totals(), by_key: self.usage.snapshot() },
            results: results.clone(),
        };
        let report_path = report.write(self.ctx.fs.as_ref(), &job.output_dir)?;
        info!(
            report = %report_path.display(),
            projects = report.produced_projects,
            tokens = report.usage.total.total(),
            "migration finished"
        );
        Ok(MigrationOutcome { results, archive, report, report_path })
    }

    async fn process_microservice(&self, ms: &Microservice, job: &MigrationJob) -> Result<MicroserviceOutcome> {
        let ms_dir = job.repo_dir().join(&ms.name);
        self.ctx
            .fs
            .create_dir_all(&ms_dir)
            .map_err(|e| MigrationError::Io(format!("create {}: {e}", ms_dir.display())))?;

        let cache = FileCache::new(self.ctx.fs.as_ref());
        let memory = ConversationMemory::new(self.settings.memory_tokens);
        let worker = CodeGenerationWorker::new(
            self.ctx.llm.as_ref(),
            &self.gate,
            &self.templates,
            self.settings,
            &self.usage,
            &job.target_version,
        )
        .with_retrieval(&self.context, &self.analysis)
        .with_memory(&memory);

        let mut results = Vec::with_capacity(ms.projects.len());
        for project in order_projects(&ms.projects) {
            let result = self.process_project(&worker, &cache, ms, project, &ms_dir, job).await;
            info!(
                microservice = %ms.name,
                project = %result.project_name,
                generated = result.successful_files.len(),
                failed = result.failed_files.len(),
                "project finished"
            );
            results.push(result);
        }

        let build_failure = match create_solution(self.ctx.shell.as_ref(), &self.settings.build_tool, &ms_dir, &ms.name) {
            Ok(_) => None,
            Err(err) => {
                warn!(microservice = %ms.name, error = %err, "solution build failed");
                Some(BuildFailure { microservice: ms.name.clone(), error: err.to_string() })
            }
        };
        Ok(MicroserviceOutcome { results, build_failure })
    }

    async fn process_project(
        &self,
        worker: &CodeGenerationWorker<'_>,
        cache: &FileCache<'_>,
        ms: &Microservice,
        project: &Project,
        ms_dir: &Path,
        job: &MigrationJob,
    ) -> MigrationResult {
        let gateway = ms.is_gateway();
        let (project_name, project_dir) = if gateway {
            (GATEWAY, ms_dir.to_path_buf())
        } else {
            (project.project_name.as_str(), ms_dir.join(&project.project_name))
        };
        let scope = ProjectScope {
            microservice: &ms.name,
            project_name,
            project_dir: &project_dir,
            source_root: &job.source_dir,
        };
        let walker = TreeWalker::new(worker, cache, scope);
        let mut result = MigrationResult::new(&ms.name, project_name, &job.target_version);
        let layout = &project.target_structure;
        let grpc = job.variant == Variant::Grpc;

        let mut normal: Vec<(PathBuf, &TargetFileSpec)> = Vec::new();
        let mut special: Vec<(PathBuf, &TargetFileSpec)> = Vec::new();
        for (name, spec) in &layout.root {
            let name = if gateway { name.strip_prefix("Gateway/").unwrap_or(name) } else { name.as_str() };
            if name.eq_ignore_ascii_case("ocelot.json") || (grpc && is_wwwroot(name)) {
                info!(microservice = %ms.name, file = name, "skipping root file");
                continue;
            }
            let entry = (PathBuf::from(name), spec);
            if is_special(name) {
                special.push(entry);
            } else {
                normal.push(entry);
            }
        }
        normal.extend(special);

        if grpc {
            let outcomes = join_all(normal.iter().map(|(rel, spec)| walker.process_file(rel, spec))).await;
            for ((rel, _), outcome) in normal.iter().zip(outcomes) {
                result.record(slash_path(rel), outcome);
            }
        } else {
            for (rel, spec) in &normal {
                let outcome = walker.process_file(rel, spec).await;
                result.record(slash_path(rel), outcome);
            }
        }

        for (name, folder) in &layout.folders {
            if grpc && is_wwwroot(name) {
                continue;
            }
            walker.walk(PathBuf::from(name), folder, &mut result).await;
        }

        let wants_assets = if grpc {
            layout.folders.keys().any(|n| is_wwwroot(n)) || job.source_dir.join("wwwroot").is_dir()
        } else {
            layout.folders.contains_key("Views")
        };
        if wants_assets {
            match copy_static_assets(self.ctx.fs.as_ref(), &job.source_dir, &project_dir) {
                Ok(copied) => {
                    info!(project = %project_name, copied, "static assets copied");
                    result.static_assets_copied = true;
                }
                Err(err) => warn!(project = %project_name, error = %err, "static asset copy failed"),
            }
        }
        result
    }
}
