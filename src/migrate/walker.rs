//! Depth-first generation of a project's folder tree.

use std::path::{Component, Path, PathBuf};

use futures::future::{FutureExt, LocalBoxFuture};
use tracing::{debug, info, warn};

use super::result::{GeneratedFile, MigrationResult};
use super::routes::extract_routes;
use crate::cache::FileCache;
use crate::error::{MigrationError, Result};
use crate::generation::{strip_fences, CodeGenerationWorker, GenerationRequest};
use crate::structure::{FileType, TargetFileSpec, TargetFolder};

/// Where one project's files come from and go to.
#[derive(Debug, Clone, Copy)]
pub struct ProjectScope<'a> {
    /// Owning microservice.
    pub microservice: &'a str,
    /// Namespace base; `Gateway` for the gateway.
    pub project_name: &'a str,
    /// Output directory of the project.
    pub project_dir: &'a Path,
    /// Root the specs' `source_files` are relative to.
    pub source_root: &'a Path,
}

/// Generates files of one project through a shared worker and cache.
pub struct TreeWalker<'a> {
    worker: &'a CodeGenerationWorker<'a>,
    cache: &'a FileCache<'a>,
    scope: ProjectScope<'a>,
}

impl<'a> TreeWalker<'a> {
    /// Creates a walker for `scope`.
    #[must_use]
    pub fn new(worker: &'a CodeGenerationWorker<'a>, cache: &'a FileCache<'a>, scope: ProjectScope<'a>) -> Self {
        Self { worker, cache, scope }
    }

    /// Visits `folder` at `base` (relative to the project directory): its
    /// files first, then each subfolder depth-first. File failures are
    /// recorded in `result` and never stop the walk.
    pub fn walk<'s>(
        &'s self,
        base: PathBuf,
        folder: &'s TargetFolder,
        result: &'s mut MigrationResult,
    ) -> LocalBoxFuture<'s, ()> {
        async move {
            debug!(folder = %base.display(), files = folder.target_files.len(), "walking folder");
            for (name, spec) in &folder.target_files {
                let rel = base.join(name);
                let outcome = self.process_file(&rel, spec).await;
                result.record(slash_path(&rel), outcome);
            }
            for (name, subfolder) in &folder.subfolders {
                self.walk(base.join(name), subfolder, result).await;
            }
        }
        .boxed_local()
    }

    /// Generates, cleans and writes one file at `rel_path` under the project
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns the generation error, or [`MigrationError::Io`] when the
    /// file cannot be written.
    pub async fn process_file(&self, rel_path: &Path, spec: &TargetFileSpec) -> Result<GeneratedFile> {
        let file_name = rel_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| MigrationError::Structure(format!("not a file path: {}", rel_path.display())))?;
        let namespace = if spec.namespace.trim().is_empty() {
            derive_namespace(self.scope.project_name, rel_path)
        } else {
            spec.namespace.clone()
        };

        let request = GenerationRequest {
            source_content: self.read_sources(&spec.source_files),
            file_type: spec.file_type,
            description: spec.description.clone(),
            instructions: spec.instructions.clone(),
            file_name,
            namespace,
            microservice_name: self.scope.microservice.to_string(),
            project_name: self.scope.project_name.to_string(),
        };
        info!(
            microservice = %self.scope.microservice,
            project = %self.scope.project_name,
            file = %rel_path.display(),
            file_type = %spec.file_type,
            "generating file"
        );

        let generated = self.worker.generate(&request).await?;
        let code = strip_fences(&generated.generated_code);
        self.cache.put(&self.scope.project_dir.join(rel_path), &code)?;

        let routes = if spec.file_type == FileType::Controller { extract_routes(&code) } else { Vec::new() };
        Ok(GeneratedFile { dependencies: generated.dependencies, routes })
    }

    /// Concatenates the listed sources, skipping unreadable ones.
    fn read_sources(&self, sources: &[String]) -> String {
        let mut parts = Vec::with_capacity(sources.len());
        for source in sources {
            let path = self.scope.source_root.join(source);
            match self.cache.get(&path) {
                Ok(content) => parts.push(content),
                Err(MigrationError::FileNotFound(_)) => {
                    warn!(source = %source, "source file not found, generating without it");
                }
                Err(err) => warn!(source = %source, error = %err, "source file unreadable, generating without it"),
            }
        }
        parts.join("\n")
    }
}

/// `project_name` plus the directories of `rel_path`, dot-separated.
#[must_use]
pub fn derive_namespace(project_name: &str, rel_path: &Path) -> String {
    let dirs: Vec<String> = rel_path
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if dirs.is_empty() {
        project_name.to_string()
    } else {
        format!("{project_name}.{}", dirs.join("."))
    }
}

/// Forward-slash rendering of a relative path, stable across platforms.
#[must_use]
pub fn slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use tokio::sync::Semaphore;

    use super::*;
    use crate::adapters::live::filesystem::LiveFileSystem;
    use crate::config::Settings;
    use crate::error::RetryPolicy;
    use crate::generation::PromptTemplates;
    use crate::ports::{CompletionFuture, CompletionRequest, CompletionResponse, LlmClient, PortError};
    use crate::usage::UsageTracker;

    /// Fails for any prompt naming `Broken.cs`; otherwise returns a
    /// controller with a route named after the requested file.
    struct FileEcho {
        seen: Mutex<Vec<String>>,
    }

    impl LlmClient for FileEcho {
        fn complete(&self, request: &CompletionRequest) -> CompletionFuture<'_> {
            let name = request
                .prompt
                .split("Generate code for a file named ")
                .nth(1)
                .and_then(|rest| rest.split(' ').next())
                .unwrap_or("?")
                .to_string();
            self.seen.lock().unwrap().push(name.clone());
            let has_source = request.prompt.contains("LEGACY SOURCE");
            Box::pin(async move {
                if name == "Broken.cs" {
                    return Err(PortError::from("model overloaded"));
                }
                let code = format!("```csharp\\n[Route(\\\"api/{name}\\\")] // source:{has_source}\\n```");
                Ok(CompletionResponse {
                    text: format!(r#"{{"generated_code": "{code}", "dependencies": ["Dep.{name}"]}}"#),
                    prompt_tokens: 1,
                    completion_tokens: 1,
                })
            })
        }
    }

    fn spec(file_type: FileType, sources: &[&str]) -> TargetFileSpec {
        let mut spec = TargetFileSpec::new(file_type, "test file", "");
        spec.source_files = sources.iter().map(|s| (*s).to_string()).collect();
        spec
    }

    fn tree() -> TargetFolder {
        let mut inner = TargetFolder::default();
        inner.target_files.insert("Deep.cs".into(), spec(FileType::Model, &[]));
        let mut folder = TargetFolder::default();
        folder.target_files.insert("OrdersController.cs".into(), spec(FileType::Controller, &["Legacy/Orders.cs"]));
        folder.target_files.insert("Broken.cs".into(), spec(FileType::Service, &["Legacy/Missing.cs"]));
        folder.subfolders.insert("Inner".into(), inner);
        folder.subfolders.insert("Empty".into(), TargetFolder { target_files: BTreeMap::new(), subfolders: BTreeMap::new() });
        folder
    }

    #[tokio::test]
    async fn walk_visits_every_leaf_once_and_isolates_failures() {
        let source = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(source.path().join("Legacy")).unwrap();
        std::fs::write(source.path().join("Legacy/Orders.cs"), "LEGACY SOURCE").unwrap();
        let out = tempfile::tempdir().unwrap();

        let llm = FileEcho { seen: Mutex::new(Vec::new()) };
        let settings = Settings { retry: RetryPolicy { max_attempts: 1, delay: std::time::Duration::ZERO }, ..Settings::default() };
        let (gate, templates, usage) = (Semaphore::new(4), PromptTemplates::default(), UsageTracker::new());
        let worker = CodeGenerationWorker::new(&llm, &gate, &templates, &settings, &usage, "net8.0");
        let fs = LiveFileSystem;
        let cache = FileCache::new(&fs);
        let walker = TreeWalker::new(
            &worker,
            &cache,
            ProjectScope {
                microservice: "Orders",
                project_name: "Orders.Api",
                project_dir: out.path(),
                source_root: source.path(),
            },
        );

        let folder = tree();
        let mut result = MigrationResult::new("Orders", "Orders.Api", "net8.0");
        walker.walk(PathBuf::from("Controllers"), &folder, &mut result).await;

        assert_eq!(result.total_files, 3);
        assert_eq!(result.successful_files.len() + result.failed_files.len(), result.total_files);
        assert_eq!(result.failed_files.len(), 1);
        assert_eq!(result.failed_files[0].file, "Controllers/Broken.cs");
        assert_eq!(
            result.successful_files,
            vec!["Controllers/OrdersController.cs", "Controllers/Inner/Deep.cs"]
        );

        let written = std::fs::read_to_string(out.path().join("Controllers/OrdersController.cs")).unwrap();
        assert_eq!(written, "[Route(\"api/OrdersController.cs\")] // source:true");
        assert_eq!(
            result.file_routes["Controllers/OrdersController.cs"],
            vec!["api/OrdersController.cs"]
        );
        assert!(!result.file_routes.contains_key("Controllers/Inner/Deep.cs"));
        assert!(result.dependencies.contains("Dep.Deep.cs"));
        assert!(out.path().join("Controllers/Inner/Deep.cs").exists());
    }

    #[test]
    fn namespace_follows_folders() {
        assert_eq!(derive_namespace("Orders.Api", Path::new("Program.cs")), "Orders.Api");
        assert_eq!(
            derive_namespace("Orders.Api", Path::new("Controllers/V1/OrdersController.cs")),
            "Orders.Api.Controllers.V1"
        );
    }

    #[test]
    fn slash_path_is_platform_neutral() {
        let path: PathBuf = ["Controllers", "Inner", "Deep.cs"].iter().collect();
        assert_eq!(slash_path(&path), "Controllers/Inner/Deep.cs");
    }
}
