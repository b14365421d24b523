//! Per-project outcome of a migration run.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::MigrationError;

/// A file that could not be generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedFile {
    /// Path relative to the project directory.
    pub file: String,
    /// Error message.
    pub error: String,
}

/// What one successfully generated file contributed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Packages the file declared.
    pub dependencies: Vec<String>,
    /// Routes found in controller code.
    pub routes: Vec<String>,
}

/// How much of a project was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Every file generated.
    Full,
    /// Some files failed.
    Partial,
    /// Nothing generated.
    NotGenerated,
}

/// Tally for one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Owning microservice.
    pub microservice: String,
    /// Project name (`Gateway` for the gateway).
    pub project_name: String,
    /// Target framework.
    pub target_version: String,
    /// Generated files, relative to the project directory.
    pub successful_files: Vec<String>,
    /// Files that failed, with their errors.
    pub failed_files: Vec<FailedFile>,
    /// Files visited.
    pub total_files: usize,
    /// `successful / total * 100`, or 0 for an empty project.
    pub success_rate: f64,
    /// Controller routes per file.
    pub file_routes: BTreeMap<String, Vec<String>>,
    /// Union of declared dependencies.
    pub dependencies: BTreeSet<String>,
    /// Whether static assets were copied into `wwwroot`.
    pub static_assets_copied: bool,
}

impl MigrationResult {
    /// An empty tally.
    #[must_use]
    pub fn new(microservice: &str, project_name: &str, target_version: &str) -> Self {
        Self {
            microservice: microservice.to_string(),
            project_name: project_name.to_string(),
            target_version: target_version.to_string(),
            successful_files: Vec::new(),
            failed_files: Vec::new(),
            total_files: 0,
            success_rate: 0.0,
            file_routes: BTreeMap::new(),
            dependencies: BTreeSet::new(),
            static_assets_copied: false,
        }
    }

    /// Counts one visited file and files its outcome.
    pub fn record(&mut self, path: String, outcome: Result<GeneratedFile, MigrationError>) {
        self.total_files += 1;
        match outcome {
            Ok(file) => {
                self.dependencies.extend(file.dependencies);
                if !file.routes.is_empty() {
                    self.file_routes.insert(path.clone(), file.routes);
                }
                self.successful_files.push(path);
            }
            Err(err) => {
                warn!(microservice = %self.microservice, project = %self.project_name, file = %path, error = %err, "file failed");
                self.failed_files.push(FailedFile { file: path, error: err.to_string() });
            }
        }
        self.update_rate();
    }

    /// Derived status for reporting.
    #[must_use]
    pub fn status(&self) -> ProjectStatus {
        if self.failed_files.is_empty() && self.total_files > 0 {
            ProjectStatus::Full
        } else if self.successful_files.is_empty() {
            ProjectStatus::NotGenerated
        } else {
            ProjectStatus::Partial
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn update_rate(&mut self) {
        self.success_rate = if self.total_files == 0 {
            0.0
        } else {
            self.successful_files.len() as f64 / self.total_files as f64 * 100.0
        };
    }
}
