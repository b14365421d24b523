//! JSON run report written next to the archive.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::result::{MigrationResult, ProjectStatus};
use crate::error::{MigrationError, Result};
use crate::ports::FileSystem;
use crate::usage::TokenUsage;

/// A microservice whose processing aborted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedMicroservice {
    /// Microservice name.
    pub name: String,
    /// Why it stopped.
    pub error: String,
}

/// A solution file that could not be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFailure {
    /// Microservice name.
    pub microservice: String,
    /// Build tool error, including stderr.
    pub error: String,
}

/// What happened to `Gateway/ocelot.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GatewayConfigOutcome {
    /// Written at `path`.
    Written {
        /// Where it went.
        path: PathBuf,
    },
    /// No gateway microservice in the structure.
    Skipped,
    /// The LLM call, decode or write failed.
    Failed {
        /// Error message.
        error: String,
    },
}

/// Status line for one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    /// Owning microservice.
    pub microservice: String,
    /// Project name.
    pub project_name: String,
    /// Full, partial or not generated.
    pub status: ProjectStatus,
    /// Generated file count.
    pub generated: usize,
    /// Failed file count.
    pub failed: usize,
}

/// Token usage section of the report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    /// Sum over every key.
    pub total: TokenUsage,
    /// Per key.
    pub by_key: BTreeMap<String, TokenUsage>,
}

/// Everything a run produced, serialized to `<output>/<repo>.report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Identifier of this run.
    pub run_id: String,
    /// When processing began.
    pub started_at: DateTime<Utc>,
    /// When the report was assembled.
    pub finished_at: DateTime<Utc>,
    /// Output repository name.
    pub repo_name: String,
    /// Archive path, absent when packaging failed.
    pub archive: Option<PathBuf>,
    /// `(microservice, project)` pairs in the structure.
    pub expected_projects: usize,
    /// Results actually produced.
    pub produced_projects: usize,
    /// Per-project status.
    pub projects: Vec<ProjectSummary>,
    /// Microservices that aborted.
    pub failed_microservices: Vec<FailedMicroservice>,
    /// Solution files that could not be built.
    pub build_failures: Vec<BuildFailure>,
    /// Gateway routing configuration outcome.
    pub gateway_config: GatewayConfigOutcome,
    /// Token accounting.
    pub usage: UsageSummary,
    /// Full per-project results.
    pub results: Vec<MigrationResult>,
}

impl MigrationReport {
    /// Summaries derived from `results`, in result order.
    #[must_use]
    pub fn summarize(results: &[MigrationResult]) -> Vec<ProjectSummary> {
        results
            .iter()
            .map(|r| ProjectSummary {
                microservice: r.microservice.clone(),
                project_name: r.project_name.clone(),
                status: r.status(),
                generated: r.successful_files.len(),
                failed: r.failed_files.len(),
            })
            .collect()
    }

    /// Expected projects that produced nothing or never ran.
    #[must_use]
    pub fn shortfall(&self) -> usize {
        self.expected_projects.saturating_sub(self.produced_projects)
    }

    /// Writes the report to `<output_dir>/<repo_name>.report.json`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Io`] on serialization or write failure.
    pub fn write(&self, fs: &dyn FileSystem, output_dir: &Path) -> Result<PathBuf> {
        let path = output_dir.join(format!("{}.report.json", self.repo_name));
        let text = serde_json::to_string_pretty(self).map_err(|e| MigrationError::Io(e.to_string()))?;
        fs.write(&path, &text).map_err(|e| MigrationError::Io(format!("write {}: {e}", path.display())))?;
        Ok(path)
    }
}
