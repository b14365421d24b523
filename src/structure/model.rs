//! Serde model of a target structure: microservices, their projects, and
//! each project's nested folder/file tree.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Component, Path};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{MigrationError, Result};

/// Reserved name of the routing microservice.
pub const GATEWAY: &str = "Gateway";

/// Kind of file to generate. Unknown tags deserialize as [`FileType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    /// MVC or API controller.
    Controller,
    /// Settings file such as `appsettings.json`.
    Config,
    /// Razor view.
    View,
    /// Plain model class.
    Model,
    /// Data-access repository.
    Repository,
    /// C# interface.
    Interface,
    /// Razor layout.
    Layout,
    /// Razor component.
    RazorComponent,
    /// Application or domain service.
    Service,
    /// ASP.NET middleware.
    Middleware,
    /// `Program.cs` entry point.
    Program,
    /// `Program.cs` of a gRPC host.
    ProgramCsGrpc,
    /// Project file.
    Csproj,
    /// Gateway routing configuration.
    Ocelot,
    /// Project file of a gRPC host.
    CsprojGrpc,
    /// Protocol buffer definition.
    Proto,
    /// gRPC service implementation.
    GrpcServiceCs,
    /// EF Core database context.
    #[serde(rename = "dbcontext")]
    DbContext,
    /// Persistence entity.
    Entity,
    /// Data-transfer object.
    Dto,
    /// Anything else.
    #[serde(other)]
    Other,
}

impl FileType {
    /// Tag used in target structures and prompt templates.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Controller => "controller",
            Self::Config => "config",
            Self::View => "view",
            Self::Model => "model",
            Self::Repository => "repository",
            Self::Interface => "interface",
            Self::Layout => "layout",
            Self::RazorComponent => "razor_component",
            Self::Service => "service",
            Self::Middleware => "middleware",
            Self::Program => "program",
            Self::ProgramCsGrpc => "program_cs_grpc",
            Self::Csproj => "csproj",
            Self::Ocelot => "ocelot",
            Self::CsprojGrpc => "csproj_grpc",
            Self::Proto => "proto",
            Self::GrpcServiceCs => "grpc_service_cs",
            Self::DbContext => "dbcontext",
            Self::Entity => "entity",
            Self::Dto => "dto",
            Self::Other => "other",
        }
    }

    /// File types whose oversized sources are split into chunks.
    #[must_use]
    pub fn is_chunkable(self) -> bool {
        matches!(
            self,
            Self::Model | Self::Proto | Self::GrpcServiceCs | Self::Service | Self::Interface
        )
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to generate for one target file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetFileSpec {
    /// Source paths, relative to the source root, that feed the prompt.
    #[serde(default, deserialize_with = "null_as_default")]
    pub source_files: Vec<String>,
    /// What the file is for.
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    /// Kind of file.
    pub file_type: FileType,
    /// Namespace to use; derived from the path when empty.
    #[serde(default, deserialize_with = "null_as_default")]
    pub namespace: String,
    /// Expected routes, for controllers.
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<String>,
    /// Extra generation guidance.
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub instructions: String,
}

impl TargetFileSpec {
    /// A spec with no sources, used when filling in required files.
    #[must_use]
    pub fn new(file_type: FileType, description: &str, namespace: &str) -> Self {
        Self {
            source_files: Vec::new(),
            description: description.to_string(),
            file_type,
            namespace: namespace.to_string(),
            routes: Vec::new(),
            instructions: String::new(),
        }
    }
}

/// A folder: files at this level plus named subfolders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetFolder {
    /// Files directly in this folder.
    #[serde(default, alias = "root", deserialize_with = "null_as_default")]
    pub target_files: BTreeMap<String, TargetFileSpec>,
    /// Nested folders.
    #[serde(default, alias = "folders", deserialize_with = "null_as_default")]
    pub subfolders: BTreeMap<String, TargetFolder>,
}

impl TargetFolder {
    /// Number of files in this folder and everything below it.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.target_files.len() + self.subfolders.values().map(TargetFolder::file_count).sum::<usize>()
    }

    /// Returns `true` when the subtree holds no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.file_count() == 0
    }

    /// Paths (`Folder/Sub/File.cs`) of every file in the subtree.
    #[must_use]
    pub fn file_paths(&self) -> Vec<String> {
        let mut out: Vec<String> = self.target_files.keys().cloned().collect();
        for (name, folder) in &self.subfolders {
            out.extend(folder.file_paths().into_iter().map(|p| format!("{name}/{p}")));
        }
        out
    }
}

/// Layout of one project: root files plus top-level folders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectLayout {
    /// Files at the project root.
    #[serde(default, alias = "target_files", deserialize_with = "null_as_default")]
    pub root: BTreeMap<String, TargetFileSpec>,
    /// Top-level folders of the project.
    #[serde(default, alias = "subfolders", deserialize_with = "null_as_default")]
    pub folders: BTreeMap<String, TargetFolder>,
}

impl ProjectLayout {
    /// Number of files in the whole project.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.root.len() + self.folders.values().map(TargetFolder::file_count).sum::<usize>()
    }

    /// Paths of every file in the project, relative to the project root.
    #[must_use]
    pub fn file_paths(&self) -> Vec<String> {
        let mut out: Vec<String> = self.root.keys().cloned().collect();
        for (name, folder) in &self.folders {
            out.extend(folder.file_paths().into_iter().map(|p| format!("{name}/{p}")));
        }
        out
    }
}

/// One buildable project inside a microservice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Project name, e.g. `Orders.Domain`.
    pub project_name: String,
    /// Files and folders to generate.
    #[serde(default, deserialize_with = "null_as_default")]
    pub target_structure: ProjectLayout,
}

/// A deployable service and its projects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Microservice {
    /// Service name; also its directory name in the output repository.
    pub name: String,
    /// Projects in proposal order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub projects: Vec<Project>,
}

impl Microservice {
    /// Returns `true` for the reserved routing service.
    #[must_use]
    pub fn is_gateway(&self) -> bool {
        self.name.eq_ignore_ascii_case(GATEWAY)
    }
}

/// Root of a proposal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetStructure {
    /// Proposed services.
    #[serde(default, deserialize_with = "null_as_default")]
    pub microservices: Vec<Microservice>,
}

impl TargetStructure {
    /// Parses and validates a JSON proposal.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Structure`] for unparseable or invalid input.
    pub fn from_json(text: &str) -> Result<Self> {
        let structure: Self = serde_json::from_str(text)
            .map_err(|e| MigrationError::Structure(format!("cannot parse target structure: {e}")))?;
        structure.validate()?;
        Ok(structure)
    }

    /// Checks the invariants the orchestrator relies on.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Structure`] when there are no microservices,
    /// a name is empty or unsafe as a directory, two names collide
    /// case-insensitively, or a file or folder key would leave its project
    /// directory.
    pub fn validate(&self) -> Result<()> {
        if self.microservices.is_empty() {
            return Err(MigrationError::Structure("no microservices proposed".into()));
        }
        let mut seen = HashSet::new();
        for ms in &self.microservices {
            check_segment(&ms.name, "microservice")?;
            if !seen.insert(ms.name.to_lowercase()) {
                return Err(MigrationError::Structure(format!(
                    "duplicate microservice name: {}",
                    ms.name
                )));
            }
            for project in &ms.projects {
                check_segment(&project.project_name, "project")?;
                let layout = &project.target_structure;
                for name in layout.root.keys() {
                    check_relative(name, "file")?;
                }
                for (name, folder) in &layout.folders {
                    check_relative(name, "folder")?;
                    check_folder(folder)?;
                }
            }
        }
        Ok(())
    }

    /// The gateway microservice, if proposed.
    #[must_use]
    pub fn gateway(&self) -> Option<&Microservice> {
        self.microservices.iter().find(|ms| ms.is_gateway())
    }

    /// Mutable access to the gateway microservice.
    pub fn gateway_mut(&mut self) -> Option<&mut Microservice> {
        self.microservices.iter_mut().find(|ms| ms.is_gateway())
    }

    /// Sum of projects across microservices.
    #[must_use]
    pub fn project_count(&self) -> usize {
        self.microservices.iter().map(|ms| ms.projects.len()).sum()
    }
}

fn check_segment(name: &str, what: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(MigrationError::Structure(format!("{what} with an empty name")));
    }
    if trimmed == "." || trimmed == ".." || trimmed.contains(['/', '\\']) {
        return Err(MigrationError::Structure(format!("{what} name {name:?} is not a plain directory name")));
    }
    Ok(())
}

fn check_folder(folder: &TargetFolder) -> Result<()> {
    for name in folder.target_files.keys() {
        check_relative(name, "file")?;
    }
    for (name, sub) in &folder.subfolders {
        check_relative(name, "folder")?;
        check_folder(sub)?;
    }
    Ok(())
}

/// File and folder keys are joined onto output directories, so they may only
/// hold plain `a/b.cs` components.
fn check_relative(key: &str, what: &str) -> Result<()> {
    let normalized = key.replace('\\', "/");
    let path = Path::new(&normalized);
    let plain = !normalized.trim().is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)));
    if plain {
        Ok(())
    } else {
        Err(MigrationError::Structure(format!("{what} path {key:?} must be relative without '.' or '..'")))
    }
}

/// Treats an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
