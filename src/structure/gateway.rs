//! Gateway sanitization: forcing the proposed gateway into the shape the
//! chosen authentication strategy needs, and pruning empty folders.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::model::{
    FileType, Microservice, Project, ProjectLayout, TargetFileSpec, TargetFolder, TargetStructure,
    GATEWAY,
};
use crate::error::{MigrationError, Result};

/// Folders a routing-only gateway must not carry.
const ROUTING_ONLY_REMOVED: [&str; 5] = ["Controllers", "Data", "Entities", "Models", "Views"];

/// Where authentication ends up in the target system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthCase {
    /// The source has no authentication; the gateway only routes.
    None,
    /// Authentication moves to its own microservice; the gateway only routes.
    Dedicated,
    /// Authentication stays inside the gateway.
    InGateway,
}

impl AuthCase {
    /// Decides the case from source detection and the user's instruction.
    ///
    /// Any mention of "auth" in the instruction asks for a dedicated service.
    #[must_use]
    pub fn decide(source_has_auth: bool, instruction: &str) -> Self {
        if instruction.to_lowercase().contains("auth") {
            Self::Dedicated
        } else if source_has_auth {
            Self::InGateway
        } else {
            Self::None
        }
    }
}

/// Returns `true` when any path mentions authentication.
pub fn detect_auth<'a>(paths: impl IntoIterator<Item = &'a str>) -> bool {
    paths.into_iter().any(|p| {
        let lower = p.to_lowercase();
        lower.contains("auth") || lower.contains("identity") || lower.contains("login")
    })
}

/// Applies the gateway rules for `case` to `structure` in place.
///
/// # Errors
///
/// Returns [`MigrationError::MissingGateway`] when authentication has to
/// live in the gateway but no gateway was proposed.
pub fn sanitize_gateway(structure: &mut TargetStructure, case: AuthCase) -> Result<()> {
    let Some(gateway) = structure.gateway_mut() else {
        if case == AuthCase::InGateway {
            return Err(MigrationError::MissingGateway);
        }
        return Ok(());
    };

    if gateway.projects.is_empty() {
        warn!(microservice = %gateway.name, "gateway has no projects, adding the default routing project");
        gateway.projects.push(default_gateway_project());
    }

    match case {
        AuthCase::None => {
            for project in &mut gateway.projects {
                let folders = &mut project.target_structure.folders;
                for name in ROUTING_ONLY_REMOVED {
                    if folders.remove(name).is_some() {
                        info!(folder = name, "removed folder from routing-only gateway");
                    }
                }
            }
        }
        AuthCase::Dedicated => {
            for project in &mut gateway.projects {
                if !project.target_structure.folders.is_empty() {
                    info!(project = %project.project_name, "clearing gateway folders, auth lives in its own service");
                }
                project.target_structure.folders.clear();
            }
        }
        AuthCase::InGateway => ensure_auth_files(gateway),
    }
    Ok(())
}

/// The routing project a gateway gets when the proposal left it empty.
#[must_use]
pub fn default_gateway_project() -> Project {
    let root = BTreeMap::from([
        (
            "appsettings.json".to_string(),
            TargetFileSpec::new(FileType::Config, "Gateway configuration", ""),
        ),
        (
            format!("{GATEWAY}.csproj"),
            TargetFileSpec::new(FileType::Csproj, "API Gateway project with Ocelot dependencies", ""),
        ),
        (
            "ocelot.json".to_string(),
            TargetFileSpec::new(FileType::Ocelot, "Ocelot routing configuration", ""),
        ),
        (
            "Program.cs".to_string(),
            TargetFileSpec::new(FileType::Program, "Gateway entry point with Ocelot middleware", GATEWAY),
        ),
    ]);
    Project {
        project_name: GATEWAY.to_string(),
        target_structure: ProjectLayout { root, folders: BTreeMap::new() },
    }
}

/// Adds the controller, context and entity an in-gateway auth needs to the
/// first gateway project, leaving any the proposal already has.
fn ensure_auth_files(gateway: &mut Microservice) {
    let Some(project) = gateway.projects.first_mut() else {
        return;
    };
    let existing: Vec<String> =
        project.target_structure.file_paths().iter().map(|p| p.to_lowercase()).collect();
    let has = |path: &str| existing.iter().any(|p| p.ends_with(&path.to_lowercase()));

    let mut required = Vec::new();
    if !has("Controllers/AuthController.cs") {
        let mut spec = TargetFileSpec::new(
            FileType::Controller,
            "Authentication endpoints (login, token)",
            "Gateway.Controllers",
        );
        spec.routes = vec!["/api/auth/login".into(), "/api/auth/token".into()];
        required.push(("Controllers", "AuthController.cs", spec));
    }
    if !has("Data/AuthDbContext.cs") {
        required.push((
            "Data",
            "AuthDbContext.cs",
            TargetFileSpec::new(FileType::DbContext, "EF Core context for auth data", "Gateway.Data"),
        ));
    }
    if !has("Entities/User.cs") {
        required.push((
            "Entities",
            "User.cs",
            TargetFileSpec::new(FileType::Entity, "User entity for authentication", "Gateway.Entities"),
        ));
    }

    for (folder, file, spec) in required {
        warn!(file = %format!("{folder}/{file}"), "gateway is missing a required auth file, adding it");
        project
            .target_structure
            .folders
            .entry(folder.to_string())
            .or_default()
            .target_files
            .insert(file.to_string(), spec);
    }
}

/// Removes every folder that holds no files anywhere beneath it.
pub fn clear_empty_folders(structure: &mut TargetStructure) {
    for ms in &mut structure.microservices {
        for project in &mut ms.projects {
            prune(&mut project.target_structure.folders);
        }
    }
}

fn prune(folders: &mut BTreeMap<String, TargetFolder>) {
    for folder in folders.values_mut() {
        prune(&mut folder.subfolders);
    }
    folders.retain(|_, folder| !folder.is_empty());
}
