//! The generation phase: walking target structures into a repository,
//! then packaging it.

pub mod archive;
pub mod assets;
pub mod gateway_config;
pub mod orchestrator;
pub mod report;
pub mod result;
pub mod routes;
pub mod solution;
pub mod walker;

pub use orchestrator::{MicroserviceOrchestrator, MigrationJob, MigrationOutcome, Variant};
pub use report::{GatewayConfigOutcome, MigrationReport};
pub use result::{FailedFile, MigrationResult, ProjectStatus};
pub use walker::{ProjectScope, TreeWalker};
