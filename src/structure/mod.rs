//! Target-structure model and the rules applied to it before generation.

pub mod gateway;
pub mod model;

pub use gateway::{clear_empty_folders, detect_auth, sanitize_gateway, AuthCase};
pub use model::{
    FileType, Microservice, Project, ProjectLayout, TargetFileSpec, TargetFolder, TargetStructure,
    GATEWAY,
};
