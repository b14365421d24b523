//! Port traits for every boundary the migration pipeline crosses.
//!
//! The core never talks to the network, the disk or the build tool
//! directly. It goes through these traits, and `src/adapters/` supplies
//! live, recording and replaying implementations.

pub mod clock;
pub mod filesystem;
pub mod id_gen;
pub mod llm;
pub mod shell;

pub use clock::Clock;
pub use filesystem::FileSystem;
pub use id_gen::IdGenerator;
pub use llm::{CompletionFuture, CompletionRequest, CompletionResponse, LlmClient};
pub use shell::{ShellExecutor, ShellOutput};

/// Error type returned by port implementations.
pub type PortError = Box<dyn std::error::Error + Send + Sync>;
