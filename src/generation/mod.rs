//! Code generation: prompt assembly, chunking, lenient decoding and the
//! retrying worker.

pub mod chunk;
pub mod extract;
pub mod memory;
pub mod prompt;
pub mod tokens;
pub mod worker;

pub use chunk::chunk;
pub use extract::{decode_object, decode_value, strip_fences};
pub use memory::ConversationMemory;
pub use prompt::{PromptTemplates, ProjectLayer};
pub use tokens::estimate_tokens;
pub use worker::{CodeGenerationWorker, GeneratedCode, GenerationRequest};
