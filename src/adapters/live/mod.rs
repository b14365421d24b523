//! Adapters that talk to the real world.

pub mod clock;
pub mod filesystem;
pub mod id_gen;
pub mod llm;
pub mod shell;
