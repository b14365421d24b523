//! Port implementations: live adapters for real work, recording wrappers
//! that capture cassettes, and replaying adapters that serve them back.

pub mod live;
pub mod recording;
pub mod replaying;
