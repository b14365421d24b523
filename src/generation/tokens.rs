//! Deterministic token estimate: one token per four characters, rounded up.

/// Estimates how many model tokens `text` costs.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}
