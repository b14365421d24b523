//! Local TF-IDF vectors and cosine ranking.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Maximum vocabulary size (number of unique tokens tracked).
const MAX_VOCAB_SIZE: usize = 8192;

/// Vocabulary learned from a corpus: token columns plus their IDF weights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    token_to_idx: HashMap<String, usize>,
    idf: Vec<f32>,
    num_docs: usize,
}

impl Vocabulary {
    /// Builds the vocabulary of `corpus`, keeping the most frequent tokens.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn build(corpus: &[&str]) -> Self {
        let num_docs = corpus.len().max(1);

        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for doc in corpus {
            let unique: HashSet<String> = tokenize(doc).into_iter().collect();
            for token in unique {
                *doc_freq.entry(token).or_insert(0) += 1;
            }
        }

        let mut entries: Vec<(String, usize)> = doc_freq.into_iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(MAX_VOCAB_SIZE);

        let mut token_to_idx = HashMap::with_capacity(entries.len());
        let mut idf = Vec::with_capacity(entries.len());
        for (idx, (token, freq)) in entries.into_iter().enumerate() {
            token_to_idx.insert(token, idx);
            // log(N / df) + 1 keeps tokens present in every document non-zero.
            idf.push(((num_docs as f32) / (freq as f32)).ln() + 1.0);
        }

        Self { token_to_idx, idf, num_docs }
    }

    /// Number of columns in vectors produced from this vocabulary.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.idf.len()
    }

    /// L2-normalised TF-IDF vector of `text`. Empty for an empty vocabulary.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn vector(&self, text: &str) -> Vec<f32> {
        let dim = self.idf.len();
        if dim == 0 {
            return Vec::new();
        }

        let tokens = tokenize(text);
        let total = tokens.len().max(1) as f32;

        let mut tf = vec![0.0f32; dim];
        for token in &tokens {
            if let Some(&idx) = self.token_to_idx.get(token) {
                tf[idx] += 1.0 / total;
            }
        }
        for (value, idf) in tf.iter_mut().zip(&self.idf) {
            *value *= idf;
        }

        let magnitude = tf.iter().map(|v| v * v).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut tf {
                *value /= magnitude;
            }
        }
        tf
    }
}

/// Cosine similarity of two vectors; 0.0 when either has zero magnitude or
/// the lengths differ.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut mag_a = 0.0f32;
    let mut mag_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }
    let denom = mag_a.sqrt() * mag_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

/// Splits on non-alphanumerics, then splits identifiers on camelCase and
/// snake_case boundaries. Compound identifiers also yield the whole word.
/// Tokens shorter than two characters are dropped.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in text.split(|c: char| !c.is_alphanumeric() && c != '_') {
        let word = word.trim_matches('_');
        if word.chars().count() < 2 {
            continue;
        }
        let parts = split_identifier(word);
        let compound = parts.len() > 1;
        tokens.extend(parts.into_iter().filter(|p| p.chars().count() >= 2));
        if compound {
            tokens.push(word.to_lowercase());
        }
    }
    tokens
}

/// `OrderService` -> `order`, `service`; `order_line` -> `order`, `line`.
fn split_identifier(word: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for ch in word.chars() {
        if ch == '_' {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}
