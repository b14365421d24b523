//! Retrieval over the target structure and the source analysis.
//!
//! Each service persists its JSON corpus under `<workspace>/<kind>/data.json`
//! and a TF-IDF index under `<workspace>/<kind>/index/index.json`. The index
//! records a SHA-256 fingerprint of its corpus and is rebuilt whenever the
//! corpus changes. A service
//! that failed to initialize answers queries with a sentinel string instead
//! of an error, so generation degrades to "no extra context".

pub mod documents;
pub mod tfidf;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, info};

use crate::error::{MigrationError, Result};
use crate::ports::FileSystem;
use documents::{flatten, Document};
use tfidf::{cosine_similarity, Vocabulary};

/// How many snippets a query returns at most.
const TOP_K: usize = 3;

/// Separator between returned snippets.
const SNIPPET_SEPARATOR: &str = "\n---\n";

/// Which corpus a service indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalKind {
    /// The target structure proposal.
    Context,
    /// The per-file source analysis.
    Analysis,
}

impl RetrievalKind {
    /// Workspace subdirectory for this kind.
    #[must_use]
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Context => "context",
            Self::Analysis => "analysis",
        }
    }
}

impl fmt::Display for RetrievalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Context => "Context",
            Self::Analysis => "Analysis",
        })
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedIndex {
    #[serde(default)]
    fingerprint: String,
    vocabulary: Vocabulary,
    documents: Vec<Document>,
}

struct Index {
    vocabulary: Vocabulary,
    documents: Vec<Document>,
    vectors: Vec<Vec<f32>>,
}

impl Index {
    fn from_persisted(persisted: PersistedIndex) -> Self {
        let vectors = persisted.documents.iter().map(|d| persisted.vocabulary.vector(&d.text)).collect();
        Self { vocabulary: persisted.vocabulary, documents: persisted.documents, vectors }
    }

    fn search(&self, text: &str) -> Vec<&Document> {
        let query = self.vocabulary.vector(text);
        let mut scored: Vec<(f32, usize)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (cosine_similarity(&query, v), i))
            .filter(|(score, _)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.into_iter().take(TOP_K).map(|(_, i)| &self.documents[i]).collect()
    }
}

/// A read-only index once initialized; shared by reference across workers.
pub struct RetrievalService {
    kind: RetrievalKind,
    index: Option<Index>,
}

impl RetrievalService {
    /// Creates an uninitialized service.
    #[must_use]
    pub fn new(kind: RetrievalKind) -> Self {
        Self { kind, index: None }
    }

    /// Which corpus this service indexes.
    #[must_use]
    pub fn kind(&self) -> RetrievalKind {
        self.kind
    }

    /// Returns `true` once [`RetrievalService::initialize`] has succeeded.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.index.is_some()
    }

    /// Persists `json_text` and builds the index, or loads the persisted one
    /// when present and `force_rebuild` is false.
    ///
    /// Returns `false` (and logs why) on any failure; the service is then
    /// left uninitialized.
    pub fn initialize(
        &mut self,
        fs: &dyn FileSystem,
        json_text: &str,
        workspace: &Path,
        force_rebuild: bool,
    ) -> bool {
        match self.try_initialize(fs, json_text, workspace, force_rebuild) {
            Ok(index) => {
                info!(kind = %self.kind, documents = index.documents.len(), "retrieval index ready");
                self.index = Some(index);
                true
            }
            Err(err) => {
                error!(kind = %self.kind, error = %err, "retrieval index unavailable");
                self.index = None;
                false
            }
        }
    }

    fn try_initialize(
        &self,
        fs: &dyn FileSystem,
        json_text: &str,
        workspace: &Path,
        force_rebuild: bool,
    ) -> Result<Index> {
        let init_err = |what: &str, e: &dyn fmt::Display| MigrationError::RetrievalInit(format!("{what}: {e}"));

        let value: serde_json::Value =
            serde_json::from_str(json_text).map_err(|e| init_err("malformed JSON document", &e))?;

        let dir = workspace.join(self.kind.dir_name());
        let pretty = serde_json::to_string_pretty(&value).map_err(|e| init_err("cannot serialize document", &e))?;
        fs.write(&dir.join("data.json"), &pretty).map_err(|e| init_err("cannot persist document", &e))?;

        let fingerprint = fingerprint(&pretty);
        let index_path = index_path(&dir);
        if !force_rebuild && fs.exists(&index_path) {
            let text = fs.read_to_string(&index_path).map_err(|e| init_err("cannot read index", &e))?;
            let persisted: PersistedIndex =
                serde_json::from_str(&text).map_err(|e| init_err("corrupt index", &e))?;
            if persisted.fingerprint == fingerprint {
                return Ok(Index::from_persisted(persisted));
            }
            info!(kind = %self.kind, "persisted index belongs to another document, rebuilding");
        }

        let documents = flatten(&value);
        let corpus: Vec<&str> = documents.iter().map(|d| d.text.as_str()).collect();
        let persisted = PersistedIndex { fingerprint, vocabulary: Vocabulary::build(&corpus), documents };
        let text = serde_json::to_string(&persisted).map_err(|e| init_err("cannot serialize index", &e))?;
        fs.write(&index_path, &text).map_err(|e| init_err("cannot persist index", &e))?;
        Ok(Index::from_persisted(persisted))
    }

    /// Best-matching snippets for `text`, or a "not initialized" sentinel.
    #[must_use]
    pub fn query(&self, text: &str) -> String {
        if self.index.is_none() {
            return format!("{} index not initialized.", self.kind);
        }
        self.lookup(text).unwrap_or_default()
    }

    /// Best-matching snippets, or `None` when uninitialized or nothing
    /// matches.
    #[must_use]
    pub fn lookup(&self, text: &str) -> Option<String> {
        let hits = self.index.as_ref()?.search(text);
        if hits.is_empty() {
            return None;
        }
        Some(hits.iter().map(|d| d.text.as_str()).collect::<Vec<_>>().join(SNIPPET_SEPARATOR))
    }
}

fn fingerprint(document: &str) -> String {
    format!("{:x}", Sha256::digest(document.as_bytes()))
}

fn index_path(kind_dir: &Path) -> PathBuf {
    kind_dir.join("index").join("index.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::live::filesystem::LiveFileSystem;

    const STRUCTURE: &str = r#"{
      "microservices": [
        {"name": "Orders", "projects": [{"project_name": "Orders.Domain", "target_structure": {"root": {
          "Order.cs": {"file_type": "entity", "description": "Order aggregate with order lines"}
        }}}]},
        {"name": "Customers", "projects": [{"project_name": "Customers.Domain", "target_structure": {"root": {
          "Customer.cs": {"file_type": "entity", "description": "Customer profile and loyalty tier"}
        }}}]}
      ]
    }"#;

    #[test]
    fn query_before_initialize_returns_sentinel() {
        let context = RetrievalService::new(RetrievalKind::Context);
        assert_eq!(context.query("anything"), "Context index not initialized.");
        assert!(context.lookup("anything").is_none());
        let analysis = RetrievalService::new(RetrievalKind::Analysis);
        assert_eq!(analysis.query("anything"), "Analysis index not initialized.");
    }

    #[test]
    fn malformed_json_leaves_service_uninitialized() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = RetrievalService::new(RetrievalKind::Analysis);
        assert!(!service.initialize(&LiveFileSystem, "{not json", dir.path(), false));
        assert!(!service.is_initialized());
        assert!(!dir.path().join("analysis/data.json").exists());
    }

    #[test]
    fn builds_persists_and_answers() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = RetrievalService::new(RetrievalKind::Context);
        assert!(service.initialize(&LiveFileSystem, STRUCTURE, dir.path(), false));
        assert!(dir.path().join("context/data.json").exists());
        assert!(dir.path().join("context/index/index.json").exists());

        let answer = service.query("customer loyalty");
        assert!(answer.starts_with("microservices/Customers/projects/Customers.Domain/target_structure/root/Customer.cs"));
        assert!(service.lookup("zzzz unrelated").is_none());
    }

    #[test]
    fn persisted_index_is_reused_for_the_same_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = RetrievalService::new(RetrievalKind::Context);
        assert!(first.initialize(&LiveFileSystem, STRUCTURE, dir.path(), false));

        // Mark the persisted snippets so a reload is observable.
        let path = dir.path().join("context/index/index.json");
        let mut persisted: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        for doc in persisted["documents"].as_array_mut().unwrap() {
            let text = format!("REUSED {}", doc["text"].as_str().unwrap());
            doc["text"] = serde_json::Value::String(text);
        }
        std::fs::write(&path, persisted.to_string()).unwrap();

        let mut reused = RetrievalService::new(RetrievalKind::Context);
        assert!(reused.initialize(&LiveFileSystem, STRUCTURE, dir.path(), false));
        assert!(reused.lookup("customer loyalty").unwrap().starts_with("REUSED "));

        let mut rebuilt = RetrievalService::new(RetrievalKind::Context);
        assert!(rebuilt.initialize(&LiveFileSystem, STRUCTURE, dir.path(), true));
        assert!(!rebuilt.lookup("customer loyalty").unwrap().starts_with("REUSED "));
    }

    #[test]
    fn changed_document_rebuilds_the_persisted_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = RetrievalService::new(RetrievalKind::Context);
        assert!(first.initialize(&LiveFileSystem, STRUCTURE, dir.path(), false));

        let other = r#"{"microservices": [{"name": "Billing", "description": "invoices"}]}"#;
        let mut second = RetrievalService::new(RetrievalKind::Context);
        assert!(second.initialize(&LiveFileSystem, other, dir.path(), false));
        assert!(second.lookup("invoices").is_some());
        assert!(second.lookup("customer loyalty").is_none());

        let persisted = std::fs::read_to_string(dir.path().join("context/index/index.json")).unwrap();
        assert!(persisted.contains("invoices"));
        assert!(!persisted.contains("loyalty"));
    }

    #[test]
    fn corrupt_index_fails_initialization() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("analysis/index")).unwrap();
        std::fs::write(dir.path().join("analysis/index/index.json"), "garbage").unwrap();
        let mut service = RetrievalService::new(RetrievalKind::Analysis);
        assert!(!service.initialize(&LiveFileSystem, "{}", dir.path(), false));
        assert!(service.initialize(&LiveFileSystem, "{}", dir.path(), true));
    }
}
