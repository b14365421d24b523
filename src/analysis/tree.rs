//! Source-tree scanning and per-file analysis records.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use walkdir::{DirEntry, WalkDir};

use crate::error::{MigrationError, Result};
use crate::migrate::walker::slash_path;

/// Name fragments that exclude a file or directory from scanning.
pub const IGNORED: [&str; 8] = [".git", "__pycache__", "node_modules", ".vs", "bin", "obj", ".vscode", ".idea"];

/// Extensions sent to the model for analysis.
const ANALYZED_EXTENSIONS: [&str; 3] = ["cs", "cshtml", "razor"];

/// What the model reports about one legacy file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAnalysis {
    /// Coarse kind (`controller`, `model`, `view`, ...).
    pub file_type: String,
    /// What the file does.
    pub description: String,
    /// Declared classes.
    #[serde(default)]
    pub classnames: Vec<String>,
    /// Declared namespaces.
    #[serde(default)]
    pub namespace: Vec<String>,
    /// Public methods.
    #[serde(default)]
    pub methods: Vec<String>,
    /// Referenced assemblies and packages.
    #[serde(default)]
    pub external_references: Vec<String>,
    /// Framework features in use (WebForms, EF, ...).
    #[serde(default)]
    pub framework_features: Vec<String>,
    /// Types and services the file depends on.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Recognised design patterns.
    #[serde(default)]
    pub patterns_used: Vec<String>,
    /// Controller routes, when the file is a controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<String>>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_notes: Option<String>,
}

fn is_ignored(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    entry.depth() > 0 && IGNORED.iter().any(|pattern| name.contains(pattern))
}

fn walk_err(err: walkdir::Error) -> MigrationError {
    MigrationError::Io(format!("cannot scan source tree: {err}"))
}

/// Returns `true` for files the analyzer sends to the model.
#[must_use]
pub fn is_analyzable(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ANALYZED_EXTENSIONS.iter().any(|a| ext.eq_ignore_ascii_case(a)))
}

/// Inserts `leaf` at the slash-separated `rel` path of `tree`, creating
/// intermediate objects.
pub fn insert_path(tree: &mut Map<String, Value>, rel: &str, leaf: Value) {
    let mut parts: Vec<&str> = rel.split('/').filter(|p| !p.is_empty()).collect();
    let Some(last) = parts.pop() else {
        return;
    };
    let mut current = tree;
    for part in parts {
        let slot = current.entry(part.to_string()).or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        current = next;
    }
    current.insert(last.to_string(), leaf);
}

/// Nested object mirroring the source tree, with every file mapped to
/// `"file"`. Names containing an [`IGNORED`] fragment are skipped.
///
/// # Errors
///
/// Returns [`MigrationError::Io`] when the tree cannot be walked.
pub fn basic_tree(root: &Path) -> Result<Value> {
    let mut tree = Map::new();
    for entry in WalkDir::new(root).sort_by_file_name().into_iter().filter_entry(|e| !is_ignored(e)) {
        let entry = entry.map_err(walk_err)?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(root) {
            insert_path(&mut tree, &slash_path(rel), Value::String("file".into()));
        }
    }
    Ok(Value::Object(tree))
}

/// Analyzable files under `root`, as absolute paths, in walk order.
///
/// # Errors
///
/// Returns [`MigrationError::Io`] when the tree cannot be walked.
pub fn analyzable_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name().into_iter().filter_entry(|e| !is_ignored(e)) {
        let entry = entry.map_err(walk_err)?;
        if entry.file_type().is_file() && is_analyzable(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Paths of the files recorded in an analysis or basic tree: objects with a
/// `file_type` field and `"file"` markers are leaves.
#[must_use]
pub fn analysed_paths(tree: &Value) -> Vec<String> {
    fn walk(value: &Value, prefix: &str, out: &mut Vec<String>) {
        let Value::Object(map) = value else {
            return;
        };
        for (key, child) in map {
            let path = if prefix.is_empty() { key.clone() } else { format!("{prefix}/{key}") };
            let is_leaf = match child {
                Value::Object(fields) => fields.contains_key("file_type"),
                _ => true,
            };
            if is_leaf {
                out.push(path);
            } else {
                walk(child, &path, out);
            }
        }
    }
    let mut out = Vec::new();
    walk(tree, "", &mut out);
    out
}
