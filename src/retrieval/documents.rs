//! Flattens a JSON document into labelled text snippets for indexing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One indexed snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Path of the object in the source document, e.g.
    /// `microservices/Orders/projects/Orders.Domain/target_structure/root/Order.cs`.
    pub label: String,
    /// Label plus `key: value` lines of the object's scalar fields.
    pub text: String,
}

/// Produces one document per object that carries scalar fields (its
/// "leaf subtree"). Array items are labelled by their `name` or
/// `project_name` when present, else by index. A bare scalar root becomes a
/// single document.
#[must_use]
pub fn flatten(root: &Value) -> Vec<Document> {
    let mut out = Vec::new();
    walk(root, &mut Vec::new(), &mut out);
    if out.is_empty() && !root.is_null() && !root.is_object() && !root.is_array() {
        out.push(Document { label: String::new(), text: scalar_text(root) });
    }
    out
}

fn walk(value: &Value, path: &mut Vec<String>, out: &mut Vec<Document>) {
    match value {
        Value::Object(map) => {
            let mut lines = Vec::new();
            for (key, child) in map {
                if let Some(text) = leaf_text(child) {
                    lines.push(format!("{key}: {text}"));
                }
            }
            if !lines.is_empty() {
                let label = path.join("/");
                let text = if label.is_empty() {
                    lines.join("\n")
                } else {
                    format!("{label}\n{}", lines.join("\n"))
                };
                out.push(Document { label, text });
            }
            for (key, child) in map {
                if leaf_text(child).is_none() {
                    path.push(key.clone());
                    walk(child, path, out);
                    path.pop();
                }
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                path.push(item_label(item).unwrap_or_else(|| index.to_string()));
                walk(item, path, out);
                path.pop();
            }
        }
        _ => {}
    }
}

/// Text of a scalar or an array of scalars; `None` for anything nested.
fn leaf_text(value: &Value) -> Option<String> {
    match value {
        Value::Object(_) => None,
        Value::Array(items) => {
            if items.iter().all(|v| !v.is_object() && !v.is_array()) {
                Some(items.iter().map(scalar_text).collect::<Vec<_>>().join(", "))
            } else {
                None
            }
        }
        other => Some(scalar_text(other)),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn item_label(item: &Value) -> Option<String> {
    let map = item.as_object()?;
    ["name", "project_name"]
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}
