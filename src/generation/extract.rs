//! Lenient decoding of LLM output.
//!
//! Models wrap JSON in prose and markdown fences. Decoding is three explicit
//! steps: strip fence markers, take the first balanced `{...}` object
//! (string- and escape-aware), then parse and deserialize it.

use serde::de::DeserializeOwned;

use crate::error::{MigrationError, Result};

/// Fence markers removed from responses and generated code, longest first.
const FENCES: &[&str] = &[
    "```csharp", "```json", "```xml", "```cs", "```", "'''csharp", "'''json", "'''xml", "'''cs",
    "'''",
];

/// Removes markdown code-fence markers and trims surrounding whitespace.
#[must_use]
pub fn strip_fences(text: &str) -> String {
    let mut out = text.to_string();
    for fence in FENCES {
        out = out.replace(fence, "");
    }
    out.trim().to_string()
}

/// Returns the first balanced JSON object in `text`, if any.
///
/// Braces inside string literals are ignored, so generated code carried in
/// a JSON string does not confuse the scan.
#[must_use]
pub fn first_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        for (i, &b) in bytes.iter().enumerate().skip(start) {
            if in_string {
                match b {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&text[start..=i]);
                    }
                }
                _ => {}
            }
        }
        // Unbalanced from this brace; try the next one.
        search_from = start + 1;
    }
    None
}

/// Strips fences, extracts the first object and deserializes it as `T`.
///
/// # Errors
///
/// - [`MigrationError::MalformedResponse`] when no object is found or it is
///   not valid JSON.
/// - [`MigrationError::InvalidResponse`] when the JSON does not match `T`.
pub fn decode_object<T: DeserializeOwned>(text: &str) -> Result<T> {
    let value = decode_value(text)?;
    serde_json::from_value(value).map_err(|e| MigrationError::InvalidResponse(e.to_string()))
}

/// Like [`decode_object`] but stops at an untyped JSON value.
///
/// # Errors
///
/// Returns [`MigrationError::MalformedResponse`] when no valid object is found.
pub fn decode_value(text: &str) -> Result<serde_json::Value> {
    let cleaned = strip_fences(text);
    let object = first_json_object(&cleaned).ok_or_else(|| {
        MigrationError::MalformedResponse(format!("no JSON object in response: {}", preview(&cleaned)))
    })?;
    serde_json::from_str(object).map_err(|e| MigrationError::MalformedResponse(e.to_string()))
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(120).collect();
    if text.chars().count() > 120 {
        out.push_str("...");
    }
    out
}
