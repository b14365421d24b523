//! Splits oversized source files at declaration boundaries.
//!
//! The scanner walks lines and tracks whether it is inside a "method" block
//! (class, interface, method) or a "struct" block (struct, record). A line
//! with a closing brace ends the open block. Chunks are only cut outside an
//! open block, so a declaration is never split in the middle even when it is
//! larger than the threshold on its own.

use crate::structure::FileType;

use super::tokens::estimate_tokens;

const CSHARP_METHOD_STARTS: &[&str] = &[
    "public class",
    "private class",
    "public interface",
    "private interface",
    "public void",
    "private void",
    "public async",
    "private async",
    "public string",
    "private string",
    "public int",
    "private int",
];
const CSHARP_STRUCT_STARTS: &[&str] =
    &["public struct", "private struct", "public record", "private record"];
const PROTO_METHOD_STARTS: &[&str] = &["service ", "rpc "];
const PROTO_STRUCT_STARTS: &[&str] = &["message ", "enum "];

/// Splits `content` into ordered chunks of at most roughly `max_tokens`.
///
/// Content at or under the threshold comes back unchanged as one chunk.
/// Otherwise the chunks, joined with `\n`, reproduce the content's lines.
#[must_use]
pub fn chunk(content: &str, max_tokens: usize, file_type: FileType) -> Vec<String> {
    if estimate_tokens(content) <= max_tokens {
        return vec![content.to_string()];
    }

    let (method_starts, struct_starts) = match file_type {
        FileType::Proto => (PROTO_METHOD_STARTS, PROTO_STRUCT_STARTS),
        _ => (CSHARP_METHOD_STARTS, CSHARP_STRUCT_STARTS),
    };
    let flush_after_block = max_tokens * 4 / 5;

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut size = 0usize;
    let mut in_method = false;
    let mut in_struct = false;

    let mut flush = |current: &mut Vec<&str>, size: &mut usize| {
        chunks.push(current.join("\n"));
        current.clear();
        *size = 0;
    };

    for line in content.lines() {
        let trimmed = line.trim();
        let cost = estimate_tokens(line);
        let overflows = size + cost > max_tokens && !current.is_empty();

        if struct_starts.iter().any(|k| trimmed.contains(k)) {
            if overflows && !in_method {
                flush(&mut current, &mut size);
            }
            in_struct = true;
        } else if in_struct && trimmed.contains('}') {
            current.push(line);
            size += cost;
            in_struct = false;
            if size > flush_after_block {
                flush(&mut current, &mut size);
            }
            continue;
        } else if method_starts.iter().any(|k| trimmed.contains(k)) {
            if overflows && !in_struct {
                flush(&mut current, &mut size);
            }
            in_method = true;
        } else if in_method && trimmed.contains('}') {
            current.push(line);
            size += cost;
            in_method = false;
            if size > flush_after_block {
                flush(&mut current, &mut size);
            }
            continue;
        } else if overflows && !in_method && !in_struct {
            flush(&mut current, &mut size);
        }

        current.push(line);
        size += cost;
    }

    if !current.is_empty() {
        flush(&mut current, &mut size);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_with_methods(methods: usize, body_lines: usize) -> String {
        let mut out = String::from("namespace Shop.Orders;\npublic class OrderService\n{\n");
        for m in 0..methods {
            out.push_str(&format!("    public void Handle{m}()\n    {{\n"));
            for l in 0..body_lines {
                out.push_str(&format!("        var value{l} = Compute({m}, {l}); // padding text\n"));
            }
            out.push_str("    }\n");
        }
        out.push_str("}\n");
        out
    }

    fn rejoined(content: &str) -> String {
        content.lines().collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn small_content_is_a_single_untouched_chunk() {
        let content = "public class A {}\n";
        assert_eq!(chunk(content, 100, FileType::Model), vec![content.to_string()]);
    }

    #[test]
    fn chunks_reassemble_to_the_original_lines() {
        let content = class_with_methods(12, 20);
        let chunks = chunk(&content, 400, FileType::Service);
        assert!(chunks.len() > 1);
        assert_eq!(chunks.join("\n"), rejoined(&content));
        assert!(chunks.len() <= content.lines().count());
    }

    #[test]
    fn oversized_declaration_is_not_split() {
        let mut content = String::from("public record Huge(\n");
        for i in 0..200 {
            content.push_str(&format!("    string Field{i},\n"));
        }
        content.push_str(");\n}\n");
        content.push_str(&"// trailing comment line\n".repeat(10));

        let chunks = chunk(&content, 50, FileType::Model);
        assert!(chunks[0].starts_with("public record Huge("));
        assert!(chunks[0].contains("Field199"));
        assert_eq!(chunks.join("\n"), rejoined(&content));
    }

    #[test]
    fn proto_messages_are_boundaries() {
        let mut content = String::from("syntax = \"proto3\";\n");
        for i in 0..30 {
            content.push_str(&format!(
                "message Item{i} {{\n  string id = 1;\n  string name = 2;\n  int32 qty = 3;\n}}\n"
            ));
        }
        let chunks = chunk(&content, 60, FileType::Proto);
        assert!(chunks.len() > 1);
        for c in &chunks[1..] {
            assert!(c.trim_start().starts_with("message "), "chunk starts mid-message: {c}");
        }
        assert_eq!(chunks.join("\n"), rejoined(&content));
    }

    #[test]
    fn always_at_least_one_chunk() {
        assert_eq!(chunk("", 1, FileType::Model), vec![String::new()]);
    }
}
