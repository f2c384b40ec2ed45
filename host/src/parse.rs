//! Extension-dispatched parsing of configuration and mapping files.
//!
//! `.yao` and `.jsonc` are JSON with `//` and `/* */` comments and optional
//! trailing commas. The cleaner below blanks comments in place so byte
//! offsets in parse errors still point at the original file.

use std::path::Path;

use mcp_types::McpError;
use mcp_types::Result;
use serde_json::Value;

/// Parse `bytes` according to the extension of `path`. Unknown extensions
/// are treated as JSON-with-comments, matching the `.yao` default.
pub fn parse_slice(path: &Path, bytes: &[u8]) -> Result<Value> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_slice(bytes)
            .map_err(|err| McpError::Load(format!("{}: {err}", path.display()))),
        "json" => serde_json::from_slice(bytes)
            .map_err(|err| McpError::Load(format!("{}: {err}", path.display()))),
        _ => {
            let text = std::str::from_utf8(bytes)
                .map_err(|err| McpError::Load(format!("{}: invalid UTF-8: {err}", path.display())))?;
            let cleaned = strip_trailing_commas(&strip_jsonc_comments(text));
            serde_json::from_str(&cleaned)
                .map_err(|err| McpError::Load(format!("{}: {err}", path.display())))
        }
    }
}

/// Blank out `//` and `/* */` comments outside string literals. Newlines are
/// preserved and removed spans are replaced with spaces so line/column error
/// offsets keep pointing at the original source.
pub fn strip_jsonc_comments(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            result.push(c);
            if c == '\\' {
                if let Some(next) = chars.next() {
                    result.push(next);
                }
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                result.push(c);
            }
            '/' => match chars.peek() {
                Some('/') => {
                    chars.next();
                    result.push_str("  ");
                    for nc in chars.by_ref() {
                        if nc == '\n' {
                            result.push('\n');
                            break;
                        }
                        result.push(' ');
                    }
                }
                Some('*') => {
                    chars.next();
                    result.push_str("  ");
                    let mut prev = ' ';
                    for nc in chars.by_ref() {
                        if prev == '*' && nc == '/' {
                            result.push_str("  ");
                            break;
                        }
                        result.push(if nc == '\n' { '\n' } else { ' ' });
                        prev = nc;
                    }
                }
                _ => result.push(c),
            },
            _ => result.push(c),
        }
    }

    result
}

/// Blank out commas that directly precede a closing `]` or `}` outside
/// string literals.
pub fn strip_trailing_commas(content: &str) -> String {
    let mut bytes: Vec<u8> = content.bytes().collect();
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if b == b'\\' {
                i += 1;
            } else if b == b'"' {
                in_string = false;
            }
        } else if b == b'"' {
            in_string = true;
        } else if b == b',' {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            if j < bytes.len() && (bytes[j] == b']' || bytes[j] == b'}') {
                bytes[i] = b' ';
            }
        }
        i += 1;
    }
    // The cleaner only swaps bytes for ASCII spaces, so this cannot fail.
    String::from_utf8(bytes).unwrap_or_else(|_| content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parses_jsonc_with_comments_and_trailing_commas() {
        let raw = br#"{
            // client entry
            "id": "test.client", /* inline */
            "transport": "process",
        }"#;
        let value = parse_slice(Path::new("client.mcp.yao"), raw).expect("parse");
        assert_eq!(
            value,
            json!({"id": "test.client", "transport": "process"})
        );
    }

    #[test]
    fn comment_markers_inside_strings_survive() {
        let raw = br#"{"url": "https://x/a//b", "note": "/* keep */"}"#;
        let value = parse_slice(Path::new("client.mcp.jsonc"), raw).expect("parse");
        assert_eq!(value["url"], "https://x/a//b");
        assert_eq!(value["note"], "/* keep */");
    }

    #[test]
    fn cleaner_preserves_line_offsets() {
        let raw = "{\n// one\n\"id\": 1,\n/* two\nlines */\n\"x\": }\n";
        let cleaned = strip_jsonc_comments(raw);
        assert_eq!(raw.lines().count(), cleaned.lines().count());
        let err = serde_json::from_str::<Value>(&strip_trailing_commas(&cleaned))
            .expect_err("still malformed");
        assert_eq!(err.line(), 6);
    }

    #[test]
    fn parses_yaml_by_extension() {
        let raw = b"id: test.client\ntransport: stdio\ncommand: echo\n";
        let value = parse_slice(Path::new("client.mcp.yaml"), raw).expect("parse");
        assert_eq!(value["transport"], "stdio");
    }
}
