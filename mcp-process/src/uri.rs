//! `{name}` URI templates and query-string handling.

use std::collections::HashMap;

use mcp_types::McpError;
use mcp_types::Result;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed URI template. Matching is literal-anchored on both ends: each
/// placeholder captures up to the next literal's first occurrence, and the
/// final placeholder captures to the end of the path.
#[derive(Debug, Clone, PartialEq)]
pub struct UriTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl UriTemplate {
    /// Parse a template. An unclosed `{` is an error.
    pub fn parse(template: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(|| {
                McpError::Load(format!("unclosed `{{` in URI template `{template}`"))
            })?;
            segments.push(Segment::Placeholder(after[..close].to_string()));
            rest = &after[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }
        Ok(Self {
            raw: template.to_string(),
            segments,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_template(&self) -> bool {
        self.segments
            .iter()
            .any(|segment| matches!(segment, Segment::Placeholder(_)))
    }

    /// Match `uri` against the template and return the captured parameters,
    /// or `None` when the literals do not line up. Any query string on
    /// `uri` is ignored here; see [`parse_query`].
    pub fn extract(&self, uri: &str) -> Option<HashMap<String, String>> {
        let path = split_query(uri).0;
        let mut captures = HashMap::new();
        let mut pos = 0;

        let mut segments = self.segments.iter().peekable();
        while let Some(segment) = segments.next() {
            match segment {
                Segment::Literal(literal) => {
                    if !path[pos..].starts_with(literal.as_str()) {
                        return None;
                    }
                    pos += literal.len();
                }
                Segment::Placeholder(name) => {
                    let captured = match segments.peek() {
                        // The next literal delimits this capture.
                        Some(Segment::Literal(literal)) => {
                            let idx = path[pos..].find(literal.as_str())?;
                            &path[pos..pos + idx]
                        }
                        // Adjacent placeholders: the former captures nothing.
                        Some(Segment::Placeholder(_)) => "",
                        // Final placeholder runs to the end of the path.
                        None => &path[pos..],
                    };
                    captures.insert(name.clone(), captured.to_string());
                    pos += captured.len();
                }
            }
        }

        (pos == path.len()).then_some(captures)
    }
}

/// Split a URI into its path part and raw query string (without the `?`).
pub fn split_query(uri: &str) -> (&str, Option<&str>) {
    match uri.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (uri, None),
    }
}

/// Parse the query string of `uri` into a map. Later duplicates win.
pub fn parse_query(uri: &str) -> HashMap<String, String> {
    let Some(query) = split_query(uri).1 else {
        return HashMap::new();
    };
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}
