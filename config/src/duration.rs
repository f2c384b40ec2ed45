use std::time::Duration;

use mcp_types::McpError;
use mcp_types::Result;

/// Parse a DSL duration string: `1500ms`, `30s`, `2m`, `1h`, or a bare
/// integer meaning seconds.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(McpError::Config("empty duration".to_string()));
    }

    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| McpError::Config(format!("invalid duration `{raw}`")))?;

    match unit {
        "" | "s" => Ok(Duration::from_secs(value)),
        "ms" => Ok(Duration::from_millis(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        _ => Err(McpError::Config(format!("invalid duration `{raw}`"))),
    }
}
