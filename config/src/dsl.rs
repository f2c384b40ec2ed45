use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use mcp_types::ClientCapabilities;
use mcp_types::McpError;
use mcp_types::Result;
use mcp_types::RootsCapability;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use tether_host::EnvExpander;
use tether_host::HostFs;
use tether_host::parse::parse_slice;

use crate::duration::parse_duration;

/// Marker segment that separates a DSL tree prefix from client paths.
const MCPS_SEGMENT: &str = "/mcps/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Http,
    Sse,
    Stdio,
    Process,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransportKind::Http => "http",
            TransportKind::Sse => "sse",
            TransportKind::Stdio => "stdio",
            TransportKind::Process => "process",
        };
        write!(f, "{name}")
    }
}

/// Declarative configuration of one client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientDsl {
    /// Unique client id. May be omitted in a file loaded by path; the id is
    /// then derived from the path (see [`client_id_from_path`]).
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    /// Free-form tag, e.g. `"standard"`.
    #[serde(default, rename = "type")]
    pub client_type: Option<String>,
    pub transport: TransportKind,

    // http / sse
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub authorization_token: Option<String>,
    /// Optional external mount path for the message endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Duration string such as `30s`.
    #[serde(default)]
    pub timeout: Option<String>,

    // stdio
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,

    // process
    #[serde(default)]
    pub tools: HashMap<String, String>,
    #[serde(default)]
    pub resources: HashMap<String, String>,
    #[serde(default)]
    pub prompts: HashMap<String, String>,

    // capability flags
    #[serde(default)]
    pub enable_sampling: bool,
    #[serde(default)]
    pub enable_roots: bool,
    #[serde(default)]
    pub roots_list_changed: bool,
    #[serde(default)]
    pub enable_elicitation: bool,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl ClientDsl {
    /// Parse a DSL document, expanding `$ENV.NAME` in every string value.
    /// `path` selects the syntax (`.yao`/`.jsonc`/`.json`/`.yaml`/`.yml`).
    pub fn from_slice(bytes: &[u8], path: &Path, env: &dyn EnvExpander) -> Result<Self> {
        let mut value = parse_slice(path, bytes)?;
        expand_strings(&mut value, env);
        if let Value::Object(map) = &mut value {
            let missing_id = map
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .is_empty();
            if missing_id {
                map.insert(
                    "id".to_string(),
                    Value::String(client_id_from_path(&path.to_string_lossy())),
                );
            }
        }
        Self::from_value(value)
    }

    pub async fn from_path(
        fs: &dyn HostFs,
        env: &dyn EnvExpander,
        path: &Path,
    ) -> Result<Self> {
        let bytes = fs.read(path).await.map_err(|err| match err {
            McpError::NotFound(p) => McpError::Load(format!("client DSL not found: {p}")),
            other => other,
        })?;
        Self::from_slice(&bytes, path, env)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value.get("transport") {
            None => {
                return Err(McpError::Config("missing `transport`".to_string()));
            }
            Some(Value::String(transport))
                if !matches!(transport.as_str(), "http" | "sse" | "stdio" | "process") =>
            {
                return Err(McpError::Config(format!("unknown transport `{transport}`")));
            }
            Some(Value::String(_)) => {}
            Some(other) => {
                return Err(McpError::Config(format!("invalid transport: {other}")));
            }
        }

        let dsl: ClientDsl = serde_json::from_value(value)
            .map_err(|err| McpError::Config(format!("invalid client DSL: {err}")))?;
        dsl.validate()?;
        Ok(dsl)
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(McpError::Config("client `id` must not be empty".to_string()));
        }
        match self.transport {
            TransportKind::Http | TransportKind::Sse => {
                if self.url.as_deref().unwrap_or_default().is_empty() {
                    return Err(McpError::Config(format!(
                        "transport `{}` requires `url`",
                        self.transport
                    )));
                }
            }
            TransportKind::Stdio => {
                if self.command.as_deref().unwrap_or_default().is_empty() {
                    return Err(McpError::Config(
                        "transport `stdio` requires `command`".to_string(),
                    ));
                }
            }
            TransportKind::Process => {}
        }
        if let Some(raw) = &self.timeout {
            parse_duration(raw)?;
        }
        Ok(())
    }

    /// The parsed request timeout, if one is configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        // validate() already rejected malformed values.
        self.timeout.as_deref().and_then(|raw| parse_duration(raw).ok())
    }

    /// Capabilities advertised in `initialize`, derived from the DSL flags.
    pub fn capabilities(&self) -> ClientCapabilities {
        ClientCapabilities {
            experimental: None,
            roots: self.enable_roots.then(|| RootsCapability {
                list_changed: self.roots_list_changed.then_some(true),
            }),
            sampling: self.enable_sampling.then(|| json!({})),
            elicitation: self.enable_elicitation.then(|| json!({})),
        }
    }

    /// Headers derived from the DSL for the HTTP transports.
    pub fn headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        if let Some(token) = self
            .authorization_token
            .as_deref()
            .filter(|token| !token.is_empty())
        {
            headers.insert("Authorization".to_string(), format!("Bearer {token}"));
        }
        headers
    }
}

fn expand_strings(value: &mut Value, env: &dyn EnvExpander) {
    match value {
        Value::String(s) => *s = env.expand(s),
        Value::Array(items) => {
            for item in items {
                expand_strings(item, env);
            }
        }
        Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                expand_strings(item, env);
            }
        }
        _ => {}
    }
}

/// Derive a client id from a DSL file path: strip the `.mcp.*` suffix, keep
/// only the segment after the last `/mcps/`, and turn `/` into `.`.
pub fn client_id_from_path(path: &str) -> String {
    let mut id = path.to_string();
    for suffix in [".mcp.yao", ".mcp.jsonc", ".mcp.json", ".mcp.yaml", ".mcp.yml"] {
        if let Some(stripped) = id.strip_suffix(suffix) {
            id = stripped.to_string();
            break;
        }
    }
    if let Some(pos) = id.rfind(MCPS_SEGMENT) {
        id = id[pos + MCPS_SEGMENT.len()..].to_string();
    }
    id.trim_matches('/').replace('/', ".")
}

/// Mapping base directory for a DSL file: `<prefix>/mcps/mapping` when the
/// file lives under a `.../mcps/` tree, plain `mcps/mapping` otherwise.
pub fn mapping_base_for(dsl_path: &str) -> PathBuf {
    match dsl_path.split_once(MCPS_SEGMENT) {
        Some((prefix, _)) => Path::new(prefix).join("mcps").join("mapping"),
        None => PathBuf::from("mcps/mapping"),
    }
}
