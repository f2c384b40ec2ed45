//! Host collaborator interfaces consumed by the client core.
//!
//! The core never touches the filesystem, the process environment, or the
//! host's handler runtime directly; it goes through the traits defined here.
//! Default implementations cover the common case of a host backed by the
//! local filesystem and `std::env`.

pub mod parse;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::RwLock;

use async_trait::async_trait;
use futures::future::BoxFuture;
use mcp_types::McpError;
use mcp_types::Result;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Filesystem abstraction used by the configuration and mapping loaders.
#[async_trait]
pub trait HostFs: Send + Sync {
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;
    async fn exists(&self, path: &Path) -> bool;
}

/// Default filesystem backed by `tokio::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioFs;

#[async_trait]
impl HostFs for TokioFs {
    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(McpError::NotFound(path.display().to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }
}

/// Substitutes `$ENV.NAME` references inside configuration strings.
pub trait EnvExpander: Send + Sync {
    fn expand(&self, input: &str) -> String;
}

/// Default expander reading from the process environment. Unset variables
/// expand to the empty string.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvExpander for ProcessEnv {
    fn expand(&self, input: &str) -> String {
        expand_with(input, |name| std::env::var(name).ok())
    }
}

/// Expander over a fixed map, for tests and hermetic loads.
#[derive(Debug, Default, Clone)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    pub fn new(vars: HashMap<String, String>) -> Self {
        Self { vars }
    }
}

impl EnvExpander for MapEnv {
    fn expand(&self, input: &str) -> String {
        expand_with(input, |name| self.vars.get(name).cloned())
    }
}

fn expand_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    const PREFIX: &str = "$ENV.";

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find(PREFIX) {
        out.push_str(&rest[..start]);
        let after = &rest[start + PREFIX.len()..];
        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        if name_len == 0 {
            // A bare `$ENV.` with no name is left untouched.
            out.push_str(PREFIX);
            rest = after;
            continue;
        }
        let name = &after[..name_len];
        out.push_str(&lookup(name).unwrap_or_default());
        rest = &after[name_len..];
    }
    out.push_str(rest);
    out
}

/// Validates a JSON Schema document once at load time.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, schema: &Value) -> Result<()>;
}

/// Structural checks against the JSON-Schema meta-schema: enough to reject
/// the malformed documents the loader would otherwise accept silently.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetaSchemaValidator;

impl SchemaValidator for MetaSchemaValidator {
    fn validate(&self, schema: &Value) -> Result<()> {
        validate_schema_node(schema)
    }
}

fn validate_schema_node(schema: &Value) -> Result<()> {
    let obj = match schema {
        Value::Bool(_) => return Ok(()),
        Value::Object(obj) => obj,
        other => {
            return Err(McpError::Load(format!(
                "schema must be an object or boolean, got {other}"
            )));
        }
    };

    if let Some(ty) = obj.get("type") {
        let valid = match ty {
            Value::String(name) => is_schema_type(name),
            Value::Array(names) => names
                .iter()
                .all(|name| name.as_str().is_some_and(is_schema_type)),
            _ => false,
        };
        if !valid {
            return Err(McpError::Load(format!("invalid schema `type`: {ty}")));
        }
    }

    if let Some(required) = obj.get("required") {
        let valid = required
            .as_array()
            .is_some_and(|names| names.iter().all(Value::is_string));
        if !valid {
            return Err(McpError::Load(
                "schema `required` must be an array of strings".to_string(),
            ));
        }
    }

    if let Some(properties) = obj.get("properties") {
        let props = properties.as_object().ok_or_else(|| {
            McpError::Load("schema `properties` must be an object".to_string())
        })?;
        for (name, prop) in props {
            validate_schema_node(prop)
                .map_err(|err| McpError::Load(format!("property `{name}`: {err}")))?;
        }
    }

    if let Some(items) = obj.get("items") {
        validate_schema_node(items).map_err(|err| McpError::Load(format!("items: {err}")))?;
    }

    Ok(())
}

fn is_schema_type(name: &str) -> bool {
    matches!(
        name,
        "object" | "array" | "string" | "number" | "integer" | "boolean" | "null"
    )
}

/// The host's process runtime: executes a named handler with positional
/// arguments. Implementations must honour `ctx` cancellation.
#[async_trait]
pub trait ProcessRuntime: Send + Sync {
    async fn invoke(
        &self,
        ctx: &CancellationToken,
        handler: &str,
        args: Vec<Value>,
    ) -> Result<Value>;
}

pub type HandlerFn =
    Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// A `ProcessRuntime` over named boxed closures. Hosts embed their own
/// dispatcher in production; this adapter serves demos and tests.
#[derive(Default)]
pub struct FnRuntime {
    handlers: RwLock<HashMap<String, HandlerFn>>,
}

impl FnRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(Vec<Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync + 'static,
    {
        let mut guard = self
            .handlers
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.insert(name.into(), Arc::new(handler));
    }

    fn handler(&self, name: &str) -> Option<HandlerFn> {
        let guard = self
            .handlers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.get(name).cloned()
    }
}

#[async_trait]
impl ProcessRuntime for FnRuntime {
    async fn invoke(
        &self,
        ctx: &CancellationToken,
        handler: &str,
        args: Vec<Value>,
    ) -> Result<Value> {
        let handler_fn = self
            .handler(handler)
            .ok_or_else(|| McpError::NotFound(format!("handler `{handler}`")))?;

        tokio::select! {
            _ = ctx.cancelled() => Err(McpError::Cancelled),
            result = handler_fn(args) => result,
        }
    }
}
