//! The process client: executes MCP calls against host handlers.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::RwLock;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;

use mcp_types::CallToolResult;
use mcp_types::ContentBlock;
use mcp_types::GetPromptResult;
use mcp_types::ListPromptsResult;
use mcp_types::ListResourcesResult;
use mcp_types::ListToolsResult;
use mcp_types::LoggingLevel;
use mcp_types::McpError;
use mcp_types::Prompt;
use mcp_types::PromptArgument;
use mcp_types::PromptMessage;
use mcp_types::Resource;
use mcp_types::ResourceBlock;
use mcp_types::ResourceBody;
use mcp_types::Result;
use mcp_types::Role;
use mcp_types::Tool;
use serde_json::Value;
use serde_json::json;
use tether_config::ClientDsl;
use tether_host::HostFs;
use tether_host::ProcessRuntime;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::binder::bind_resource_args;
use crate::binder::bind_tool_args;
use crate::mapping::MappingData;
use crate::mapping::ResourceSchema;
use crate::samples::SampleKind;
use crate::samples::SampleStore;
use crate::uri::UriTemplate;
use crate::uri::parse_query;

/// An MCP client whose tools, resources, and prompts dispatch straight to
/// host handlers. The mapping is shared with the registry so concurrent
/// mapping updates are observed immediately.
pub struct ProcessClient {
    dsl: ClientDsl,
    mapping: Arc<RwLock<MappingData>>,
    runtime: Arc<dyn ProcessRuntime>,
    samples: SampleStore,
    active: StdMutex<HashMap<i64, CancellationToken>>,
    next_id: AtomicI64,
    log_level: StdMutex<LoggingLevel>,
}

fn lock<T>(mutex: &StdMutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl ProcessClient {
    pub fn new(
        dsl: ClientDsl,
        mapping: Arc<RwLock<MappingData>>,
        runtime: Arc<dyn ProcessRuntime>,
        fs: Arc<dyn HostFs>,
        mapping_base: &Path,
    ) -> Self {
        let samples = SampleStore::new(fs, mapping_base, &dsl.id);
        Self {
            dsl,
            mapping,
            runtime,
            samples,
            active: StdMutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            log_level: StdMutex::new(LoggingLevel::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.dsl.id
    }

    pub fn dsl(&self) -> &ClientDsl {
        &self.dsl
    }

    /// Snapshot of the current mapping.
    pub fn mapping(&self) -> MappingData {
        self.mapping
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn active_request_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = lock(&self.active).keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Cancel an in-flight handler invocation.
    pub fn cancel_request(&self, id: i64) -> Result<()> {
        let active = lock(&self.active);
        let token = active
            .get(&id)
            .ok_or_else(|| McpError::NotFound(format!("request {id}")))?;
        token.cancel();
        Ok(())
    }

    // -- tools --------------------------------------------------------------

    pub fn list_tools(&self) -> ListToolsResult {
        let mapping = self.mapping();
        let mut tools: Vec<Tool> = mapping
            .tools
            .into_iter()
            .map(|(name, schema)| Tool {
                name,
                title: None,
                description: (!schema.description.is_empty()).then_some(schema.description),
                input_schema: schema.input_schema,
                output_schema: schema.output_schema,
            })
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        ListToolsResult {
            tools,
            next_cursor: None,
        }
    }

    /// Invoke a tool handler. All per-call failures are in-band: the result
    /// carries `is_error = true` and a diagnostic text block.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
        extras: &[Value],
    ) -> Result<CallToolResult> {
        let schema = {
            let mapping = self
                .mapping
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            mapping.tools.get(name).cloned()
        };
        let Some(schema) = schema else {
            return Ok(CallToolResult::error(format!("tool not found: {name}")));
        };

        let arguments = arguments.unwrap_or_else(|| json!({}));
        let mut args = match bind_tool_args(&schema.process_args, &arguments) {
            Ok(args) => args,
            Err(err) => {
                return Ok(CallToolResult::error(format!(
                    "Error extracting arguments for {name}: {}",
                    bind_detail(err)
                )));
            }
        };
        args.extend(extras.iter().cloned());

        let (id, token) = self.register_request();
        debug!("process tool call: {name} -> {}", schema.handler);
        let outcome = self.runtime.invoke(&token, &schema.handler, args).await;
        self.release_request(id);

        match outcome {
            Ok(value) => Ok(wrap_tool_result(value)),
            Err(McpError::Cancelled) => Ok(CallToolResult::error(format!(
                "tool call cancelled: {name}"
            ))),
            Err(err) => Ok(CallToolResult::error(format!(
                "Error calling tool {name}: {err}"
            ))),
        }
    }

    // -- resources ----------------------------------------------------------

    pub fn list_resources(&self) -> ListResourcesResult {
        let mapping = self.mapping();
        let mut resources: Vec<Resource> = mapping
            .resources
            .into_iter()
            .map(|(name, schema)| Resource {
                uri: schema.uri,
                name: Some(name),
                description: (!schema.description.is_empty()).then_some(schema.description),
                mime_type: schema.mime_type,
            })
            .collect();
        resources.sort_by(|a, b| a.uri.cmp(&b.uri));
        ListResourcesResult {
            resources,
            next_cursor: None,
        }
    }

    /// Read a resource by URI. Unlike tool calls, failures surface
    /// out-of-band.
    pub async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceBlock>> {
        let (name, schema, uri_params, query_params) = self.resolve_resource(uri)?;

        let args = bind_resource_args(
            &schema.process_args,
            &json!({}),
            uri,
            &uri_params,
            &query_params,
        )
        .map_err(|err| {
            McpError::Bind(format!(
                "Error extracting arguments for {name}: {}",
                bind_detail(err)
            ))
        })?;

        let (id, token) = self.register_request();
        debug!("process resource read: {uri} -> {}", schema.handler);
        let outcome = self.runtime.invoke(&token, &schema.handler, args).await;
        self.release_request(id);

        let value = outcome?;
        let text = match value {
            Value::String(text) => text,
            other => serde_json::to_string(&other).unwrap_or_default(),
        };
        Ok(vec![ResourceBlock {
            uri: uri.to_string(),
            mime_type: schema.mime_type,
            body: ResourceBody::Text(text),
        }])
    }

    pub fn subscribe_resource(&self, _uri: &str) -> Result<()> {
        Err(McpError::Handler(
            "resource subscriptions are not supported by the process transport".to_string(),
        ))
    }

    pub fn unsubscribe_resource(&self, _uri: &str) -> Result<()> {
        Err(McpError::Handler(
            "resource subscriptions are not supported by the process transport".to_string(),
        ))
    }

    // -- prompts -------------------------------------------------------------

    pub fn list_prompts(&self) -> ListPromptsResult {
        let mapping = self.mapping();
        let mut prompts: Vec<Prompt> = mapping
            .prompts
            .into_iter()
            .map(|(name, schema)| Prompt {
                name,
                description: (!schema.description.is_empty()).then_some(schema.description),
                arguments: schema
                    .arguments
                    .iter()
                    .filter_map(|argument| {
                        serde_json::from_value::<PromptArgument>(argument.clone()).ok()
                    })
                    .collect(),
            })
            .collect();
        prompts.sort_by(|a, b| a.name.cmp(&b.name));
        ListPromptsResult {
            prompts,
            next_cursor: None,
        }
    }

    /// Render a prompt. A non-empty template has its `{arg}` placeholders
    /// substituted; otherwise the prompt handler produces the message text.
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<GetPromptResult> {
        let schema = {
            let mapping = self
                .mapping
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            mapping
                .prompts
                .get(name)
                .cloned()
                .ok_or_else(|| McpError::NotFound(format!("prompt {name}")))?
        };

        let arguments = arguments.unwrap_or_else(|| json!({}));
        let text = if schema.template.is_empty() {
            let (id, token) = self.register_request();
            let outcome = self
                .runtime
                .invoke(&token, &schema.handler, vec![arguments])
                .await;
            self.release_request(id);
            match outcome? {
                Value::String(text) => text,
                other => serde_json::to_string(&other).unwrap_or_default(),
            }
        } else {
            render_template(&schema.template, &arguments)
        };

        Ok(GetPromptResult {
            description: (!schema.description.is_empty()).then_some(schema.description),
            messages: vec![PromptMessage {
                role: Role::User,
                content: ContentBlock::text(text),
            }],
        })
    }

    // -- samples -------------------------------------------------------------

    pub async fn list_samples(&self, kind: &str, name: &str) -> Result<Vec<Value>> {
        self.samples
            .list_samples(SampleKind::parse(kind)?, name)
            .await
    }

    pub async fn get_sample(&self, kind: &str, name: &str, index: i64) -> Result<Value> {
        self.samples
            .get_sample(SampleKind::parse(kind)?, name, index)
            .await
    }

    // -- logging -------------------------------------------------------------

    pub fn set_log_level(&self, level: LoggingLevel) {
        *lock(&self.log_level) = level;
    }

    pub fn get_log_level(&self) -> LoggingLevel {
        *lock(&self.log_level)
    }

    // -- internals -----------------------------------------------------------

    fn register_request(&self) -> (i64, CancellationToken) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();
        lock(&self.active).insert(id, token.clone());
        (id, token)
    }

    fn release_request(&self, id: i64) {
        lock(&self.active).remove(&id);
    }

    /// Resolve a request URI to a resource schema. An exact `uri` match
    /// wins; otherwise templates are tried in name order and the first
    /// match is used. URI-template captures and query-string parameters
    /// are returned separately so the binder can address either source.
    #[allow(clippy::type_complexity)]
    fn resolve_resource(
        &self,
        uri: &str,
    ) -> Result<(
        String,
        ResourceSchema,
        HashMap<String, String>,
        HashMap<String, String>,
    )> {
        let mapping = self
            .mapping
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut names: Vec<&String> = mapping.resources.keys().collect();
        names.sort();

        for name in &names {
            let schema = &mapping.resources[*name];
            if schema.uri == uri {
                return Ok((
                    (*name).clone(),
                    schema.clone(),
                    HashMap::new(),
                    parse_query(uri),
                ));
            }
        }

        for name in &names {
            let schema = &mapping.resources[*name];
            if !schema.uri.contains('{') {
                continue;
            }
            let template = UriTemplate::parse(&schema.uri)?;
            if let Some(captures) = template.extract(uri) {
                return Ok((
                    (*name).clone(),
                    schema.clone(),
                    captures,
                    parse_query(uri),
                ));
            }
        }

        Err(McpError::NotFound(format!("resource {uri}")))
    }
}

fn bind_detail(err: McpError) -> String {
    match err {
        McpError::Bind(detail) => detail,
        other => other.to_string(),
    }
}

/// Wrap a handler value per the tool-result contract: strings become one
/// text item, arrays of content blocks pass through, anything else is
/// marshalled to JSON text.
fn wrap_tool_result(value: Value) -> CallToolResult {
    match value {
        Value::String(text) => CallToolResult::text(text),
        Value::Array(items) if is_content_array(&items) => {
            let content = items
                .into_iter()
                .filter_map(|item| serde_json::from_value::<ContentBlock>(item).ok())
                .collect();
            CallToolResult {
                content,
                is_error: false,
            }
        }
        other => CallToolResult::text(serde_json::to_string(&other).unwrap_or_default()),
    }
}

fn is_content_array(items: &[Value]) -> bool {
    !items.is_empty()
        && items.iter().all(|item| {
            item.get("type")
                .and_then(Value::as_str)
                .is_some_and(|kind| {
                    matches!(kind, "text" | "image" | "resource" | "resource_link")
                })
        })
}

fn render_template(template: &str, arguments: &Value) -> String {
    let Value::Object(map) = arguments else {
        return template.to_string();
    };
    let mut rendered = template.to_string();
    for (key, value) in map {
        let needle = format!("{{{key}}}");
        let replacement = match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        rendered = rendered.replace(&needle, &replacement);
    }
    rendered
}
