//! Remote client state machine and request correlation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::RwLock as StdRwLock;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use mcp_types::CallToolRequest;
use mcp_types::CallToolRequestParams;
use mcp_types::CallToolResult;
use mcp_types::CancelledNotification;
use mcp_types::CancelledNotificationParams;
use mcp_types::GetPromptRequest;
use mcp_types::GetPromptRequestParams;
use mcp_types::GetPromptResult;
use mcp_types::Implementation;
use mcp_types::InitializeRequest;
use mcp_types::InitializeRequestParams;
use mcp_types::InitializeResult;
use mcp_types::InitializedNotification;
use mcp_types::JSONRPC_VERSION;
use mcp_types::JSONRPCError;
use mcp_types::JSONRPCErrorError;
use mcp_types::JSONRPCMessage;
use mcp_types::JSONRPCNotification;
use mcp_types::JSONRPCRequest;
use mcp_types::JSONRPCResponse;
use mcp_types::ListPromptsRequest;
use mcp_types::ListPromptsRequestParams;
use mcp_types::ListPromptsResult;
use mcp_types::ListResourcesRequest;
use mcp_types::ListResourcesRequestParams;
use mcp_types::ListResourcesResult;
use mcp_types::ListToolsRequest;
use mcp_types::ListToolsRequestParams;
use mcp_types::ListToolsResult;
use mcp_types::LoggingLevel;
use mcp_types::MCP_SCHEMA_VERSION;
use mcp_types::METHOD_NOT_FOUND_ERROR_CODE;
use mcp_types::McpError;
use mcp_types::ModelContextProtocolNotification;
use mcp_types::ModelContextProtocolRequest;
use mcp_types::PingRequest;
use mcp_types::ProgressNotification;
use mcp_types::ProgressNotificationParams;
use mcp_types::ProgressToken;
use mcp_types::ReadResourceRequest;
use mcp_types::ReadResourceRequestParams;
use mcp_types::ReadResourceResult;
use mcp_types::RequestId;
use mcp_types::ResourceBlock;
use mcp_types::Result;
use mcp_types::ServerCapabilities;
use mcp_types::SetLevelRequest;
use mcp_types::SetLevelRequestParams;
use mcp_types::SubscribeRequest;
use mcp_types::SubscribeRequestParams;
use mcp_types::UnsubscribeRequest;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::json;
use tether_config::ClientDsl;
use tether_config::TransportKind;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::events;
use crate::events::Event;
use crate::events::HandlerId;
use crate::events::HandlerRegistry;
use crate::events::SharedHandlers;
use crate::progress::ProgressRegistry;
use crate::progress::ProgressState;
use crate::transport::SseTransport;
use crate::transport::StdioTransport;
use crate::transport::StreamableHttpTransport;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Initialized,
    Error,
}

/// Per-connect overrides. `headers` are merged over the DSL headers (these
/// win on conflict); `timeout` overrides the DSL request timeout.
#[derive(Debug, Clone, Default)]
pub struct ConnectionOptions {
    pub headers: HashMap<String, String>,
    pub timeout: Option<Duration>,
}

struct PendingEntry {
    method: String,
    tx: oneshot::Sender<Result<Value>>,
    cancel: CancellationToken,
}

struct Shared {
    state: StdMutex<ConnectionState>,
    init_result: StdMutex<Option<InitializeResult>>,
    pending: StdMutex<HashMap<i64, PendingEntry>>,
    handlers: SharedHandlers,
    progress: StdMutex<ProgressRegistry>,
    log_level: StdMutex<LoggingLevel>,
    next_id: AtomicI64,
}

struct Connection {
    transport: Option<Arc<dyn Transport>>,
    reader_shutdown: CancellationToken,
    timeout: Option<Duration>,
}

/// A client for one remote MCP server, speaking the transport named by its
/// DSL. All methods take `&self`; per-client locks serialize the writers.
pub struct RemoteClient {
    dsl: ClientDsl,
    shared: Arc<Shared>,
    conn: Mutex<Connection>,
}

fn lock<T>(mutex: &StdMutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl RemoteClient {
    pub fn new(dsl: ClientDsl) -> Result<Self> {
        dsl.validate()?;
        if dsl.transport == TransportKind::Process {
            return Err(McpError::Config(
                "process transport is served in-process, not by the remote client".to_string(),
            ));
        }
        Ok(Self {
            dsl,
            shared: Arc::new(Shared {
                state: StdMutex::new(ConnectionState::Disconnected),
                init_result: StdMutex::new(None),
                pending: StdMutex::new(HashMap::new()),
                handlers: Arc::new(StdRwLock::new(HandlerRegistry::default())),
                progress: StdMutex::new(ProgressRegistry::default()),
                log_level: StdMutex::new(LoggingLevel::default()),
                next_id: AtomicI64::new(1),
            }),
            conn: Mutex::new(Connection {
                transport: None,
                reader_shutdown: CancellationToken::new(),
                timeout: None,
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.dsl.id
    }

    pub fn dsl(&self) -> &ClientDsl {
        &self.dsl
    }

    // -- state machine ------------------------------------------------------

    pub fn state(&self) -> ConnectionState {
        *lock(&self.shared.state)
    }

    pub fn is_connected(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::Connected | ConnectionState::Initialized
        )
    }

    /// Establish the transport. Idempotent while already connected.
    pub async fn connect(&self, opts: Option<ConnectionOptions>) -> Result<()> {
        let mut conn = self.conn.lock().await;
        if self.is_connected() {
            return Ok(());
        }
        *lock(&self.shared.state) = ConnectionState::Connecting;

        let opts = opts.unwrap_or_default();
        let mut headers = self.dsl.headers();
        headers.extend(opts.headers);
        let timeout = opts.timeout.or_else(|| self.dsl.request_timeout());

        let transport: Arc<dyn Transport> = match self.dsl.transport {
            TransportKind::Http => Arc::new(StreamableHttpTransport::new(
                self.dsl.url.as_deref().unwrap_or_default(),
                &headers,
            )?),
            TransportKind::Sse => Arc::new(SseTransport::new(
                self.dsl.url.as_deref().unwrap_or_default(),
                self.dsl.endpoint.as_deref(),
                &headers,
            )?),
            TransportKind::Stdio => Arc::new(StdioTransport::new(
                self.dsl.command.clone().unwrap_or_default(),
                self.dsl.arguments.clone(),
                self.dsl.env.clone(),
            )),
            TransportKind::Process => unreachable!("rejected in new()"),
        };

        let inbound_rx = match transport.start().await {
            Ok(rx) => rx,
            Err(err) => {
                *lock(&self.shared.state) = ConnectionState::Error;
                return Err(err);
            }
        };

        let shutdown = CancellationToken::new();
        spawn_reader(
            Arc::clone(&self.shared),
            Arc::clone(&transport),
            inbound_rx,
            shutdown.clone(),
        );

        conn.transport = Some(transport);
        conn.reader_shutdown = shutdown;
        conn.timeout = timeout;

        *lock(&self.shared.state) = ConnectionState::Connected;
        self.emit_event("connected", json!({"transport": self.dsl.transport.to_string()}));
        Ok(())
    }

    /// Run the `initialize` handshake and emit `notifications/initialized`.
    /// Repeated calls overwrite the stored result.
    pub async fn initialize(&self) -> Result<InitializeResult> {
        if !self.is_connected() {
            return Err(McpError::State(
                "initialize requires a connected client".to_string(),
            ));
        }

        let name = if self.dsl.name.is_empty() {
            self.dsl.id.clone()
        } else {
            self.dsl.name.clone()
        };
        let params = InitializeRequestParams {
            capabilities: self.dsl.capabilities(),
            client_info: Implementation {
                name,
                title: None,
                version: self.dsl.version.clone(),
            },
            protocol_version: MCP_SCHEMA_VERSION.to_string(),
        };

        let result = self.request::<InitializeRequest>(params).await?;
        *lock(&self.shared.init_result) = Some(result.clone());

        self.notify::<InitializedNotification>(None).await?;
        *lock(&self.shared.state) = ConnectionState::Initialized;
        self.emit_event(
            "initialized",
            json!({"serverInfo": {"name": result.server_info.name, "version": result.server_info.version}}),
        );
        Ok(result)
    }

    /// Compatibility no-op: the `initialized` notification is already sent
    /// by [`RemoteClient::initialize`].
    pub async fn initialized(&self) -> Result<()> {
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<()> {
        let mut conn = self.conn.lock().await;
        conn.reader_shutdown.cancel();
        let transport = conn.transport.take();
        conn.timeout = None;
        drop(conn);

        evict_pending(&self.shared, "connection closed");
        *lock(&self.shared.state) = ConnectionState::Disconnected;
        lock(&self.shared.init_result).take();

        if let Some(transport) = transport {
            transport.stop().await?;
        }
        self.emit_event("disconnected", json!({}));
        Ok(())
    }

    pub async fn close(&self) -> Result<()> {
        self.disconnect().await
    }

    // -- observers ----------------------------------------------------------

    pub fn initialize_result(&self) -> Option<InitializeResult> {
        lock(&self.shared.init_result).clone()
    }

    pub fn server_capabilities(&self) -> Option<ServerCapabilities> {
        lock(&self.shared.init_result)
            .as_ref()
            .map(|result| result.capabilities.clone())
    }

    pub fn pending_request_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = lock(&self.shared.pending).keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    // -- tools --------------------------------------------------------------

    pub async fn list_tools(&self, cursor: Option<String>) -> Result<ListToolsResult> {
        self.require_capability(CapabilityCheck::Tools)?;
        self.request::<ListToolsRequest>(cursor.map(|cursor| ListToolsRequestParams {
            cursor: Some(cursor),
        }))
        .await
    }

    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<CallToolResult> {
        self.require_capability(CapabilityCheck::Tools)?;
        debug!("MCP tool call: {name}");
        self.request::<CallToolRequest>(CallToolRequestParams {
            name: name.to_string(),
            arguments,
        })
        .await
    }

    // -- resources ----------------------------------------------------------

    pub async fn list_resources(&self, cursor: Option<String>) -> Result<ListResourcesResult> {
        self.require_capability(CapabilityCheck::Resources)?;
        self.request::<ListResourcesRequest>(cursor.map(|cursor| ListResourcesRequestParams {
            cursor: Some(cursor),
        }))
        .await
    }

    /// Read a resource, decoding base64 `blob` records to bytes.
    pub async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceBlock>> {
        self.require_capability(CapabilityCheck::Resources)?;
        let result: ReadResourceResult = self
            .request::<ReadResourceRequest>(ReadResourceRequestParams {
                uri: uri.to_string(),
            })
            .await?;
        result
            .contents
            .into_iter()
            .map(ResourceBlock::try_from)
            .collect()
    }

    pub async fn subscribe_resource(&self, uri: &str) -> Result<()> {
        self.require_capability(CapabilityCheck::ResourceSubscribe)?;
        self.request::<SubscribeRequest>(SubscribeRequestParams {
            uri: uri.to_string(),
        })
        .await?;
        Ok(())
    }

    pub async fn unsubscribe_resource(&self, uri: &str) -> Result<()> {
        self.require_capability(CapabilityCheck::ResourceSubscribe)?;
        self.request::<UnsubscribeRequest>(SubscribeRequestParams {
            uri: uri.to_string(),
        })
        .await?;
        Ok(())
    }

    // -- prompts -------------------------------------------------------------

    pub async fn list_prompts(&self, cursor: Option<String>) -> Result<ListPromptsResult> {
        self.require_capability(CapabilityCheck::Prompts)?;
        self.request::<ListPromptsRequest>(cursor.map(|cursor| ListPromptsRequestParams {
            cursor: Some(cursor),
        }))
        .await
    }

    /// Fetch a prompt. Argument values are stringified before transmission
    /// because prompt arguments are declared string-valued on the wire.
    pub async fn get_prompt(&self, name: &str, arguments: Option<Value>) -> Result<GetPromptResult> {
        self.require_capability(CapabilityCheck::Prompts)?;
        let arguments = arguments.map(stringify_prompt_args).transpose()?;
        self.request::<GetPromptRequest>(GetPromptRequestParams {
            name: name.to_string(),
            arguments,
        })
        .await
    }

    // -- logging -------------------------------------------------------------

    pub async fn set_log_level(&self, level: LoggingLevel) -> Result<()> {
        self.require_capability(CapabilityCheck::Logging)?;
        self.request::<SetLevelRequest>(SetLevelRequestParams { level })
            .await?;
        *lock(&self.shared.log_level) = level;
        Ok(())
    }

    pub fn get_log_level(&self) -> LoggingLevel {
        *lock(&self.shared.log_level)
    }

    // -- liveness ------------------------------------------------------------

    pub async fn ping(&self) -> Result<()> {
        if !self.is_connected() {
            return Err(McpError::State("ping requires a connected client".to_string()));
        }
        self.request::<PingRequest>(None).await?;
        Ok(())
    }

    // -- progress ------------------------------------------------------------

    pub fn create_progress(&self, total: f64) -> i64 {
        lock(&self.shared.progress).create(total)
    }

    pub async fn update_progress(&self, token: i64, progress: f64) -> Result<ProgressState> {
        let state = lock(&self.shared.progress).update(token, progress)?;
        if self.is_connected() {
            let params = ProgressNotificationParams {
                progress_token: ProgressToken::Integer(token),
                progress: state.progress,
                total: Some(state.total),
                message: None,
            };
            if let Err(err) = self.notify::<ProgressNotification>(params).await {
                debug!("failed to send progress notification: {err}");
            }
        }
        Ok(state)
    }

    pub fn complete_progress(&self, token: i64) -> Result<ProgressState> {
        lock(&self.shared.progress).complete(token)
    }

    pub fn get_progress(&self, token: i64) -> Result<ProgressState> {
        lock(&self.shared.progress).get(token)
    }

    // -- cancellation --------------------------------------------------------

    /// Cancel the in-flight request with the given id. The waiting caller
    /// resumes with `Cancelled` after a `notifications/cancelled` frame has
    /// been sent.
    pub fn cancel_request(&self, id: i64) -> Result<()> {
        let pending = lock(&self.shared.pending);
        let entry = pending
            .get(&id)
            .ok_or_else(|| McpError::NotFound(format!("request {id}")))?;
        entry.cancel.cancel();
        Ok(())
    }

    // -- handlers ------------------------------------------------------------

    pub fn on_event(
        &self,
        kind: &str,
        handler: impl Fn(Event) + Send + Sync + 'static,
    ) -> HandlerId {
        events::write(&self.shared.handlers).add_event(kind, Arc::new(handler))
    }

    pub fn on_notification(
        &self,
        method: &str,
        handler: impl Fn(JSONRPCNotification) + Send + Sync + 'static,
    ) -> HandlerId {
        events::write(&self.shared.handlers).add_notification(method, Arc::new(handler))
    }

    pub fn on_error(
        &self,
        handler: impl Fn(Arc<McpError>) + Send + Sync + 'static,
    ) -> HandlerId {
        events::write(&self.shared.handlers).add_error(Arc::new(handler))
    }

    pub fn remove_event_handler(&self, kind: &str, id: HandlerId) -> bool {
        events::write(&self.shared.handlers).remove_event(kind, id)
    }

    pub fn remove_notification_handler(&self, method: &str, id: HandlerId) -> bool {
        events::write(&self.shared.handlers).remove_notification(method, id)
    }

    pub fn clear_all_handlers(&self) {
        events::write(&self.shared.handlers).clear();
    }

    pub fn event_handler_counts(&self) -> HashMap<String, usize> {
        events::read(&self.shared.handlers).event_counts()
    }

    // -- internals -----------------------------------------------------------

    fn emit_event(&self, kind: &str, data: Value) {
        events::dispatch_event(
            &self.shared.handlers,
            Event {
                kind: kind.to_string(),
                data,
            },
        );
    }

    fn require_capability(&self, check: CapabilityCheck) -> Result<()> {
        let caps = {
            let guard = lock(&self.shared.init_result);
            match (*guard).as_ref() {
                Some(result) if self.state() == ConnectionState::Initialized => {
                    result.capabilities.clone()
                }
                _ => {
                    return Err(McpError::Capability(
                        "client is not initialized".to_string(),
                    ));
                }
            }
        };

        let ok = match check {
            CapabilityCheck::Tools => caps.tools.is_some(),
            CapabilityCheck::Resources => caps.resources.is_some(),
            CapabilityCheck::ResourceSubscribe => caps
                .resources
                .as_ref()
                .is_some_and(|resources| resources.subscribe == Some(true)),
            CapabilityCheck::Prompts => caps.prompts.is_some(),
            CapabilityCheck::Logging => caps.logging.is_some(),
        };
        if ok {
            Ok(())
        } else {
            Err(McpError::Capability(format!(
                "server does not advertise {}",
                check.name()
            )))
        }
    }

    async fn request<R>(&self, params: R::Params) -> Result<R::Result>
    where
        R: ModelContextProtocolRequest,
        R::Params: Serialize,
        R::Result: DeserializeOwned,
    {
        // `Params` is often `Option<T>`; `None` must encode as an absent
        // field rather than `null`.
        let params_json = serde_json::to_value(&params)?;
        let params_field = if params_json.is_null() {
            None
        } else {
            Some(params_json)
        };
        let value = self.request_value(R::METHOD, params_field).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn request_value(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        // Register before sending so an immediate response cannot be lost.
        {
            let mut pending = lock(&self.shared.pending);
            pending.insert(
                id,
                PendingEntry {
                    method: method.to_string(),
                    tx,
                    cancel: cancel.clone(),
                },
            );
        }

        let frame = JSONRPCMessage::Request(JSONRPCRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: RequestId::Integer(id),
            method: method.to_string(),
            params,
        });

        let timeout = {
            let conn = self.conn.lock().await;
            let Some(transport) = conn.transport.as_ref() else {
                self.take_pending(id);
                return Err(McpError::State("client is not connected".to_string()));
            };
            if let Err(err) = transport.send(frame).await {
                drop(conn);
                self.take_pending(id);
                return Err(err);
            }
            conn.timeout
        };

        tokio::select! {
            outcome = rx => match outcome {
                Ok(result) => result,
                Err(_) => Err(McpError::Connection(
                    "connection closed before a reply was received".to_string(),
                )),
            },
            _ = cancel.cancelled() => {
                self.take_pending(id);
                self.notify_cancelled(id, "request cancelled").await;
                Err(McpError::Cancelled)
            }
            _ = deadline(timeout) => {
                self.take_pending(id);
                self.notify_cancelled(id, "request timed out").await;
                Err(McpError::Timeout)
            }
        }
    }

    fn take_pending(&self, id: i64) -> Option<PendingEntry> {
        lock(&self.shared.pending).remove(&id)
    }

    /// Best-effort cancellation frame for an abandoned request.
    async fn notify_cancelled(&self, id: i64, reason: &str) {
        let params = CancelledNotificationParams {
            request_id: RequestId::Integer(id),
            reason: Some(reason.to_string()),
        };
        if let Err(err) = self.notify::<CancelledNotification>(params).await {
            debug!("failed to send cancellation notification: {err}");
        }
    }

    async fn notify<N>(&self, params: N::Params) -> Result<()>
    where
        N: ModelContextProtocolNotification,
        N::Params: Serialize,
    {
        let params_json = serde_json::to_value(&params)?;
        let params_field = if params_json.is_null() {
            None
        } else {
            Some(params_json)
        };
        let frame = JSONRPCMessage::Notification(JSONRPCNotification {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: N::METHOD.to_string(),
            params: params_field,
        });

        let conn = self.conn.lock().await;
        let transport = conn
            .transport
            .as_ref()
            .ok_or_else(|| McpError::State("client is not connected".to_string()))?;
        transport.send(frame).await
    }
}

enum CapabilityCheck {
    Tools,
    Resources,
    ResourceSubscribe,
    Prompts,
    Logging,
}

impl CapabilityCheck {
    fn name(&self) -> &'static str {
        match self {
            CapabilityCheck::Tools => "tools",
            CapabilityCheck::Resources => "resources",
            CapabilityCheck::ResourceSubscribe => "resources.subscribe",
            CapabilityCheck::Prompts => "prompts",
            CapabilityCheck::Logging => "logging",
        }
    }
}

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

fn stringify_prompt_args(arguments: Value) -> Result<HashMap<String, String>> {
    let Value::Object(map) = arguments else {
        return Err(McpError::Protocol(
            "prompt arguments must be an object".to_string(),
        ));
    };
    Ok(map
        .into_iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, rendered)
        })
        .collect())
}

fn evict_pending(shared: &Arc<Shared>, reason: &str) {
    let entries: Vec<PendingEntry> = {
        let mut pending = lock(&shared.pending);
        pending.drain().map(|(_, entry)| entry).collect()
    };
    for entry in entries {
        debug!("evicting pending request `{}`", entry.method);
        let _ = entry
            .tx
            .send(Err(McpError::Connection(reason.to_string())));
    }
}

fn spawn_reader(
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    mut inbound_rx: mpsc::Receiver<JSONRPCMessage>,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                maybe = inbound_rx.recv() => match maybe {
                    Some(message) => handle_incoming(&shared, &transport, message).await,
                    None => {
                        // Terminal transport failure: resume every waiter
                        // with a connection error.
                        evict_pending(&shared, "connection closed");
                        *lock(&shared.state) = ConnectionState::Error;
                        events::dispatch_error(
                            &shared.handlers,
                            McpError::Connection("transport closed unexpectedly".to_string()),
                        );
                        break;
                    }
                }
            }
        }
    });
}

async fn handle_incoming(
    shared: &Arc<Shared>,
    transport: &Arc<dyn Transport>,
    message: JSONRPCMessage,
) {
    match message {
        JSONRPCMessage::Response(JSONRPCResponse { id, result, .. }) => {
            complete(shared, &id, Ok(result));
        }
        JSONRPCMessage::Error(JSONRPCError { id, error, .. }) => {
            complete(
                shared,
                &id,
                Err(McpError::Protocol(format!(
                    "server returned JSON-RPC error: code = {}, message = {}",
                    error.code, error.message
                ))),
            );
        }
        JSONRPCMessage::Notification(notification) => {
            debug!("<- notification: {}", notification.method);
            events::dispatch_notification(&shared.handlers, notification);
        }
        JSONRPCMessage::Request(request) => {
            // Server-initiated request (sampling, roots, elicitation).
            // Surfaced for observation; answered with method-not-found.
            events::dispatch_event(
                &shared.handlers,
                Event {
                    kind: "request".to_string(),
                    data: json!({
                        "id": request.id,
                        "method": request.method,
                        "params": request.params,
                    }),
                },
            );
            let reply = JSONRPCMessage::Error(JSONRPCError {
                jsonrpc: JSONRPC_VERSION.to_string(),
                id: request.id,
                error: JSONRPCErrorError {
                    code: METHOD_NOT_FOUND_ERROR_CODE,
                    message: format!("method not found: {}", request.method),
                    data: None,
                },
            });
            if let Err(err) = transport.send(reply).await {
                warn!("failed to answer server-initiated request: {err}");
            }
        }
    }
}

/// Route a response or error object to its pending entry. A late arrival
/// for an already-removed id is dropped.
fn complete(shared: &Arc<Shared>, id: &RequestId, outcome: Result<Value>) {
    let RequestId::Integer(id) = id else {
        warn!("response with string ID - no matching pending request");
        return;
    };
    let entry = lock(&shared.pending).remove(id);
    match entry {
        Some(entry) => {
            let _ = entry.tx.send(outcome);
        }
        None => warn!(id, "no pending request found for response"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn process_dsl() -> ClientDsl {
        let raw = br#"{"id": "p", "transport": "process"}"#;
        ClientDsl::from_slice(raw, std::path::Path::new("p.mcp.json"), &tether_host::ProcessEnv)
            .expect("dsl")
    }

    fn stdio_dsl() -> ClientDsl {
        let raw = br#"{"id": "s", "transport": "stdio", "command": "true"}"#;
        ClientDsl::from_slice(raw, std::path::Path::new("s.mcp.json"), &tether_host::ProcessEnv)
            .expect("dsl")
    }

    #[test]
    fn process_transport_is_rejected() {
        assert!(matches!(
            RemoteClient::new(process_dsl()),
            Err(McpError::Config(_))
        ));
    }

    #[tokio::test]
    async fn operations_require_initialization() {
        let client = RemoteClient::new(stdio_dsl()).expect("client");
        assert_eq!(client.state(), ConnectionState::Disconnected);

        let err = client.list_tools(None).await.expect_err("not initialized");
        assert!(matches!(err, McpError::Capability(_)));

        let err = client.cancel_request(7).expect_err("nothing pending");
        assert!(matches!(err, McpError::NotFound(_)));
    }

    #[test]
    fn prompt_args_are_stringified() {
        let args = stringify_prompt_args(json!({
            "name": "alice",
            "count": 3,
            "flag": true,
        }))
        .expect("stringify");
        assert_eq!(args.get("name").map(String::as_str), Some("alice"));
        assert_eq!(args.get("count").map(String::as_str), Some("3"));
        assert_eq!(args.get("flag").map(String::as_str), Some("true"));

        assert!(stringify_prompt_args(json!(["not", "a", "map"])).is_err());
    }
}
