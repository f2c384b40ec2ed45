//! The unified client facade and the batch fan-out executor.

use std::collections::HashMap;
use std::sync::Arc;

use mcp_types::CallToolResult;
use mcp_types::GetPromptResult;
use mcp_types::InitializeResult;
use mcp_types::JSONRPCNotification;
use mcp_types::ListPromptsResult;
use mcp_types::ListResourcesResult;
use mcp_types::ListToolsResult;
use mcp_types::LoggingLevel;
use mcp_types::McpError;
use mcp_types::ResourceBlock;
use mcp_types::Result;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tether_mcp_client::ConnectionOptions;
use tether_mcp_client::ConnectionState;
use tether_mcp_client::Event;
use tether_mcp_client::HandlerId;
use tether_mcp_client::ProgressState;
use tether_mcp_client::RemoteClient;
use tether_mcp_process::ProcessClient;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::warn;

/// One entry of a batch tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// A loaded client: either a remote connection or an in-process handler
/// bundle. The method set is uniform; `extras` reach process handlers and
/// are ignored by remote transports.
pub enum Client {
    Remote(RemoteClient),
    Process(ProcessClient),
}

impl Client {
    pub fn id(&self) -> &str {
        match self {
            Client::Remote(client) => client.id(),
            Client::Process(client) => client.id(),
        }
    }

    pub fn remote(&self) -> Option<&RemoteClient> {
        match self {
            Client::Remote(client) => Some(client),
            Client::Process(_) => None,
        }
    }

    pub fn process(&self) -> Option<&ProcessClient> {
        match self {
            Client::Process(client) => Some(client),
            Client::Remote(_) => None,
        }
    }

    // -- lifecycle -----------------------------------------------------------

    /// Connect the underlying transport. A process client has nothing to
    /// connect and is always ready.
    pub async fn connect(&self, opts: Option<ConnectionOptions>) -> Result<()> {
        match self {
            Client::Remote(client) => client.connect(opts).await,
            Client::Process(_) => Ok(()),
        }
    }

    /// Run the `initialize` handshake. Process clients have no handshake
    /// and return `None`.
    pub async fn initialize(&self) -> Result<Option<InitializeResult>> {
        match self {
            Client::Remote(client) => client.initialize().await.map(Some),
            Client::Process(_) => Ok(None),
        }
    }

    pub async fn initialized(&self) -> Result<()> {
        match self {
            Client::Remote(client) => client.initialized().await,
            Client::Process(_) => Ok(()),
        }
    }

    pub async fn disconnect(&self) -> Result<()> {
        match self {
            Client::Remote(client) => client.disconnect().await,
            Client::Process(_) => Ok(()),
        }
    }

    pub async fn close(&self) -> Result<()> {
        self.disconnect().await
    }

    pub fn is_connected(&self) -> bool {
        match self {
            Client::Remote(client) => client.is_connected(),
            Client::Process(_) => true,
        }
    }

    pub fn state(&self) -> ConnectionState {
        match self {
            Client::Remote(client) => client.state(),
            Client::Process(_) => ConnectionState::Initialized,
        }
    }

    // -- tools ---------------------------------------------------------------

    pub async fn list_tools(&self, cursor: Option<String>) -> Result<ListToolsResult> {
        match self {
            Client::Remote(client) => client.list_tools(cursor).await,
            Client::Process(client) => Ok(client.list_tools()),
        }
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
        extras: &[Value],
    ) -> Result<CallToolResult> {
        match self {
            Client::Remote(client) => client.call_tool(name, arguments).await,
            Client::Process(client) => client.call_tool(name, arguments, extras).await,
        }
    }

    /// Invoke `calls` sequentially in input order. Individual failures are
    /// captured per-result; the output length always equals the input
    /// length.
    pub async fn call_tools(
        &self,
        calls: &[ToolCall],
        extras: &[Value],
    ) -> Result<Vec<CallToolResult>> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let result = match self
                .call_tool(&call.name, call.arguments.clone(), extras)
                .await
            {
                Ok(result) => result,
                Err(err) => CallToolResult::error(err.to_string()),
            };
            results.push(result);
        }
        Ok(results)
    }

    /// Invoke `calls` concurrently. Results land at their input index, so
    /// the output order matches the input order regardless of completion
    /// order. Dropping the returned future cancels every in-flight
    /// sub-call.
    pub async fn call_tools_parallel(
        self: &Arc<Self>,
        calls: &[ToolCall],
        extras: &[Value],
    ) -> Result<Vec<CallToolResult>> {
        let slots: Arc<Mutex<Vec<Option<CallToolResult>>>> =
            Arc::new(Mutex::new(vec![None; calls.len()]));

        let mut join_set = JoinSet::new();
        for (index, call) in calls.iter().cloned().enumerate() {
            let client = Arc::clone(self);
            let slots = Arc::clone(&slots);
            let extras = extras.to_vec();
            join_set.spawn(async move {
                let result = match client
                    .call_tool(&call.name, call.arguments, &extras)
                    .await
                {
                    Ok(result) => result,
                    Err(err) => CallToolResult::error(err.to_string()),
                };
                slots.lock().await[index] = Some(result);
            });
        }

        while let Some(joined) = join_set.join_next().await {
            if let Err(err) = joined {
                warn!("tool-call task failed: {err}");
            }
        }

        let slots = {
            let mut guard = slots.lock().await;
            std::mem::take(&mut *guard)
        };
        Ok(slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| CallToolResult::error("tool call task aborted"))
            })
            .collect())
    }

    // -- resources -----------------------------------------------------------

    pub async fn list_resources(&self, cursor: Option<String>) -> Result<ListResourcesResult> {
        match self {
            Client::Remote(client) => client.list_resources(cursor).await,
            Client::Process(client) => Ok(client.list_resources()),
        }
    }

    pub async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceBlock>> {
        match self {
            Client::Remote(client) => client.read_resource(uri).await,
            Client::Process(client) => client.read_resource(uri).await,
        }
    }

    pub async fn subscribe_resource(&self, uri: &str) -> Result<()> {
        match self {
            Client::Remote(client) => client.subscribe_resource(uri).await,
            Client::Process(client) => client.subscribe_resource(uri),
        }
    }

    pub async fn unsubscribe_resource(&self, uri: &str) -> Result<()> {
        match self {
            Client::Remote(client) => client.unsubscribe_resource(uri).await,
            Client::Process(client) => client.unsubscribe_resource(uri),
        }
    }

    // -- prompts -------------------------------------------------------------

    pub async fn list_prompts(&self, cursor: Option<String>) -> Result<ListPromptsResult> {
        match self {
            Client::Remote(client) => client.list_prompts(cursor).await,
            Client::Process(client) => Ok(client.list_prompts()),
        }
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<GetPromptResult> {
        match self {
            Client::Remote(client) => client.get_prompt(name, arguments).await,
            Client::Process(client) => client.get_prompt(name, arguments).await,
        }
    }

    // -- logging -------------------------------------------------------------

    pub async fn set_log_level(&self, level: LoggingLevel) -> Result<()> {
        match self {
            Client::Remote(client) => client.set_log_level(level).await,
            Client::Process(client) => {
                client.set_log_level(level);
                Ok(())
            }
        }
    }

    pub fn get_log_level(&self) -> LoggingLevel {
        match self {
            Client::Remote(client) => client.get_log_level(),
            Client::Process(client) => client.get_log_level(),
        }
    }

    // -- liveness, cancellation, progress ------------------------------------

    pub async fn ping(&self) -> Result<()> {
        match self {
            Client::Remote(client) => client.ping().await,
            Client::Process(_) => Ok(()),
        }
    }

    pub fn cancel_request(&self, id: i64) -> Result<()> {
        match self {
            Client::Remote(client) => client.cancel_request(id),
            Client::Process(client) => client.cancel_request(id),
        }
    }

    pub fn create_progress(&self, total: f64) -> Result<i64> {
        match self {
            Client::Remote(client) => Ok(client.create_progress(total)),
            Client::Process(_) => Err(progress_requires_remote()),
        }
    }

    pub async fn update_progress(&self, token: i64, progress: f64) -> Result<ProgressState> {
        match self {
            Client::Remote(client) => client.update_progress(token, progress).await,
            Client::Process(_) => Err(progress_requires_remote()),
        }
    }

    pub fn complete_progress(&self, token: i64) -> Result<ProgressState> {
        match self {
            Client::Remote(client) => client.complete_progress(token),
            Client::Process(_) => Err(progress_requires_remote()),
        }
    }

    pub fn get_progress(&self, token: i64) -> Result<ProgressState> {
        match self {
            Client::Remote(client) => client.get_progress(token),
            Client::Process(_) => Err(progress_requires_remote()),
        }
    }

    // -- handlers ------------------------------------------------------------

    pub fn on_event(
        &self,
        kind: &str,
        handler: impl Fn(Event) + Send + Sync + 'static,
    ) -> Result<HandlerId> {
        match self {
            Client::Remote(client) => Ok(client.on_event(kind, handler)),
            Client::Process(_) => Err(handlers_require_remote()),
        }
    }

    pub fn on_notification(
        &self,
        method: &str,
        handler: impl Fn(JSONRPCNotification) + Send + Sync + 'static,
    ) -> Result<HandlerId> {
        match self {
            Client::Remote(client) => Ok(client.on_notification(method, handler)),
            Client::Process(_) => Err(handlers_require_remote()),
        }
    }

    pub fn on_error(
        &self,
        handler: impl Fn(Arc<McpError>) + Send + Sync + 'static,
    ) -> Result<HandlerId> {
        match self {
            Client::Remote(client) => Ok(client.on_error(handler)),
            Client::Process(_) => Err(handlers_require_remote()),
        }
    }

    pub fn remove_event_handler(&self, kind: &str, id: HandlerId) -> bool {
        match self {
            Client::Remote(client) => client.remove_event_handler(kind, id),
            Client::Process(_) => false,
        }
    }

    pub fn remove_notification_handler(&self, method: &str, id: HandlerId) -> bool {
        match self {
            Client::Remote(client) => client.remove_notification_handler(method, id),
            Client::Process(_) => false,
        }
    }

    pub fn clear_all_handlers(&self) {
        if let Client::Remote(client) = self {
            client.clear_all_handlers();
        }
    }

    pub fn event_handler_counts(&self) -> HashMap<String, usize> {
        match self {
            Client::Remote(client) => client.event_handler_counts(),
            Client::Process(_) => HashMap::new(),
        }
    }

    // -- samples -------------------------------------------------------------

    pub async fn list_samples(&self, kind: &str, name: &str) -> Result<Vec<Value>> {
        match self {
            Client::Process(client) => client.list_samples(kind, name).await,
            Client::Remote(_) => Err(samples_require_process()),
        }
    }

    pub async fn get_sample(&self, kind: &str, name: &str, index: i64) -> Result<Value> {
        match self {
            Client::Process(client) => client.get_sample(kind, name, index).await,
            Client::Remote(_) => Err(samples_require_process()),
        }
    }
}

fn progress_requires_remote() -> McpError {
    McpError::State("progress tracking requires a remote client".to_string())
}

fn handlers_require_remote() -> McpError {
    McpError::State("event handlers require a remote client".to_string())
}

fn samples_require_process() -> McpError {
    McpError::State("samples require a process client".to_string())
}
