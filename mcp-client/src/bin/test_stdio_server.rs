//! Loopback MCP server speaking newline-delimited JSON over stdio.
//!
//! Only used by the transport integration tests: it exposes a handful of
//! tools, two resources, and one prompt, and records which requests the
//! client cancelled so tests can assert on the cancellation frames.

use std::collections::HashSet;
use std::sync::Arc;

use mcp_types::CallToolRequestParams;
use mcp_types::CallToolResult;
use mcp_types::CancelledNotificationParams;
use mcp_types::ClientRequest;
use mcp_types::ContentBlock;
use mcp_types::GetPromptRequestParams;
use mcp_types::GetPromptResult;
use mcp_types::Implementation;
use mcp_types::InitializeRequestParams;
use mcp_types::InitializeResult;
use mcp_types::JSONRPC_VERSION;
use mcp_types::JSONRPCError;
use mcp_types::JSONRPCErrorError;
use mcp_types::JSONRPCMessage;
use mcp_types::JSONRPCNotification;
use mcp_types::JSONRPCRequest;
use mcp_types::JSONRPCResponse;
use mcp_types::ListPromptsResult;
use mcp_types::ListResourcesResult;
use mcp_types::ListToolsResult;
use mcp_types::Prompt;
use mcp_types::PromptArgument;
use mcp_types::PromptMessage;
use mcp_types::ReadResourceRequestParams;
use mcp_types::ReadResourceResult;
use mcp_types::RequestId;
use mcp_types::Resource;
use mcp_types::ResourceContents;
use mcp_types::ResourcesCapability;
use mcp_types::Role;
use mcp_types::ServerCapabilities;
use mcp_types::Tool;
use mcp_types::ToolsCapability;
use serde_json::Value;
use serde_json::json;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const MEMO_TEXT_URI: &str = "memo://note";
const MEMO_TEXT: &str = "loopback memo";
const MEMO_BLOB_URI: &str = "memo://blob";
// "hello bytes"
const MEMO_BLOB_BASE64: &str = "aGVsbG8gYnl0ZXM=";

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<JSONRPCMessage>();
    tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = outgoing_rx.recv().await {
            let Ok(mut frame) = serde_json::to_vec(&message) else {
                continue;
            };
            frame.push(b'\n');
            if stdout.write_all(&frame).await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    let cancelled: Arc<Mutex<HashSet<i64>>> = Arc::new(Mutex::new(HashSet::new()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match serde_json::from_str::<JSONRPCMessage>(&line) {
            Ok(JSONRPCMessage::Request(request)) => {
                let outgoing_tx = outgoing_tx.clone();
                let cancelled = Arc::clone(&cancelled);
                tokio::spawn(async move {
                    handle_request(request, outgoing_tx, cancelled).await;
                });
            }
            Ok(JSONRPCMessage::Notification(notification)) => {
                handle_notification(notification, &cancelled).await;
            }
            Ok(other) => warn!("ignoring message: {other:?}"),
            Err(err) => warn!("malformed frame: {err}; line = {line}"),
        }
    }
}

async fn handle_notification(
    notification: JSONRPCNotification,
    cancelled: &Arc<Mutex<HashSet<i64>>>,
) {
    if notification.method != "notifications/cancelled" {
        return;
    }
    let Some(params) = notification.params else {
        return;
    };
    let Ok(params) = serde_json::from_value::<CancelledNotificationParams>(params) else {
        return;
    };
    if let RequestId::Integer(id) = params.request_id {
        cancelled.lock().await.insert(id);
    }
}

async fn handle_request(
    request: JSONRPCRequest,
    outgoing_tx: mpsc::UnboundedSender<JSONRPCMessage>,
    cancelled: Arc<Mutex<HashSet<i64>>>,
) {
    let id = request.id.clone();
    let client_request = match ClientRequest::try_from(request) {
        Ok(client_request) => client_request,
        Err(err) => {
            respond_error(&outgoing_tx, id, format!("unsupported request: {err}"));
            return;
        }
    };

    match client_request {
        ClientRequest::Initialize(params) => {
            respond(&outgoing_tx, id, initialize_result(params));
        }
        ClientRequest::Ping(_) => respond(&outgoing_tx, id, json!({})),
        ClientRequest::ListTools(_) => respond(&outgoing_tx, id, list_tools()),
        ClientRequest::CallTool(params) => {
            let result = call_tool(params, &cancelled).await;
            respond(&outgoing_tx, id, result);
        }
        ClientRequest::ListResources(_) => respond(&outgoing_tx, id, list_resources()),
        ClientRequest::ReadResource(params) => match read_resource(params) {
            Some(result) => respond(&outgoing_tx, id, result),
            None => respond_error(&outgoing_tx, id, "unknown resource".to_string()),
        },
        ClientRequest::Subscribe(_) | ClientRequest::Unsubscribe(_) => {
            respond(&outgoing_tx, id, json!({}));
        }
        ClientRequest::ListPrompts(_) => respond(&outgoing_tx, id, list_prompts()),
        ClientRequest::GetPrompt(params) => respond(&outgoing_tx, id, get_prompt(params)),
        ClientRequest::SetLevel(_) => respond(&outgoing_tx, id, json!({})),
    }
}

fn respond<T: serde::Serialize>(
    outgoing_tx: &mpsc::UnboundedSender<JSONRPCMessage>,
    id: RequestId,
    result: T,
) {
    let Ok(result) = serde_json::to_value(result) else {
        return;
    };
    let _ = outgoing_tx.send(JSONRPCMessage::Response(JSONRPCResponse {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id,
        result,
    }));
}

fn respond_error(
    outgoing_tx: &mpsc::UnboundedSender<JSONRPCMessage>,
    id: RequestId,
    message: String,
) {
    let _ = outgoing_tx.send(JSONRPCMessage::Error(JSONRPCError {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id,
        error: JSONRPCErrorError {
            code: mcp_types::INVALID_PARAMS_ERROR_CODE,
            message,
            data: None,
        },
    }));
}

fn initialize_result(params: InitializeRequestParams) -> InitializeResult {
    InitializeResult {
        capabilities: ServerCapabilities {
            completions: None,
            experimental: None,
            logging: Some(json!({})),
            prompts: Some(Default::default()),
            resources: Some(ResourcesCapability {
                subscribe: Some(true),
                list_changed: Some(true),
            }),
            tools: Some(ToolsCapability {
                list_changed: Some(true),
            }),
        },
        instructions: None,
        protocol_version: params.protocol_version,
        server_info: Implementation {
            name: "test-stdio-server".to_string(),
            title: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    }
}

fn list_tools() -> ListToolsResult {
    let echo_schema = json!({
        "type": "object",
        "properties": { "message": { "type": "string" } },
        "required": ["message"],
        "additionalProperties": false
    });
    ListToolsResult {
        tools: vec![
            Tool {
                name: "echo".to_string(),
                title: None,
                description: Some("Echo back the provided message.".to_string()),
                input_schema: echo_schema,
                output_schema: None,
            },
            Tool {
                name: "slow".to_string(),
                title: None,
                description: Some("Finish after a two second pause.".to_string()),
                input_schema: json!({"type": "object"}),
                output_schema: None,
            },
            Tool {
                name: "cancelled_ids".to_string(),
                title: None,
                description: Some("Report the request ids the client cancelled.".to_string()),
                input_schema: json!({"type": "object"}),
                output_schema: None,
            },
        ],
        next_cursor: None,
    }
}

async fn call_tool(
    params: CallToolRequestParams,
    cancelled: &Arc<Mutex<HashSet<i64>>>,
) -> CallToolResult {
    match params.name.as_str() {
        "echo" => {
            let message = params
                .arguments
                .as_ref()
                .and_then(|arguments| arguments.get("message"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            CallToolResult::text(message)
        }
        "slow" => {
            tokio::time::sleep(std::time::Duration::from_secs(2)).await;
            CallToolResult::text("done")
        }
        "cancelled_ids" => {
            let mut ids: Vec<i64> = cancelled.lock().await.iter().copied().collect();
            ids.sort_unstable();
            CallToolResult {
                content: vec![ContentBlock::text(
                    serde_json::to_string(&ids).unwrap_or_default(),
                )],
                is_error: false,
            }
        }
        other => CallToolResult::error(format!("tool not found: {other}")),
    }
}

fn list_resources() -> ListResourcesResult {
    ListResourcesResult {
        resources: vec![
            Resource {
                uri: MEMO_TEXT_URI.to_string(),
                name: Some("note".to_string()),
                description: None,
                mime_type: Some("text/plain".to_string()),
            },
            Resource {
                uri: MEMO_BLOB_URI.to_string(),
                name: Some("blob".to_string()),
                description: None,
                mime_type: Some("application/octet-stream".to_string()),
            },
        ],
        next_cursor: None,
    }
}

fn read_resource(params: ReadResourceRequestParams) -> Option<ReadResourceResult> {
    match params.uri.as_str() {
        MEMO_TEXT_URI => Some(ReadResourceResult {
            contents: vec![ResourceContents {
                uri: MEMO_TEXT_URI.to_string(),
                mime_type: Some("text/plain".to_string()),
                text: Some(MEMO_TEXT.to_string()),
                blob: None,
            }],
        }),
        MEMO_BLOB_URI => Some(ReadResourceResult {
            contents: vec![ResourceContents {
                uri: MEMO_BLOB_URI.to_string(),
                mime_type: Some("application/octet-stream".to_string()),
                text: None,
                blob: Some(MEMO_BLOB_BASE64.to_string()),
            }],
        }),
        _ => None,
    }
}

fn list_prompts() -> ListPromptsResult {
    ListPromptsResult {
        prompts: vec![Prompt {
            name: "greet".to_string(),
            description: Some("Greets someone, several times if asked.".to_string()),
            arguments: vec![
                PromptArgument {
                    name: "name".to_string(),
                    description: None,
                    required: Some(true),
                },
                PromptArgument {
                    name: "count".to_string(),
                    description: None,
                    required: None,
                },
            ],
        }],
        next_cursor: None,
    }
}

fn get_prompt(params: GetPromptRequestParams) -> GetPromptResult {
    let arguments = params.arguments.unwrap_or_default();
    let name = arguments.get("name").cloned().unwrap_or_default();
    let count = arguments.get("count").cloned().unwrap_or_else(|| "1".to_string());
    GetPromptResult {
        description: Some(format!("greet name={name} count={count}")),
        messages: vec![PromptMessage {
            role: Role::User,
            content: ContentBlock::text(format!("Hello {name} x{count}")),
        }],
    }
}
