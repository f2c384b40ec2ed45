use std::sync::Arc;
use std::time::Duration;

use mcp_types::ContentBlock;
use mcp_types::LoggingLevel;
use mcp_types::McpError;
use mcp_types::ResourceBody;
use pretty_assertions::assert_eq;
use serde_json::json;
use tether_config::ClientDsl;
use tether_mcp_client::ConnectionOptions;
use tether_mcp_client::ConnectionState;
use tether_mcp_client::RemoteClient;

fn stdio_client() -> RemoteClient {
    let dsl = ClientDsl::from_value(json!({
        "id": "loopback",
        "name": "loopback-test",
        "transport": "stdio",
        "command": env!("CARGO_BIN_EXE_test_stdio_server"),
    }))
    .expect("dsl");
    RemoteClient::new(dsl).expect("client")
}

async fn wait_for_pending(client: &RemoteClient) -> i64 {
    for _ in 0..100 {
        if let Some(id) = client.pending_request_ids().into_iter().next() {
            return id;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no pending request appeared");
}

async fn cancelled_ids(client: &RemoteClient) -> Vec<i64> {
    let result = client
        .call_tool("cancelled_ids", Some(json!({})))
        .await
        .expect("cancelled_ids tool");
    let ContentBlock::Text { text } = &result.content[0] else {
        panic!("expected text content");
    };
    serde_json::from_str(text).expect("ids json")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn initialize_handshake_and_surface() {
    let client = stdio_client();
    client.connect(None).await.expect("connect");
    assert_eq!(client.state(), ConnectionState::Connected);

    let result = client.initialize().await.expect("initialize");
    assert_eq!(client.state(), ConnectionState::Initialized);
    assert_eq!(result.server_info.name, "test-stdio-server");
    assert!(result.capabilities.tools.is_some());

    let tools = client.list_tools(None).await.expect("tools/list");
    assert!(tools.tools.iter().any(|tool| tool.name == "echo"));

    let echo = client
        .call_tool("echo", Some(json!({"message": "hi there"})))
        .await
        .expect("tools/call");
    assert!(!echo.is_error);
    assert_eq!(echo.content, vec![ContentBlock::text("hi there")]);

    // Prompt arguments are stringified before they hit the wire.
    let prompt = client
        .get_prompt("greet", Some(json!({"name": "bob", "count": 2})))
        .await
        .expect("prompts/get");
    assert_eq!(
        prompt.description.as_deref(),
        Some("greet name=bob count=2")
    );

    // Binary resource records surface as decoded bytes.
    let blocks = client.read_resource("memo://blob").await.expect("read");
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].uri, "memo://blob");
    assert_eq!(blocks[0].body, ResourceBody::Bytes(b"hello bytes".to_vec()));

    // The server advertises resources.subscribe and logging.
    client
        .subscribe_resource("memo://note")
        .await
        .expect("subscribe");
    client
        .set_log_level(LoggingLevel::Warning)
        .await
        .expect("setLevel");
    assert_eq!(client.get_log_level(), LoggingLevel::Warning);

    client.disconnect().await.expect("disconnect");
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(client.initialize_result().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn calls_are_gated_until_initialized() {
    let client = stdio_client();
    client.connect(None).await.expect("connect");

    let err = client.list_tools(None).await.expect_err("gated");
    assert!(matches!(err, McpError::Capability(_)));

    client.disconnect().await.expect("disconnect");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_request_sends_cancellation_frame() {
    let client = Arc::new(stdio_client());
    client.connect(None).await.expect("connect");
    client.initialize().await.expect("initialize");

    let worker = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.call_tool("slow", Some(json!({}))).await })
    };

    let id = wait_for_pending(&client).await;
    client.cancel_request(id).expect("cancel");

    let outcome = worker.await.expect("join");
    assert!(matches!(outcome, Err(McpError::Cancelled)));
    assert!(client.pending_request_ids().is_empty());

    // The cancellation notification reached the server before the call
    // returned.
    assert!(cancelled_ids(&client).await.contains(&id));

    client.disconnect().await.expect("disconnect");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn deadline_elapse_cancels_and_times_out() {
    let client = Arc::new(stdio_client());
    client
        .connect(Some(ConnectionOptions {
            timeout: Some(Duration::from_millis(200)),
            ..Default::default()
        }))
        .await
        .expect("connect");
    client.initialize().await.expect("initialize");

    let err = client
        .call_tool("slow", Some(json!({})))
        .await
        .expect_err("timeout");
    assert!(matches!(err, McpError::Timeout));
    assert!(client.pending_request_ids().is_empty());
    assert!(!cancelled_ids(&client).await.is_empty());

    client.disconnect().await.expect("disconnect");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disconnect_resumes_every_pending_waiter() {
    let client = Arc::new(stdio_client());
    client.connect(None).await.expect("connect");
    client.initialize().await.expect("initialize");

    let worker = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.call_tool("slow", Some(json!({}))).await })
    };
    wait_for_pending(&client).await;

    client.disconnect().await.expect("disconnect");

    let outcome = worker.await.expect("join");
    assert!(matches!(outcome, Err(McpError::Connection(_))));
    assert!(client.pending_request_ids().is_empty());
}
