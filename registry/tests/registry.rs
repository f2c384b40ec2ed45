use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use mcp_types::ContentBlock;
use mcp_types::McpError;
use pretty_assertions::assert_eq;
use serde_json::Value;
use serde_json::json;
use tether_host::FnRuntime;
use tether_mcp_process::MappingData;
use tether_mcp_process::ToolSchema;
use tether_registry::Client;
use tether_registry::ClientRegistry;
use tether_registry::Hosts;
use tether_registry::ToolCall;

async fn write(path: &std::path::Path, contents: &str) {
    tokio::fs::create_dir_all(path.parent().expect("parent"))
        .await
        .expect("mkdir");
    tokio::fs::write(path, contents).await.expect("write");
}

fn runtime() -> Arc<FnRuntime> {
    let runtime = FnRuntime::new();
    runtime.register("utils.Ping", |args| {
        let msg = args
            .first()
            .and_then(|arguments| arguments.get("msg"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(json!(format!("pong {msg}")))
        }
        .boxed()
    });
    runtime.register("utils.Status", |_| {
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(json!({"status": "ok"}))
        }
        .boxed()
    });
    Arc::new(runtime)
}

async fn fixture() -> (tempfile::TempDir, ClientRegistry, String) {
    let dir = tempfile::tempdir().expect("tempdir");
    let base = dir.path();

    let dsl_path = base.join("app/mcps/crm/customer.mcp.yao");
    write(
        &dsl_path,
        r#"{
            // crm process client
            "transport": "process",
            "tools": {
                "ping": "utils.Ping",
                "status": "utils.Status",
            },
        }"#,
    )
    .await;
    write(
        &base.join("app/mcps/mapping/crm/customer/schemes/ping.in.json"),
        r#"{"type": "object", "properties": {"msg": {"type": "string"}}}"#,
    )
    .await;
    write(
        &base.join("app/mcps/mapping/crm/customer/schemes/status.in.json"),
        r#"{"type": "object"}"#,
    )
    .await;

    let registry = ClientRegistry::new(Hosts {
        runtime: runtime(),
        ..Hosts::default()
    });
    (dir, registry, dsl_path.to_string_lossy().into_owned())
}

fn text_of(result: &mcp_types::CallToolResult) -> &str {
    match &result.content[0] {
        ContentBlock::Text { text } => text,
        other => panic!("expected text content, got {other:?}"),
    }
}

#[tokio::test]
async fn load_derives_id_and_publishes_mapping() {
    let (_dir, registry, dsl_path) = fixture().await;

    let client = registry
        .load_client(&dsl_path, None, None)
        .await
        .expect("load");
    assert_eq!(client.id(), "crm.customer");
    assert!(registry.exists("crm.customer"));
    assert_eq!(registry.list_clients(), vec!["crm.customer".to_string()]);

    let mapping = registry
        .get_client_mapping("crm.customer")
        .expect("mapping");
    assert_eq!(mapping.tools.len(), 2);
    assert_eq!(mapping.tools["ping"].handler, "utils.Ping");

    let selected = registry.select("crm.customer").expect("select");
    let tools = selected.list_tools(None).await.expect("tools");
    assert_eq!(
        tools.tools.iter().map(|tool| tool.name.as_str()).collect::<Vec<_>>(),
        vec!["ping", "status"]
    );
}

#[tokio::test]
async fn unload_removes_client_and_mapping_together() {
    let (_dir, registry, dsl_path) = fixture().await;
    registry
        .load_client(&dsl_path, None, None)
        .await
        .expect("load");

    registry.unload_client("crm.customer").await.expect("unload");

    assert!(!registry.exists("crm.customer"));
    assert!(matches!(
        registry.select("crm.customer"),
        Err(McpError::NotFound(_))
    ));
    assert!(matches!(
        registry.get_client_mapping("crm.customer"),
        Err(McpError::NotFound(_))
    ));
    assert!(matches!(
        registry.unload_client("crm.customer").await,
        Err(McpError::NotFound(_))
    ));
}

#[tokio::test]
async fn sequential_batch_preserves_order_under_partial_failure() {
    let (_dir, registry, dsl_path) = fixture().await;
    let client = registry
        .load_client(&dsl_path, None, None)
        .await
        .expect("load");

    let calls = vec![
        ToolCall {
            name: "ping".to_string(),
            arguments: Some(json!({"msg": "1"})),
        },
        ToolCall {
            name: "non_existent".to_string(),
            arguments: Some(json!({})),
        },
        ToolCall {
            name: "status".to_string(),
            arguments: Some(json!({})),
        },
    ];

    let results = client.call_tools(&calls, &[]).await.expect("batch");
    assert_eq!(results.len(), calls.len());
    assert!(!results[0].is_error);
    assert_eq!(text_of(&results[0]), "pong 1");
    assert!(results[1].is_error);
    assert!(text_of(&results[1]).contains("tool not found"));
    assert!(!results[2].is_error);
    assert_eq!(text_of(&results[2]), "{\"status\":\"ok\"}");
}

#[tokio::test]
async fn parallel_batch_matches_input_order() {
    let (_dir, registry, dsl_path) = fixture().await;
    let client = registry
        .load_client(&dsl_path, None, None)
        .await
        .expect("load");

    // The slow call sits first so completion order differs from input
    // order.
    let calls = vec![
        ToolCall {
            name: "ping".to_string(),
            arguments: Some(json!({"msg": "first"})),
        },
        ToolCall {
            name: "non_existent".to_string(),
            arguments: Some(json!({})),
        },
        ToolCall {
            name: "status".to_string(),
            arguments: Some(json!({})),
        },
    ];

    let results = client
        .call_tools_parallel(&calls, &[])
        .await
        .expect("parallel");
    assert_eq!(results.len(), calls.len());
    assert_eq!(text_of(&results[0]), "pong first");
    assert!(results[1].is_error);
    assert!(text_of(&results[1]).contains("tool not found"));
    assert_eq!(text_of(&results[2]), "{\"status\":\"ok\"}");
}

#[tokio::test]
async fn mapping_updates_are_visible_to_the_client() {
    let (_dir, registry, dsl_path) = fixture().await;
    let client = registry
        .load_client(&dsl_path, None, None)
        .await
        .expect("load");

    let mut tools = HashMap::new();
    tools.insert(
        "echo".to_string(),
        ToolSchema {
            description: "Echo".to_string(),
            handler: "utils.Ping".to_string(),
            input_schema: json!({"type": "object"}),
            output_schema: None,
            process_args: Vec::new(),
        },
    );
    registry
        .update_client_mapping("crm.customer", tools, HashMap::new(), HashMap::new())
        .expect("update");

    let names: Vec<String> = client
        .list_tools(None)
        .await
        .expect("tools")
        .tools
        .into_iter()
        .map(|tool| tool.name)
        .collect();
    assert_eq!(names, vec!["echo", "ping", "status"]);

    registry
        .remove_client_mapping_items(
            "crm.customer",
            &["echo".to_string(), "ping".to_string()],
            &[],
            &[],
        )
        .expect("remove");
    let names: Vec<String> = client
        .list_tools(None)
        .await
        .expect("tools")
        .tools
        .into_iter()
        .map(|tool| tool.name)
        .collect();
    assert_eq!(names, vec!["status"]);
}

#[tokio::test]
async fn source_loads_accept_a_mapping_override() {
    let (_dir, registry, _) = fixture().await;

    let mut mapping = MappingData::default();
    mapping.tools.insert(
        "status".to_string(),
        ToolSchema {
            description: String::new(),
            handler: "utils.Status".to_string(),
            input_schema: json!({"type": "object"}),
            output_schema: None,
            process_args: Vec::new(),
        },
    );

    let client = registry
        .load_client_source(
            br#"{"transport": "process", "tools": {"status": "utils.Status"}}"#,
            "inline.status",
            Some(mapping),
        )
        .await
        .expect("load source");

    let result = client
        .call_tool("status", Some(json!({})), &[])
        .await
        .expect("call");
    assert!(!result.is_error);
    assert_eq!(text_of(&result), "{\"status\":\"ok\"}");

    // Remote DSLs load too, without touching the mapping registry.
    let remote = registry
        .load_client_source(
            br#"{"transport": "stdio", "command": "true"}"#,
            "inline.remote",
            None,
        )
        .await
        .expect("load remote");
    assert!(matches!(remote.as_ref(), Client::Remote(_)));
    assert!(matches!(
        registry.get_client_mapping("inline.remote"),
        Err(McpError::NotFound(_))
    ));
}
