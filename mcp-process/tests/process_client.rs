use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;
use std::time::Duration;

use futures::FutureExt;
use mcp_types::ContentBlock;
use mcp_types::McpError;
use mcp_types::ResourceBody;
use pretty_assertions::assert_eq;
use serde_json::Value;
use serde_json::json;
use tether_config::ClientDsl;
use tether_host::FnRuntime;
use tether_host::MetaSchemaValidator;
use tether_host::TokioFs;
use tether_mcp_process::ProcessClient;
use tether_mcp_process::load_mapping;

struct Fixture {
    _dir: tempfile::TempDir,
    client: ProcessClient,
    invocations: Arc<Mutex<Vec<(String, Vec<Value>)>>>,
}

async fn write(base: &Path, rel: &str, contents: &str) {
    let path = base.join(rel);
    tokio::fs::create_dir_all(path.parent().expect("parent"))
        .await
        .expect("mkdir");
    tokio::fs::write(path, contents).await.expect("write");
}

async fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let base = dir.path();

    write(
        base,
        "customer/schemes/create_customer.in.yao",
        r#"{
            "type": "object",
            "description": "Create a customer",
            "properties": {
                "name": { "type": "string" },
                "email": { "type": "string" },
                "phone": { "type": "string" },
                "status": { "type": "string" }
            },
            "required": ["name", "email"],
            "x-process-args": ["$name", "$email", "$phone", "$status"],
        }"#,
    )
    .await;
    write(
        base,
        "customer/schemes/ping.in.json",
        r#"{"type": "object", "properties": {"msg": {"type": "string"}}}"#,
    )
    .await;
    write(
        base,
        "customer/schemes/status.in.json",
        r#"{"type": "object"}"#,
    )
    .await;
    write(
        base,
        "customer/schemes/stall.in.json",
        r#"{"type": "object"}"#,
    )
    .await;
    write(
        base,
        "customer/schemes/test_action.in.json",
        r#"{"type": "object"}"#,
    )
    .await;
    write(
        base,
        "customer/schemes/test_action.jsonl",
        concat!(
            "{\"input\": {\"message\": \"plain message\"}}\n",
            "{\"input\": {\"message\": \"test foo.bar path\"}}\n",
        ),
    )
    .await;
    write(
        base,
        "customer/resources/detail.res.yao",
        r#"{
            "description": "Customer detail",
            "uri": "customers://{id}",
            "mimeType": "application/json",
            "x-process-args": ["$uri.id"]
        }"#,
    )
    .await;
    write(
        base,
        "customer/prompts/greet.pmt.json",
        r#"{"description": "Greeting", "template": "Hello {name}"}"#,
    )
    .await;

    let dsl = ClientDsl::from_value(json!({
        "id": "customer",
        "transport": "process",
        "tools": {
            "create_customer": "models.customer.Create",
            "ping": "models.utils.Ping",
            "status": "models.utils.Status",
            "stall": "models.utils.Stall",
            "test_action": "models.utils.TestAction",
        },
        "resources": { "detail": "models.customer.Find" },
        "prompts": { "greet": "prompts.customer.Greet" },
    }))
    .expect("dsl");

    let mapping = load_mapping(
        &TokioFs,
        &MetaSchemaValidator,
        base,
        &dsl.id,
        &dsl.tools,
        &dsl.resources,
        &dsl.prompts,
    )
    .await
    .expect("mapping");

    let invocations: Arc<Mutex<Vec<(String, Vec<Value>)>>> = Arc::new(Mutex::new(Vec::new()));
    let runtime = FnRuntime::new();

    let record = |name: &'static str, invocations: &Arc<Mutex<Vec<(String, Vec<Value>)>>>| {
        let invocations = Arc::clone(invocations);
        move |args: Vec<Value>| {
            invocations
                .lock()
                .expect("lock")
                .push((name.to_string(), args.clone()));
            args
        }
    };

    {
        let observe = record("models.customer.Create", &invocations);
        runtime.register("models.customer.Create", move |args| {
            observe(args);
            async { Ok(json!({"id": 7})) }.boxed()
        });
    }
    {
        let observe = record("models.utils.Ping", &invocations);
        runtime.register("models.utils.Ping", move |args| {
            let msg = args
                .first()
                .and_then(|arguments| arguments.get("msg"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            observe(args);
            async move { Ok(json!(format!("pong {msg}"))) }.boxed()
        });
    }
    {
        let observe = record("models.utils.Status", &invocations);
        runtime.register("models.utils.Status", move |args| {
            observe(args);
            async { Ok(json!({"status": "ok"})) }.boxed()
        });
    }
    runtime.register("models.utils.Stall", |_| std::future::pending().boxed());
    {
        let observe = record("models.customer.Find", &invocations);
        runtime.register("models.customer.Find", move |args| {
            let id = args.first().cloned().unwrap_or(Value::Null);
            observe(args);
            async move { Ok(json!({"id": id, "name": "A"})) }.boxed()
        });
    }

    let client = ProcessClient::new(
        dsl,
        Arc::new(RwLock::new(mapping)),
        Arc::new(runtime),
        Arc::new(TokioFs),
        base,
    );

    Fixture {
        _dir: dir,
        client,
        invocations,
    }
}

fn text_of(result: &mcp_types::CallToolResult) -> &str {
    match &result.content[0] {
        ContentBlock::Text { text } => text,
        other => panic!("expected text content, got {other:?}"),
    }
}

#[tokio::test]
async fn tool_happy_path_binds_positional_args() {
    let fixture = fixture().await;
    let result = fixture
        .client
        .call_tool(
            "create_customer",
            Some(json!({
                "name": "A",
                "email": "a@x",
                "phone": "1",
                "status": "active"
            })),
            &[],
        )
        .await
        .expect("call");

    assert!(!result.is_error);
    assert_eq!(text_of(&result), "{\"id\":7}");

    let invocations = fixture.invocations.lock().expect("lock");
    let (handler, args) = &invocations[0];
    assert_eq!(handler, "models.customer.Create");
    assert_eq!(
        args,
        &vec![json!("A"), json!("a@x"), json!("1"), json!("active")]
    );
}

#[tokio::test]
async fn extras_are_appended_after_bound_args() {
    let fixture = fixture().await;
    fixture
        .client
        .call_tool(
            "create_customer",
            Some(json!({
                "name": "A",
                "email": "a@x",
                "phone": "1",
                "status": "active"
            })),
            &[json!("admin"), json!(42)],
        )
        .await
        .expect("call");

    let invocations = fixture.invocations.lock().expect("lock");
    let (_, args) = &invocations[0];
    assert_eq!(
        args,
        &vec![
            json!("A"),
            json!("a@x"),
            json!("1"),
            json!("active"),
            json!("admin"),
            json!(42)
        ]
    );
}

#[tokio::test]
async fn binder_failures_do_not_reach_the_handler() {
    let fixture = fixture().await;
    let result = fixture
        .client
        .call_tool("create_customer", Some(json!([1, 2, 3])), &[])
        .await
        .expect("call");

    assert!(result.is_error);
    assert!(text_of(&result).starts_with("Error extracting arguments for create_customer:"));
    assert!(fixture.invocations.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn unknown_tool_is_an_in_band_error() {
    let fixture = fixture().await;
    let result = fixture
        .client
        .call_tool("non_existent", Some(json!({})), &[])
        .await
        .expect("call");
    assert!(result.is_error);
    assert!(text_of(&result).contains("tool not found"));
}

#[tokio::test]
async fn uri_template_read_binds_capture() {
    let fixture = fixture().await;
    let blocks = fixture
        .client
        .read_resource("customers://123")
        .await
        .expect("read");

    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].uri, "customers://123");
    assert_eq!(blocks[0].mime_type.as_deref(), Some("application/json"));
    let ResourceBody::Text(text) = &blocks[0].body else {
        panic!("expected text body");
    };
    let parsed: Value = serde_json::from_str(text).expect("json body");
    assert_eq!(parsed["id"], json!("123"));

    let invocations = fixture.invocations.lock().expect("lock");
    let (handler, args) = &invocations[0];
    assert_eq!(handler, "models.customer.Find");
    assert_eq!(args, &vec![json!("123")]);
}

#[tokio::test]
async fn unknown_resource_is_not_found() {
    let fixture = fixture().await;
    let err = fixture
        .client
        .read_resource("orders://1")
        .await
        .expect_err("must fail");
    assert!(matches!(err, McpError::NotFound(_)));
}

#[tokio::test]
async fn subscriptions_are_rejected() {
    let fixture = fixture().await;
    assert!(matches!(
        fixture.client.subscribe_resource("customers://1"),
        Err(McpError::Handler(_))
    ));
    assert!(matches!(
        fixture.client.unsubscribe_resource("customers://1"),
        Err(McpError::Handler(_))
    ));
}

#[tokio::test]
async fn cancellation_produces_in_band_error() {
    let fixture = fixture().await;
    let client = Arc::new(fixture.client);

    let worker = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.call_tool("stall", Some(json!({})), &[]).await })
    };

    let mut id = None;
    for _ in 0..100 {
        if let Some(found) = client.active_request_ids().into_iter().next() {
            id = Some(found);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let id = id.expect("active request");
    client.cancel_request(id).expect("cancel");

    let result = worker.await.expect("join").expect("call");
    assert!(result.is_error);
    assert!(text_of(&result).contains("cancelled"));
    assert!(client.active_request_ids().is_empty());

    assert!(matches!(
        client.cancel_request(id),
        Err(McpError::NotFound(_))
    ));
}

#[tokio::test]
async fn prompts_render_templates() {
    let fixture = fixture().await;
    let prompt = fixture
        .client
        .get_prompt("greet", Some(json!({"name": "Ada"})))
        .await
        .expect("prompt");
    assert_eq!(prompt.description.as_deref(), Some("Greeting"));
    let ContentBlock::Text { text } = &prompt.messages[0].content else {
        panic!("expected text message");
    };
    assert_eq!(text, "Hello Ada");

    assert!(matches!(
        fixture.client.get_prompt("missing", None).await,
        Err(McpError::NotFound(_))
    ));
}

#[tokio::test]
async fn sample_store_is_addressable_by_index() {
    let fixture = fixture().await;
    let samples = fixture
        .client
        .list_samples("tool", "test_action")
        .await
        .expect("list");
    assert_eq!(samples.len(), 2);
    assert!(samples
        .iter()
        .all(|sample| sample["itemName"] == json!("test_action")));

    let sample = fixture
        .client
        .get_sample("tool", "test_action", 1)
        .await
        .expect("get");
    assert_eq!(sample["input"]["message"], json!("test foo.bar path"));
}
