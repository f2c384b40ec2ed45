use mcp_types::ClientCapabilities;
use mcp_types::ClientRequest;
use mcp_types::Implementation;
use mcp_types::InitializeRequestParams;
use mcp_types::JSONRPC_VERSION;
use mcp_types::JSONRPCMessage;
use mcp_types::JSONRPCRequest;
use mcp_types::RequestId;
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn deserialize_initialize_request() {
    let raw = r#"{
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "capabilities": {},
            "clientInfo": { "name": "acme-client", "title": "Acme", "version": "1.2.3" },
            "protocolVersion": "2025-06-18"
        }
    }"#;

    let msg: JSONRPCMessage =
        serde_json::from_str(raw).expect("failed to deserialize JSONRPCMessage");

    let JSONRPCMessage::Request(json_req) = msg else {
        unreachable!()
    };

    let expected_req = JSONRPCRequest {
        jsonrpc: JSONRPC_VERSION.into(),
        id: RequestId::Integer(1),
        method: "initialize".into(),
        params: Some(json!({
            "capabilities": {},
            "clientInfo": { "name": "acme-client", "title": "Acme", "version": "1.2.3" },
            "protocolVersion": "2025-06-18"
        })),
    };

    assert_eq!(json_req, expected_req);

    let client_req: ClientRequest =
        ClientRequest::try_from(json_req).expect("conversion must succeed");
    let ClientRequest::Initialize(init_params) = client_req else {
        unreachable!()
    };

    assert_eq!(
        init_params,
        InitializeRequestParams {
            capabilities: ClientCapabilities {
                experimental: None,
                roots: None,
                sampling: None,
                elicitation: None,
            },
            client_info: Implementation {
                name: "acme-client".into(),
                title: Some("Acme".to_string()),
                version: "1.2.3".into(),
            },
            protocol_version: "2025-06-18".into(),
        }
    );
}

#[test]
fn responses_and_errors_are_discriminated() {
    let response: JSONRPCMessage = serde_json::from_str(
        r#"{"jsonrpc": "2.0", "id": 7, "result": {"ok": true}}"#,
    )
    .expect("response frame");
    assert!(matches!(response, JSONRPCMessage::Response(_)));

    let error: JSONRPCMessage = serde_json::from_str(
        r#"{"jsonrpc": "2.0", "id": 7, "error": {"code": -32601, "message": "method not found"}}"#,
    )
    .expect("error frame");
    let JSONRPCMessage::Error(error) = error else {
        unreachable!()
    };
    assert_eq!(error.error.code, mcp_types::METHOD_NOT_FOUND_ERROR_CODE);
}
