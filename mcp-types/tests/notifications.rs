use mcp_types::JSONRPCMessage;
use mcp_types::ProgressNotificationParams;
use mcp_types::ProgressToken;
use mcp_types::RequestId;
use mcp_types::ServerNotification;
use pretty_assertions::assert_eq;

#[test]
fn deserialize_progress_notification() {
    let raw = r#"{
        "jsonrpc": "2.0",
        "method": "notifications/progress",
        "params": {
            "message": "Half way there",
            "progress": 0.5,
            "progressToken": 99,
            "total": 1.0
        }
    }"#;

    let msg: JSONRPCMessage = serde_json::from_str(raw).expect("invalid JSONRPCMessage");

    let JSONRPCMessage::Notification(notif) = msg else {
        unreachable!()
    };

    let server_notif: ServerNotification =
        ServerNotification::try_from(notif).expect("conversion must succeed");

    let ServerNotification::Progress(params) = server_notif else {
        unreachable!()
    };

    let expected_params = ProgressNotificationParams {
        message: Some("Half way there".into()),
        progress: 0.5,
        progress_token: ProgressToken::Integer(99),
        total: Some(1.0),
    };

    assert_eq!(params, expected_params);
}

#[test]
fn deserialize_cancelled_notification() {
    let raw = r#"{
        "jsonrpc": "2.0",
        "method": "notifications/cancelled",
        "params": { "requestId": 12, "reason": "client timeout" }
    }"#;

    let msg: JSONRPCMessage = serde_json::from_str(raw).expect("invalid JSONRPCMessage");
    let JSONRPCMessage::Notification(notif) = msg else {
        unreachable!()
    };

    let ServerNotification::Cancelled(params) =
        ServerNotification::try_from(notif).expect("conversion must succeed")
    else {
        unreachable!()
    };

    assert_eq!(params.request_id, RequestId::Integer(12));
    assert_eq!(params.reason.as_deref(), Some("client timeout"));
}

#[test]
fn list_changed_notifications_have_no_params() {
    for (method, expected) in [
        (
            "notifications/resources/list_changed",
            ServerNotification::ResourceListChanged,
        ),
        (
            "notifications/tools/list_changed",
            ServerNotification::ToolListChanged,
        ),
        (
            "notifications/prompts/list_changed",
            ServerNotification::PromptListChanged,
        ),
    ] {
        let raw = format!(r#"{{"jsonrpc": "2.0", "method": "{method}"}}"#);
        let msg: JSONRPCMessage = serde_json::from_str(&raw).expect("invalid JSONRPCMessage");
        let JSONRPCMessage::Notification(notif) = msg else {
            unreachable!()
        };
        assert_eq!(
            ServerNotification::try_from(notif).expect("conversion must succeed"),
            expected
        );
    }
}
