//! JSON-RPC 2.0 framing: one JSON document per newline-terminated frame.

use mcp_types::JSONRPCMessage;
use mcp_types::McpError;
use mcp_types::Result;

/// Serialize one frame, newline-terminated for the stream transports.
pub fn encode(message: &JSONRPCMessage) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(message)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Decode one frame. Framing and JSON errors surface as protocol errors.
pub fn decode(bytes: &[u8]) -> Result<JSONRPCMessage> {
    serde_json::from_slice(bytes)
        .map_err(|err| McpError::Protocol(format!("malformed JSON-RPC frame: {err}")))
}

pub fn decode_str(line: &str) -> Result<JSONRPCMessage> {
    decode(line.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_types::JSONRPC_VERSION;
    use mcp_types::JSONRPCRequest;
    use mcp_types::RequestId;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn encode_is_newline_terminated() {
        let message = JSONRPCMessage::Request(JSONRPCRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: RequestId::Integer(1),
            method: "tools/list".to_string(),
            params: None,
        });
        let bytes = encode(&message).expect("encode");
        assert_eq!(bytes.last(), Some(&b'\n'));
        assert_eq!(decode(&bytes[..bytes.len() - 1]).expect("decode"), message);
    }

    #[test]
    fn params_are_omitted_when_absent() {
        let message = JSONRPCMessage::Request(JSONRPCRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: RequestId::Integer(2),
            method: "ping".to_string(),
            params: None,
        });
        let bytes = encode(&message).expect("encode");
        let value: serde_json::Value =
            serde_json::from_slice(&bytes[..bytes.len() - 1]).expect("json");
        assert_eq!(value, json!({"jsonrpc": "2.0", "id": 2, "method": "ping"}));
    }

    #[test]
    fn garbage_is_a_protocol_error() {
        let err = decode(b"{not json").expect_err("must fail");
        assert!(matches!(err, McpError::Protocol(_)));
    }
}
