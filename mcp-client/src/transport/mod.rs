//! Transport drivers.
//!
//! Every driver implements [`Transport`]: `start` hands back the inbound
//! frame stream, `send` writes one frame, `stop` tears the connection down.
//! Drivers are single-producer for send (the client layer serializes
//! writers) and single-consumer for receive (the client's reader task).

mod http;
mod sse;
mod stdio;

use std::collections::HashMap;

use async_trait::async_trait;
use mcp_types::JSONRPCMessage;
use mcp_types::McpError;
use mcp_types::Result;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use tokio::sync::mpsc;

pub use http::StreamableHttpTransport;
pub use sse::SseTransport;
pub use stdio::StdioTransport;

/// Capacity of the bounded channels that move frames between the IO tasks
/// and the client.
pub(crate) const CHANNEL_CAPACITY: usize = 128;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the connection and return the inbound frame stream.
    async fn start(&self) -> Result<mpsc::Receiver<JSONRPCMessage>>;

    /// Write one frame. Callers are serialized by the client's send lock.
    async fn send(&self, message: JSONRPCMessage) -> Result<()>;

    /// Tear the connection down, releasing any child process or stream.
    async fn stop(&self) -> Result<()>;
}

pub(crate) fn build_header_map(headers: &HashMap<String, String>) -> Result<HeaderMap> {
    let mut header_map = HeaderMap::new();
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| McpError::Config(format!("invalid header name: {key}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| McpError::Config(format!("invalid header value for {key}")))?;
        header_map.insert(name, value);
    }
    Ok(header_map)
}
