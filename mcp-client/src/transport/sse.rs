//! HTTP + Server-Sent Events transport.
//!
//! Inbound frames arrive as `data:` events on a long-lived GET stream.
//! Outbound frames are POSTed to the endpoint the server advertises in its
//! first `endpoint` event, falling back to the configured endpoint (or the
//! stream URL) until that event arrives.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use mcp_types::JSONRPCMessage;
use mcp_types::McpError;
use mcp_types::Result;
use reqwest::Url;
use reqwest::header::ACCEPT;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderMap;
use tokio::sync::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::codec;
use crate::transport::CHANNEL_CAPACITY;
use crate::transport::Transport;
use crate::transport::build_header_map;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

pub struct SseTransport {
    stream_url: Url,
    headers: HeaderMap,
    client: reqwest::Client,
    post_url: Arc<RwLock<Url>>,
    shutdown: CancellationToken,
}

impl SseTransport {
    pub fn new(
        stream_url: &str,
        endpoint: Option<&str>,
        headers: &HashMap<String, String>,
    ) -> Result<Self> {
        let stream_url = Url::parse(stream_url)
            .map_err(|err| McpError::Config(format!("invalid SSE stream URL {stream_url}: {err}")))?;
        let post_url = match endpoint {
            Some(endpoint) => stream_url.join(endpoint).map_err(|err| {
                McpError::Config(format!("invalid SSE endpoint {endpoint}: {err}"))
            })?,
            None => stream_url.clone(),
        };
        let header_map = build_header_map(headers)?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| McpError::Connection(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            stream_url,
            headers: header_map,
            client,
            post_url: Arc::new(RwLock::new(post_url)),
            shutdown: CancellationToken::new(),
        })
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn start(&self) -> Result<mpsc::Receiver<JSONRPCMessage>> {
        let (inbound_tx, inbound_rx) = mpsc::channel::<JSONRPCMessage>(CHANNEL_CAPACITY);

        let client = self.client.clone();
        let stream_url = self.stream_url.clone();
        let headers = self.headers.clone();
        let post_url = Arc::clone(&self.post_url);
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            loop {
                let attempt = run_stream(&client, &stream_url, &headers, &post_url, &inbound_tx);
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    result = attempt => {
                        if let Err(err) = result {
                            warn!("SSE stream error: {err}");
                        }
                    }
                }
                if inbound_tx.is_closed() {
                    break;
                }
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                }
            }
        });

        Ok(inbound_rx)
    }

    async fn send(&self, message: JSONRPCMessage) -> Result<()> {
        let url = self.post_url.read().await.clone();
        let body = serde_json::to_vec(&message)?;
        let response = self
            .client
            .post(url)
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|err| McpError::Connection(format!("SSE POST failed: {err}")))?;
        response
            .error_for_status()
            .map_err(|err| McpError::Connection(format!("SSE POST failed: {err}")))?;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.shutdown.cancel();
        Ok(())
    }
}

async fn run_stream(
    client: &reqwest::Client,
    stream_url: &Url,
    headers: &HeaderMap,
    post_url: &Arc<RwLock<Url>>,
    inbound_tx: &mpsc::Sender<JSONRPCMessage>,
) -> Result<()> {
    let response = client
        .get(stream_url.clone())
        .headers(headers.clone())
        .header(ACCEPT, "text/event-stream")
        .send()
        .await
        .map_err(|err| McpError::Connection(format!("failed to open SSE stream: {err}")))?;

    if !response.status().is_success() {
        let status = response.status();
        return Err(McpError::Connection(format!(
            "SSE stream returned {status}"
        )));
    }

    let mut events = response.bytes_stream().eventsource();
    while let Some(event) = events.next().await {
        let event =
            event.map_err(|err| McpError::Connection(format!("SSE stream error: {err}")))?;

        if event.event == "endpoint" {
            // The server names the POST target for this session.
            match stream_url.join(event.data.trim()) {
                Ok(resolved) => {
                    debug!("SSE endpoint event: {resolved}");
                    *post_url.write().await = resolved;
                }
                Err(err) => warn!("ignoring malformed endpoint event: {err}"),
            }
            continue;
        }

        let data = event.data.trim();
        if data.is_empty() {
            continue;
        }
        match codec::decode_str(data) {
            Ok(message) => {
                if inbound_tx.send(message).await.is_err() {
                    break;
                }
            }
            Err(err) => warn!("dropping malformed SSE payload: {err}; payload = {data}"),
        }
    }

    Ok(())
}
