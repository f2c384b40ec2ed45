//! Streamable HTTP transport.
//!
//! Every outbound frame is POSTed on its own request. The response is either
//! a single JSON frame or a `text/event-stream` body carrying the messages
//! the server emits while servicing that request. A long-lived GET stream is
//! also attempted for server-initiated messages; servers that do not offer
//! one (HTTP 4xx) are tolerated.

use std::collections::HashMap;
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
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::codec;
use crate::transport::CHANNEL_CAPACITY;
use crate::transport::Transport;
use crate::transport::build_header_map;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

pub struct StreamableHttpTransport {
    url: Url,
    headers: HeaderMap,
    client: reqwest::Client,
    inbound_tx: Mutex<Option<mpsc::Sender<JSONRPCMessage>>>,
    shutdown: CancellationToken,
}

impl StreamableHttpTransport {
    pub fn new(url: &str, headers: &HashMap<String, String>) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|err| McpError::Config(format!("invalid HTTP URL {url}: {err}")))?;
        let header_map = build_header_map(headers)?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| McpError::Connection(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            url,
            headers: header_map,
            client,
            inbound_tx: Mutex::new(None),
            shutdown: CancellationToken::new(),
        })
    }
}

#[async_trait]
impl Transport for StreamableHttpTransport {
    async fn start(&self) -> Result<mpsc::Receiver<JSONRPCMessage>> {
        let (inbound_tx, inbound_rx) = mpsc::channel::<JSONRPCMessage>(CHANNEL_CAPACITY);
        *self.inbound_tx.lock().await = Some(inbound_tx.clone());

        let client = self.client.clone();
        let url = self.url.clone();
        let headers = self.headers.clone();
        let shutdown = self.shutdown.clone();

        // Optional listening stream for server-initiated messages.
        tokio::spawn(async move {
            loop {
                let attempt = listen_stream(&client, &url, &headers, &inbound_tx);
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    result = attempt => match result {
                        Ok(ListenOutcome::Unsupported) => break,
                        Ok(ListenOutcome::Ended) => {}
                        Err(err) => debug!("HTTP listen stream error: {err}"),
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
        let inbound_tx = {
            let guard = self.inbound_tx.lock().await;
            guard
                .as_ref()
                .cloned()
                .ok_or_else(|| McpError::State("HTTP transport is not started".to_string()))?
        };

        let body = serde_json::to_vec(&message)?;
        let response = self
            .client
            .post(self.url.clone())
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/event-stream")
            .body(body)
            .send()
            .await
            .map_err(|err| McpError::Connection(format!("HTTP POST failed: {err}")))?;

        let response = response
            .error_for_status()
            .map_err(|err| McpError::Connection(format!("HTTP POST failed: {err}")))?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if content_type.starts_with("text/event-stream") {
            // Messages produced while servicing this request stream back on
            // the response body.
            tokio::spawn(async move {
                if let Err(err) = pump_sse_body(response, &inbound_tx).await {
                    warn!("HTTP response stream error: {err}");
                }
            });
            return Ok(());
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| McpError::Connection(format!("failed to read HTTP body: {err}")))?;
        if bytes.is_empty() {
            // Accepted notification; nothing streams back.
            return Ok(());
        }

        let message = codec::decode(&bytes)?;
        inbound_tx
            .send(message)
            .await
            .map_err(|_| McpError::Connection("reader task is gone".to_string()))
    }

    async fn stop(&self) -> Result<()> {
        self.shutdown.cancel();
        self.inbound_tx.lock().await.take();
        Ok(())
    }
}

enum ListenOutcome {
    /// The server rejected the GET stream; do not retry.
    Unsupported,
    /// The stream ended; the caller may reconnect.
    Ended,
}

async fn listen_stream(
    client: &reqwest::Client,
    url: &Url,
    headers: &HeaderMap,
    inbound_tx: &mpsc::Sender<JSONRPCMessage>,
) -> Result<ListenOutcome> {
    let response = client
        .get(url.clone())
        .headers(headers.clone())
        .header(ACCEPT, "text/event-stream")
        .send()
        .await
        .map_err(|err| McpError::Connection(format!("failed to open HTTP stream: {err}")))?;

    if response.status().is_client_error() {
        debug!("server does not offer a listening stream: {}", response.status());
        return Ok(ListenOutcome::Unsupported);
    }
    if !response.status().is_success() {
        return Err(McpError::Connection(format!(
            "HTTP stream returned {}",
            response.status()
        )));
    }

    pump_sse_body(response, inbound_tx).await?;
    Ok(ListenOutcome::Ended)
}

async fn pump_sse_body(
    response: reqwest::Response,
    inbound_tx: &mpsc::Sender<JSONRPCMessage>,
) -> Result<()> {
    let mut events = response.bytes_stream().eventsource();
    while let Some(event) = events.next().await {
        let event =
            event.map_err(|err| McpError::Connection(format!("HTTP stream error: {err}")))?;
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
            Err(err) => warn!("dropping malformed HTTP payload: {err}; payload = {data}"),
        }
    }
    Ok(())
}
