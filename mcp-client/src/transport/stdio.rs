//! Child-process transport speaking newline-delimited JSON over stdio.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use mcp_types::JSONRPCMessage;
use mcp_types::McpError;
use mcp_types::Result;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::process::Child;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::codec;
use crate::transport::CHANNEL_CAPACITY;
use crate::transport::Transport;

/// How long a child gets to exit after SIGTERM before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct StdioTransport {
    program: String,
    args: Vec<String>,
    extra_env: HashMap<String, String>,
    child: Mutex<Option<Child>>,
    outgoing_tx: Mutex<Option<mpsc::Sender<JSONRPCMessage>>>,
}

impl StdioTransport {
    pub fn new(program: String, args: Vec<String>, extra_env: HashMap<String, String>) -> Self {
        Self {
            program,
            args,
            extra_env,
            child: Mutex::new(None),
            outgoing_tx: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn start(&self) -> Result<mpsc::Receiver<JSONRPCMessage>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env_clear()
            .envs(create_env_for_mcp_server(&self.extra_env))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The Tokio runtime makes a best effort to reap-after-exit; the
            // explicit shutdown path below remains the primary cleanup.
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                McpError::Connection(format!("failed to spawn `{}`: {err}", self.program))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Connection("failed to capture child stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Connection("failed to capture child stdout".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            let program = self.program.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    info!("MCP server stderr ({program}): {line}");
                }
            });
        }

        let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<JSONRPCMessage>(CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel::<JSONRPCMessage>(CHANNEL_CAPACITY);

        // Writer task: drains the outgoing channel into the child's stdin.
        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(message) = outgoing_rx.recv().await {
                match codec::encode(&message) {
                    Ok(frame) => {
                        debug!("MCP message to server: {}", String::from_utf8_lossy(&frame));
                        if stdin.write_all(&frame).await.is_err() {
                            error!("failed to write frame to child stdin");
                            break;
                        }
                    }
                    Err(err) => error!("failed to encode frame: {err}"),
                }
            }
        });

        // Reader task: line-delimited JSON from the child's stdout. Exit of
        // the child ends the loop and closes the inbound stream.
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("MCP message from server: {line}");
                match codec::decode_str(&line) {
                    Ok(message) => {
                        if inbound_tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!("dropping malformed frame: {err}; line = {line}"),
                }
            }
        });

        *self.child.lock().await = Some(child);
        *self.outgoing_tx.lock().await = Some(outgoing_tx);

        Ok(inbound_rx)
    }

    async fn send(&self, message: JSONRPCMessage) -> Result<()> {
        let guard = self.outgoing_tx.lock().await;
        let tx = guard
            .as_ref()
            .ok_or_else(|| McpError::State("stdio transport is not started".to_string()))?;
        tx.send(message)
            .await
            .map_err(|_| McpError::Connection("writer task is gone".to_string()))
    }

    async fn stop(&self) -> Result<()> {
        // Dropping the sender ends the writer task and closes the child's
        // stdin, which is the polite shutdown signal.
        self.outgoing_tx.lock().await.take();

        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };

        terminate(&mut child);

        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                debug!("MCP server exited: {status}");
            }
            Ok(Err(err)) => {
                return Err(McpError::Connection(format!(
                    "failed to reap MCP server: {err}"
                )));
            }
            Err(_) => {
                warn!("MCP server ignored SIGTERM, killing");
                child
                    .start_kill()
                    .map_err(|err| McpError::Connection(format!("failed to kill child: {err}")))?;
                let _ = child.wait().await;
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        // SAFETY: plain signal send to a pid we own.
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.start_kill();
}

/// Environment variables that are always forwarded to a spawned MCP server.
///
/// MCP servers inherit only a curated subset of the environment; the
/// DSL-provided entries are layered on top and win on conflict.
#[rustfmt::skip]
#[cfg(unix)]
const DEFAULT_ENV_VARS: &[&str] = &[
    "HOME",
    "LOGNAME",
    "PATH",
    "SHELL",
    "USER",
    "__CF_USER_TEXT_ENCODING",
    "LANG",
    "LC_ALL",
    "TERM",
    "TMPDIR",
    "TZ",
];

#[cfg(windows)]
const DEFAULT_ENV_VARS: &[&str] = &[
    "PATH",
    "PATHEXT",
    "USERNAME",
    "USERDOMAIN",
    "USERPROFILE",
    "TEMP",
    "TMP",
];

fn create_env_for_mcp_server(extra_env: &HashMap<String, String>) -> HashMap<String, String> {
    DEFAULT_ENV_VARS
        .iter()
        .filter_map(|var| match std::env::var(var) {
            Ok(value) => Some((var.to_string(), value)),
            Err(_) => None,
        })
        .chain(extra_env.clone())
        .collect::<HashMap<_, _>>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_env_wins_over_inherited() {
        let var = "PATH";
        let overridden = format!("{}-extra", std::env::var(var).unwrap_or_default());
        let extra = HashMap::from([(var.to_string(), overridden.clone())]);
        let env = create_env_for_mcp_server(&extra);
        assert_eq!(env.get(var), Some(&overridden));
    }
}
