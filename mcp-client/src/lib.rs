//! Remote MCP client: transport drivers, JSON-RPC correlation, and the
//! per-client connection state machine.
//!
//! The client hides all JSON-RPC framing behind a typed API. Callers issue
//! requests through the [`ModelContextProtocolRequest`] markers from
//! `mcp-types`; the correlation layer pairs responses with their requests,
//! applies per-request deadlines, and propagates cancellation to the server
//! via `notifications/cancelled`.
//!
//! [`ModelContextProtocolRequest`]: mcp_types::ModelContextProtocolRequest

mod client;
pub mod codec;
mod events;
mod progress;
pub mod transport;

pub use client::ConnectionOptions;
pub use client::ConnectionState;
pub use client::RemoteClient;
pub use events::Event;
pub use events::HandlerId;
pub use progress::ProgressState;
