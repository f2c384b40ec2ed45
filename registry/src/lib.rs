//! The public client surface: a unified [`Client`] facade over the remote
//! and process client kinds, batch fan-out, and the process-global client
//! and mapping registries.

mod client;
mod registry;

pub use client::Client;
pub use client::ToolCall;
pub use registry::ClientRegistry;
pub use registry::Hosts;
