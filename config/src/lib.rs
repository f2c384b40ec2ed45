//! Declarative client configuration (`*.mcp.*` files).
//!
//! A `ClientDsl` describes one MCP client: which transport it uses, how to
//! reach the server, and which capabilities the client advertises. Every
//! string-valued field is passed through the host's `$ENV.NAME` expander at
//! load time.

mod dsl;
mod duration;

pub use dsl::ClientDsl;
pub use dsl::TransportKind;
pub use dsl::client_id_from_path;
pub use dsl::mapping_base_for;
pub use duration::parse_duration;
