//! In-process ("process") transport: MCP tools, resources, and prompts
//! served by host-defined handlers without a network hop.
//!
//! The mapping loader reads the per-client sidecar files (input/output
//! schemas, resource descriptors, prompt templates) into a [`MappingData`]
//! bundle; the [`ProcessClient`] executes calls by binding MCP arguments to
//! handler positional arguments through the `x-process-args` mini-language.

mod binder;
mod client;
mod loader;
mod mapping;
mod samples;
mod uri;

pub use binder::bind_resource_args;
pub use binder::bind_tool_args;
pub use client::ProcessClient;
pub use loader::load_mapping;
pub use mapping::MappingData;
pub use mapping::PromptSchema;
pub use mapping::ResourceSchema;
pub use mapping::ToolSchema;
pub use samples::SampleKind;
pub use samples::SampleStore;
pub use uri::UriTemplate;
pub use uri::parse_query;
pub use uri::split_query;
