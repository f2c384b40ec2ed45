//! Builds [`MappingData`] from the per-client sidecar files.
//!
//! Layout under the mapping base, with the client id `foo.bar` translated
//! to the directory `foo/bar`:
//!
//! ```text
//! <base>/foo/bar/schemes/<tool>.in.yao      required, JSON Schema
//! <base>/foo/bar/schemes/<tool>.out.yao     optional, output schema
//! <base>/foo/bar/resources/<name>.res.yao   required per resource
//! <base>/foo/bar/prompts/<name>.pmt.yao     required per prompt
//! ```
//!
//! `.jsonc`, `.json`, `.yaml`, and `.yml` are accepted wherever `.yao` is.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use mcp_types::McpError;
use mcp_types::Result;
use serde::Deserialize;
use serde_json::Value;
use tether_host::HostFs;
use tether_host::SchemaValidator;
use tether_host::parse::parse_slice;

use crate::mapping::MappingData;
use crate::mapping::PromptSchema;
use crate::mapping::ResourceSchema;
use crate::mapping::ToolSchema;
use crate::uri::UriTemplate;

const EXTENSIONS: &[&str] = &["yao", "jsonc", "json", "yaml", "yml"];
const PROCESS_ARGS_KEY: &str = "x-process-args";

/// Load the mapping for a process-transport client. The three maps come
/// from the DSL (`MCP item name -> handler name`); when all are empty the
/// filesystem is never touched.
pub async fn load_mapping(
    fs: &dyn HostFs,
    validator: &dyn SchemaValidator,
    base: &Path,
    client_id: &str,
    tools: &HashMap<String, String>,
    resources: &HashMap<String, String>,
    prompts: &HashMap<String, String>,
) -> Result<MappingData> {
    let mut mapping = MappingData::default();
    if tools.is_empty() && resources.is_empty() && prompts.is_empty() {
        return Ok(mapping);
    }

    let client_dir = base.join(client_id.replace('.', "/"));

    for (name, handler) in tools {
        let schemes = client_dir.join("schemes");
        let (in_path, input_schema) =
            read_required(fs, &schemes, &format!("{name}.in")).await?;
        validator
            .validate(&input_schema)
            .map_err(|err| McpError::Load(format!("{}: {err}", in_path.display())))?;
        let process_args = process_args_from(&input_schema, &in_path)?;

        let output_schema = match read_optional(fs, &schemes, &format!("{name}.out")).await? {
            Some((out_path, schema)) => {
                validator
                    .validate(&schema)
                    .map_err(|err| McpError::Load(format!("{}: {err}", out_path.display())))?;
                Some(schema)
            }
            None => None,
        };

        let description = input_schema
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        mapping.tools.insert(
            name.clone(),
            ToolSchema {
                description,
                handler: handler.clone(),
                input_schema,
                output_schema,
                process_args,
            },
        );
    }

    for (name, handler) in resources {
        let (path, doc) =
            read_required(fs, &client_dir.join("resources"), &format!("{name}.res")).await?;
        let file: ResourceFile = serde_json::from_value(doc.clone())
            .map_err(|err| McpError::Load(format!("{}: {err}", path.display())))?;
        // Reject malformed templates at load time, not at first read.
        UriTemplate::parse(&file.uri)
            .map_err(|err| McpError::Load(format!("{}: {err}", path.display())))?;
        let process_args = process_args_from(&doc, &path)?;

        mapping.resources.insert(
            name.clone(),
            ResourceSchema {
                description: file.description,
                handler: handler.clone(),
                uri: file.uri,
                mime_type: file.mime_type,
                parameters: file.parameters,
                meta: file.meta,
                process_args,
            },
        );
    }

    for (name, handler) in prompts {
        let (path, doc) =
            read_required(fs, &client_dir.join("prompts"), &format!("{name}.pmt")).await?;
        let file: PromptFile = serde_json::from_value(doc)
            .map_err(|err| McpError::Load(format!("{}: {err}", path.display())))?;

        mapping.prompts.insert(
            name.clone(),
            PromptSchema {
                description: file.description,
                handler: handler.clone(),
                template: file.template,
                arguments: file.arguments,
                meta: file.meta,
            },
        );
    }

    Ok(mapping)
}

#[derive(Deserialize)]
struct ResourceFile {
    #[serde(default)]
    description: String,
    uri: String,
    #[serde(default, alias = "mimeType")]
    mime_type: Option<String>,
    #[serde(default)]
    parameters: Vec<Value>,
    #[serde(default)]
    meta: Option<Value>,
}

#[derive(Deserialize)]
struct PromptFile {
    #[serde(default)]
    description: String,
    #[serde(default)]
    template: String,
    #[serde(default)]
    arguments: Vec<Value>,
    #[serde(default)]
    meta: Option<Value>,
}

async fn read_required(fs: &dyn HostFs, dir: &Path, stem: &str) -> Result<(PathBuf, Value)> {
    match read_optional(fs, dir, stem).await? {
        Some(found) => Ok(found),
        None => Err(McpError::Load(format!(
            "{}: file not found",
            dir.join(format!("{stem}.yao")).display()
        ))),
    }
}

async fn read_optional(
    fs: &dyn HostFs,
    dir: &Path,
    stem: &str,
) -> Result<Option<(PathBuf, Value)>> {
    for ext in EXTENSIONS {
        let path = dir.join(format!("{stem}.{ext}"));
        if fs.exists(&path).await {
            let bytes = fs.read(&path).await?;
            let value = parse_slice(&path, &bytes)?;
            return Ok(Some((path, value)));
        }
    }
    Ok(None)
}

fn process_args_from(doc: &Value, path: &Path) -> Result<Vec<String>> {
    match doc.get(PROCESS_ARGS_KEY) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    McpError::Load(format!(
                        "{}: `{PROCESS_ARGS_KEY}` entries must be strings",
                        path.display()
                    ))
                })
            })
            .collect(),
        Some(_) => Err(McpError::Load(format!(
            "{}: `{PROCESS_ARGS_KEY}` must be an array",
            path.display()
        ))),
    }
}
