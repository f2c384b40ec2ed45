//! The in-memory mapping bundle for one process-transport client.

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingData {
    #[serde(default)]
    pub tools: HashMap<String, ToolSchema>,
    #[serde(default)]
    pub resources: HashMap<String, ResourceSchema>,
    #[serde(default)]
    pub prompts: HashMap<String, PromptSchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    #[serde(default)]
    pub description: String,
    pub handler: String,
    /// JSON Schema for the tool inputs (`<tool>.in.yao`).
    #[serde(default)]
    pub input_schema: Value,
    /// Optional output schema (`<tool>.out.yao`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    /// `x-process-args` binding vector. Empty means "pass the arguments
    /// object as the single positional argument".
    #[serde(default)]
    pub process_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSchema {
    #[serde(default)]
    pub description: String,
    pub handler: String,
    /// Either a fixed URI or a template containing `{param}` placeholders.
    pub uri: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Value>,
    #[serde(default)]
    pub meta: Option<Value>,
    /// `x-process-args` binding vector. Empty means "pass the request URI
    /// as the single positional argument".
    #[serde(default)]
    pub process_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSchema {
    #[serde(default)]
    pub description: String,
    pub handler: String,
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub arguments: Vec<Value>,
    #[serde(default)]
    pub meta: Option<Value>,
}

impl MappingData {
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty() && self.resources.is_empty() && self.prompts.is_empty()
    }

    /// Merge `other` into `self`; existing keys are overwritten.
    pub fn merge(&mut self, other: MappingData) {
        self.tools.extend(other.tools);
        self.resources.extend(other.resources);
        self.prompts.extend(other.prompts);
    }

    /// Delete the named entries. Unknown names are ignored.
    pub fn remove_items(&mut self, tools: &[String], resources: &[String], prompts: &[String]) {
        for name in tools {
            self.tools.remove(name);
        }
        for name in resources {
            self.resources.remove(name);
        }
        for name in prompts {
            self.prompts.remove(name);
        }
    }
}
