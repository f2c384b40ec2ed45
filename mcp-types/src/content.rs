//! Tool and prompt content payloads.
//!
//! `ContentBlock` is a tagged union over the content types a server may
//! return. Unknown tags deserialize into a text block carrying a diagnostic
//! string instead of failing the whole response.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde_json::Value;

use crate::McpError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: EmbeddedResource,
    },
    ResourceLink(ResourceLink),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedResource {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

impl EmbeddedResource {
    /// Decode the base64 `blob` payload, if present.
    pub fn blob_bytes(&self) -> Result<Option<Vec<u8>>> {
        self.blob.as_deref().map(decode_base64).transpose()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLink {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }
}

impl<'de> Deserialize<'de> for ContentBlock {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let parsed = match tag.as_str() {
            "text" => value
                .get("text")
                .and_then(Value::as_str)
                .map(|text| ContentBlock::Text {
                    text: text.to_string(),
                }),
            "image" => {
                let data = value.get("data").and_then(Value::as_str);
                let mime_type = value.get("mimeType").and_then(Value::as_str);
                match (data, mime_type) {
                    (Some(data), Some(mime_type)) => Some(ContentBlock::Image {
                        data: data.to_string(),
                        mime_type: mime_type.to_string(),
                    }),
                    _ => None,
                }
            }
            "resource" => value
                .get("resource")
                .cloned()
                .and_then(|resource| serde_json::from_value(resource).ok())
                .map(|resource| ContentBlock::Resource { resource }),
            "resource_link" => serde_json::from_value(value.clone())
                .ok()
                .map(ContentBlock::ResourceLink),
            _ => None,
        };

        // A malformed or unknown block degrades into a diagnostic text item
        // rather than failing the surrounding result.
        Ok(parsed.unwrap_or_else(|| ContentBlock::Text {
            text: format!("<unsupported content: {value}>"),
        }))
    }
}

pub(crate) fn decode_base64(blob: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(blob.trim())
        .map_err(|err| McpError::Protocol(format!("invalid base64 blob: {err}")))
}
