//! `.jsonl`-backed training-sample lookup.
//!
//! Tool samples live at `<base>/<idPath>/schemes/<tool>.jsonl`, resource
//! samples at `<base>/<idPath>/resources/<name>.jsonl`. Every accepted line
//! is stamped with its zero-based `index` and the owning `itemName`.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use mcp_types::McpError;
use mcp_types::Result;
use serde_json::Value;
use serde_json::json;
use tether_host::HostFs;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    Tool,
    Resource,
}

impl SampleKind {
    pub fn parse(kind: &str) -> Result<Self> {
        match kind {
            "tool" => Ok(SampleKind::Tool),
            "resource" => Ok(SampleKind::Resource),
            other => Err(McpError::NotFound(format!("sample kind `{other}`"))),
        }
    }

    fn dir(self) -> &'static str {
        match self {
            SampleKind::Tool => "schemes",
            SampleKind::Resource => "resources",
        }
    }
}

pub struct SampleStore {
    fs: Arc<dyn HostFs>,
    base: PathBuf,
    client_id: String,
}

impl SampleStore {
    pub fn new(fs: Arc<dyn HostFs>, base: &Path, client_id: &str) -> Self {
        Self {
            fs,
            base: base.to_path_buf(),
            client_id: client_id.to_string(),
        }
    }

    fn sample_path(&self, kind: SampleKind, name: &str) -> PathBuf {
        self.base
            .join(self.client_id.replace('.', "/"))
            .join(kind.dir())
            .join(format!("{name}.jsonl"))
    }

    /// All accepted samples for the item. A missing file lists empty.
    pub async fn list_samples(&self, kind: SampleKind, name: &str) -> Result<Vec<Value>> {
        let path = self.sample_path(kind, name);
        let bytes = match self.fs.read(&path).await {
            Ok(bytes) => bytes,
            Err(McpError::NotFound(_)) => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        Ok(accepted_lines(&bytes, &path, name))
    }

    /// The i-th accepted sample. A missing file or out-of-range index is
    /// `NotFound`.
    pub async fn get_sample(&self, kind: SampleKind, name: &str, index: i64) -> Result<Value> {
        if index < 0 {
            return Err(McpError::NotFound(format!("sample index {index}")));
        }
        let path = self.sample_path(kind, name);
        let bytes = self.fs.read(&path).await.map_err(|err| match err {
            McpError::NotFound(_) => McpError::NotFound(format!("samples for `{name}`")),
            other => other,
        })?;
        accepted_lines(&bytes, &path, name)
            .into_iter()
            .nth(index as usize)
            .ok_or_else(|| McpError::NotFound(format!("sample index {index} for `{name}`")))
    }
}

fn accepted_lines(bytes: &[u8], path: &Path, item_name: &str) -> Vec<Value> {
    let text = String::from_utf8_lossy(bytes);
    let mut samples = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(mut sample)) => {
                sample.insert("index".to_string(), json!(samples.len()));
                sample.insert("itemName".to_string(), json!(item_name));
                samples.push(Value::Object(sample));
            }
            Ok(other) => {
                warn!(
                    "{}:{}: skipping non-object sample: {other}",
                    path.display(),
                    line_no + 1
                );
            }
            Err(err) => {
                warn!(
                    "{}:{}: skipping malformed sample: {err}",
                    path.display(),
                    line_no + 1
                );
            }
        }
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tether_host::TokioFs;

    async fn store_with(lines: &str) -> (tempfile::TempDir, SampleStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("crm/customer/schemes");
        tokio::fs::create_dir_all(&path).await.expect("mkdir");
        tokio::fs::write(path.join("test_action.jsonl"), lines)
            .await
            .expect("write");
        let store = SampleStore::new(Arc::new(TokioFs), dir.path(), "crm.customer");
        (dir, store)
    }

    #[tokio::test]
    async fn lists_and_indexes_samples() {
        let (_dir, store) = store_with(concat!(
            "{\"input\": {\"message\": \"first\"}}\n",
            "\n",
            "{\"input\": {\"message\": \"test foo.bar path\"}}\n",
        ))
        .await;

        let samples = store
            .list_samples(SampleKind::Tool, "test_action")
            .await
            .expect("list");
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0]["index"], json!(0));
        assert_eq!(samples[1]["index"], json!(1));
        assert!(samples
            .iter()
            .all(|sample| sample["itemName"] == json!("test_action")));

        let sample = store
            .get_sample(SampleKind::Tool, "test_action", 1)
            .await
            .expect("get");
        assert_eq!(sample["input"]["message"], json!("test foo.bar path"));
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped_not_fatal() {
        let (_dir, store) = store_with(concat!(
            "{\"ok\": 1}\n",
            "{broken json\n",
            "42\n",
            "{\"ok\": 2}\n",
        ))
        .await;
        let samples = store
            .list_samples(SampleKind::Tool, "test_action")
            .await
            .expect("list");
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1]["ok"], json!(2));
        assert_eq!(samples[1]["index"], json!(1));
    }

    #[tokio::test]
    async fn missing_files_and_bad_indices() {
        let (_dir, store) = store_with("{\"ok\": 1}\n").await;

        let empty = store
            .list_samples(SampleKind::Tool, "no_such_tool")
            .await
            .expect("list");
        assert!(empty.is_empty());

        assert!(matches!(
            store.get_sample(SampleKind::Tool, "no_such_tool", 0).await,
            Err(McpError::NotFound(_))
        ));
        assert!(matches!(
            store.get_sample(SampleKind::Tool, "test_action", -1).await,
            Err(McpError::NotFound(_))
        ));
        assert!(matches!(
            store.get_sample(SampleKind::Tool, "test_action", 5).await,
            Err(McpError::NotFound(_))
        ));
        assert!(matches!(
            SampleKind::parse("prompt"),
            Err(McpError::NotFound(_))
        ));
    }
}
