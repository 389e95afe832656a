use anyhow::Result as AnyhowResult;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{unknown_tool, System};
use crate::models::tool::{Tool, ToolCall};
use crate::models::tool_result::ToolResult;
use crate::services::storage::ObjectStore;

pub const DEFAULT_RESULTS_KEY: &str = "results.md";

/// Writes the finished plan to the results bucket
pub struct StorageSystem {
    tools: Vec<Tool>,
    store: Arc<dyn ObjectStore>,
    bucket: String,
    consent: bool,
}

impl StorageSystem {
    /// `consent` must be true for any write to happen; without it the tool
    /// refuses and says why.
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, consent: bool) -> Self {
        let store_results = Tool::new(
            "store_results",
            "Write a markdown document to the results bucket.",
            json!({
                "type": "object",
                "required": ["content"],
                "properties": {
                    "content": {
                        "type": "string",
                        "description": "Markdown to write."
                    },
                    "key": {
                        "type": "string",
                        "default": DEFAULT_RESULTS_KEY,
                        "description": "Object key, defaults to results.md."
                    }
                }
            }),
        );

        Self {
            tools: vec![store_results],
            store,
            bucket: bucket.into(),
            consent,
        }
    }

    async fn store_results(&self, key: &str, content: &str) -> ToolResult {
        if !self.consent {
            warn!(bucket = %self.bucket, "Refusing write without tool consent");
            return ToolResult::error(format!(
                "Tool consent required to write to {}",
                self.bucket
            ));
        }

        match self
            .store
            .put_object(&self.bucket, key, content.to_string(), "text/markdown")
            .await
        {
            Ok(()) => {
                info!(bucket = %self.bucket, key, "Stored results");
                ToolResult::success(format!("Stored {} in bucket {}", key, self.bucket))
            }
            Err(e) => {
                error!(bucket = %self.bucket, key, "Failed to store results: {}", e);
                ToolResult::error(format!("Error: {}", e))
            }
        }
    }
}

#[async_trait]
impl System for StorageSystem {
    fn name(&self) -> &str {
        "storage"
    }

    fn description(&self) -> &str {
        "Cloud storage for finished plans"
    }

    fn instructions(&self) -> &str {
        "Use store_results to save the final plan as results.md."
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn status(&self) -> AnyhowResult<HashMap<String, Value>> {
        Ok(HashMap::from([
            ("bucket".to_string(), json!(self.bucket)),
            ("consent".to_string(), json!(self.consent)),
        ]))
    }

    async fn call(&self, tool_call: ToolCall) -> ToolResult {
        match tool_call.name.as_str() {
            "store_results" => {
                let key = tool_call
                    .arguments
                    .get("key")
                    .and_then(|v| v.as_str())
                    .filter(|k| !k.is_empty())
                    .unwrap_or(DEFAULT_RESULTS_KEY);
                match tool_call.string_arg("content") {
                    Ok(content) => self.store_results(key, content).await,
                    Err(e) => e.into(),
                }
            }
            _ => unknown_tool(&tool_call),
        }
    }
}
