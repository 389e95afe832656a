use anyhow::Result as AnyhowResult;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

use super::{unknown_tool, System};
use crate::models::tool::{Tool, ToolCall};
use crate::models::tool_result::ToolResult;
use crate::services::memory::MemoryStore;

// Every run reads and writes the same memory owner.
pub const ACTOR_ID: &str = "user123";
pub const SESSION_ID: &str = "session456";

pub const PREFERENCES_QUERY: &str = "What are the user's activity preferences and interests?";
pub const MAX_PREFERENCE_RESULTS: usize = 5;
pub const DEFAULT_PREFERENCES: &str = "outdoor activities, hiking, beaches, museums";

/// Remembers user preferences and finished plans across runs
pub struct MemorySystem {
    tools: Vec<Tool>,
    store: Option<Arc<dyn MemoryStore>>,
}

impl MemorySystem {
    pub fn new(store: Option<Arc<dyn MemoryStore>>) -> Self {
        let store_user_preferences = Tool::new(
            "store_user_preferences",
            "Remember the activities the user says they like.",
            json!({
                "type": "object",
                "required": ["preferences"],
                "properties": {
                    "preferences": {
                        "type": "string",
                        "description": "The user's stated preferences, e.g. \"hiking, live music\"."
                    }
                }
            }),
        );

        let get_activity_preferences = Tool::new(
            "get_activity_preferences",
            "Recall the user's stored activity preferences.",
            json!({
                "type": "object",
                "required": [],
                "properties": {}
            }),
        );

        let store_activity_plan = Tool::new(
            "store_activity_plan",
            "Remember the activity plan produced for a city.",
            json!({
                "type": "object",
                "required": ["city", "plan"],
                "properties": {
                    "city": {
                        "type": "string",
                        "description": "The city the plan is for."
                    },
                    "plan": {
                        "type": "string",
                        "description": "The recommended activities."
                    }
                }
            }),
        );

        Self {
            tools: vec![
                store_user_preferences,
                get_activity_preferences,
                store_activity_plan,
            ],
            store,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    async fn store_user_preferences(&self, preferences: &str) -> ToolResult {
        let Some(store) = &self.store else {
            return ToolResult::success("Memory not enabled. Preferences not stored.");
        };

        let metadata = HashMap::from([("type".to_string(), "preferences".to_string())]);
        let content = format!("User activity preferences: {}", preferences);
        match store.store(ACTOR_ID, SESSION_ID, &content, metadata).await {
            Ok(()) => {
                info!("Stored user preferences");
                ToolResult::success(format!("Preferences stored: {}", preferences))
            }
            Err(e) => {
                error!("Failed to store preferences: {}", e);
                ToolResult::error(format!("Error storing preferences: {}", e))
            }
        }
    }

    async fn get_activity_preferences(&self) -> ToolResult {
        let Some(store) = &self.store else {
            return ToolResult::success(format!(
                "Memory not enabled. Default: {}.",
                DEFAULT_PREFERENCES
            ));
        };

        match store
            .retrieve(PREFERENCES_QUERY, MAX_PREFERENCE_RESULTS)
            .await
        {
            Ok(records) if records.is_empty() => ToolResult::success(format!(
                "No preferences stored. Default: {}.",
                DEFAULT_PREFERENCES
            )),
            Ok(records) => {
                let contents: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();
                ToolResult::success(format!("User preferences: {}", contents.join("\n")))
            }
            Err(e) => {
                error!("Failed to retrieve preferences: {}", e);
                ToolResult::error(format!("Error retrieving preferences: {}", e))
            }
        }
    }

    async fn store_activity_plan(&self, city: &str, plan: &str) -> ToolResult {
        let Some(store) = &self.store else {
            return ToolResult::success("Memory not enabled. Plan not stored.");
        };

        let metadata = HashMap::from([
            ("city".to_string(), city.to_string()),
            ("type".to_string(), "activity_plan".to_string()),
        ]);
        let content = format!("Activity plan for {}: {}", city, plan);
        match store.store(ACTOR_ID, SESSION_ID, &content, metadata).await {
            Ok(()) => ToolResult::success(format!("Activity plan stored in memory for {}", city)),
            Err(e) => {
                error!(city, "Failed to store plan: {}", e);
                ToolResult::error(format!("Error storing plan: {}", e))
            }
        }
    }
}

#[async_trait]
impl System for MemorySystem {
    fn name(&self) -> &str {
        "memory"
    }

    fn description(&self) -> &str {
        "Long-term memory of user preferences and activity plans"
    }

    fn instructions(&self) -> &str {
        "Check get_activity_preferences before planning. When the user mentions what \
        they enjoy, save it with store_user_preferences. Save every finished plan with \
        store_activity_plan."
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn status(&self) -> AnyhowResult<HashMap<String, Value>> {
        Ok(HashMap::from([(
            "enabled".to_string(),
            json!(self.store.is_some()),
        )]))
    }

    async fn call(&self, tool_call: ToolCall) -> ToolResult {
        match tool_call.name.as_str() {
            "store_user_preferences" => match tool_call.string_arg("preferences") {
                Ok(preferences) => self.store_user_preferences(preferences).await,
                Err(e) => e.into(),
            },
            "get_activity_preferences" => self.get_activity_preferences().await,
            "store_activity_plan" => {
                match (tool_call.string_arg("city"), tool_call.string_arg("plan")) {
                    (Ok(city), Ok(plan)) => self.store_activity_plan(city, plan).await,
                    (Err(e), _) | (_, Err(e)) => e.into(),
                }
            }
            _ => unknown_tool(&tool_call),
        }
    }
}
