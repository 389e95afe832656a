use serde::{Deserialize, Serialize};
use std::fmt;

use super::content::TextContent;
use crate::errors::AgentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
}

/// The outcome of every tool call: `{"status": "success"|"error", "content": [{"text": ...}]}`
///
/// Tools never hand an error back to the agent; a failure is just a result with
/// `status: error`, so the model always sees the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub status: ToolStatus,
    pub content: Vec<TextContent>,
}

impl ToolResult {
    pub fn success<S: Into<String>>(text: S) -> Self {
        Self {
            status: ToolStatus::Success,
            content: vec![TextContent::new(text)],
        }
    }

    pub fn error<S: Into<String>>(text: S) -> Self {
        Self {
            status: ToolStatus::Error,
            content: vec![TextContent::new(text)],
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }

    /// All text blocks joined by newlines
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The wire form handed to the LLM as the tool message body
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.text())
    }
}

impl From<AgentError> for ToolResult {
    fn from(error: AgentError) -> Self {
        ToolResult::error(error.to_string())
    }
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolStatus::Success => write!(f, "success"),
            ToolStatus::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_shape() {
        let result = ToolResult::success("sunny");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"status": "success", "content": [{"text": "sunny"}]})
        );
    }

    #[test]
    fn test_error_shape_matches_success_shape() {
        let result = ToolResult::error("Error: boom");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"status": "error", "content": [{"text": "Error: boom"}]})
        );
        assert!(!result.is_success());
    }

    #[test]
    fn test_from_agent_error() {
        let result: ToolResult = AgentError::ToolNotFound("nope".to_string()).into();
        assert_eq!(result.status, ToolStatus::Error);
        assert_eq!(result.text(), "Tool not found: nope");
    }

    #[test]
    fn test_deserialize() {
        let result: ToolResult =
            serde_json::from_str(r#"{"status":"error","content":[{"text":"a"},{"text":"b"}]}"#)
                .unwrap();
        assert_eq!(result.text(), "a\nb");
    }
}
