use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{AgentError, AgentResult};

/// A tool that can be used by a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// A JSON schema defining the expected parameters for the tool
    pub input_schema: Value,
}

impl Tool {
    /// Create a new tool with the given name and description
    pub fn new<N, D>(name: N, description: D, input_schema: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// A tool call request that a system can execute
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// The name of the tool to execute
    pub name: String,
    /// The parameters for the execution
    pub arguments: Value,
}

impl ToolCall {
    /// Create a new ToolCall with the given name and parameters
    pub fn new<S: Into<String>>(name: S, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Fetch a required string argument
    pub fn string_arg(&self, key: &str) -> AgentResult<&str> {
        self.arguments
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| AgentError::InvalidParameters(format!("{} parameter required", key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_arg() {
        let call = ToolCall::new("get_weather_data", json!({"city": "Richmond VA"}));
        assert_eq!(call.string_arg("city").unwrap(), "Richmond VA");
    }

    #[test]
    fn test_string_arg_missing_or_wrong_type() {
        let call = ToolCall::new("get_weather_data", json!({"city": 7}));
        assert_eq!(
            call.string_arg("city").unwrap_err(),
            AgentError::InvalidParameters("city parameter required".to_string())
        );
        assert!(call.string_arg("plan").is_err());
    }
}
