use anyhow::Result as AnyhowResult;
use async_trait::async_trait;
use indoc::formatdoc;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

use super::{unknown_tool, System};
use crate::models::message::Message;
use crate::models::tool::{Tool, ToolCall};
use crate::models::tool_result::ToolResult;
use crate::providers::base::Provider;

lazy_static! {
    static ref CODE_BLOCK: Regex =
        Regex::new(r"(?s)```(?:json|python)?\n(.*?)\n```").expect("code block pattern is valid");
}

const CODEGEN_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Turns raw forecast text into classification code with a plain LLM call
pub struct AnalysisSystem {
    tools: Vec<Tool>,
    provider: Arc<dyn Provider>,
}

impl AnalysisSystem {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        let generate_analysis_code = Tool::new(
            "generate_analysis_code",
            "Generate Python code that classifies each forecast day as GOOD, OK or POOR \
            for outdoor activities.",
            json!({
                "type": "object",
                "required": ["weather_data"],
                "properties": {
                    "weather_data": {
                        "type": "string",
                        "description": "The raw forecast text returned by get_weather_data."
                    }
                }
            }),
        );

        Self {
            tools: vec![generate_analysis_code],
            provider,
        }
    }

    async fn generate_analysis_code(&self, weather_data: &str) -> ToolResult {
        info!("Generating analysis code");
        let prompt = classification_prompt(weather_data);
        let messages = [Message::user().with_text(prompt)];

        match self
            .provider
            .complete(CODEGEN_SYSTEM_PROMPT, &messages, &[])
            .await
        {
            Ok((response, _usage)) => match response.first_text() {
                Some(text) => ToolResult::success(extract_code_block(text)),
                None => ToolResult::error("Error: model response contained no text"),
            },
            Err(e) => {
                error!("Code generation failed: {}", e);
                ToolResult::error(format!("Error: {}", e))
            }
        }
    }
}

pub fn classification_prompt(weather_data: &str) -> String {
    formatdoc! {"
        Create Python code to classify weather days as GOOD/OK/POOR:
        Rules: GOOD: 65-80°F clear, OK: 55-85°F partly cloudy, POOR: <55°F or >85°F
        Weather data: {weather_data}
        Return code that outputs list of tuples: [('2025-09-16', 'GOOD'), ...]"
    }
}

/// The trimmed body of the first fenced block tagged `json`, `python` or nothing.
/// Text without such a block is returned as is.
pub fn extract_code_block(text: &str) -> String {
    match CODE_BLOCK.captures(text).and_then(|c| c.get(1)) {
        Some(body) => body.as_str().trim().to_string(),
        None => text.to_string(),
    }
}

#[async_trait]
impl System for AnalysisSystem {
    fn name(&self) -> &str {
        "analysis"
    }

    fn description(&self) -> &str {
        "Writes weather classification code"
    }

    fn instructions(&self) -> &str {
        "Use generate_analysis_code on the forecast text, then run the returned code \
        with execute_code."
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn status(&self) -> AnyhowResult<HashMap<String, Value>> {
        Ok(HashMap::from([("enabled".to_string(), json!(true))]))
    }

    async fn call(&self, tool_call: ToolCall) -> ToolResult {
        match tool_call.name.as_str() {
            "generate_analysis_code" => match tool_call.string_arg("weather_data") {
                Ok(weather_data) => self.generate_analysis_code(weather_data).await,
                Err(e) => e.into(),
            },
            _ => unknown_tool(&tool_call),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::{FailingProvider, MockProvider};

    #[test]
    fn test_extract_python_block() {
        let text = "Here you go:\n```python\nprint('hi')\n```\nEnjoy";
        assert_eq!(extract_code_block(text), "print('hi')");
    }

    #[test]
    fn test_extract_first_block_only() {
        let text = "```json\n[1, 2]\n```\nand\n```python\nprint(3)\n```";
        assert_eq!(extract_code_block(text), "[1, 2]");
    }

    #[test]
    fn test_extract_untagged_block_is_trimmed() {
        let text = "```\n   days = []\nprint(days)   \n```";
        assert_eq!(extract_code_block(text), "days = []\nprint(days)");
    }

    #[test]
    fn test_no_block_returns_text_unmodified() {
        let text = "  print('no fences')\n";
        assert_eq!(extract_code_block(text), text);

        // Other info strings do not count as a fence match
        let text = "```rust\nfn main() {}\n```";
        assert_eq!(extract_code_block(text), text);
    }

    #[test]
    fn test_prompt_embeds_weather_data() {
        let prompt = classification_prompt("Sat: 72F sunny");
        assert!(prompt.starts_with("Create Python code to classify weather days as GOOD/OK/POOR:"));
        assert!(prompt.contains("Weather data: Sat: 72F sunny\n"));
        assert!(prompt.ends_with("[('2025-09-16', 'GOOD'), ...]"));
    }

    #[tokio::test]
    async fn test_generate_returns_extracted_code() {
        let provider = MockProvider::new(vec![Message::assistant()
            .with_text("Sure!\n```python\nprint([('Sat', 'GOOD')])\n```")]);
        let system = AnalysisSystem::new(Arc::new(provider.clone()));

        let result = system
            .call(ToolCall::new(
                "generate_analysis_code",
                json!({"weather_data": "Sat: 72F sunny"}),
            ))
            .await;

        assert_eq!(result, ToolResult::success("print([('Sat', 'GOOD')])"));
        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].tool_names.is_empty());
        assert!(calls[0].messages[0]
            .first_text()
            .unwrap()
            .contains("Weather data: Sat: 72F sunny"));
    }

    #[tokio::test]
    async fn test_provider_failure_is_error_result() {
        let system = AnalysisSystem::new(Arc::new(FailingProvider("rate limited".to_string())));
        let result = system
            .call(ToolCall::new(
                "generate_analysis_code",
                json!({"weather_data": "x"}),
            ))
            .await;
        assert_eq!(result, ToolResult::error("Error: rate limited"));
    }
}
