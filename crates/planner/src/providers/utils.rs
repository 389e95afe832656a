use anyhow::{anyhow, Result};
use regex::Regex;
use reqwest::{RequestBuilder, StatusCode};
use serde_json::{json, Map, Value};

use crate::errors::AgentError;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

/// Convert internal Message format to OpenAI's API message specification
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        let mut converted = Map::new();
        converted.insert("role".to_string(), json!(message.role));
        let mut tool_calls = Vec::new();
        let mut output = Vec::new();

        for content in &message.content {
            match content {
                MessageContent::Text(text) => {
                    if !text.text.is_empty() {
                        converted.insert("content".to_string(), json!(text.text));
                    }
                }
                MessageContent::ToolRequest(request) => match &request.tool_call {
                    Ok(tool_call) => {
                        tool_calls.push(json!({
                            "id": request.id,
                            "type": "function",
                            "function": {
                                "name": sanitize_function_name(&tool_call.name),
                                "arguments": tool_call.arguments.to_string(),
                            }
                        }));
                    }
                    Err(e) => {
                        output.push(json!({
                            "role": "tool",
                            "content": format!("Error: {}", e),
                            "tool_call_id": request.id
                        }));
                    }
                },
                MessageContent::ToolResponse(response) => {
                    // The model reads the full {status, content} record, errors included
                    output.push(json!({
                        "role": "tool",
                        "content": response.tool_result.to_json_string(),
                        "tool_call_id": response.id
                    }));
                }
            }
        }

        if !tool_calls.is_empty() {
            converted.insert("tool_calls".to_string(), Value::Array(tool_calls));
        }
        if converted.contains_key("content") || converted.contains_key("tool_calls") {
            output.insert(0, Value::Object(converted));
        }
        messages_spec.extend(output);
    }

    messages_spec
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            }
        }));
    }

    Ok(result)
}

/// Build a chat-completions request body
pub fn build_openai_payload(
    model: &str,
    system: &str,
    messages: &[Message],
    tools: &[Tool],
    temperature: Option<f32>,
    max_tokens: Option<i32>,
) -> Result<Value> {
    let mut messages_array = vec![json!({"role": "system", "content": system})];
    messages_array.extend(messages_to_openai_spec(messages));

    let mut payload = Map::new();
    payload.insert("model".to_string(), json!(model));
    payload.insert("messages".to_string(), Value::Array(messages_array));

    let tools_spec = tools_to_openai_spec(tools)?;
    if !tools_spec.is_empty() {
        payload.insert("tools".to_string(), Value::Array(tools_spec));
    }
    if let Some(temp) = temperature {
        payload.insert("temperature".to_string(), json!(temp));
    }
    if let Some(tokens) = max_tokens {
        payload.insert("max_tokens".to_string(), json!(tokens));
    }

    Ok(Value::Object(payload))
}

/// Send a chat-completions request and decode the JSON body
pub async fn send_openai_request(request: RequestBuilder, payload: &Value) -> Result<Value> {
    let response = request.json(payload).send().await?;

    match response.status() {
        StatusCode::OK => Ok(response.json().await?),
        status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
            Err(anyhow!("Server error: {}", status))
        }
        status => {
            let body = response.text().await.unwrap_or_default();
            Err(anyhow!("Request failed: {} - {}", status, body))
        }
    }
}

/// Read the usage block of a chat-completions response
pub fn get_openai_usage(data: &Value) -> Result<super::base::Usage> {
    let usage = data
        .get("usage")
        .ok_or_else(|| anyhow!("No usage data in response"))?;

    let read = |key: &str| usage.get(key).and_then(|v| v.as_i64()).map(|v| v as i32);
    let input_tokens = read("prompt_tokens");
    let output_tokens = read("completion_tokens");
    let total_tokens = read("total_tokens").or(match (input_tokens, output_tokens) {
        (Some(input), Some(output)) => Some(input + output),
        _ => None,
    });

    Ok(super::base::Usage::new(
        input_tokens,
        output_tokens,
        total_tokens,
    ))
}

/// Convert OpenAI's API response to internal Message format
pub fn openai_response_to_message(response: Value) -> Result<Message> {
    if let Some(error) = response.get("error") {
        return Err(anyhow!("API error: {}", error));
    }

    let original = response
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .cloned()
        .ok_or_else(|| anyhow!("Invalid response format: missing choices[0].message"))?;
    let mut content = Vec::new();

    if let Some(text_str) = original.get("content").and_then(|t| t.as_str()) {
        content.push(MessageContent::text(text_str));
    }

    if let Some(tool_calls_array) = original.get("tool_calls").and_then(|t| t.as_array()) {
        for tool_call in tool_calls_array {
            let id = tool_call["id"].as_str().unwrap_or_default().to_string();
            let function_name = tool_call["function"]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            let arguments = tool_call["function"]["arguments"]
                .as_str()
                .unwrap_or_default()
                .to_string();

            if !is_valid_function_name(&function_name) {
                let error = AgentError::ToolNotFound(format!(
                    "The provided function name '{}' had invalid characters, it must match this regex [a-zA-Z0-9_-]+",
                    function_name
                ));
                content.push(MessageContent::tool_request(id, Err(error)));
                continue;
            }

            // Some servers send an empty string for tools that take no arguments
            let arguments = if arguments.trim().is_empty() {
                "{}".to_string()
            } else {
                arguments
            };

            match serde_json::from_str::<Value>(&arguments) {
                Ok(params) => {
                    content.push(MessageContent::tool_request(
                        id,
                        Ok(ToolCall::new(&function_name, params)),
                    ));
                }
                Err(e) => {
                    let error = AgentError::InvalidParameters(format!(
                        "Could not interpret tool use parameters for id {}: {}",
                        id, e
                    ));
                    content.push(MessageContent::tool_request(id, Err(error)));
                }
            }
        }
    }

    Ok(Message {
        role: Role::Assistant,
        created: chrono::Utc::now().timestamp(),
        content,
    })
}

fn sanitize_function_name(name: &str) -> String {
    let re = Regex::new(r"[^a-zA-Z0-9_-]").unwrap();
    re.replace_all(name, "_").to_string()
}

fn is_valid_function_name(name: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
    re.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool_result::ToolResult;

    const OPENAI_TOOL_USE_RESPONSE: &str = r#"{
        "choices": [{
            "role": "assistant",
            "message": {
                "tool_calls": [{
                    "id": "1",
                    "function": {
                        "name": "weather__get_weather_data",
                        "arguments": "{\"city\": \"Richmond VA\"}"
                    }
                }]
            }
        }],
        "usage": {
            "prompt_tokens": 10,
            "completion_tokens": 25,
            "total_tokens": 35
        }
    }"#;

    #[test]
    fn test_messages_to_openai_spec() {
        let message = Message::user().with_text("Hello");
        let spec = messages_to_openai_spec(&[message]);

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["role"], "user");
        assert_eq!(spec[0]["content"], "Hello");
    }

    #[test]
    fn test_tool_exchange_to_openai_spec() {
        let messages = vec![
            Message::user().with_text("What should I do this weekend in Richmond VA?"),
            Message::assistant().with_tool_request(
                "call_1",
                Ok(ToolCall::new("memory__get_activity_preferences", json!({}))),
            ),
            Message::user()
                .with_tool_response("call_1", ToolResult::error("Error retrieving preferences: boom")),
        ];

        let spec = messages_to_openai_spec(&messages);

        assert_eq!(spec.len(), 3);
        assert_eq!(spec[1]["role"], "assistant");
        assert_eq!(spec[1]["tool_calls"][0]["id"], "call_1");
        assert_eq!(spec[1]["tool_calls"][0]["function"]["arguments"], "{}");
        assert_eq!(spec[2]["role"], "tool");
        assert_eq!(spec[2]["tool_call_id"], "call_1");

        let body: Value = serde_json::from_str(spec[2]["content"].as_str().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({"status": "error", "content": [{"text": "Error retrieving preferences: boom"}]})
        );
    }

    #[test]
    fn test_malformed_request_becomes_tool_error() {
        let message = Message::assistant().with_tool_request(
            "bad",
            Err(AgentError::InvalidParameters("oops".to_string())),
        );
        let spec = messages_to_openai_spec(&[message]);
        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["role"], "tool");
        assert_eq!(spec[0]["content"], "Error: Invalid parameters: oops");
    }

    #[test]
    fn test_tools_to_openai_spec_duplicate() {
        let tool = Tool::new("store_results", "Store", json!({"type": "object"}));
        let result = tools_to_openai_spec(&[tool.clone(), tool]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Duplicate tool name"));
    }

    #[test]
    fn test_build_payload_omits_empty_tools() -> Result<()> {
        let payload = build_openai_payload(
            "gpt-4o",
            "You are a helpful assistant.",
            &[Message::user().with_text("hi")],
            &[],
            Some(0.2),
            None,
        )?;
        assert!(payload.get("tools").is_none());
        assert!(payload.get("max_tokens").is_none());
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][1]["content"], "hi");
        Ok(())
    }

    #[test]
    fn test_openai_response_to_message_valid_toolrequest() -> Result<()> {
        let response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        let message = openai_response_to_message(response)?;

        assert_eq!(message.content.len(), 1);
        let request = message.content[0].as_tool_request().unwrap();
        let tool_call = request.tool_call.as_ref().unwrap();
        assert_eq!(tool_call.name, "weather__get_weather_data");
        assert_eq!(tool_call.arguments, json!({"city": "Richmond VA"}));
        Ok(())
    }

    #[test]
    fn test_openai_response_to_message_empty_arguments() -> Result<()> {
        let mut response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        response["choices"][0]["message"]["tool_calls"][0]["function"]["arguments"] = json!("");

        let message = openai_response_to_message(response)?;
        let request = message.content[0].as_tool_request().unwrap();
        assert_eq!(request.tool_call.as_ref().unwrap().arguments, json!({}));
        Ok(())
    }

    #[test]
    fn test_openai_response_to_message_invalid_func_name() -> Result<()> {
        let mut response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        response["choices"][0]["message"]["tool_calls"][0]["function"]["name"] =
            json!("invalid fn");

        let message = openai_response_to_message(response)?;
        match &message.content[0].as_tool_request().unwrap().tool_call {
            Err(AgentError::ToolNotFound(msg)) => {
                assert!(msg.starts_with("The provided function name"));
            }
            _ => panic!("Expected ToolNotFound error"),
        }
        Ok(())
    }

    #[test]
    fn test_openai_response_to_message_json_decode_error() -> Result<()> {
        let mut response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        response["choices"][0]["message"]["tool_calls"][0]["function"]["arguments"] =
            json!("invalid json {");

        let message = openai_response_to_message(response)?;
        match &message.content[0].as_tool_request().unwrap().tool_call {
            Err(AgentError::InvalidParameters(msg)) => {
                assert!(msg.starts_with("Could not interpret tool use parameters"));
            }
            _ => panic!("Expected InvalidParameters error"),
        }
        Ok(())
    }

    #[test]
    fn test_openai_response_error_body() {
        let response = json!({"error": {"message": "bad key"}});
        assert!(openai_response_to_message(response).is_err());
    }

    #[test]
    fn test_usage_totals_fallback() -> Result<()> {
        let usage = get_openai_usage(&json!({"usage": {"prompt_tokens": 3, "completion_tokens": 4}}))?;
        assert_eq!(usage.total_tokens, Some(7));
        Ok(())
    }

    #[test]
    fn test_sanitize_function_name() {
        assert_eq!(sanitize_function_name("hello-world"), "hello-world");
        assert_eq!(sanitize_function_name("hello world"), "hello_world");
        assert!(is_valid_function_name("memory__store_activity_plan"));
        assert!(!is_valid_function_name("hello@world"));
    }
}
