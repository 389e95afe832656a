use anyhow::Result;
use futures::stream::BoxStream;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::errors::{AgentError, AgentResult};
use crate::models::message::{Message, ToolRequest};
use crate::models::tool::{Tool, ToolCall};
use crate::models::tool_result::ToolResult;
use crate::prompt_template::load_prompt_file;
use crate::providers::base::Provider;
use crate::systems::System;

/// Separates the system name from the tool name in the names the model sees
pub const TOOL_SEPARATOR: &str = "__";

#[derive(Clone, Debug, Serialize)]
struct SystemInfo {
    name: String,
    description: String,
    instructions: String,
    tools: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct SystemStatus {
    name: String,
    status: String,
}

#[derive(Serialize)]
struct PromptContext<'a> {
    name: &'a str,
    instructions: &'a str,
    systems: Vec<SystemInfo>,
    statuses: Vec<SystemStatus>,
}

/// Agent integrates a foundational LLM with the systems it needs to pilot
pub struct Agent {
    name: String,
    instructions: String,
    systems: Vec<Box<dyn System>>,
    provider: Arc<dyn Provider>,
}

impl Agent {
    /// Create a new Agent with the specified provider
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            name: "an assistant".to_string(),
            instructions: String::new(),
            systems: Vec::new(),
            provider,
        }
    }

    /// Give the agent a name and the instructions that open its system prompt
    pub fn with_identity<N, I>(mut self, name: N, instructions: I) -> Self
    where
        N: Into<String>,
        I: Into<String>,
    {
        self.name = name.into();
        self.instructions = instructions.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a system to the agent
    pub fn add_system(&mut self, system: Box<dyn System>) {
        self.systems.push(system);
    }

    pub fn provider(&self) -> Arc<dyn Provider> {
        self.provider.clone()
    }

    /// Get all tools from all systems with proper system prefixing
    pub fn get_prefixed_tools(&self) -> Vec<Tool> {
        let mut tools = Vec::new();
        for system in &self.systems {
            for tool in system.tools() {
                tools.push(Tool::new(
                    prefixed_name(system.name(), &tool.name),
                    &tool.description,
                    tool.input_schema.clone(),
                ));
            }
        }
        tools
    }

    /// Find the appropriate system for a tool call based on the prefixed name
    fn get_system_for_tool(&self, prefixed_name: &str) -> Option<&dyn System> {
        let (system_name, _) = prefixed_name.split_once(TOOL_SEPARATOR)?;
        self.systems
            .iter()
            .find(|sys| sys.name() == system_name)
            .map(|v| &**v)
    }

    /// Dispatch a single tool call to the appropriate system.
    ///
    /// Calls that cannot be routed come back as error results, just like a
    /// failing tool, so the model can read what went wrong.
    pub async fn dispatch_tool_call(&self, tool_call: AgentResult<ToolCall>) -> ToolResult {
        let call = match tool_call {
            Ok(call) => call,
            Err(e) => return e.into(),
        };

        let Some(system) = self.get_system_for_tool(&call.name) else {
            return AgentError::ToolNotFound(call.name).into();
        };
        let tool_name = match call.name.split_once(TOOL_SEPARATOR) {
            Some((_, tool_name)) if !tool_name.is_empty() => tool_name,
            _ => return AgentError::ToolNotFound(call.name.clone()).into(),
        };

        debug!(tool = %call.name, "Dispatching tool call");
        system
            .call(ToolCall::new(tool_name, call.arguments.clone()))
            .await
    }

    /// Render the system prompt, including the current status of each system
    pub async fn get_system_prompt(&self) -> AgentResult<String> {
        let systems = self
            .systems
            .iter()
            .map(|system| SystemInfo {
                name: system.name().to_string(),
                description: system.description().to_string(),
                instructions: system.instructions().to_string(),
                tools: system
                    .tools()
                    .iter()
                    .map(|tool| prefixed_name(system.name(), &tool.name))
                    .collect(),
            })
            .collect();

        let mut statuses = Vec::new();
        for system in &self.systems {
            let status = system
                .status()
                .await
                .map_err(|e| AgentError::Internal(e.to_string()))?;
            statuses.push(SystemStatus {
                name: system.name().to_string(),
                status: format_status(status),
            });
        }

        let context = PromptContext {
            name: &self.name,
            instructions: &self.instructions,
            systems,
            statuses,
        };
        load_prompt_file("system.md", &context).map_err(|e| AgentError::Internal(e.to_string()))
    }

    /// Create a stream that yields each message as it's generated by the agent.
    /// This includes both the assistant's responses and any tool responses.
    pub async fn reply(&self, messages: &[Message]) -> Result<BoxStream<'_, Result<Message>>> {
        let mut messages = messages.to_vec();
        let tools = self.get_prefixed_tools();
        let system_prompt = self.get_system_prompt().await?;

        Ok(Box::pin(async_stream::try_stream! {
            loop {
                // Get completion from provider
                let (response, _) = self.provider.complete(
                    &system_prompt,
                    &messages,
                    &tools,
                ).await?;

                yield response.clone();

                // Make sure the message above reaches the caller before the
                // potentially long-running tool calls start
                tokio::task::yield_now().await;

                // First collect any tool requests
                let tool_requests: Vec<&ToolRequest> = response.content
                    .iter()
                    .filter_map(|content| content.as_tool_request())
                    .collect();

                if tool_requests.is_empty() {
                    // No more tool calls, end the reply loop
                    break;
                }

                // Then dispatch each in parallel
                let futures: Vec<_> = tool_requests
                    .iter()
                    .map(|request| self.dispatch_tool_call(request.tool_call.clone()))
                    .collect();

                // Process all the futures in parallel but wait until all are finished
                let outputs = futures::future::join_all(futures).await;

                // Create a message with the responses, matched up by request id
                let mut message_tool_response = Message::user();
                for (request, output) in tool_requests.iter().zip(outputs.into_iter()) {
                    message_tool_response = message_tool_response.with_tool_response(
                        request.id.clone(),
                        output,
                    );
                }

                yield message_tool_response.clone();

                messages.push(response.clone());
                messages.push(message_tool_response);
            }
        }))
    }
}

fn prefixed_name(system: &str, tool: &str) -> String {
    format!("{}{}{}", system, TOOL_SEPARATOR, tool)
}

/// `key=value` pairs in a stable order
fn format_status(status: HashMap<String, Value>) -> String {
    let sorted: BTreeMap<String, Value> = status.into_iter().collect();
    sorted
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(", ")
}
