use anyhow::Result as AnyhowResult;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

use super::{unknown_tool, System};
use crate::errors::{ServiceError, ServiceResult};
use crate::models::tool::{Tool, ToolCall};
use crate::models::tool_result::ToolResult;
use crate::services::code_interpreter::CodeSandbox;

pub const CODE_INTERPRETER_DISABLED: &str = "Code Interpreter capability not enabled";

pub struct SandboxSystem {
    tools: Vec<Tool>,
    sandbox: Option<Arc<dyn CodeSandbox>>,
}

impl SandboxSystem {
    pub fn new(sandbox: Option<Arc<dyn CodeSandbox>>) -> Self {
        let execute_code = Tool::new(
            "execute_code",
            "Execute Python code in a remote sandbox and return its result.",
            json!({
                "type": "object",
                "required": ["python_code"],
                "properties": {
                    "python_code": {
                        "type": "string",
                        "description": "The Python source to run."
                    }
                }
            }),
        );

        Self {
            tools: vec![execute_code],
            sandbox,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    async fn execute_code(&self, python_code: &str) -> ToolResult {
        let Some(sandbox) = &self.sandbox else {
            return ToolResult::error(CODE_INTERPRETER_DISABLED);
        };

        match run_python(sandbox.as_ref(), python_code).await {
            Ok(result) => {
                info!("Analysis results: {}", result);
                ToolResult::success(result)
            }
            Err(e) => {
                error!("Code execution failed: {}", e);
                ToolResult::error(format!("Error: {}", e))
            }
        }
    }
}

/// Run the code in a fresh session and return the `result` of the final event.
/// Earlier events are dropped.
async fn run_python(sandbox: &dyn CodeSandbox, code: &str) -> ServiceResult<String> {
    let session_id = sandbox.start().await?;
    let mut events = sandbox
        .invoke(
            &session_id,
            "executeCode",
            json!({
                "code": code,
                "language": "python",
                "clearContext": true,
            }),
        )
        .await?;

    let mut last = None;
    while let Some(event) = events.next().await {
        let mut event = event?;
        let result = event
            .get_mut("result")
            .map(Value::take)
            .ok_or_else(|| ServiceError::MissingData("event without result".to_string()))?;
        last = Some(result);
    }

    last.map(stringify)
        .ok_or_else(|| ServiceError::MissingData("no result events".to_string()))
}

fn stringify(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[async_trait]
impl System for SandboxSystem {
    fn name(&self) -> &str {
        "sandbox"
    }

    fn description(&self) -> &str {
        "Runs generated code in a managed code interpreter"
    }

    fn instructions(&self) -> &str {
        "Use execute_code to run the code produced by generate_analysis_code. The \
        result lists each day with its GOOD, OK or POOR label."
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn status(&self) -> AnyhowResult<HashMap<String, Value>> {
        Ok(HashMap::from([(
            "enabled".to_string(),
            json!(self.sandbox.is_some()),
        )]))
    }

    async fn call(&self, tool_call: ToolCall) -> ToolResult {
        match tool_call.name.as_str() {
            "execute_code" => match tool_call.string_arg("python_code") {
                Ok(code) => self.execute_code(code).await,
                Err(e) => e.into(),
            },
            _ => unknown_tool(&tool_call),
        }
    }
}
