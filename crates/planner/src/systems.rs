//! Tool systems exposed to the planner agent.
//!
//! Each system groups the tools that share one managed-service capability. A
//! system built without its backing service still advertises its tools, but
//! answers every call with a fixed "not enabled" result and never reaches out
//! to the network.
pub mod analysis;
pub mod memory;
pub mod sandbox;
pub mod storage;
pub mod system;
pub mod weather;

pub use system::System;

use crate::models::tool::ToolCall;
use crate::models::tool_result::ToolResult;
use crate::errors::AgentError;

/// The result returned for a tool name a system does not own
pub(crate) fn unknown_tool(tool_call: &ToolCall) -> ToolResult {
    AgentError::ToolNotFound(tool_call.name.clone()).into()
}
