//! These models represent the objects passed around by the agent
//!
//! There are a few related formats we need to interact with:
//! - openai messages/tools, sent from the agent to the LLM
//! - tool results, sent from the systems back to the agent in the
//!   `{status, content: [{text}]}` shape the prompt and the LLM rely on
//! - system requests, sent from the agent to the systems providing capabilities
//!
//! We always immediately convert those data models into the internal structs using
//! to/from helpers, so the internal models are not an exact match to any of these formats.
pub mod content;
pub mod message;
pub mod role;
pub mod tool;
pub mod tool_result;
