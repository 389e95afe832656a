use serde::{Deserialize, Serialize};
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum AgentError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Failures talking to one of the managed services (browser, sandbox, memory, storage)
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Malformed response from {service}: {reason}")]
    Malformed {
        service: &'static str,
        reason: String,
    },

    #[error("{0}")]
    MissingData(String),

    #[error("{0}")]
    Other(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
