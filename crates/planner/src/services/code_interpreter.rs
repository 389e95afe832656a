use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::http::ServiceClient;
use crate::errors::{ServiceError, ServiceResult};

/// Stream of events produced by one sandbox invocation
pub type EventStream = BoxStream<'static, ServiceResult<Value>>;

/// A managed, sandboxed code interpreter
#[async_trait]
pub trait CodeSandbox: Send + Sync {
    /// Start an interpreter session and return its id
    async fn start(&self) -> ServiceResult<String>;

    /// Invoke a named interpreter operation, streaming back its events
    async fn invoke(&self, session_id: &str, name: &str, arguments: Value)
        -> ServiceResult<EventStream>;
}

pub struct ManagedCodeInterpreter {
    http: ServiceClient,
    interpreter_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionResponse {
    session_id: String,
}

impl ManagedCodeInterpreter {
    pub fn new(http: ServiceClient, interpreter_id: impl Into<String>) -> Self {
        Self {
            http,
            interpreter_id: interpreter_id.into(),
        }
    }
}

#[async_trait]
impl CodeSandbox for ManagedCodeInterpreter {
    async fn start(&self) -> ServiceResult<String> {
        let path = format!(
            "code-interpreters/{}/sessions/start",
            urlencoding::encode(&self.interpreter_id)
        );
        let response = self
            .http
            .request(Method::PUT, &path)
            .json(&json!({
                "name": format!("planner-{}", Uuid::new_v4()),
                "sessionTimeoutSeconds": 900,
            }))
            .send()
            .await?;
        let response = self.http.check(response).await?;
        let body: StartSessionResponse = response
            .json()
            .await
            .map_err(|e| self.http.malformed(e.to_string()))?;
        Ok(body.session_id)
    }

    async fn invoke(
        &self,
        session_id: &str,
        name: &str,
        arguments: Value,
    ) -> ServiceResult<EventStream> {
        let path = format!(
            "code-interpreters/{}/tools/invoke",
            urlencoding::encode(&self.interpreter_id)
        );
        let response = self
            .http
            .request(Method::POST, &path)
            .header("x-code-interpreter-session-id", session_id)
            .json(&json!({ "name": name, "arguments": arguments }))
            .send()
            .await?;
        let response = self.http.check(response).await?;
        let service = self.http.service();

        let mut bytes = response.bytes_stream();
        let events = async_stream::stream! {
            let mut lines = LineBuffer::default();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(ServiceError::from(e));
                        return;
                    }
                };
                for line in lines.push(&chunk) {
                    match parse_event_line(service, &line) {
                        Ok(Some(event)) => yield Ok(event),
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }
            match parse_event_line(service, &lines.finish()) {
                Ok(Some(event)) => yield Ok(event),
                Ok(None) => {}
                Err(e) => yield Err(e),
            }
        };

        Ok(Box::pin(events))
    }
}

/// Splits a byte stream into lines without decoding partial characters
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append a chunk and take every line it completes
    fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            lines.push(self.pending.drain(..=newline).collect());
        }
        lines
    }

    /// Whatever followed the last newline
    fn finish(self) -> Vec<u8> {
        self.pending
    }
}

/// One event per line of newline-delimited JSON; blank lines are skipped
fn parse_event_line(service: &'static str, line: &[u8]) -> ServiceResult<Option<Value>> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(line)
        .map(Some)
        .map_err(|e| ServiceError::Malformed {
            service,
            reason: format!("bad event line: {}", e),
        })
}
