use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use super::http::ServiceClient;
use crate::errors::{ServiceError, ServiceResult};

/// Connection timeout applied to every automation session
pub const BROWSER_CONNECT_TIMEOUT: Duration = Duration::from_millis(150_000);

/// A started remote browser: where to connect and how to authenticate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBrowser {
    pub session_id: String,
    pub ws_url: String,
    pub headers: HashMap<String, String>,
}

/// How the automation agent should connect to a [`RemoteBrowser`]
#[derive(Debug, Clone, Serialize)]
pub struct BrowserProfile {
    pub headers: HashMap<String, String>,
    #[serde(rename = "timeout_ms", serialize_with = "serialize_millis")]
    pub timeout: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// The record of an automation run; each step is the action the agent took
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct AgentHistory {
    #[serde(default)]
    pub actions: Vec<Value>,
}

impl AgentHistory {
    pub fn last_action(&self) -> Option<&Value> {
        self.actions.last()
    }

    /// The text of the final `done` action, if the run ended with one
    pub fn done_text(&self) -> Option<&str> {
        self.last_action()?.get("done")?.get("text")?.as_str()
    }
}

/// The managed service that hosts remote browsers
#[async_trait]
pub trait BrowserService: Send + Sync {
    async fn start(&self) -> ServiceResult<RemoteBrowser>;
    async fn stop(&self, session_id: &str) -> ServiceResult<()>;
}

/// An LLM-driven browser agent able to attach to a remote browser
#[async_trait]
pub trait BrowserAutomation: Send + Sync {
    async fn connect(
        &self,
        browser: &RemoteBrowser,
        profile: &BrowserProfile,
    ) -> ServiceResult<Box<dyn AutomationSession>>;
}

/// A live automation session; must be closed once it is no longer needed
#[async_trait]
pub trait AutomationSession: Send + Sync {
    async fn run(&self, task: &str) -> ServiceResult<AgentHistory>;
    async fn close(&self) -> ServiceResult<()>;
}

/// Browser sessions on the managed tool gateway
pub struct ManagedBrowserClient {
    http: ServiceClient,
    browser_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionResponse {
    session_id: String,
    streams: SessionStreams,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionStreams {
    automation_stream: StreamEndpoint,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamEndpoint {
    stream_endpoint: String,
}

impl ManagedBrowserClient {
    pub fn new(http: ServiceClient, browser_id: impl Into<String>) -> Self {
        Self {
            http,
            browser_id: browser_id.into(),
        }
    }

    fn ws_headers(&self, session_id: &str) -> HashMap<String, String> {
        let mut headers = HashMap::from([
            ("X-Browser-Id".to_string(), self.browser_id.clone()),
            ("X-Session-Id".to_string(), session_id.to_string()),
        ]);
        if let Some(token) = self.http.token() {
            headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        }
        headers
    }
}

#[async_trait]
impl BrowserService for ManagedBrowserClient {
    async fn start(&self) -> ServiceResult<RemoteBrowser> {
        let path = format!(
            "browsers/{}/sessions/start",
            urlencoding::encode(&self.browser_id)
        );
        let response = self
            .http
            .request(Method::PUT, &path)
            .json(&json!({
                "name": format!("planner-{}", Uuid::new_v4()),
                "sessionTimeoutSeconds": 3600,
            }))
            .send()
            .await?;
        let response = self.http.check(response).await?;
        let body: StartSessionResponse = response
            .json()
            .await
            .map_err(|e| self.http.malformed(e.to_string()))?;

        let headers = self.ws_headers(&body.session_id);
        Ok(RemoteBrowser {
            session_id: body.session_id,
            ws_url: body.streams.automation_stream.stream_endpoint,
            headers,
        })
    }

    async fn stop(&self, session_id: &str) -> ServiceResult<()> {
        let path = format!(
            "browsers/{}/sessions/stop?sessionId={}",
            urlencoding::encode(&self.browser_id),
            urlencoding::encode(session_id)
        );
        let response = self.http.request(Method::PUT, &path).send().await?;
        self.http.check(response).await?;
        Ok(())
    }
}

/// A browser-use style agent hosted behind an HTTP runner
pub struct RemoteBrowserAgent {
    http: ServiceClient,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ConnectResponse {
    id: String,
}

impl RemoteBrowserAgent {
    pub fn new(http: ServiceClient, model: impl Into<String>) -> Self {
        Self {
            http,
            model: model.into(),
        }
    }
}

#[async_trait]
impl BrowserAutomation for RemoteBrowserAgent {
    async fn connect(
        &self,
        browser: &RemoteBrowser,
        profile: &BrowserProfile,
    ) -> ServiceResult<Box<dyn AutomationSession>> {
        let response = self
            .http
            .request(Method::POST, "sessions")
            .json(&json!({
                "cdp_url": browser.ws_url,
                "browser_profile": profile,
                "keep_alive": true,
                "llm": {"model_id": self.model},
            }))
            .send()
            .await?;
        let response = self.http.check(response).await?;
        let body: ConnectResponse = response
            .json()
            .await
            .map_err(|e| self.http.malformed(e.to_string()))?;

        Ok(Box::new(RemoteAutomationSession {
            http: self.http.clone(),
            id: body.id,
        }))
    }
}

struct RemoteAutomationSession {
    http: ServiceClient,
    id: String,
}

#[async_trait]
impl AutomationSession for RemoteAutomationSession {
    async fn run(&self, task: &str) -> ServiceResult<AgentHistory> {
        let path = format!("sessions/{}/run", urlencoding::encode(&self.id));
        let response = self
            .http
            .request(Method::POST, &path)
            .json(&json!({ "task": task }))
            .send()
            .await?;
        let response = self.http.check(response).await?;
        response
            .json()
            .await
            .map_err(|e| self.http.malformed(e.to_string()))
    }

    async fn close(&self) -> ServiceResult<()> {
        let path = format!("sessions/{}", urlencoding::encode(&self.id));
        let response = self.http.request(Method::DELETE, &path).send().await?;
        match self.http.check(response).await {
            Ok(_) => Ok(()),
            // Already gone is as good as closed
            Err(ServiceError::Status { status: 404, .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
