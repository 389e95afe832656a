use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

use super::http::ServiceClient;
use crate::errors::ServiceResult;

/// One remembered item as returned by a retrieval
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRecord {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// A managed long-term memory store
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn store(
        &self,
        actor_id: &str,
        session_id: &str,
        content: &str,
        metadata: HashMap<String, String>,
    ) -> ServiceResult<()>;

    async fn retrieve(&self, query: &str, max_results: usize) -> ServiceResult<Vec<MemoryRecord>>;
}

pub struct ManagedMemoryClient {
    http: ServiceClient,
    memory_id: String,
}

#[derive(Debug, Deserialize)]
struct RetrieveResponse {
    #[serde(default)]
    records: Vec<MemoryRecord>,
}

impl ManagedMemoryClient {
    pub fn new(http: ServiceClient, memory_id: impl Into<String>) -> Self {
        Self {
            http,
            memory_id: memory_id.into(),
        }
    }
}

#[async_trait]
impl MemoryStore for ManagedMemoryClient {
    async fn store(
        &self,
        actor_id: &str,
        session_id: &str,
        content: &str,
        metadata: HashMap<String, String>,
    ) -> ServiceResult<()> {
        let path = format!("memories/{}/events", urlencoding::encode(&self.memory_id));
        let response = self
            .http
            .request(Method::POST, &path)
            .json(&json!({
                "actorId": actor_id,
                "sessionId": session_id,
                "eventTimestamp": chrono::Utc::now().to_rfc3339(),
                "payload": [{"content": content, "metadata": metadata}],
            }))
            .send()
            .await?;
        self.http.check(response).await?;
        Ok(())
    }

    async fn retrieve(&self, query: &str, max_results: usize) -> ServiceResult<Vec<MemoryRecord>> {
        let path = format!("memories/{}/retrieve", urlencoding::encode(&self.memory_id));
        let response = self
            .http
            .request(Method::POST, &path)
            .json(&json!({"query": query, "maxResults": max_results}))
            .send()
            .await?;
        let response = self.http.check(response).await?;
        let body: RetrieveResponse = response
            .json()
            .await
            .map_err(|e| self.http.malformed(e.to_string()))?;
        Ok(body.records)
    }
}
