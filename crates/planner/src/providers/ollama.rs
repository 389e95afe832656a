use super::base::{Provider, Usage};
use super::configs::OllamaProviderConfig;
use super::utils::{
    build_openai_payload, get_openai_usage, openai_response_to_message, send_openai_request,
};
use crate::models::message::Message;
use crate::models::tool::Tool;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

pub const OLLAMA_HOST: &str = "http://localhost:11434";
pub const OLLAMA_MODEL: &str = "qwen2.5";

/// Talks to Ollama through its OpenAI-compatible chat completions endpoint
pub struct OllamaProvider {
    client: Client,
    config: OllamaProviderConfig,
}

impl OllamaProvider {
    pub fn new(config: OllamaProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage)> {
        let payload = build_openai_payload(
            &self.config.model,
            system,
            messages,
            tools,
            self.config.temperature,
            self.config.max_tokens,
        )?;

        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );
        let response = send_openai_request(self.client.post(&url), &payload).await?;

        let message = openai_response_to_message(response.clone())?;
        let usage = get_openai_usage(&response).unwrap_or_default();

        Ok((message, usage))
    }
}
