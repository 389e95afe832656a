use config::{Config, Environment};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::providers::configs::{OllamaProviderConfig, OpenAiProviderConfig, ProviderConfig};
use crate::providers::ollama;

pub const DEFAULT_RESULTS_BUCKET: &str = "weather-results-bucket";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_BROWSER_MODEL: &str = "us.anthropic.claude-3-7-sonnet-20250219-v1:0";
pub const DEFAULT_BROWSER_AGENT_ENDPOINT: &str = "http://localhost:9242";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Unknown provider '{0}', expected one of: openai, ollama")]
    UnknownProvider(String),

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Which of the optional managed-service integrations are switched on.
///
/// Derived once from [`PlannerConfig`]: an integration is enabled exactly when its
/// identifier is present and non-empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub browser: bool,
    pub code_interpreter: bool,
    pub memory: bool,
}

/// Process configuration, read from the environment once and then passed by
/// reference to whatever needs it.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerConfig {
    #[serde(default)]
    pub browser_id: Option<String>,
    #[serde(default)]
    pub code_interpreter_id: Option<String>,
    #[serde(default)]
    pub memory_id: Option<String>,
    #[serde(default = "default_results_bucket")]
    pub results_bucket: String,
    #[serde(default = "default_region")]
    pub aws_region: String,

    /// Base URL of the managed browser, code interpreter and memory services
    #[serde(default)]
    pub agentcore_endpoint: Option<String>,
    #[serde(default)]
    pub agentcore_token: Option<String>,
    /// Base URL of the object store holding the results bucket
    #[serde(default)]
    pub storage_endpoint: Option<String>,
    /// Base URL of the runner hosting the LLM-driven browser agent
    #[serde(default = "default_browser_agent_endpoint")]
    pub browser_agent_endpoint: String,
    #[serde(default = "default_browser_model")]
    pub browser_model: String,

    #[serde(default = "default_provider")]
    pub planner_provider: String,
    #[serde(default = "default_openai_host")]
    pub openai_host: String,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_ollama_host")]
    pub ollama_host: String,
    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,

    /// Set by the entry point; never read from the environment
    #[serde(skip)]
    pub bypass_tool_consent: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            browser_id: None,
            code_interpreter_id: None,
            memory_id: None,
            results_bucket: default_results_bucket(),
            aws_region: default_region(),
            agentcore_endpoint: None,
            agentcore_token: None,
            storage_endpoint: None,
            browser_agent_endpoint: default_browser_agent_endpoint(),
            browser_model: default_browser_model(),
            planner_provider: default_provider(),
            openai_host: default_openai_host(),
            openai_api_key: None,
            openai_model: default_openai_model(),
            ollama_host: default_ollama_host(),
            ollama_model: default_ollama_model(),
            bypass_tool_consent: false,
        }
    }
}

impl PlannerConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::default())
    }

    /// Load from an explicit set of variables, as if they were the environment
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::load(Environment::default().source(Some(vars)))
    }

    fn load(source: Environment) -> Result<Self, ConfigError> {
        let config = Config::builder().add_source(source).build()?;

        match config.try_deserialize::<Self>() {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);
                if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: field.to_uppercase(),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            browser: is_set(&self.browser_id),
            code_interpreter: is_set(&self.code_interpreter_id),
            memory: is_set(&self.memory_id),
        }
    }

    pub fn service_endpoint(&self) -> String {
        self.agentcore_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://bedrock-agentcore.{}.amazonaws.com", self.aws_region))
    }

    pub fn storage_endpoint(&self) -> String {
        self.storage_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", self.aws_region))
    }

    pub fn provider_config(&self) -> Result<ProviderConfig, ConfigError> {
        match self.planner_provider.to_lowercase().as_str() {
            "openai" => {
                let api_key = self.openai_api_key.clone().ok_or(ConfigError::MissingEnvVar {
                    env_var: "OPENAI_API_KEY".to_string(),
                })?;
                Ok(ProviderConfig::OpenAi(OpenAiProviderConfig {
                    host: self.openai_host.clone(),
                    api_key,
                    model: self.openai_model.clone(),
                    temperature: None,
                    max_tokens: None,
                }))
            }
            "ollama" => Ok(ProviderConfig::Ollama(OllamaProviderConfig {
                host: self.ollama_host.clone(),
                model: self.ollama_model.clone(),
                temperature: None,
                max_tokens: None,
            })),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

fn default_results_bucket() -> String {
    DEFAULT_RESULTS_BUCKET.to_string()
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_browser_agent_endpoint() -> String {
    DEFAULT_BROWSER_AGENT_ENDPOINT.to_string()
}

fn default_browser_model() -> String {
    DEFAULT_BROWSER_MODEL.to_string()
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_openai_host() -> String {
    "https://api.openai.com".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o".to_string()
}

fn default_ollama_host() -> String {
    ollama::OLLAMA_HOST.to_string()
}

fn default_ollama_model() -> String {
    ollama::OLLAMA_MODEL.to_string()
}
