use anyhow::{anyhow, Result};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

use crate::agent::Agent;
use crate::config::PlannerConfig;
use crate::errors::{AgentError, AgentResult, ServiceResult};
use crate::models::message::Message;
use crate::prompt_template::load_prompt_file;
use crate::providers::base::Provider;
use crate::services::browser::{ManagedBrowserClient, RemoteBrowserAgent};
use crate::services::code_interpreter::{CodeSandbox, ManagedCodeInterpreter};
use crate::services::http::ServiceClient;
use crate::services::memory::{ManagedMemoryClient, MemoryStore};
use crate::services::storage::{HttpObjectStore, ObjectStore};
use crate::systems::analysis::AnalysisSystem;
use crate::systems::memory::MemorySystem;
use crate::systems::sandbox::SandboxSystem;
use crate::systems::storage::StorageSystem;
use crate::systems::weather::{BrowserBackend, WeatherSystem};
use crate::workflow::ScriptedWorkflow;

pub const AGENT_NAME: &str = "WeatherActivityPlanner";
pub const DEFAULT_QUERY: &str = "What should I do this weekend in Richmond VA?";

/// The top-level answer to one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RunOutcome {
    Completed { result: String },
    Error { error: String },
}

/// The managed-service clients behind the tool systems.
///
/// A missing entry means the matching tools run in their disabled form.
#[derive(Clone, Default)]
pub struct PlannerServices {
    pub browser: Option<BrowserBackend>,
    pub sandbox: Option<Arc<dyn CodeSandbox>>,
    pub memory: Option<Arc<dyn MemoryStore>>,
    pub storage: Option<Arc<dyn ObjectStore>>,
}

impl PlannerServices {
    /// HTTP clients for every capability the configuration enables
    pub fn from_config(config: &PlannerConfig) -> ServiceResult<Self> {
        let capabilities = config.capabilities();
        let endpoint = config.service_endpoint();
        let token = config.agentcore_token.clone();
        let mut services = Self::default();

        if let (true, Some(browser_id)) = (capabilities.browser, &config.browser_id) {
            let http = ServiceClient::new("browser", endpoint.clone(), token.clone())?;
            let runner =
                ServiceClient::new("browser agent", &config.browser_agent_endpoint, None)?;
            services.browser = Some(BrowserBackend {
                service: Arc::new(ManagedBrowserClient::new(http, browser_id.clone())),
                automation: Arc::new(RemoteBrowserAgent::new(runner, &config.browser_model)),
            });
        }

        if let (true, Some(interpreter_id)) =
            (capabilities.code_interpreter, &config.code_interpreter_id)
        {
            let http = ServiceClient::new("code interpreter", endpoint.clone(), token.clone())?;
            services.sandbox = Some(Arc::new(ManagedCodeInterpreter::new(
                http,
                interpreter_id.clone(),
            )));
        }

        if let (true, Some(memory_id)) = (capabilities.memory, &config.memory_id) {
            let http = ServiceClient::new("memory", endpoint, token.clone())?;
            services.memory = Some(Arc::new(ManagedMemoryClient::new(http, memory_id.clone())));
        }

        let http = ServiceClient::new("storage", config.storage_endpoint(), token)?;
        services.storage = Some(Arc::new(HttpObjectStore::new(http)));

        Ok(services)
    }
}

/// The weekend activity planner: an agent wired to every tool system
pub struct Planner {
    agent: Agent,
    config: PlannerConfig,
}

impl Planner {
    /// Build the planner. Services for capabilities the configuration does not
    /// enable are ignored, so their tools stay offline.
    pub fn new(
        config: PlannerConfig,
        provider: Arc<dyn Provider>,
        services: PlannerServices,
    ) -> AgentResult<Self> {
        let capabilities = config.capabilities();
        info!(
            browser = capabilities.browser,
            code_interpreter = capabilities.code_interpreter,
            memory = capabilities.memory,
            "Capabilities"
        );

        let context = HashMap::from([("bucket", config.results_bucket.as_str())]);
        let instructions = load_prompt_file("planner.md", &context)
            .map_err(|e| AgentError::Internal(e.to_string()))?;

        let mut agent = Agent::new(provider.clone()).with_identity(AGENT_NAME, instructions);
        agent.add_system(Box::new(MemorySystem::new(
            services.memory.filter(|_| capabilities.memory),
        )));
        agent.add_system(Box::new(WeatherSystem::new(
            services.browser.filter(|_| capabilities.browser),
        )));
        agent.add_system(Box::new(AnalysisSystem::new(provider)));
        agent.add_system(Box::new(SandboxSystem::new(
            services.sandbox.filter(|_| capabilities.code_interpreter),
        )));
        if let Some(store) = services.storage {
            agent.add_system(Box::new(StorageSystem::new(
                store,
                config.results_bucket.clone(),
                config.bypass_tool_consent,
            )));
        }

        Ok(Self { agent, config })
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Answer one query, letting the model drive the tools
    pub async fn run(&self, query: Option<&str>) -> RunOutcome {
        let query = query.unwrap_or(DEFAULT_QUERY);
        info!(query, "Planning");
        outcome(self.reply_text(query).await)
    }

    /// Answer one query by walking the fixed workflow instead
    pub async fn run_scripted(&self, query: Option<&str>) -> RunOutcome {
        let query = query.unwrap_or(DEFAULT_QUERY);
        info!(query, "Planning with the scripted workflow");
        let result = ScriptedWorkflow::new(&self.agent, &self.config.results_bucket, query)
            .run()
            .await
            .map(|report| report.plan);
        outcome(result)
    }

    async fn reply_text(&self, query: &str) -> Result<String> {
        let messages = vec![Message::user().with_text(query)];
        let mut stream = self.agent.reply(&messages).await?;

        let mut last = None;
        while let Some(message) = stream.try_next().await? {
            last = Some(message);
        }

        last.as_ref()
            .and_then(|m| m.first_text())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Agent finished without a text answer"))
    }
}

fn outcome(result: Result<String>) -> RunOutcome {
    match result {
        Ok(result) => RunOutcome::Completed { result },
        Err(e) => {
            error!("Planning failed: {}", e);
            RunOutcome::Error {
                error: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool::ToolCall;
    use crate::providers::mock::{FailingProvider, MockProvider};
    use serde_json::json;

    #[test]
    fn test_outcome_shape() {
        let completed = RunOutcome::Completed {
            result: "Go hiking".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&completed).unwrap(),
            json!({"status": "completed", "result": "Go hiking"})
        );

        let failed = RunOutcome::Error {
            error: "boom".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"status": "error", "error": "boom"})
        );
    }

    #[test]
    fn test_tools_are_prefixed_by_system() {
        let planner = Planner::new(
            PlannerConfig::default(),
            Arc::new(MockProvider::new(vec![])),
            PlannerServices::default(),
        )
        .unwrap();

        let names: Vec<String> = planner
            .agent()
            .get_prefixed_tools()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "memory__store_user_preferences",
                "memory__get_activity_preferences",
                "memory__store_activity_plan",
                "weather__get_weather_data",
                "analysis__generate_analysis_code",
                "sandbox__execute_code",
            ]
        );
    }

    #[tokio::test]
    async fn test_default_query_with_everything_disabled() {
        let provider = MockProvider::new(vec![
            Message::assistant()
                .with_tool_request(
                    "1",
                    Ok(ToolCall::new("memory__get_activity_preferences", json!({}))),
                )
                .with_tool_request(
                    "2",
                    Ok(ToolCall::new(
                        "weather__get_weather_data",
                        json!({"city": "Richmond VA"}),
                    )),
                ),
            Message::assistant().with_text("Visit the Virginia Museum of Fine Arts."),
        ]);
        let planner = Planner::new(
            PlannerConfig::default(),
            Arc::new(provider.clone()),
            PlannerServices::default(),
        )
        .unwrap();

        let outcome = planner.run(None).await;

        assert_eq!(
            outcome,
            RunOutcome::Completed {
                result: "Visit the Virginia Museum of Fine Arts.".to_string()
            }
        );
        let calls = provider.calls();
        assert_eq!(
            calls[0].messages[0].first_text(),
            Some("What should I do this weekend in Richmond VA?")
        );
        assert!(calls[0].system.starts_with("You are WeatherActivityPlanner."));
        assert!(calls[0]
            .system
            .contains("9. Store results.md in bucket weather-results-bucket"));

        let results: Vec<String> = calls[1].messages[2]
            .content
            .iter()
            .filter_map(|c| c.as_tool_response())
            .map(|r| r.tool_result.text())
            .collect();
        assert_eq!(
            results,
            vec![
                "Memory not enabled. Default: outdoor activities, hiking, beaches, museums.",
                "Browser capability not enabled",
            ]
        );
    }

    #[tokio::test]
    async fn test_provider_failure_is_error_outcome() {
        let planner = Planner::new(
            PlannerConfig::default(),
            Arc::new(FailingProvider("model unavailable".to_string())),
            PlannerServices::default(),
        )
        .unwrap();

        assert_eq!(
            planner.run(Some("Plans for Boston?")).await,
            RunOutcome::Error {
                error: "model unavailable".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_from_config_only_builds_enabled_services() {
        let config = PlannerConfig {
            memory_id: Some("mem-1".to_string()),
            ..Default::default()
        };
        let services = PlannerServices::from_config(&config).unwrap();
        assert!(services.memory.is_some());
        assert!(services.browser.is_none());
        assert!(services.sandbox.is_none());
        assert!(services.storage.is_some());
    }
}
