//! A fixed, code-driven alternative to letting the model choose the tool order.
//!
//! The workflow walks the same tools the agent would, in the documented order,
//! and only asks the model to write the final recommendations.
use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use tracing::{info, warn};

use crate::agent::Agent;
use crate::models::message::Message;
use crate::models::tool::ToolCall;
use crate::models::tool_result::ToolResult;
use crate::prompt_template::load_prompt_file;
use crate::systems::storage::DEFAULT_RESULTS_KEY;

lazy_static! {
    static ref CITY: Regex = Regex::new(
        r"(?i)\bin\s+([a-z][a-z .'-]*?)\s*(?:,|[?.!;]|\s+(?:this|next|on|for|during)\b|$)"
    )
    .expect("city pattern is valid");
    static ref PREFERENCES: Regex = Regex::new(
        r"(?i)\bI\s+(?:really\s+)?(?:like|love|enjoy|prefer)\s+([^.?!;]+?)\s*(?:[.?!;]|,\s*(?:what|where|when|how|which|can|could|should)\b|$)"
    )
    .expect("preferences pattern is valid");
}

const PLAN_SYSTEM_PROMPT: &str =
    "You are a Weather-Based Activity Planning Assistant. Answer with the plan only.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkflowState {
    CheckPreferences,
    FetchWeather,
    Classify,
    Execute,
    Plan,
    Persist,
    Done,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One tool call made by the workflow and what it returned
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub state: WorkflowState,
    pub tool: String,
    pub result: ToolResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
    pub city: String,
    pub plan: String,
    pub steps: Vec<StepRecord>,
}

/// Runs CheckPreferences, FetchWeather, Classify, Execute, Plan, Persist, Done.
///
/// Classify needs a forecast and Execute needs code; when either input is
/// missing the machine skips ahead to Plan, carrying the error text along.
pub struct ScriptedWorkflow<'a> {
    agent: &'a Agent,
    bucket: &'a str,
    query: &'a str,
    state: WorkflowState,
    city: String,
    preferences: String,
    forecast: String,
    code: Option<String>,
    classification: String,
    plan: String,
    steps: Vec<StepRecord>,
}

impl<'a> ScriptedWorkflow<'a> {
    pub fn new(agent: &'a Agent, bucket: &'a str, query: &'a str) -> Self {
        Self {
            agent,
            bucket,
            query,
            state: WorkflowState::CheckPreferences,
            city: String::new(),
            preferences: String::new(),
            forecast: String::new(),
            code: None,
            classification: String::new(),
            plan: String::new(),
            steps: Vec::new(),
        }
    }

    pub async fn run(mut self) -> Result<WorkflowReport> {
        self.city = extract_city(self.query)
            .ok_or_else(|| anyhow!("Could not find a city in the query: {}", self.query))?;

        while self.state != WorkflowState::Done {
            let next = self.step().await?;
            info!(from = %self.state, to = %next, "Workflow transition");
            self.state = next;
        }

        Ok(WorkflowReport {
            city: self.city,
            plan: self.plan,
            steps: self.steps,
        })
    }

    async fn step(&mut self) -> Result<WorkflowState> {
        match self.state {
            WorkflowState::CheckPreferences => {
                let recalled = self
                    .call("memory__get_activity_preferences", json!({}))
                    .await;
                self.preferences = recalled.text();

                if let Some(stated) = extract_preferences(self.query) {
                    self.call(
                        "memory__store_user_preferences",
                        json!({ "preferences": stated }),
                    )
                    .await;
                    self.preferences = format!("{}\nStated in this request: {}", self.preferences, stated);
                }
                Ok(WorkflowState::FetchWeather)
            }
            WorkflowState::FetchWeather => {
                let city = self.city.clone();
                let forecast = self
                    .call("weather__get_weather_data", json!({ "city": city }))
                    .await;
                self.forecast = forecast.text();
                if forecast.is_success() {
                    Ok(WorkflowState::Classify)
                } else {
                    self.classification = "Unavailable, no forecast.".to_string();
                    Ok(WorkflowState::Plan)
                }
            }
            WorkflowState::Classify => {
                let forecast = self.forecast.clone();
                let code = self
                    .call(
                        "analysis__generate_analysis_code",
                        json!({ "weather_data": forecast }),
                    )
                    .await;
                if code.is_success() {
                    self.code = Some(code.text());
                    Ok(WorkflowState::Execute)
                } else {
                    self.classification = code.text();
                    Ok(WorkflowState::Plan)
                }
            }
            WorkflowState::Execute => {
                let code = self.code.take().unwrap_or_default();
                let classified = self
                    .call("sandbox__execute_code", json!({ "python_code": code }))
                    .await;
                self.classification = classified.text();
                Ok(WorkflowState::Plan)
            }
            WorkflowState::Plan => {
                self.plan = self.recommend().await?;
                Ok(WorkflowState::Persist)
            }
            WorkflowState::Persist => {
                let city = self.city.clone();
                let plan = self.plan.clone();
                self.call(
                    "memory__store_activity_plan",
                    json!({ "city": city, "plan": plan }),
                )
                .await;

                let document = format!("# Weekend plan for {}\n\n{}\n", city, plan);
                let stored = self
                    .call(
                        "storage__store_results",
                        json!({ "key": DEFAULT_RESULTS_KEY, "content": document }),
                    )
                    .await;
                if !stored.is_success() {
                    warn!(bucket = self.bucket, "Results were not stored: {}", stored.text());
                }
                Ok(WorkflowState::Done)
            }
            WorkflowState::Done => Ok(WorkflowState::Done),
        }
    }

    async fn call(&mut self, tool: &str, arguments: Value) -> ToolResult {
        let result = self
            .agent
            .dispatch_tool_call(Ok(ToolCall::new(tool, arguments)))
            .await;
        self.steps.push(StepRecord {
            state: self.state,
            tool: tool.to_string(),
            result: result.clone(),
        });
        result
    }

    async fn recommend(&self) -> Result<String> {
        let context = json!({
            "query": self.query,
            "city": self.city,
            "preferences": self.preferences,
            "forecast": self.forecast,
            "classification": self.classification,
        });
        let prompt = load_prompt_file("recommend.md", &context)?;
        let messages = [Message::user().with_text(prompt)];

        let (response, _) = self
            .agent
            .provider()
            .complete(PLAN_SYSTEM_PROMPT, &messages, &[])
            .await?;
        response
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Model returned no plan text"))
    }
}

/// The place named after "in", e.g. "Richmond VA" in "...this weekend in Richmond VA?"
pub fn extract_city(query: &str) -> Option<String> {
    CITY.captures_iter(query)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|city| !city.is_empty())
        .last()
}

/// Preferences stated as "I like ...", "I love ...", "I enjoy ..." or "I prefer ..."
pub fn extract_preferences(query: &str) -> Option<String> {
    PREFERENCES
        .captures(query)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|p| !p.is_empty())
}
