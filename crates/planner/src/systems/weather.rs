use anyhow::Result as AnyhowResult;
use async_trait::async_trait;
use indoc::formatdoc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{unknown_tool, System};
use crate::errors::{ServiceError, ServiceResult};
use crate::models::tool::{Tool, ToolCall};
use crate::models::tool_result::ToolResult;
use crate::services::browser::{
    AutomationSession, BrowserAutomation, BrowserProfile, BrowserService, RemoteBrowser,
    BROWSER_CONNECT_TIMEOUT,
};

pub const BROWSER_DISABLED: &str = "Browser capability not enabled";
pub const NO_DATA: &str = "NO Data";

/// The remote browser plus the agent that drives it
#[derive(Clone)]
pub struct BrowserBackend {
    pub service: Arc<dyn BrowserService>,
    pub automation: Arc<dyn BrowserAutomation>,
}

pub struct WeatherSystem {
    tools: Vec<Tool>,
    backend: Option<BrowserBackend>,
}

impl WeatherSystem {
    pub fn new(backend: Option<BrowserBackend>) -> Self {
        let get_weather_data = Tool::new(
            "get_weather_data",
            "Get the 8-day weather forecast for a city by browsing weather.gov. \
            Returns the forecast text extracted by the browser agent.",
            json!({
                "type": "object",
                "required": ["city"],
                "properties": {
                    "city": {
                        "type": "string",
                        "description": "The city to look up, e.g. \"Richmond VA\"."
                    }
                }
            }),
        );

        Self {
            tools: vec![get_weather_data],
            backend,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    async fn get_weather_data(&self, city: &str) -> ToolResult {
        let Some(backend) = &self.backend else {
            return ToolResult::error(BROWSER_DISABLED);
        };

        info!(city, "Getting weather data");
        match fetch_forecast(backend, city).await {
            Ok(forecast) => {
                info!(city, "Weather data retrieved");
                ToolResult::success(forecast)
            }
            Err(e) => {
                error!(city, "Weather lookup failed: {}", e);
                ToolResult::error(format!("Error: {}", e))
            }
        }
    }
}

/// The browser agent's instructions for one city
pub fn forecast_task(city: &str) -> String {
    formatdoc! {"
        Extract 8-Day Weather Forecast for {city} from weather.gov
        Steps:
        - Go to https://weather.gov
        - Search for \"{city}\" and click GO
        - Click \"Printable Forecast\" link
        - Extract date, high, low, conditions, wind, precip for each day
        - Return JSON array of daily forecasts"
    }
}

/// Start a remote browser, run the forecast task in it and stop it again.
///
/// The remote session is stopped on every path once it has started.
async fn fetch_forecast(backend: &BrowserBackend, city: &str) -> ServiceResult<String> {
    let browser = backend.service.start().await?;
    debug!(
        "Browser automation endpoint: {}",
        browser.ws_url.chars().take(50).collect::<String>()
    );

    let result = run_in_browser(backend.automation.as_ref(), &browser, city).await;

    if let Err(e) = backend.service.stop(&browser.session_id).await {
        warn!(session_id = %browser.session_id, "Failed to stop browser session: {}", e);
    }
    result
}

/// Connect to the browser and run the task; the connected session is closed
/// exactly once, whatever the task does.
async fn run_in_browser(
    automation: &dyn BrowserAutomation,
    browser: &RemoteBrowser,
    city: &str,
) -> ServiceResult<String> {
    let profile = BrowserProfile {
        headers: browser.headers.clone(),
        timeout: BROWSER_CONNECT_TIMEOUT,
    };
    let session = automation.connect(browser, &profile).await?;

    let result = run_task(session.as_ref(), &forecast_task(city)).await;

    if let Err(e) = session.close().await {
        warn!("Failed to close browser session: {}", e);
    }
    result
}

async fn run_task(session: &dyn AutomationSession, task: &str) -> ServiceResult<String> {
    info!("Starting browser task");
    let history = session.run(task).await?;
    info!(steps = history.actions.len(), "Browser task finished");

    history
        .done_text()
        .map(str::to_string)
        .ok_or_else(|| ServiceError::MissingData(NO_DATA.to_string()))
}

#[async_trait]
impl System for WeatherSystem {
    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "Looks up weather forecasts by driving a remote browser"
    }

    fn instructions(&self) -> &str {
        "Use get_weather_data with the city from the user's query. The result is raw \
        forecast text; pass it unchanged to the analysis tool."
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn status(&self) -> AnyhowResult<HashMap<String, Value>> {
        Ok(HashMap::from([(
            "enabled".to_string(),
            json!(self.backend.is_some()),
        )]))
    }

    async fn call(&self, tool_call: ToolCall) -> ToolResult {
        match tool_call.name.as_str() {
            "get_weather_data" => match tool_call.string_arg("city") {
                Ok(city) => self.get_weather_data(city).await,
                Err(e) => e.into(),
            },
            _ => unknown_tool(&tool_call),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool_result::ToolStatus;
    use crate::services::browser::AgentHistory;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Counters {
        starts: AtomicUsize,
        stops: AtomicUsize,
        connects: AtomicUsize,
        closes: AtomicUsize,
        tasks: Mutex<Vec<String>>,
    }

    enum Script {
        Done(&'static str),
        NoDone,
        RunFails,
        ConnectFails,
        StartFails,
    }

    struct FakeBrowser {
        counters: Arc<Counters>,
        script: Script,
        cleanup_fails: bool,
    }

    #[async_trait]
    impl BrowserService for FakeBrowser {
        async fn start(&self) -> ServiceResult<RemoteBrowser> {
            self.counters.starts.fetch_add(1, Ordering::SeqCst);
            if let Script::StartFails = self.script {
                return Err(ServiceError::Other("no capacity".to_string()));
            }
            Ok(RemoteBrowser {
                session_id: "sess-1".to_string(),
                ws_url: "wss://browser.test/automation/sess-1".to_string(),
                headers: HashMap::from([("X-Session-Id".to_string(), "sess-1".to_string())]),
            })
        }

        async fn stop(&self, _session_id: &str) -> ServiceResult<()> {
            self.counters.stops.fetch_add(1, Ordering::SeqCst);
            if self.cleanup_fails {
                return Err(ServiceError::Other("stop timed out".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl BrowserAutomation for FakeBrowser {
        async fn connect(
            &self,
            browser: &RemoteBrowser,
            profile: &BrowserProfile,
        ) -> ServiceResult<Box<dyn AutomationSession>> {
            assert_eq!(profile.timeout, BROWSER_CONNECT_TIMEOUT);
            assert_eq!(profile.headers, browser.headers);
            self.counters.connects.fetch_add(1, Ordering::SeqCst);
            match self.script {
                Script::ConnectFails => Err(ServiceError::Other("cdp refused".to_string())),
                Script::Done(text) => Ok(Box::new(FakeSession {
                    counters: self.counters.clone(),
                    cleanup_fails: self.cleanup_fails,
                    outcome: Ok(AgentHistory {
                        actions: vec![json!({"done": {"text": text}})],
                    }),
                })),
                Script::NoDone => Ok(Box::new(FakeSession {
                    counters: self.counters.clone(),
                    cleanup_fails: self.cleanup_fails,
                    outcome: Ok(AgentHistory {
                        actions: vec![json!({"go_to_url": {"url": "https://weather.gov"}})],
                    }),
                })),
                _ => Ok(Box::new(FakeSession {
                    counters: self.counters.clone(),
                    cleanup_fails: self.cleanup_fails,
                    outcome: Err("agent crashed".to_string()),
                })),
            }
        }
    }

    struct FakeSession {
        counters: Arc<Counters>,
        cleanup_fails: bool,
        outcome: Result<AgentHistory, String>,
    }

    #[async_trait]
    impl AutomationSession for FakeSession {
        async fn run(&self, task: &str) -> ServiceResult<AgentHistory> {
            self.counters.tasks.lock().unwrap().push(task.to_string());
            self.outcome.clone().map_err(ServiceError::Other)
        }

        async fn close(&self) -> ServiceResult<()> {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
            if self.cleanup_fails {
                return Err(ServiceError::Other("socket already gone".to_string()));
            }
            Ok(())
        }
    }

    fn system(script: Script) -> (WeatherSystem, Arc<Counters>) {
        build(script, false)
    }

    fn build(script: Script, cleanup_fails: bool) -> (WeatherSystem, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let fake = Arc::new(FakeBrowser {
            counters: counters.clone(),
            script,
            cleanup_fails,
        });
        let system = WeatherSystem::new(Some(BrowserBackend {
            service: fake.clone(),
            automation: fake,
        }));
        (system, counters)
    }

    fn call(city: &str) -> ToolCall {
        ToolCall::new("get_weather_data", json!({ "city": city }))
    }

    #[tokio::test]
    async fn test_disabled_returns_fixed_error() {
        let system = WeatherSystem::disabled();
        for city in ["Richmond VA", "", "Paris"] {
            let result = system.call(call(city)).await;
            assert_eq!(result, ToolResult::error("Browser capability not enabled"));
        }
    }

    #[tokio::test]
    async fn test_returns_done_text() {
        let (system, counters) = system(Script::Done("[{\"date\": \"Sat\", \"high\": 72}]"));
        let result = system.call(call("Richmond VA")).await;

        assert_eq!(result.status, ToolStatus::Success);
        assert_eq!(result.text(), "[{\"date\": \"Sat\", \"high\": 72}]");
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);

        let tasks = counters.tasks.lock().unwrap();
        assert!(tasks[0].starts_with("Extract 8-Day Weather Forecast for Richmond VA from weather.gov"));
        assert!(tasks[0].contains("- Search for \"Richmond VA\" and click GO"));
    }

    #[tokio::test]
    async fn test_cleanup_failures_keep_forecast() {
        let (system, counters) = build(Script::Done("[{\"date\": \"Sun\", \"high\": 68}]"), true);
        let result = system.call(call("Richmond VA")).await;

        assert_eq!(result, ToolResult::success("[{\"date\": \"Sun\", \"high\": 68}]"));
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_done_action_is_no_data() {
        let (system, counters) = system(Script::NoDone);
        let result = system.call(call("Richmond VA")).await;

        assert_eq!(result, ToolResult::error("Error: NO Data"));
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_failure_still_closes_once() {
        let (system, counters) = system(Script::RunFails);
        let result = system.call(call("Richmond VA")).await;

        assert_eq!(result, ToolResult::error("Error: agent crashed"));
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_stops_remote_session() {
        let (system, counters) = system(Script::ConnectFails);
        let result = system.call(call("Richmond VA")).await;

        assert_eq!(result, ToolResult::error("Error: cdp refused"));
        assert_eq!(counters.closes.load(Ordering::SeqCst), 0);
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_start_failure_touches_nothing_else() {
        let (system, counters) = system(Script::StartFails);
        let result = system.call(call("Richmond VA")).await;

        assert_eq!(result, ToolResult::error("Error: no capacity"));
        assert_eq!(counters.starts.load(Ordering::SeqCst), 1);
        assert_eq!(counters.connects.load(Ordering::SeqCst), 0);
        assert_eq!(counters.stops.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_city_and_unknown_tool() {
        let (system, counters) = system(Script::Done("x"));

        let result = system
            .call(ToolCall::new("get_weather_data", json!({})))
            .await;
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.text().contains("city parameter required"));

        let result = system.call(ToolCall::new("get_tides", json!({}))).await;
        assert_eq!(result, ToolResult::error("Tool not found: get_tides"));
        assert_eq!(counters.starts.load(Ordering::SeqCst), 0);
    }
}
