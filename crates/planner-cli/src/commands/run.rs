use anyhow::Result;
use console::style;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use planner::config::{Capabilities, PlannerConfig};
use planner::planner::{Planner, PlannerServices, RunOutcome, DEFAULT_QUERY};
use planner::providers::factory::get_provider;

const IDLE_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// The model picks the tools and their order
    Agent,
    /// A fixed workflow calls the tools, the model only writes the plan
    Scripted,
}

pub async fn execute(query: Option<String>, mode: Mode, once: bool) -> Result<()> {
    let mut config = PlannerConfig::from_env()?;
    // Running the planner is consent for its tools to write results
    config.bypass_tool_consent = true;

    println!("🌤️ Weather-Based Activity Planner");
    println!("{}", "=".repeat(30));
    print_capabilities(&config.capabilities());

    let provider = get_provider(config.provider_config()?)?;
    let services = PlannerServices::from_config(&config)?;
    let planner = Planner::new(config, Arc::from(provider), services)?;

    let query = query.unwrap_or_else(|| DEFAULT_QUERY.to_string());
    println!("\n{} {}", style("🔍 Query:").bold().blue(), query);

    let outcome = match mode {
        Mode::Agent => planner.run(Some(query.as_str())).await,
        Mode::Scripted => planner.run_scripted(Some(query.as_str())).await,
    };
    render(&outcome)?;

    if !once {
        idle().await;
    }
    Ok(())
}

fn print_capabilities(capabilities: &Capabilities) {
    let line = |name: &str, enabled: bool| {
        if enabled {
            println!("{} {}", style("✓").green(), name);
        } else {
            println!("{} {} {}", style("✗").red(), name, style("(not enabled)").dim());
        }
    };
    line("Browser", capabilities.browser);
    line("Code Interpreter", capabilities.code_interpreter);
    line("Memory", capabilities.memory);
}

fn render(outcome: &RunOutcome) -> Result<()> {
    match outcome {
        RunOutcome::Completed { result } => {
            println!("\n{}\n{}", style("✅ Plan").bold().green(), result);
        }
        RunOutcome::Error { error } => {
            println!("\n{} {}", style("❌ Error:").bold().red(), error);
        }
    }
    println!("\n{}", serde_json::to_string_pretty(outcome)?);
    Ok(())
}

async fn idle() {
    println!("\nWaiting for requests...");
    println!("Press Ctrl+C to exit");
    loop {
        tokio::select! {
            _ = tokio::time::sleep(IDLE_INTERVAL) => debug!("Still idle"),
            _ = tokio::signal::ctrl_c() => break,
        }
    }
}
