use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod logging;

use commands::run::Mode;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Plan the weekend for a query, then wait for Ctrl+C
    Run {
        /// What to ask, e.g. "What should I do this weekend in Richmond VA?"
        query: Option<String>,

        /// Who decides the order of the tool calls
        #[arg(short, long, value_enum, default_value = "agent")]
        mode: Mode,

        /// Exit after printing the result instead of idling
        #[arg(long)]
        once: bool,
    },

    /// Print the version
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init();

    let cli = Cli::parse();
    match cli.command {
        Some(Command::Run { query, mode, once }) => commands::run::execute(query, mode, once).await,
        Some(Command::Version) => commands::version::execute().await,
        None => commands::run::execute(None, Mode::Agent, false).await,
    }
}
