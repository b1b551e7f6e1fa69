use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use toolbridge_core::TrimBudget;

mod tools_cmd;
mod trim_cmd;

#[derive(Parser)]
#[command(name = "toolbridge", about = "Toolbridge CLI - MCP tool discovery for LLM agents")]
struct Cli {
    /// Toolbridge server URL
    #[arg(long, env = "TOOLBRIDGE_URL", default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured toolsets and whether their tools are cached
    Toolsets,

    /// Discover (or fetch cached) tools of a toolset and print them
    Tools {
        /// Toolset name
        toolset: String,

        /// Agent name passed as selection context
        #[arg(long)]
        agent_name: Option<String>,
    },

    /// Trim a JSON conversation history file and print the result
    Trim {
        /// Path to a JSON array of turns
        file: std::path::PathBuf,

        /// Previous user turns to keep (-1 disables trimming); defaults to
        /// the server's setting
        #[arg(long, allow_hyphen_values = true)]
        max_previous_user_turns: Option<TrimBudget>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Toolsets => tools_cmd::list_toolsets(&cli.url).await?,
        Commands::Tools {
            toolset,
            agent_name,
        } => tools_cmd::get_tools(&cli.url, &toolset, agent_name.as_deref()).await?,
        Commands::Trim {
            file,
            max_previous_user_turns,
        } => trim_cmd::run(&cli.url, &file, max_previous_user_turns).await?,
    }

    Ok(())
}
