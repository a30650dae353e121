mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use playground_core::config::{load_dotenv, ExecutionLimits};

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    playground_core::observability::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            language,
            timeout,
            max_memory,
            json,
        } => {
            let limits = ExecutionLimits::from_env().with_cli_overrides(timeout, max_memory);
            let succeeded = commands::run::run_file(&file, language, limits, json).await?;
            if !succeeded {
                std::process::exit(1);
            }
        }
        Commands::Repl {
            language,
            starter,
            timeout,
            max_memory,
        } => {
            let limits = ExecutionLimits::from_env().with_cli_overrides(timeout, max_memory);
            commands::repl::run_repl(language, starter.as_deref(), limits).await?;
        }
        Commands::Runtime => {
            commands::runtime::show_runtime().await?;
        }
    }

    Ok(())
}
