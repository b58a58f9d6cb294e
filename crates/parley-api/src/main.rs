//! Parley CLI and REST API entry point.
//!
//! Binary name: `parley`
//!
//! Parses CLI arguments, initializes tracing, database and services, then
//! dispatches to the appropriate command handler or starts the REST API server.

mod cli;
mod http;
mod state;

use anyhow::anyhow;
use clap::Parser;

use cli::{Cli, Commands, KeyCommand, SessionsCommand};
use parley_observe::tracing_setup::{filter_for_verbosity, init_tracing, shutdown_tracing};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.otel, filter_for_verbosity(cli.verbose, cli.quiet))
        .map_err(|e| anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init().await?;

    match cli.command {
        Commands::Serve { port, host } => cli::serve::serve(state, host, port).await?,

        Commands::Key { action } => match action {
            KeyCommand::Create { user, name } => {
                cli::key::create_key(&state, &user, &name, cli.json).await?;
            }
        },

        Commands::Ask {
            user,
            session,
            message,
        } => {
            cli::ask::ask(&state, &user, session, message, cli.json).await?;
            // Fallback titles are detached; let them land before exiting.
            state.tasks.drain().await;
        }

        Commands::Sessions { action } => match action {
            SessionsCommand::List { user } => {
                cli::sessions::list_sessions(&state, &user, cli.json).await?;
            }
        },
    }

    Ok(())
}
