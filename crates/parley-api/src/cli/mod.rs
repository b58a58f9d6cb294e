//! CLI command definitions for the `parley` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod ask;
pub mod key;
pub mod serve;
pub mod sessions;

use clap::{Parser, Subcommand};

/// Streaming LLM relay with conversation titles.
#[derive(Parser)]
#[command(name = "parley", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans to stdout via OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Port to listen on (defaults to `[server] port`).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to `[server] host`).
        #[arg(long)]
        host: Option<String>,
    },

    /// Manage API keys.
    Key {
        #[command(subcommand)]
        action: KeyCommand,
    },

    /// Run one generation and stream the answer to the terminal.
    Ask {
        /// Principal to act as.
        #[arg(long)]
        user: String,

        /// Continue an existing conversation.
        #[arg(long)]
        session: Option<String>,

        /// The user message.
        message: String,
    },

    /// Browse conversations.
    Sessions {
        #[command(subcommand)]
        action: SessionsCommand,
    },
}

#[derive(Subcommand)]
pub enum KeyCommand {
    /// Create an API key for a principal. The key is printed once.
    Create {
        #[arg(long)]
        user: String,

        /// Label for the key.
        #[arg(long, default_value = "default")]
        name: String,
    },
}

#[derive(Subcommand)]
pub enum SessionsCommand {
    /// List a principal's active conversations.
    #[command(alias = "ls")]
    List {
        #[arg(long)]
        user: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask() {
        let cli = Cli::try_parse_from([
            "parley", "--json", "ask", "--user", "ada", "--session", "abc", "Hello there",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Ask {
                user,
                session,
                message,
            } => {
                assert_eq!(user, "ada");
                assert_eq!(session.as_deref(), Some("abc"));
                assert_eq!(message, "Hello there");
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn test_parse_key_create_default_name() {
        let cli = Cli::try_parse_from(["parley", "key", "create", "--user", "ada"]).unwrap();
        match cli.command {
            Commands::Key {
                action: KeyCommand::Create { user, name },
            } => {
                assert_eq!(user, "ada");
                assert_eq!(name, "default");
            }
            _ => panic!("expected key create"),
        }
    }

    #[test]
    fn test_parse_verbosity() {
        let cli = Cli::try_parse_from(["parley", "-vv", "sessions", "list", "--user", "ada"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
    }
}
