//! CLI argument parsing and command routing

use clap::{Parser, Subcommand};

/// Sage: terminal client for the Sage assistant backend
#[derive(Debug, Parser)]
#[command(name = "sage")]
#[command(about = "Chat with the Sage assistant from the terminal", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Override the backend base URL
    #[arg(long, global = true, env = "SAGE_BASE_URL")]
    pub base_url: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the interactive chat interface
    Repl,

    /// Run a single query and print the streamed reply
    Query {
        /// The query to send
        query: String,

        /// Continue an existing session
        #[arg(long)]
        session: Option<String>,
    },

    /// Print the transcript of a stored session
    History {
        /// Session identifier
        session_id: String,
    },

    /// Show version information
    Version,
}

impl Cli {
    /// Parse CLI arguments from environment
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
