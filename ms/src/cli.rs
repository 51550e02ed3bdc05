//! CLI command definitions and subcommands

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// MsgSync - realtime messaging synchronization engine
#[derive(Parser)]
#[command(
    name = "msgsync",
    about = "Keeps a local messaging cache fresh via WebSocket push with polling fallback",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the sync engine in the foreground, printing activity
    Run {
        /// Conversation whose messages should be kept fresh
        #[arg(short = 'a', long = "conversation")]
        conversation: Option<String>,
    },

    /// Fetch and display the conversation list
    Conversations {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Fetch and display one conversation's messages
    Messages {
        /// Conversation id
        conversation_id: String,

        /// Maximum number of messages to fetch
        #[arg(short = 'n', long)]
        limit: Option<u32>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}
