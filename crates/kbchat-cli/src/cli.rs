//! CLI command definitions using clap

use crate::output::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// kbchat - chat with your knowledge base
#[derive(Parser, Debug)]
#[command(name = "kbchat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(short = 'o', long, global = true, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Configuration file path (YAML, TOML or JSON)
    #[arg(short = 'c', long, global = true, env = "KBCHAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Knowledge store snapshot file, overriding the configured path
    #[arg(short = 's', long, global = true, env = "KBCHAT_STORE__PATH")]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a document to the knowledge base
    Add {
        /// Document title
        #[arg(short, long)]
        title: String,

        /// Document text; read from --file when omitted
        #[arg(short = 'C', long, conflicts_with = "file")]
        content: Option<String>,

        /// Read the document text from a file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Category label
        #[arg(short = 'k', long)]
        category: Option<String>,

        /// Source URL recorded with the document
        #[arg(long)]
        url: Option<String>,
    },

    /// Update fields of an existing document
    Update {
        /// Document id
        id: String,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short = 'C', long)]
        content: Option<String>,

        #[arg(short = 'k', long)]
        category: Option<String>,
    },

    /// Remove a document
    #[command(alias = "rm")]
    Remove {
        /// Document id
        id: String,
    },

    /// List documents, newest first
    #[command(alias = "ls")]
    List,

    /// Show one document
    Show {
        /// Document id
        id: String,
    },

    /// Search the knowledge base without generating an answer
    Search {
        /// Search text
        query: String,

        /// Maximum number of results
        #[arg(short = 'n', long)]
        top_k: Option<usize>,
    },

    /// Ask a single question
    Ask {
        /// The question
        question: String,

        /// Chat session to continue; a new one is started when omitted
        #[arg(long)]
        session: Option<String>,

        /// Number of documents used as context
        #[arg(short = 'n', long)]
        top_k: Option<usize>,

        /// Print the answer as it is generated. With `-o json`, one event
        /// object per line.
        #[arg(long)]
        stream: bool,
    },

    /// Start an interactive chat session
    Chat {
        /// Chat session to continue; a new one is started when omitted
        #[arg(long)]
        session: Option<String>,

        /// Number of documents used as context
        #[arg(short = 'n', long)]
        top_k: Option<usize>,
    },

    /// Manage chat sessions
    #[command(alias = "session")]
    Sessions {
        #[command(subcommand)]
        action: SessionCommands,
    },

    /// Check configuration, store and chat backend
    Doctor,

    /// Show the recorded exchanges of a session
    History {
        /// Session id
        session: String,

        /// Maximum number of exchanges
        #[arg(short = 'n', long, default_value_t = 50)]
        limit: usize,
    },
}

/// Session subcommands
#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// List sessions, most recently active first
    #[command(alias = "ls")]
    List,

    /// Start a new session and print its id
    New,

    /// Show one session
    Show {
        /// Session id
        id: String,
    },
}

impl Commands {
    /// Whether the command produces answers and so needs the chat backend
    pub fn needs_backend(&self) -> bool {
        matches!(self, Self::Ask { .. } | Self::Chat { .. } | Self::Doctor)
    }
}
