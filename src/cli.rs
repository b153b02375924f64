//! Command-line interface definition for mresearch
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for research jobs, reports, the knowledge base,
//! analytics, and local settings.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::api::JobStatus;

/// mresearch - Market research AI client
///
/// Start research jobs on a Market Research AI service, follow their
/// progress, and manage reports and the knowledge base from the terminal.
#[derive(Parser, Debug, Clone)]
#[command(name = "mresearch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Base URL of the research service (overrides config and saved settings)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Path to the local SQLite store
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for mresearch
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start and manage research jobs
    Research {
        #[command(subcommand)]
        command: ResearchCommand,
    },

    /// List completed reports
    Reports {
        #[command(subcommand)]
        command: ReportsCommand,
    },

    /// Manage the knowledge base
    Knowledge {
        #[command(subcommand)]
        command: KnowledgeCommand,
    },

    /// Show or reset research analytics
    Analytics {
        #[command(subcommand)]
        command: AnalyticsCommand,
    },

    /// Manage locally stored settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },

    /// Check service health
    Health,
}

/// Research job subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ResearchCommand {
    /// Start a new research job and follow it until it finishes
    Start {
        /// Research topic (at least 3 characters)
        #[arg(short, long)]
        topic: String,

        /// Detailed research request (at least 10 characters)
        #[arg(short, long)]
        request: String,

        /// Optional user identifier sent with the request
        #[arg(long)]
        user_id: Option<String>,

        /// Return right after the job is accepted instead of following it
        #[arg(long)]
        no_wait: bool,
    },

    /// Show the current status of a job
    Status {
        /// Research job identifier
        id: String,
    },

    /// Follow a job until it finishes (Ctrl+C stops following)
    Watch {
        /// Research job identifier
        id: String,
    },

    /// Print the result of a completed job
    Result {
        /// Research job identifier
        id: String,
    },

    /// List past research jobs
    History {
        /// Maximum number of jobs to fetch (defaults to history.default_limit)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Number of jobs to skip
        #[arg(short, long, default_value = "0")]
        offset: usize,

        /// Only show jobs whose topic contains this text
        #[arg(short, long)]
        search: Option<String>,

        /// Only show jobs with this status (pending, running, completed, failed)
        #[arg(long)]
        status: Option<JobStatus>,
    },

    /// Delete a job
    Delete {
        /// Research job identifier
        id: String,
    },

    /// Download the PDF export of a job
    Download {
        /// Research job identifier
        id: String,

        /// Output path (defaults to a file named after the topic)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Report subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ReportsCommand {
    /// List stored and completed reports
    List,
}

/// Knowledge base subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum KnowledgeCommand {
    /// Show knowledge base statistics
    Stats,

    /// List knowledge documents
    Files,

    /// Upload a document
    Upload {
        /// Path of the document to upload
        path: PathBuf,
    },

    /// Delete a document
    Delete {
        /// Name of the document
        name: String,
    },

    /// Rebuild the knowledge index
    Reindex,
}

/// Analytics subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum AnalyticsCommand {
    /// Show the analytics summary and recent activity
    Show,

    /// Reset all analytics counters
    Reset,
}

/// Settings subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SettingsCommand {
    /// Show saved settings
    Show,

    /// Save a setting (api_url, username, email, notifications, auto_refresh, auth_token)
    Set {
        /// Setting name
        key: String,

        /// New value
        value: String,
    },

    /// Import a browser localStorage export (JSON object)
    Import {
        /// Path of the JSON export
        file: PathBuf,
    },

    /// Delete the locally cached research history
    ClearHistory,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            api_url: None,
            store: None,
            verbose: false,
            command: Commands::Health,
        }
    }
}
