/*!
Command handlers for the CLI

This module provides the handlers invoked by the CLI entrypoint. Each
submodule owns one command group:

- `research`  : start, follow, inspect, and delete research jobs
- `reports`   : list completed reports
- `knowledge` : knowledge base statistics and documents
- `analytics` : analytics summary and reset
- `settings`  : locally stored preferences and legacy import
- `health`    : service health check

Handlers build the coordination stores from a [`Context`] and render their
state with `prettytable` and `colored`.
*/

use crate::analytics::AnalyticsStore;
use crate::api::{ApiClient, JobStatus};
use crate::config::Config;
use crate::error::Result;
use crate::knowledge::KnowledgeStore;
use crate::research::ResearchStore;
use crate::storage::LocalStore;

use chrono::{DateTime, Local, Utc};
use colored::{ColoredString, Colorize};
use std::sync::Arc;

pub mod analytics;
pub mod health;
pub mod knowledge;
pub mod reports;
pub mod research;
pub mod settings;

/// Everything a command handler needs: configuration, the local store,
/// and an authenticated API client
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,
    pub storage: LocalStore,
    pub client: Arc<ApiClient>,
}

impl Context {
    /// Open the local store and build an API client authenticated with
    /// the stored token
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be opened or the client cannot be
    /// built from the configuration
    pub fn new(config: Config, storage: LocalStore) -> Result<Self> {
        let token = storage.auth_token()?;
        let client = Arc::new(ApiClient::new(&config.api, token)?);
        Ok(Self {
            config,
            storage,
            client,
        })
    }

    /// Research store polling at the configured interval
    pub fn research_store(&self) -> ResearchStore {
        ResearchStore::new(
            self.client.clone(),
            self.storage.clone(),
            Arc::new(self.analytics_store()),
            self.config.polling.interval(),
        )
    }

    pub fn knowledge_store(&self) -> KnowledgeStore {
        KnowledgeStore::new(self.client.clone())
    }

    pub fn analytics_store(&self) -> AnalyticsStore {
        AnalyticsStore::new(self.storage.clone())
    }
}

/// Attach the store's user-facing message to an error
///
/// The entrypoint prints only the outermost message, so this is what the
/// user sees.
pub(crate) fn with_store_message(err: anyhow::Error, message: Option<String>) -> anyhow::Error {
    match message {
        Some(message) => err.context(message),
        None => err,
    }
}

/// Status rendered in its conventional color
pub(crate) fn status_label(status: JobStatus) -> ColoredString {
    match status {
        JobStatus::Pending => status.as_str().yellow(),
        JobStatus::Running => status.as_str().blue(),
        JobStatus::Completed => status.as_str().green(),
        JobStatus::Failed => status.as_str().red(),
    }
}

/// Local time formatted for tables
pub(crate) fn format_time(time: &DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Milliseconds rendered as minutes and seconds
pub(crate) fn format_duration_ms(ms: f64) -> String {
    let total_secs = (ms / 1000.0).round() as u64;
    let (minutes, seconds) = (total_secs / 60, total_secs % 60);
    if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Human-readable byte size
pub(crate) fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

/// Shorten `text` to at most `max` characters, marking the cut with "..."
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}
