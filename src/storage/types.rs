use crate::api::types::timestamp;
use crate::api::ResearchJob;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record keys understood by the local store
pub mod keys {
    pub const AUTH_TOKEN: &str = "auth_token";
    pub const RESEARCH_HISTORY: &str = "research_history";
    pub const RESEARCH_REPORTS: &str = "research_reports";
    pub const RESEARCH_ANALYTICS: &str = "research_analytics";
    pub const DOWNLOADS_COUNT: &str = "downloads_count";
    pub const API_URL: &str = "api_url";
    pub const USERNAME: &str = "username";
    pub const EMAIL: &str = "email";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const AUTO_REFRESH: &str = "auto_refresh";
    /// Map of research id to the topic it was started with
    pub const RESEARCH_TOPICS: &str = "research_topics";

    /// Keys that hold user preferences
    pub const PREFERENCES: [&str; 5] = [API_URL, USERNAME, EMAIL, NOTIFICATIONS, AUTO_REFRESH];
}

/// A completed research job archived locally
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredReport {
    /// The job snapshot at completion
    pub job: ResearchJob,
    /// Topic the job was started with
    pub research_topic: String,
    /// When the report was archived
    #[serde(with = "timestamp")]
    pub saved_at: DateTime<Utc>,
}

impl StoredReport {
    pub fn research_id(&self) -> &str {
        &self.job.research_id
    }

    /// File name used when exporting the report as PDF
    ///
    /// # Examples
    ///
    /// ```
    /// use mresearch::api::fake::FakeBackend;
    /// use mresearch::api::JobStatus;
    /// use mresearch::storage::StoredReport;
    ///
    /// let report = StoredReport {
    ///     job: FakeBackend::job("r1", JobStatus::Completed),
    ///     research_topic: "EV charging  networks".to_string(),
    ///     saved_at: chrono::Utc::now(),
    /// };
    /// assert_eq!(report.pdf_file_name(), "EV-charging-networks.pdf");
    /// ```
    pub fn pdf_file_name(&self) -> String {
        pdf_file_name(&self.research_topic)
    }
}

/// Derive a PDF file name from a topic by collapsing whitespace runs to `-`
pub fn pdf_file_name(topic: &str) -> String {
    let slug = topic.split_whitespace().collect::<Vec<_>>().join("-");
    if slug.is_empty() {
        "report.pdf".to_string()
    } else {
        format!("{}.pdf", slug)
    }
}

/// User preferences kept in the local store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Preferences {
    /// Preferred API base URL; the configured URL is used when unset
    pub api_url: Option<String>,
    pub username: String,
    pub email: String,
    pub notifications: bool,
    pub auto_refresh: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            api_url: None,
            username: "Developer".to_string(),
            email: "dev@example.com".to_string(),
            notifications: true,
            auto_refresh: false,
        }
    }
}
