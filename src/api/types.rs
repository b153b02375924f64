//! Wire types exchanged with the research service
//!
//! Field names follow the service's JSON exactly (snake_case). Timestamps
//! produced by the service are frequently naive ISO-8601 strings without an
//! offset; see [`timestamp`] for how they are interpreted.

use crate::error::{MresearchError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum number of characters accepted for a research topic
pub const MIN_TOPIC_CHARS: usize = 3;

/// Minimum number of characters accepted for a research request body
pub const MIN_REQUEST_CHARS: usize = 10;

/// Lifecycle status of a research job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted by the service but not yet started
    Pending,
    /// Agents are working on the job
    Running,
    /// Finished with a result
    Completed,
    /// Finished with an error
    Failed,
}

impl JobStatus {
    /// Whether no further transitions can occur from this status
    ///
    /// # Examples
    ///
    /// ```
    /// use mresearch::api::JobStatus;
    ///
    /// assert!(JobStatus::Completed.is_terminal());
    /// assert!(JobStatus::Failed.is_terminal());
    /// assert!(!JobStatus::Running.is_terminal());
    /// ```
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether a job in this status should be polled
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }

    /// Lowercase wire name of the status
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = MresearchError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(MresearchError::Validation(format!(
                "Unknown research status: {}. Must be one of: pending, running, completed, failed",
                other
            ))),
        }
    }
}

/// Status of a single agent task inside a progress snapshot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Waiting,
    Running,
    Completed,
    Failed,
}

/// A request to start a new research job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResearchRequest {
    /// The main topic to research
    pub research_topic: String,
    /// Detailed description of the insights wanted
    pub research_request: String,
    /// Optional user identifier; the service defaults it when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl ResearchRequest {
    /// Build a request without a user identifier
    pub fn new(topic: impl Into<String>, request: impl Into<String>) -> Self {
        Self {
            research_topic: topic.into(),
            research_request: request.into(),
            user_id: None,
        }
    }

    /// Build the templated request used for quick-start topics
    ///
    /// # Examples
    ///
    /// ```
    /// use mresearch::api::ResearchRequest;
    ///
    /// let req = ResearchRequest::from_template("Sustainable packaging solutions");
    /// assert!(req.research_request.contains("Sustainable packaging solutions market"));
    /// assert!(req.validate().is_ok());
    /// ```
    pub fn from_template(topic: &str) -> Self {
        Self::new(
            topic,
            format!(
                "Analyze the competitive landscape, market trends, and growth opportunities in the {} market",
                topic
            ),
        )
    }

    /// Client-side validation performed before any network call
    ///
    /// # Errors
    ///
    /// Returns `MresearchError::Validation` when the topic is shorter than
    /// [`MIN_TOPIC_CHARS`] or the request text is shorter than
    /// [`MIN_REQUEST_CHARS`] characters.
    pub fn validate(&self) -> Result<()> {
        if self.research_topic.chars().count() < MIN_TOPIC_CHARS {
            return Err(MresearchError::Validation(format!(
                "Topic must be at least {} characters",
                MIN_TOPIC_CHARS
            ))
            .into());
        }

        if self.research_request.chars().count() < MIN_REQUEST_CHARS {
            return Err(MresearchError::Validation(format!(
                "Request must be at least {} characters",
                MIN_REQUEST_CHARS
            ))
            .into());
        }

        Ok(())
    }
}

/// Sample topics offered by the quick-start templates
pub const SAMPLE_TOPICS: [&str; 4] = [
    "Electric vehicle charging infrastructure",
    "AI-powered healthcare diagnostics",
    "Sustainable packaging solutions",
    "Remote work productivity tools",
];

/// Progress of one agent task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskProgress {
    pub task_name: String,
    pub status: TaskStatus,
    /// Label of the agent owning the task
    pub agent: String,
    #[serde(default, with = "timestamp::option")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tools_used: Vec<String>,
    #[serde(default)]
    pub output: Option<String>,
}

/// Progress snapshot computed by the service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchProgress {
    pub current_phase: String,
    #[serde(default)]
    pub completed_tasks: Vec<String>,
    #[serde(default)]
    pub active_task: Option<String>,
    #[serde(default)]
    pub tasks: Vec<TaskProgress>,
    /// Completion percentage in the range 0..=100
    #[serde(default)]
    pub progress_percentage: u8,
}

/// Snapshot of a research job
///
/// Jobs are never patched field by field; every fetch replaces the whole
/// record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchJob {
    pub research_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub progress: Option<ResearchProgress>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "timestamp::option")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ResearchJob {
    /// Milliseconds between creation and completion, when both are known
    ///
    /// Returns `None` for unfinished jobs and for clocks that run backwards.
    pub fn duration_ms(&self) -> Option<u64> {
        let completed = self.completed_at?;
        let millis = (completed - self.created_at).num_milliseconds();
        u64::try_from(millis).ok()
    }

    /// Progress percentage, treating a missing snapshot as zero
    pub fn progress_percentage(&self) -> u8 {
        self.progress
            .as_ref()
            .map(|p| p.progress_percentage.min(100))
            .unwrap_or(0)
    }
}

/// Final result of a completed job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchResult {
    pub research_id: String,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default, with = "timestamp::option")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// One entry of the user's research history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchHistoryItem {
    pub research_id: String,
    pub research_topic: String,
    pub status: JobStatus,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "timestamp::option")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// A page of research history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchHistoryPage {
    pub history: Vec<ResearchHistoryItem>,
    pub total: usize,
    #[serde(default)]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

/// Document counts of the knowledge base
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnowledgeStats {
    pub total_documents: u64,
    pub company_profiles: u64,
    pub industry_reports: u64,
    pub market_data: u64,
    pub user_preferences: u64,
    #[serde(with = "timestamp")]
    pub last_updated: DateTime<Utc>,
}

/// A document stored in the knowledge base
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeFile {
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default, with = "timestamp::option")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub category: String,
}

/// Listing returned by the knowledge files endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeFileList {
    #[serde(default)]
    pub files: Vec<KnowledgeFile>,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub categories: Vec<String>,
    /// Set by the service when scanning the knowledge directory failed
    #[serde(default)]
    pub error: Option<String>,
}

/// Response to a knowledge document upload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadResponse {
    pub message: String,
    pub file_path: String,
    pub size: u64,
    #[serde(default)]
    pub processed: bool,
}

/// Acknowledgement body returned by delete and reindex endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

/// Service health report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthStatus {
    pub status: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub crew_initialized: bool,
    #[serde(default)]
    pub rag_initialized: bool,
    #[serde(default)]
    pub knowledge_stats: Option<KnowledgeStats>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Error payload shape used by the service
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorPayload {
    pub detail: serde_json::Value,
}

impl ErrorPayload {
    /// Render `detail` as a message; validation failures arrive as arrays
    pub(crate) fn message(&self) -> Option<String> {
        match &self.detail {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Serde helpers accepting both RFC 3339 and naive ISO-8601 timestamps
///
/// Naive timestamps are interpreted as UTC. Serialization always emits
/// RFC 3339.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Parse a timestamp string in either accepted form
    ///
    /// # Examples
    ///
    /// ```
    /// use mresearch::api::types::timestamp::parse;
    ///
    /// assert!(parse("2025-03-01T10:00:00.123456").is_some());
    /// assert!(parse("2025-03-01T10:00:00Z").is_some());
    /// assert!(parse("yesterday").is_none());
    /// ```
    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::parse(&raw).map(Some).ok_or_else(|| {
                    serde::de::Error::custom(format!("invalid timestamp: {}", raw))
                }),
                None => Ok(None),
            }
        }
    }
}
