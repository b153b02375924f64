//! Research store state and pure helpers
//!
//! Holds the observable snapshot plus history filtering and the merge of
//! archived reports with completed history entries.

use crate::api::{JobStatus, ResearchHistoryItem, ResearchJob};
use crate::storage::StoredReport;
use chrono::{DateTime, Utc};

/// Observable state of the research coordination store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResearchState {
    /// The job currently being followed, if any
    pub current_research: Option<ResearchJob>,
    /// Last page of history fetched from the service
    pub research_history: Vec<ResearchHistoryItem>,
    /// Set while a start request is in flight
    pub is_loading: bool,
    /// Message of the last failed user-triggered action
    pub error: Option<String>,
}

impl ResearchState {
    /// History entries whose topic contains `search` (case-insensitive)
    /// and whose status matches `status` when one is given
    pub fn filter_history(
        &self,
        search: &str,
        status: Option<JobStatus>,
    ) -> Vec<ResearchHistoryItem> {
        filter_history(&self.research_history, search, status)
    }
}

/// Filter history items by topic substring and status
///
/// # Examples
///
/// ```
/// use mresearch::api::{JobStatus, ResearchHistoryItem};
/// use mresearch::research::filter_history;
///
/// let item = |id: &str, topic: &str, status| ResearchHistoryItem {
///     research_id: id.to_string(),
///     research_topic: topic.to_string(),
///     status,
///     created_at: chrono::Utc::now(),
///     completed_at: None,
/// };
/// let history = vec![
///     item("r1", "EV Charging", JobStatus::Completed),
///     item("r2", "Packaging", JobStatus::Failed),
/// ];
///
/// assert_eq!(filter_history(&history, "charging", None).len(), 1);
/// assert_eq!(filter_history(&history, "", Some(JobStatus::Failed))[0].research_id, "r2");
/// ```
pub fn filter_history(
    history: &[ResearchHistoryItem],
    search: &str,
    status: Option<JobStatus>,
) -> Vec<ResearchHistoryItem> {
    let needle = search.to_lowercase();
    history
        .iter()
        .filter(|item| item.research_topic.to_lowercase().contains(&needle))
        .filter(|item| status.map_or(true, |s| item.status == s))
        .cloned()
        .collect()
}

/// A completed report available for viewing or export
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSummary {
    pub research_id: String,
    pub research_topic: String,
    pub completed_at: Option<DateTime<Utc>>,
    /// Whether the full report is archived locally
    pub stored: bool,
}

impl From<&StoredReport> for ReportSummary {
    fn from(report: &StoredReport) -> Self {
        Self {
            research_id: report.job.research_id.clone(),
            research_topic: report.research_topic.clone(),
            completed_at: report.job.completed_at,
            stored: true,
        }
    }
}

/// Merge archived reports with completed history entries not yet archived
///
/// Archived reports come first, in archive order.
pub fn merge_completed(
    stored: &[StoredReport],
    history: &[ResearchHistoryItem],
) -> Vec<ReportSummary> {
    let mut merged: Vec<ReportSummary> = stored.iter().map(ReportSummary::from).collect();
    merged.extend(
        history
            .iter()
            .filter(|item| item.status == JobStatus::Completed)
            .filter(|item| !stored.iter().any(|s| s.job.research_id == item.research_id))
            .map(|item| ReportSummary {
                research_id: item.research_id.clone(),
                research_topic: item.research_topic.clone(),
                completed_at: item.completed_at,
                stored: false,
            }),
    );
    merged
}
